use crate::core::models::{DriftEvent, DriftKind};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// Drift events detected on one UTC calendar day.
#[derive(Debug, Clone, Serialize)]
pub struct DriftDay {
    pub date: NaiveDate,
    pub events: Vec<DriftEvent>,
}

impl DriftDay {
    pub fn count(&self, kind: DriftKind) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }
}

/// Groups events by day, newest day first; newest event first within a day.
pub fn timeline(events: Vec<DriftEvent>) -> Vec<DriftDay> {
    let mut days: BTreeMap<NaiveDate, Vec<DriftEvent>> = BTreeMap::new();
    for event in events {
        days.entry(event.detected_at.date_naive())
            .or_default()
            .push(event);
    }

    days.into_iter()
        .rev()
        .map(|(date, mut events)| {
            events.sort_by(|a, b| {
                b.detected_at
                    .cmp(&a.detected_at)
                    .then_with(|| b.id.cmp(&a.id))
            });
            DriftDay { date, events }
        })
        .collect()
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct DriftSummary {
    pub changed: usize,
    pub deleted: usize,
    pub restored: usize,
    pub other: usize,
    pub resources: usize,
}

pub fn summarize(events: &[DriftEvent]) -> DriftSummary {
    let mut summary = DriftSummary::default();
    let mut resources: Vec<i64> = Vec::new();

    for event in events {
        match event.kind {
            DriftKind::Changed => summary.changed += 1,
            DriftKind::Deleted => summary.deleted += 1,
            DriftKind::Restored => summary.restored += 1,
            DriftKind::Unknown => summary.other += 1,
        }
        resources.push(event.resource);
    }

    resources.sort_unstable();
    resources.dedup();
    summary.resources = resources.len();
    summary
}
