use crate::api::{ApiClient, DriftFilter};
use crate::cli::output::print_json;
use crate::core::drift::{summarize, timeline, DriftDay, DriftSummary};
use crate::core::models::{DriftEvent, DriftKind, FieldChange, PropertyValue};
use anyhow::Result;
use chrono::{Duration, Utc};
use clap::Args;
use serde::Serialize;

#[derive(Args)]
pub struct DriftArgs {
    /// Only changes of this resource
    #[arg(long)]
    pub resource: Option<i64>,

    /// Only changes of resources from this provider
    #[arg(long)]
    pub provider: Option<i64>,

    /// Number of days to include
    #[arg(long, default_value = "7")]
    pub days: u32,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct DriftOutput {
    summary: DriftSummary,
    days: Vec<DriftDay>,
}

pub async fn run(client: &ApiClient, args: DriftArgs) -> Result<()> {
    let filter = DriftFilter {
        resource: args.resource,
        provider: args.provider,
        since: Some(Utc::now() - Duration::days(i64::from(args.days))),
    };

    let events = client.list_drift(&filter).await?;
    let summary = summarize(&events);
    let days = timeline(events);

    if args.json {
        return print_json(&DriftOutput { summary, days });
    }

    println!(
        "Drift over the last {} days: {} changed, {} deleted, {} restored across {} resources",
        args.days, summary.changed, summary.deleted, summary.restored, summary.resources
    );

    for day in &days {
        println!();
        println!(
            "{}  {} changed, {} deleted, {} restored",
            day.date.format("%a %Y-%m-%d"),
            day.count(DriftKind::Changed),
            day.count(DriftKind::Deleted),
            day.count(DriftKind::Restored)
        );
        for event in &day.events {
            println!("  {}", event_line(event));
            for change in &event.changes {
                println!("      {}", change_line(change));
            }
        }
    }
    Ok(())
}

fn event_line(event: &DriftEvent) -> String {
    let name = event
        .resource_name
        .clone()
        .unwrap_or_else(|| format!("resource {}", event.resource));
    format!(
        "{}  {:<8}  {}",
        event.detected_at.format("%H:%M"),
        event.kind.to_string(),
        name
    )
}

fn change_line(change: &FieldChange) -> String {
    let show = |value: &Option<PropertyValue>| match value {
        Some(v) => v.to_string(),
        None => "-".to_string(),
    };
    format!("{}: {} -> {}", change.field, show(&change.old), show(&change.new))
}
