use crate::core::models::{CollectionRun, RunStatus, RunSummary};
use crate::core::settings::NotificationSettings;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
pub struct RunTransition {
    pub run: CollectionRun,
    pub previous: Option<RunStatus>,
}

impl RunTransition {
    pub fn should_notify(&self, settings: &NotificationSettings) -> bool {
        if !settings.enabled {
            return false;
        }
        match self.run.status {
            RunStatus::Failed => settings.on_failure,
            RunStatus::Completed | RunStatus::Cancelled => settings.on_completion,
            _ => false,
        }
    }
}

#[derive(Default)]
struct StoreInner {
    /// Latest listing, newest run first.
    runs: Vec<CollectionRun>,
    /// Last observed status of every run in the latest listing.
    statuses: HashMap<i64, RunStatus>,
    initialized: bool,
    last_error: Option<String>,
    last_update: Option<DateTime<Utc>>,
}

/// Latest view of recent collection runs as seen by the monitor.
#[derive(Clone, Default)]
pub struct RunStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl RunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the view with a fresh listing and returns the runs that just reached a
    /// terminal status.
    ///
    /// The first listing only establishes a baseline. After that, a run counts as a
    /// transition when it was last seen non-terminal, or when it appears for the first
    /// time already finished. Runs that dropped out of the listing are forgotten.
    pub async fn apply(&self, mut runs: Vec<CollectionRun>) -> Vec<RunTransition> {
        let mut inner = self.inner.write().await;
        let baseline = !inner.initialized;
        let mut transitions = Vec::new();
        let mut statuses = HashMap::with_capacity(runs.len());

        for run in &runs {
            let previous = inner.statuses.get(&run.id).copied();
            let finished_now = run.status.is_terminal()
                && match previous {
                    Some(status) => !status.is_terminal(),
                    None => !baseline,
                };

            if finished_now {
                transitions.push(RunTransition {
                    run: run.clone(),
                    previous,
                });
            }
            statuses.insert(run.id, run.status);
        }

        runs.sort_by(|a, b| b.id.cmp(&a.id));
        inner.runs = runs;
        inner.statuses = statuses;
        inner.initialized = true;
        inner.last_error = None;
        inner.last_update = Some(Utc::now());
        transitions
    }

    /// Keeps the last known runs; only the error is recorded.
    pub async fn set_error(&self, error: String) {
        self.inner.write().await.last_error = Some(error);
    }

    pub async fn get_error(&self) -> Option<String> {
        self.inner.read().await.last_error.clone()
    }

    pub async fn last_update(&self) -> Option<DateTime<Utc>> {
        self.inner.read().await.last_update
    }

    pub async fn runs(&self) -> Vec<CollectionRun> {
        self.inner.read().await.runs.clone()
    }

    pub async fn summary(&self) -> RunSummary {
        RunSummary::from_runs(&self.inner.read().await.runs)
    }

    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        *inner = StoreInner::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(id: i64, status: RunStatus) -> CollectionRun {
        CollectionRun {
            id,
            provider: 1,
            provider_name: None,
            status,
            started_at: None,
            finished_at: None,
            resource_count: 0,
            error_message: None,
        }
    }

    #[tokio::test]
    async fn test_first_listing_is_baseline() {
        let store = RunStore::new();
        let transitions = store
            .apply(vec![run(1, RunStatus::Completed), run(2, RunStatus::Failed)])
            .await;

        assert!(transitions.is_empty());
        assert_eq!(store.runs().await.len(), 2);
        assert!(store.last_update().await.is_some());
    }

    #[tokio::test]
    async fn test_transition_reported_once() {
        let store = RunStore::new();
        store.apply(vec![run(1, RunStatus::Running)]).await;

        let transitions = store.apply(vec![run(1, RunStatus::Failed)]).await;
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].previous, Some(RunStatus::Running));
        assert_eq!(transitions[0].run.status, RunStatus::Failed);

        let transitions = store.apply(vec![run(1, RunStatus::Failed)]).await;
        assert!(transitions.is_empty());
    }

    #[tokio::test]
    async fn test_new_run_already_finished_after_baseline() {
        let store = RunStore::new();
        store.apply(vec![run(1, RunStatus::Completed)]).await;

        let transitions = store
            .apply(vec![run(2, RunStatus::Completed), run(3, RunStatus::Pending)])
            .await;
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].run.id, 2);
        assert_eq!(transitions[0].previous, None);
    }

    #[tokio::test]
    async fn test_error_keeps_runs() {
        let store = RunStore::new();
        store.apply(vec![run(1, RunStatus::Running)]).await;

        store.set_error("503 Service Unavailable".to_string()).await;
        assert_eq!(store.get_error().await.as_deref(), Some("503 Service Unavailable"));
        assert_eq!(store.runs().await.len(), 1);

        store.apply(vec![run(1, RunStatus::Running)]).await;
        assert!(store.get_error().await.is_none());
    }

    #[tokio::test]
    async fn test_sliding_window_forgets_old_runs() {
        let store = RunStore::new();
        store
            .apply(vec![run(2, RunStatus::Pending), run(1, RunStatus::Running)])
            .await;

        for newest in 3..103 {
            store
                .apply(vec![
                    run(newest, RunStatus::Completed),
                    run(newest - 1, RunStatus::Completed),
                ])
                .await;
        }

        let ids: Vec<i64> = store.runs().await.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![102, 101]);

        let summary = store.summary().await;
        assert_eq!(summary.total, 2);
        assert_eq!(summary.running, 0);
        assert_eq!(store.inner.read().await.statuses.len(), 2);
    }

    #[tokio::test]
    async fn test_summary_and_ordering() {
        let store = RunStore::new();
        store
            .apply(vec![
                run(1, RunStatus::Completed),
                run(3, RunStatus::Running),
                run(2, RunStatus::Failed),
            ])
            .await;

        let ids: Vec<i64> = store.runs().await.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);

        let summary = store.summary().await;
        assert_eq!(summary.total, 3);
        assert_eq!(summary.running, 1);

        store.clear().await;
        assert!(store.runs().await.is_empty());
    }

    #[test]
    fn test_should_notify() {
        let settings = NotificationSettings::default();
        let failed = RunTransition {
            run: run(1, RunStatus::Failed),
            previous: Some(RunStatus::Running),
        };
        let completed = RunTransition {
            run: run(2, RunStatus::Completed),
            previous: Some(RunStatus::Running),
        };

        assert!(failed.should_notify(&settings));
        assert!(!completed.should_notify(&settings));

        let all = NotificationSettings {
            enabled: true,
            on_failure: true,
            on_completion: true,
        };
        assert!(completed.should_notify(&all));

        let off = NotificationSettings {
            enabled: false,
            ..all
        };
        assert!(!failed.should_notify(&off));
    }
}
