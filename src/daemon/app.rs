use crate::api::{ApiClient, ApiError, RunFilter};
use crate::core::credentials::Session;
use crate::core::models::CollectionRun;
use crate::core::notifications::send_run_notification;
use crate::core::polling::{PollOperation, PollState, Poller};
use crate::core::settings::Settings;
use crate::core::store::RunStore;
use crate::core::watcher::FileWatcher;
use crate::daemon::dbus::{start_dbus_server, DbusCommand};
use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Lists the most recent collection runs.
struct RecentRuns {
    client: ApiClient,
    filter: RunFilter,
}

impl RecentRuns {
    fn new(client: ApiClient, window: u32) -> Self {
        Self {
            client,
            filter: RunFilter::recent(window),
        }
    }
}

#[async_trait]
impl PollOperation<Vec<CollectionRun>> for RecentRuns {
    async fn call(&self) -> Result<Vec<CollectionRun>> {
        Ok(self.client.list_runs(&self.filter).await?.results)
    }
}

fn watch_file(
    path: Option<PathBuf>,
    what: &str,
) -> (Option<FileWatcher>, mpsc::UnboundedReceiver<()>) {
    let Some(path) = path else {
        return (None, mpsc::unbounded_channel().1);
    };
    match FileWatcher::start(path) {
        Ok((watcher, rx)) => (Some(watcher), rx),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to watch {what} file");
            (None, mpsc::unbounded_channel().1)
        }
    }
}

pub async fn run(mut settings: Settings) -> Result<()> {
    let session = Session::from_default_store()?;
    if !session.is_authenticated() {
        tracing::warn!("No stored credentials; requests will be anonymous until `invctl login`");
    }

    let client = ApiClient::new(&settings.api, session.clone())?;
    let store = RunStore::new();

    let mut poller = Poller::start(
        RecentRuns::new(client.clone(), settings.polling.run_window),
        settings.polling.interval(),
        settings.polling.enabled,
    )?;
    let mut state_rx = poller.subscribe();

    tracing::info!(
        base_url = %settings.api.base_url,
        interval_secs = settings.polling.interval_secs,
        enabled = settings.polling.enabled,
        "Run monitor started"
    );

    let (dbus_cmd_tx, mut dbus_cmd_rx) = mpsc::unbounded_channel::<DbusCommand>();
    let _dbus_connection = match start_dbus_server(dbus_cmd_tx, store.clone()).await {
        Ok(connection) => Some(connection),
        Err(e) => {
            tracing::warn!(error = %e, "D-Bus unavailable, `invctl refresh` will not reach this monitor");
            None
        }
    };

    let (_cred_watcher, mut cred_change_rx) = watch_file(session.watch_path(), "credentials");
    let (_config_watcher, mut config_change_rx) = watch_file(Settings::config_path(), "config");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut last_sequence = 0;
    loop {
        tokio::select! {
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = state_rx.borrow_and_update().clone();
                if state.sequence != last_sequence {
                    last_sequence = state.sequence;
                    handle_poll_result(&state, &store, &settings).await;
                }
            }
            Some(cmd) = dbus_cmd_rx.recv() => match cmd {
                DbusCommand::Refresh => {
                    tracing::info!(in_flight = poller.state().loading, "D-Bus refresh command received");
                    poller.refresh();
                }
            },
            Some(()) = cred_change_rx.recv() => {
                tracing::info!(authenticated = session.is_authenticated(), "Credentials changed, refreshing");
                // Another account may see other runs; start from a fresh baseline.
                store.clear().await;
                poller.refresh();
            }
            Some(()) = config_change_rx.recv() => match Settings::load() {
                Ok(new) => {
                    if let Err(e) = apply_settings(&mut poller, &client, &mut settings, new) {
                        tracing::warn!(error = %e, "Failed to apply reloaded settings");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Failed to reload settings, keeping current ones"),
            },
            _ = &mut shutdown => {
                tracing::info!("Shutdown requested");
                break;
            }
        }
    }

    poller.shutdown();
    tracing::info!(tracked_runs = store.runs().await.len(), "Run monitor stopped");
    Ok(())
}

/// Applies a reloaded config to the running monitor. API settings need a restart.
fn apply_settings(
    poller: &mut Poller<Vec<CollectionRun>>,
    client: &ApiClient,
    current: &mut Settings,
    new: Settings,
) -> Result<()> {
    let api_changed = new.api.base_url != current.api.base_url
        || new.api.prefix != current.api.prefix
        || new.api.timeout_secs != current.api.timeout_secs;
    if api_changed {
        tracing::warn!("API settings changed; restart the monitor to apply them");
    }

    poller.set_interval(new.polling.interval())?;
    if new.polling.run_window != current.polling.run_window {
        poller.set_operation(RecentRuns::new(client.clone(), new.polling.run_window));
    }
    poller.set_enabled(new.polling.enabled);

    tracing::info!(
        interval_secs = poller.interval().as_secs(),
        run_window = new.polling.run_window,
        enabled = poller.is_enabled(),
        polling = poller.is_polling(),
        "Settings reloaded"
    );

    current.polling = new.polling;
    current.notifications = new.notifications;
    current.debug = new.debug;
    Ok(())
}

async fn handle_poll_result(
    state: &PollState<Vec<CollectionRun>>,
    store: &RunStore,
    settings: &Settings,
) {
    if let Some(error) = &state.error {
        let hint = match error.downcast_ref::<ApiError>() {
            Some(api_error) if api_error.is_unauthorized() => " (run `invctl login`)",
            _ => "",
        };
        tracing::warn!(error = %error, "Failed to poll collection runs{hint}");
        store.set_error(format!("{error}{hint}")).await;
        return;
    }

    let Some(runs) = &state.data else {
        return;
    };

    let transitions = store.apply(runs.clone()).await;
    tracing::debug!(
        runs = runs.len(),
        finished = transitions.len(),
        "Applied poll result"
    );

    for transition in transitions {
        tracing::info!(
            run = transition.run.id,
            provider = transition.run.provider,
            previous = ?transition.previous,
            status = %transition.run.status,
            resources = transition.run.resource_count,
            "Collection run finished"
        );

        if transition.should_notify(&settings.notifications) {
            if let Err(e) = send_run_notification(&transition) {
                tracing::warn!(error = %e, "Failed to send notification");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::testing::{client, dead_base_url};
    use crate::core::models::RunStatus;
    use std::sync::Arc;
    use std::time::Duration;

    fn run(id: i64, status: RunStatus) -> CollectionRun {
        CollectionRun {
            id,
            provider: 1,
            provider_name: None,
            status,
            started_at: None,
            finished_at: None,
            resource_count: 3,
            error_message: None,
        }
    }

    fn quiet_settings() -> Settings {
        let mut settings = Settings::default();
        settings.notifications.enabled = false;
        settings
    }

    #[tokio::test]
    async fn test_error_result_records_hint_and_keeps_runs() {
        let store = RunStore::new();
        let settings = quiet_settings();

        let ok = PollState {
            data: Some(vec![run(1, RunStatus::Running)]),
            error: None,
            loading: false,
            sequence: 1,
        };
        handle_poll_result(&ok, &store, &settings).await;

        let unauthorized = ApiError::Status {
            status: 401,
            status_text: "Unauthorized".to_string(),
            body: String::new(),
        };
        let failed = PollState {
            data: ok.data.clone(),
            error: Some(Arc::new(anyhow::Error::new(unauthorized))),
            loading: false,
            sequence: 2,
        };
        handle_poll_result(&failed, &store, &settings).await;

        let error = store.get_error().await.unwrap();
        assert!(error.contains("401"));
        assert!(error.ends_with("(run `invctl login`)"));
        assert_eq!(store.runs().await.len(), 1);
    }

    #[tokio::test]
    async fn test_success_result_updates_store() {
        let store = RunStore::new();
        let settings = quiet_settings();

        let first = PollState {
            data: Some(vec![run(1, RunStatus::Running)]),
            error: None,
            loading: false,
            sequence: 1,
        };
        handle_poll_result(&first, &store, &settings).await;

        let second = PollState {
            data: Some(vec![run(1, RunStatus::Completed)]),
            error: None,
            loading: false,
            sequence: 2,
        };
        handle_poll_result(&second, &store, &settings).await;

        assert_eq!(
            store.runs().await.first().map(|r| r.status),
            Some(RunStatus::Completed)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reloaded_settings_reach_poller() {
        let api = client(&dead_base_url().await, None);
        let mut current = quiet_settings();
        let mut poller = Poller::start(
            RecentRuns::new(api.clone(), current.polling.run_window),
            current.polling.interval(),
            true,
        )
        .unwrap();
        assert!(poller.is_polling());

        let mut new = current.clone();
        new.polling.interval_secs = 30;
        new.polling.enabled = false;
        new.notifications.on_completion = true;
        apply_settings(&mut poller, &api, &mut current, new.clone()).unwrap();

        assert!(!poller.is_enabled());
        assert!(!poller.is_polling());
        assert_eq!(poller.interval(), Duration::from_secs(30));
        assert!(current.notifications.on_completion);

        new.polling.enabled = true;
        new.polling.run_window = 50;
        new.api.base_url = "http://elsewhere.example".to_string();
        apply_settings(&mut poller, &api, &mut current, new).unwrap();

        assert!(poller.is_polling());
        assert_eq!(current.polling.run_window, 50);
        assert_ne!(current.api.base_url, "http://elsewhere.example");
        poller.shutdown();
    }
}
