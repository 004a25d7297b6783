use crate::core::store::RunStore;
use tokio::sync::mpsc;
use zbus::interface;

pub const DBUS_NAME: &str = "io.github.invctl.Monitor";
pub const DBUS_PATH: &str = "/io/github/invctl/Monitor";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbusCommand {
    Refresh,
}

pub struct MonitorService {
    cmd_tx: mpsc::UnboundedSender<DbusCommand>,
    store: RunStore,
}

impl MonitorService {
    pub fn new(cmd_tx: mpsc::UnboundedSender<DbusCommand>, store: RunStore) -> Self {
        Self { cmd_tx, store }
    }
}

#[interface(name = "io.github.invctl.Monitor")]
impl MonitorService {
    async fn refresh(&self) -> zbus::fdo::Result<()> {
        tracing::info!("D-Bus Refresh called");
        self.cmd_tx
            .send(DbusCommand::Refresh)
            .map_err(|_| zbus::fdo::Error::Failed("Monitor is shutting down".to_string()))
    }

    /// Run counts of the monitored window, as JSON.
    async fn summary(&self) -> zbus::fdo::Result<String> {
        let summary = self.store.summary().await;
        serde_json::to_string(&summary).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }

    #[zbus(property)]
    async fn last_error(&self) -> String {
        self.store.get_error().await.unwrap_or_default()
    }

    /// RFC 3339 time of the last successful poll, empty before the first one.
    #[zbus(property)]
    async fn last_update(&self) -> String {
        self.store
            .last_update()
            .await
            .map(|t| t.to_rfc3339())
            .unwrap_or_default()
    }
}

pub async fn start_dbus_server(
    cmd_tx: mpsc::UnboundedSender<DbusCommand>,
    store: RunStore,
) -> zbus::Result<zbus::Connection> {
    let connection = zbus::connection::Builder::session()?
        .name(DBUS_NAME)?
        .serve_at(DBUS_PATH, MonitorService::new(cmd_tx, store))?
        .build()
        .await?;

    tracing::info!(name = DBUS_NAME, path = DBUS_PATH, "D-Bus service registered");
    Ok(connection)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_refresh_forwards_command() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let service = MonitorService::new(tx, RunStore::new());

        service.refresh().await.unwrap();
        assert_eq!(rx.recv().await, Some(DbusCommand::Refresh));
    }

    #[tokio::test]
    async fn test_refresh_fails_when_monitor_gone() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let service = MonitorService::new(tx, RunStore::new());

        assert!(service.refresh().await.is_err());
    }

    #[tokio::test]
    async fn test_summary_is_json() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let service = MonitorService::new(tx, RunStore::new());

        let summary = service.summary().await.unwrap();
        assert!(summary.contains("\"total\":0"));
        assert_eq!(service.last_update().await, "");
    }
}
