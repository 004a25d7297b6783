use anyhow::{Context, Result};
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

const DEBOUNCE: Duration = Duration::from_millis(200);

/// Watches one file through its parent directory, so editors that replace the file
/// and first-time creation are both seen.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Emits `()` (debounced) whenever the file is created, modified or removed.
    pub fn start(path: PathBuf) -> Result<(Self, mpsc::UnboundedReceiver<()>)> {
        let (async_tx, async_rx) = mpsc::unbounded_channel::<()>();
        let (notify_tx, mut notify_rx) = mpsc::unbounded_channel::<()>();

        let parent = path
            .parent()
            .map(|p| p.to_path_buf())
            .context("Watched path has no parent directory")?;
        let file_name = path
            .file_name()
            .map(|f| f.to_os_string())
            .context("Watched path has no file name")?;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| {
                if let Ok(event) = res {
                    if !(event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove())
                    {
                        return;
                    }
                    if event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == Some(file_name.as_os_str()))
                    {
                        let _ = notify_tx.send(());
                    }
                }
            },
            Config::default(),
        )?;

        if parent.exists() {
            watcher
                .watch(&parent, RecursiveMode::NonRecursive)
                .with_context(|| format!("Failed to watch directory: {}", parent.display()))?;
            tracing::info!(?path, "Watching file");
        } else {
            tracing::warn!(?parent, "Directory does not exist, skipping watch");
        }

        tokio::spawn(async move {
            while notify_rx.recv().await.is_some() {
                tokio::time::sleep(DEBOUNCE).await;
                while notify_rx.try_recv().is_ok() {}

                tracing::debug!(?path, "Watched file changed on disk");
                if async_tx.send(()).is_err() {
                    break;
                }
            }
        });

        Ok((Self { _watcher: watcher }, async_rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_change_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let (_watcher, mut rx) = FileWatcher::start(path.clone()).unwrap();

        std::fs::write(&path, "debug = true\n").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert_eq!(event.ok().flatten(), Some(()));
    }

    #[tokio::test]
    async fn test_other_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let (_watcher, mut rx) = FileWatcher::start(dir.path().join("config.toml")).unwrap();

        std::fs::write(dir.path().join("credentials.json"), "{}").unwrap();

        let event = tokio::time::timeout(Duration::from_millis(800), rx.recv()).await;
        assert!(event.is_err());
    }
}
