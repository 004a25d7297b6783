mod app;
mod dbus;

use crate::core::settings::Settings;
use anyhow::Result;

pub use dbus::{DBUS_NAME, DBUS_PATH};

pub async fn run(settings: Settings) -> Result<()> {
    tracing::info!("Starting invctl run monitor");
    app::run(settings).await
}
