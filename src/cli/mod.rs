pub mod auth;
pub mod drift;
pub mod imports;
pub mod output;
pub mod providers;
pub mod refresh;
pub mod resources;
pub mod runs;
pub mod tags;
pub mod watchlists;

use crate::api::{ApiClient, ApiError};
use crate::core::credentials::Session;
use crate::core::settings::Settings;
use anyhow::Result;

/// Client for the configured service, authenticated with the stored credentials.
pub fn connect(settings: &Settings) -> Result<ApiClient> {
    let session = Session::from_default_store()?;
    if !session.is_authenticated() {
        tracing::warn!("Not logged in; run `invctl login` first");
    }
    Ok(ApiClient::new(&settings.api, session)?)
}

/// Turns a 404 into a readable message naming the missing object.
pub fn not_found(kind: &'static str, id: i64) -> impl FnOnce(ApiError) -> anyhow::Error {
    move |e| {
        if e.is_not_found() {
            anyhow::anyhow!("No {kind} with id {id}")
        } else {
            e.into()
        }
    }
}
