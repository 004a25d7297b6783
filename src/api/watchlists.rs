use crate::api::client::ApiClient;
use crate::api::error::{ApiError, ValidationError};
use crate::core::models::{NewWatchlist, Resource, Watchlist};
use serde::Serialize;

impl NewWatchlist {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::required("name"));
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct WatchlistMember {
    resource: i64,
}

impl ApiClient {
    pub async fn list_watchlists(&self) -> Result<Vec<Watchlist>, ApiError> {
        self.fetch_all_pages("/watchlists/", &[]).await
    }

    pub async fn get_watchlist(&self, id: i64) -> Result<Watchlist, ApiError> {
        self.get(&format!("/watchlists/{id}/")).await
    }

    pub async fn watchlist_resources(&self, id: i64) -> Result<Vec<Resource>, ApiError> {
        self.fetch_all_pages(&format!("/watchlists/{id}/resources/"), &[])
            .await
    }

    pub async fn create_watchlist(&self, watchlist: &NewWatchlist) -> Result<Watchlist, ApiError> {
        watchlist.validate()?;
        self.post("/watchlists/", watchlist).await
    }

    pub async fn delete_watchlist(&self, id: i64) -> Result<(), ApiError> {
        self.delete(&format!("/watchlists/{id}/")).await
    }

    pub async fn add_to_watchlist(&self, id: i64, resource: i64) -> Result<Watchlist, ApiError> {
        self.post(
            &format!("/watchlists/{id}/resources/"),
            &WatchlistMember { resource },
        )
        .await
    }

    pub async fn remove_from_watchlist(&self, id: i64, resource: i64) -> Result<(), ApiError> {
        self.delete(&format!("/watchlists/{id}/resources/{resource}/"))
            .await
    }
}
