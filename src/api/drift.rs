use crate::api::client::{ApiClient, Query};
use crate::api::error::ApiError;
use crate::core::models::DriftEvent;
use chrono::{DateTime, SecondsFormat, Utc};

#[derive(Debug, Clone, Default)]
pub struct DriftFilter {
    pub resource: Option<i64>,
    pub provider: Option<i64>,
    pub since: Option<DateTime<Utc>>,
}

impl DriftFilter {
    pub fn to_query(&self) -> Query {
        let mut query = Query::new();
        if let Some(resource) = self.resource {
            query.push(("resource", resource.to_string()));
        }
        if let Some(provider) = self.provider {
            query.push(("provider", provider.to_string()));
        }
        if let Some(since) = self.since {
            query.push(("since", since.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
        query
    }
}

impl ApiClient {
    pub async fn list_drift(&self, filter: &DriftFilter) -> Result<Vec<DriftEvent>, ApiError> {
        self.fetch_all_pages("/drift/", &filter.to_query()).await
    }
}
