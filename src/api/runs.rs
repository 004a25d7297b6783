use crate::api::client::{ApiClient, Query};
use crate::api::error::ApiError;
use crate::core::models::{CollectionRun, Page, RunStatus};

#[derive(Debug, Clone, Default)]
pub struct RunFilter {
    pub provider: Option<i64>,
    pub status: Option<RunStatus>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl RunFilter {
    pub fn recent(page_size: u32) -> Self {
        Self {
            page_size: Some(page_size),
            ..Self::default()
        }
    }

    pub fn to_query(&self) -> Query {
        let mut query = Query::new();
        if let Some(provider) = self.provider {
            query.push(("provider", provider.to_string()));
        }
        if let Some(status) = self.status {
            query.push(("status", status.as_str().to_string()));
        }
        if let Some(page) = self.page {
            query.push(("page", page.to_string()));
        }
        if let Some(page_size) = self.page_size {
            query.push(("page_size", page_size.to_string()));
        }
        query.push(("ordering", "-id".to_string()));
        query
    }
}

impl ApiClient {
    pub async fn list_runs(&self, filter: &RunFilter) -> Result<Page<CollectionRun>, ApiError> {
        self.get_page("/collection-runs/", &filter.to_query()).await
    }

    pub async fn get_run(&self, id: i64) -> Result<CollectionRun, ApiError> {
        self.get(&format!("/collection-runs/{id}/")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::testing::{client, serve, Canned};

    #[test]
    fn test_filter_query() {
        let filter = RunFilter {
            provider: Some(3),
            status: Some(RunStatus::Failed),
            page: None,
            page_size: Some(10),
        };
        assert_eq!(
            filter.to_query(),
            vec![
                ("provider", "3".to_string()),
                ("status", "failed".to_string()),
                ("page_size", "10".to_string()),
                ("ordering", "-id".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_list_runs() {
        let (base, server) = serve(|_| {
            vec![Canned::json(
                "200 OK",
                r#"{"count":2,"next":null,"previous":null,"results":[
                    {"id":12,"provider":1,"status":"running"},
                    {"id":11,"provider":1,"status":"completed","resource_count":240}
                ]}"#,
            )]
        })
        .await;

        let api = client(&base, Some(("admin", "secret")));
        let page = api.list_runs(&RunFilter::recent(2)).await.unwrap();
        assert_eq!(page.results.len(), 2);
        assert_eq!(page.results[1].resource_count, 240);

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("GET /api/v1/collection-runs/?page_size=2&ordering=-id "));
    }
}
