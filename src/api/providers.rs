use crate::api::client::ApiClient;
use crate::api::error::{ApiError, ValidationError};
use crate::core::models::{
    CollectionRun, ConnectionTest, NewProvider, Page, Provider, ProviderUpdate, Vendor,
};

impl NewProvider {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::required("name"));
        }
        if self.name.len() > 255 {
            return Err(ValidationError::new("name", "must be at most 255 characters"));
        }
        if let Vendor::Other(raw) = &self.vendor {
            if raw.trim().is_empty() {
                return Err(ValidationError::required("vendor"));
            }
        }
        Ok(())
    }
}

impl ProviderUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(ValidationError::required("name"));
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.is_active.is_none()
            && self.connection_config.is_none()
    }
}

impl ApiClient {
    pub async fn list_providers(&self, page: Option<u32>) -> Result<Page<Provider>, ApiError> {
        let query: Vec<(&'static str, String)> =
            page.map(|p| vec![("page", p.to_string())]).unwrap_or_default();
        self.get_page("/providers/", &query).await
    }

    pub async fn all_providers(&self) -> Result<Vec<Provider>, ApiError> {
        self.fetch_all_pages("/providers/", &[]).await
    }

    pub async fn get_provider(&self, id: i64) -> Result<Provider, ApiError> {
        self.get(&format!("/providers/{id}/")).await
    }

    pub async fn create_provider(&self, provider: &NewProvider) -> Result<Provider, ApiError> {
        provider.validate()?;
        let created: Provider = self.post("/providers/", provider).await?;
        tracing::info!(id = created.id, name = %created.name, "Created provider");
        Ok(created)
    }

    pub async fn update_provider(
        &self,
        id: i64,
        update: &ProviderUpdate,
    ) -> Result<Provider, ApiError> {
        update.validate()?;
        if update.is_empty() {
            return Err(ValidationError::new("update", "nothing to change").into());
        }
        self.patch(&format!("/providers/{id}/"), update).await
    }

    pub async fn delete_provider(&self, id: i64) -> Result<(), ApiError> {
        self.delete(&format!("/providers/{id}/")).await?;
        tracing::info!(id, "Deleted provider");
        Ok(())
    }

    /// Asks the service to start a collection run for this provider.
    pub async fn trigger_collection(&self, id: i64) -> Result<CollectionRun, ApiError> {
        let run: CollectionRun = self.post_action(&format!("/providers/{id}/collect/")).await?;
        tracing::info!(provider = id, run = run.id, "Triggered collection run");
        Ok(run)
    }

    pub async fn test_connection(&self, id: i64) -> Result<ConnectionTest, ApiError> {
        self.post_action(&format!("/providers/{id}/test-connection/"))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::testing::{client, dead_base_url, serve, Canned};
    use crate::core::models::{Properties, PropertyValue};

    fn new_provider(name: &str) -> NewProvider {
        let mut config = Properties::new();
        config.insert(
            "host".to_string(),
            PropertyValue::Text("vcenter.lab".to_string()),
        );
        NewProvider {
            name: name.to_string(),
            vendor: Vendor::normalize("vsphere"),
            description: None,
            is_active: true,
            connection_config: config,
        }
    }

    #[test]
    fn test_new_provider_validation() {
        assert!(new_provider("lab").validate().is_ok());
        assert_eq!(
            new_provider("  ").validate(),
            Err(ValidationError::required("name"))
        );
        assert!(new_provider(&"x".repeat(256)).validate().is_err());

        let mut provider = new_provider("lab");
        provider.vendor = Vendor::Other(String::new());
        assert_eq!(provider.validate(), Err(ValidationError::required("vendor")));
    }

    #[tokio::test]
    async fn test_create_provider_validates_before_request() {
        let api = client(&dead_base_url().await, Some(("admin", "secret")));
        let err = api.create_provider(&new_provider("")).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn test_empty_update_rejected() {
        let api = client(&dead_base_url().await, None);
        let err = api
            .update_provider(1, &ProviderUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_provider_posts_normalized_vendor() {
        let (base, server) = serve(|_| {
            vec![Canned::json(
                "201 Created",
                r#"{"id":8,"name":"lab","vendor":"vmware","connection_config":{"host":"vcenter.lab"}}"#,
            )]
        })
        .await;

        let api = client(&base, Some(("admin", "secret")));
        let provider = api.create_provider(&new_provider("lab")).await.unwrap();
        assert_eq!(provider.id, 8);
        assert_eq!(provider.vendor, Vendor::Vmware);

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("POST /api/v1/providers/"));
        assert!(requests[0].contains(r#""vendor":"vmware""#));
        assert!(requests[0].contains(r#""connection_config":{"host":"vcenter.lab"}"#));
    }

    #[tokio::test]
    async fn test_trigger_collection() {
        let (base, server) = serve(|_| {
            vec![Canned::json(
                "202 Accepted",
                r#"{"id":51,"provider":8,"status":"pending"}"#,
            )]
        })
        .await;

        let api = client(&base, Some(("admin", "secret")));
        let run = api.trigger_collection(8).await.unwrap();
        assert_eq!(run.id, 51);

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("POST /api/v1/providers/8/collect/"));
    }
}
