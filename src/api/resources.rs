use crate::api::client::{ApiClient, Query};
use crate::api::error::ApiError;
use crate::core::models::{Page, Resource};

#[derive(Debug, Clone, Default)]
pub struct ResourceFilter {
    pub provider: Option<i64>,
    pub resource_type: Option<String>,
    pub search: Option<String>,
    pub tag: Option<String>,
    pub include_deleted: bool,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl ResourceFilter {
    pub fn to_query(&self) -> Query {
        let mut query = Query::new();
        if let Some(provider) = self.provider {
            query.push(("provider", provider.to_string()));
        }
        if let Some(resource_type) = self.resource_type.as_deref().filter(|s| !s.is_empty()) {
            query.push(("resource_type", resource_type.to_string()));
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            query.push(("search", search.to_string()));
        }
        if let Some(tag) = self.tag.as_deref().filter(|s| !s.is_empty()) {
            query.push(("tag", tag.to_string()));
        }
        if self.include_deleted {
            query.push(("include_deleted", "true".to_string()));
        }
        if let Some(page) = self.page {
            query.push(("page", page.to_string()));
        }
        if let Some(page_size) = self.page_size {
            query.push(("page_size", page_size.to_string()));
        }
        query
    }
}

impl ApiClient {
    pub async fn list_resources(
        &self,
        filter: &ResourceFilter,
    ) -> Result<Page<Resource>, ApiError> {
        self.get_page("/resources/", &filter.to_query()).await
    }

    pub async fn get_resource(&self, id: i64) -> Result<Resource, ApiError> {
        self.get(&format!("/resources/{id}/")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_skips_blank_values() {
        let filter = ResourceFilter {
            search: Some("   ".to_string()),
            resource_type: Some(String::new()),
            ..ResourceFilter::default()
        };
        assert!(filter.to_query().is_empty());
    }

    #[test]
    fn test_filter_query() {
        let filter = ResourceFilter {
            provider: Some(2),
            resource_type: Some("vm".to_string()),
            search: Some(" web ".to_string()),
            tag: Some("prod".to_string()),
            include_deleted: true,
            page: Some(3),
            page_size: None,
        };
        assert_eq!(
            filter.to_query(),
            vec![
                ("provider", "2".to_string()),
                ("resource_type", "vm".to_string()),
                ("search", "web".to_string()),
                ("tag", "prod".to_string()),
                ("include_deleted", "true".to_string()),
                ("page", "3".to_string()),
            ]
        );
    }
}
