use crate::api::client::ApiClient;
use crate::api::error::{ApiError, ValidationError};
use crate::core::models::{NewTag, Tag};
use serde::Serialize;

impl NewTag {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::required("name"));
        }
        if let Some(color) = &self.color {
            let hex = color.strip_prefix('#').unwrap_or("");
            if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(ValidationError::new("color", "must look like #rrggbb"));
            }
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct TagAssignment {
    tag: i64,
}

impl ApiClient {
    pub async fn list_tags(&self) -> Result<Vec<Tag>, ApiError> {
        self.fetch_all_pages("/tags/", &[]).await
    }

    pub async fn create_tag(&self, tag: &NewTag) -> Result<Tag, ApiError> {
        tag.validate()?;
        self.post("/tags/", tag).await
    }

    /// Replaces a tag's name and colour.
    pub async fn update_tag(&self, id: i64, tag: &NewTag) -> Result<Tag, ApiError> {
        tag.validate()?;
        self.put(&format!("/tags/{id}/"), tag).await
    }

    pub async fn delete_tag(&self, id: i64) -> Result<(), ApiError> {
        self.delete(&format!("/tags/{id}/")).await
    }

    pub async fn assign_tag(&self, resource: i64, tag: i64) -> Result<Tag, ApiError> {
        self.post(
            &format!("/resources/{resource}/tags/"),
            &TagAssignment { tag },
        )
        .await
    }

    pub async fn unassign_tag(&self, resource: i64, tag: i64) -> Result<(), ApiError> {
        self.delete(&format!("/resources/{resource}/tags/{tag}/"))
            .await
    }
}
