use crate::api::client::ApiClient;
use crate::api::error::{ApiError, ValidationError};
use crate::core::models::{MetricsImport, Page, Plugin, ReviewDecision};
use std::path::Path;

const TARBALL_SUFFIXES: &[&str] = &[".tar.gz", ".tgz", ".tar"];
const PLUGIN_SUFFIXES: &[&str] = &[".zip", ".tar.gz", ".tgz"];

fn check_suffix(field: &'static str, file: &Path, allowed: &[&str]) -> Result<(), ValidationError> {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if allowed.iter().any(|suffix| name.ends_with(suffix)) {
        Ok(())
    } else {
        Err(ValidationError::new(
            field,
            format!("expected one of {}", allowed.join(", ")),
        ))
    }
}

impl ApiClient {
    pub async fn list_imports(&self, page: Option<u32>) -> Result<Page<MetricsImport>, ApiError> {
        let query: Vec<(&'static str, String)> =
            page.map(|p| vec![("page", p.to_string())]).unwrap_or_default();
        self.get_page("/metrics-imports/", &query).await
    }

    pub async fn get_import(&self, id: i64) -> Result<MetricsImport, ApiError> {
        self.get(&format!("/metrics-imports/{id}/")).await
    }

    pub async fn upload_metrics(&self, tarball: &Path) -> Result<MetricsImport, ApiError> {
        check_suffix("file", tarball, TARBALL_SUFFIXES)?;
        self.upload("/metrics-imports/upload/", "file", tarball, &[])
            .await
    }

    pub async fn approve_import(
        &self,
        id: i64,
        decision: &ReviewDecision,
    ) -> Result<MetricsImport, ApiError> {
        let import: MetricsImport = self
            .post(&format!("/metrics-imports/{id}/approve/"), decision)
            .await?;
        tracing::info!(id, status = %import.status, "Approved metrics import");
        Ok(import)
    }

    pub async fn reject_import(
        &self,
        id: i64,
        decision: &ReviewDecision,
    ) -> Result<MetricsImport, ApiError> {
        let import: MetricsImport = self
            .post(&format!("/metrics-imports/{id}/reject/"), decision)
            .await?;
        tracing::info!(id, status = %import.status, "Rejected metrics import");
        Ok(import)
    }

    pub async fn list_plugins(&self) -> Result<Vec<Plugin>, ApiError> {
        self.fetch_all_pages("/plugins/", &[]).await
    }

    pub async fn upload_plugin(&self, archive: &Path) -> Result<Plugin, ApiError> {
        check_suffix("archive", archive, PLUGIN_SUFFIXES)?;
        self.upload("/plugins/upload/", "archive", archive, &[])
            .await
    }
}
