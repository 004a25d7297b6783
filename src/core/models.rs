use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Paginated envelope shared by every list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        self.next.is_some()
    }
}

/// A JSON value from a free-form property bag (connection config, resource properties).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<PropertyValue>),
    Map(BTreeMap<String, PropertyValue>),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Null => write!(f, "-"),
            PropertyValue::Bool(b) => write!(f, "{b}"),
            PropertyValue::Integer(i) => write!(f, "{i}"),
            PropertyValue::Float(x) => write!(f, "{x}"),
            PropertyValue::Text(s) => write!(f, "{s}"),
            PropertyValue::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            PropertyValue::Map(map) => {
                let parts: Vec<String> = map.iter().map(|(k, v)| format!("{k}={v}")).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

pub type Properties = BTreeMap<String, PropertyValue>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Vendor {
    Aws,
    Azure,
    Gcp,
    Vmware,
    Proxmox,
    OpenStack,
    Kubernetes,
    Other(String),
}

impl Vendor {
    /// Maps the many spellings the service and its plugins use onto one vendor.
    pub fn normalize(raw: &str) -> Self {
        let key: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();

        match key.as_str() {
            "aws" | "amazon" | "amazonwebservices" | "ec2" => Vendor::Aws,
            "azure" | "microsoftazure" | "azurerm" | "microsoft" => Vendor::Azure,
            "gcp" | "google" | "googlecloud" | "googlecloudplatform" | "gce" => Vendor::Gcp,
            "vmware" | "vsphere" | "vcenter" | "esxi" => Vendor::Vmware,
            "proxmox" | "proxmoxve" | "pve" => Vendor::Proxmox,
            "openstack" => Vendor::OpenStack,
            "kubernetes" | "k8s" => Vendor::Kubernetes,
            _ => Vendor::Other(raw.trim().to_string()),
        }
    }

    pub fn slug(&self) -> &str {
        match self {
            Vendor::Aws => "aws",
            Vendor::Azure => "azure",
            Vendor::Gcp => "gcp",
            Vendor::Vmware => "vmware",
            Vendor::Proxmox => "proxmox",
            Vendor::OpenStack => "openstack",
            Vendor::Kubernetes => "kubernetes",
            Vendor::Other(raw) => raw.as_str(),
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Vendor::Aws => "Amazon Web Services",
            Vendor::Azure => "Microsoft Azure",
            Vendor::Gcp => "Google Cloud",
            Vendor::Vmware => "VMware vSphere",
            Vendor::Proxmox => "Proxmox VE",
            Vendor::OpenStack => "OpenStack",
            Vendor::Kubernetes => "Kubernetes",
            Vendor::Other(raw) => raw.as_str(),
        }
    }
}

impl From<String> for Vendor {
    fn from(raw: String) -> Self {
        Vendor::normalize(&raw)
    }
}

impl From<Vendor> for String {
    fn from(vendor: Vendor) -> Self {
        vendor.slug().to_string()
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: i64,
    pub name: String,
    pub vendor: Vendor,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub connection_config: Properties,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_collected_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub struct NewProvider {
    pub name: String,
    pub vendor: Vendor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_active: bool,
    pub connection_config: Properties,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProviderUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_config: Option<Properties>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionTest {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(RunStatus::Pending),
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            "cancelled" | "canceled" => Ok(RunStatus::Cancelled),
            other => Err(format!("unknown run status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionRun {
    pub id: i64,
    #[serde(alias = "provider_id")]
    pub provider: i64,
    #[serde(default)]
    pub provider_name: Option<String>,
    pub status: RunStatus,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resource_count: u64,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl CollectionRun {
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) if end >= start => Some(end - start),
            _ => None,
        }
    }

    pub fn label(&self) -> String {
        match &self.provider_name {
            Some(name) => format!("#{} ({})", self.id, name),
            None => format!("#{} (provider {})", self.id, self.provider),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub resources: u64,
}

impl RunSummary {
    pub fn from_runs(runs: &[CollectionRun]) -> Self {
        let mut summary = Self::default();
        for run in runs {
            summary.total += 1;
            match run.status {
                RunStatus::Pending => summary.pending += 1,
                RunStatus::Running => summary.running += 1,
                RunStatus::Completed => summary.completed += 1,
                RunStatus::Failed => summary.failed += 1,
                RunStatus::Cancelled => summary.cancelled += 1,
                RunStatus::Unknown => {}
            }
            summary.resources += run.resource_count;
        }
        summary
    }

    pub fn active(&self) -> usize {
        self.pending + self.running
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub resource_count: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewTag {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: i64,
    #[serde(alias = "provider_id")]
    pub provider: i64,
    pub name: String,
    pub resource_type: String,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub first_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Watchlist {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub resources: Vec<i64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewWatchlist {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftKind {
    #[serde(alias = "modified", alias = "updated")]
    Changed,
    #[serde(alias = "removed")]
    Deleted,
    Restored,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for DriftKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DriftKind::Changed => "changed",
            DriftKind::Deleted => "deleted",
            DriftKind::Restored => "restored",
            DriftKind::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    #[serde(default)]
    pub old: Option<PropertyValue>,
    #[serde(default)]
    pub new: Option<PropertyValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftEvent {
    pub id: i64,
    #[serde(alias = "resource_id")]
    pub resource: i64,
    #[serde(default)]
    pub resource_name: Option<String>,
    #[serde(default)]
    pub provider: Option<i64>,
    #[serde(alias = "change_type")]
    pub kind: DriftKind,
    pub detected_at: DateTime<Utc>,
    #[serde(default)]
    pub run: Option<i64>,
    #[serde(default)]
    pub changes: Vec<FieldChange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Pending,
    Processing,
    #[serde(alias = "review")]
    NeedsReview,
    Approved,
    Rejected,
    Failed,
    #[serde(other)]
    Unknown,
}

impl ImportStatus {
    pub fn is_reviewable(&self) -> bool {
        matches!(self, ImportStatus::NeedsReview)
    }
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ImportStatus::Pending => "pending",
            ImportStatus::Processing => "processing",
            ImportStatus::NeedsReview => "needs review",
            ImportStatus::Approved => "approved",
            ImportStatus::Rejected => "rejected",
            ImportStatus::Failed => "failed",
            ImportStatus::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportMatch {
    pub id: i64,
    pub hostname: String,
    #[serde(default)]
    pub resource: Option<i64>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsImport {
    pub id: i64,
    #[serde(default)]
    pub filename: Option<String>,
    pub status: ImportStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub matches: Vec<ImportMatch>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl MetricsImport {
    pub fn unmatched(&self) -> impl Iterator<Item = &ImportMatch> {
        self.matches.iter().filter(|m| m.resource.is_none())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReviewDecision {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub matches: Vec<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plugin {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub vendor: Option<Vendor>,
}
