//! PBS API client for communicating with Proxmox Backup Server.
//!
//! This module provides a thin, authenticated GET client over the PBS REST
//! API and the typed response structures the collectors consume. Every call
//! is a single attempt; the first failure is final for that call.

use crate::config::Settings;
use crate::error::{ExporterError, Result};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

const DATASTORE_USAGE_PATH: &str = "/api2/json/status/datastore-usage";
const DATASTORE_PATH: &str = "/api2/json/admin/datastore";
// The node status endpoint requires a node name but accepts any value,
// so a fixed alias is used instead of making it configurable.
const NODE_STATUS_PATH: &str = "/api2/json/nodes/localhost/status";

/// PBS API client.
///
/// Shared read-only by every scrape; the authorization header is built once
/// at construction time.
#[derive(Clone)]
pub struct PbsClient {
    client: Client,
    endpoint: String,
    auth_header: String,
    log_auth_header: bool,
}

impl PbsClient {
    /// Create a new PBS API client from the exporter settings.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use clap::Parser;
    /// use pbs_metrics_exporter::client::PbsClient;
    /// use pbs_metrics_exporter::config::Settings;
    ///
    /// let settings = Settings::parse_from([
    ///     "pbs-metrics-exporter",
    ///     "--endpoint", "https://pbs.example.com:8007",
    ///     "--api-token", "secret",
    /// ]);
    /// let client = PbsClient::new(&settings).unwrap();
    /// ```
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .danger_accept_invalid_certs(settings.insecure)
            .build()?;

        let auth_header = format!(
            "PBSAPIToken={}!{}:{}",
            settings.username, settings.api_token_name, settings.api_token
        );

        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            auth_header,
            log_auth_header: settings.log_auth_header,
        })
    }

    /// Get usage totals for every datastore.
    pub async fn get_datastore_usage(&self) -> Result<Vec<DatastoreUsage>> {
        self.get_json(DATASTORE_USAGE_PATH, &[]).await
    }

    /// Get the namespace listing for a datastore.
    pub async fn get_namespaces(&self, store: &str) -> Result<Vec<NamespaceEntry>> {
        let path = format!("{DATASTORE_PATH}/{store}/namespace");
        self.get_json(&path, &[]).await
    }

    /// Get the snapshot listing for a datastore, filtered by namespace.
    ///
    /// An empty namespace selects the unfiltered (root) listing.
    pub async fn get_snapshots(&self, store: &str, namespace: &str) -> Result<Vec<SnapshotEntry>> {
        let path = format!("{DATASTORE_PATH}/{store}/snapshots");
        if namespace.is_empty() {
            self.get_json(&path, &[]).await
        } else {
            self.get_json(&path, &[("ns", namespace)]).await
        }
    }

    /// Get node-level resource usage (CPU, memory, swap, disk, uptime).
    pub async fn get_node_status(&self) -> Result<NodeStatus> {
        self.get_json(NODE_STATUS_PATH, &[]).await
    }

    /// Issue one authenticated GET and decode the `{"data": ...}` envelope.
    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}{}", self.endpoint, path);
        debug!("request URL: {}", url);
        if self.log_auth_header {
            debug!("request Authorization: {}", self.auth_header);
        }

        let mut request = self.client.get(&url).header("Authorization", &self.auth_header);
        if !query.is_empty() {
            request = request.query(query);
        }

        let response = request.send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!("status code {} returned from {}", status.as_u16(), url);
            return Err(ExporterError::Status {
                code: status.as_u16(),
                url,
            });
        }

        let body = response.text().await?;
        let envelope: ApiResponse<T> =
            serde_json::from_str(&body).map_err(|source| ExporterError::Decode { url, source })?;
        Ok(envelope.data)
    }
}

/// Generic PBS API response wrapper.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    data: T,
}

/// Usage totals for one datastore.
///
/// Byte counts are signed because PBS reports -1 for stores it cannot stat.
#[derive(Debug, Clone, Deserialize)]
pub struct DatastoreUsage {
    /// Datastore name
    pub store: String,
    /// Total size in bytes
    pub total: i64,
    /// Used bytes
    pub used: i64,
    /// Available bytes
    pub avail: i64,
}

/// One entry of a datastore's namespace listing.
#[derive(Debug, Clone, Deserialize)]
pub struct NamespaceEntry {
    /// Namespace name; the root namespace is the empty string
    #[serde(default)]
    pub ns: String,
}

/// One entry of a snapshot listing. Only the backup-source identifier is
/// kept; the snapshot's own identity is discarded after counting.
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotEntry {
    /// Backup-source identifier (VM ID, CT ID or hostname)
    #[serde(rename = "backup-id")]
    pub backup_id: String,
}

/// Node status information from PBS.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeStatus {
    /// CPU usage (0.0 to 1.0)
    pub cpu: f64,
    /// I/O wait (0.0 to 1.0)
    pub wait: f64,
    /// RAM usage
    pub memory: MemoryStatus,
    /// Swap usage
    pub swap: MemoryStatus,
    /// Root filesystem usage (PBS calls it "root", not "rootfs")
    pub root: DiskStatus,
    /// Uptime in seconds
    pub uptime: i64,
}

/// Memory information.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryStatus {
    /// Free bytes
    pub free: i64,
    /// Total bytes
    pub total: i64,
    /// Used bytes
    pub used: i64,
}

/// Disk information.
#[derive(Debug, Clone, Deserialize)]
pub struct DiskStatus {
    /// Available bytes
    pub avail: i64,
    /// Total bytes
    pub total: i64,
    /// Used bytes
    pub used: i64,
}
