//! Scrape pipeline: host, datastore and namespace collectors.
//!
//! One scrape is a single linear pass of fallible steps composed
//! left-to-right: fetch the datastore usage listing, walk every datastore
//! and its namespaces, then fetch the node status. The first error aborts
//! the remaining work and fails the whole scrape; there is no retry and no
//! partial result.
//!
//! All values are request-scoped. Nothing here outlives the scrape that
//! produced it.

use crate::client::{DatastoreUsage, NodeStatus, PbsClient, SnapshotEntry};
use crate::error::Result;
use std::collections::HashMap;
use tracing::debug;

/// Everything one successful scrape collected, ready to be flattened into
/// metric samples.
#[derive(Debug)]
pub struct Scrape {
    /// Per-datastore usage plus the namespace reports underneath it
    pub datastores: Vec<DatastoreReport>,
    /// Host-wide resource usage
    pub host: NodeStatus,
}

/// One datastore's usage totals and the snapshot counts of its namespaces.
#[derive(Debug)]
pub struct DatastoreReport {
    pub usage: DatastoreUsage,
    pub namespaces: Vec<NamespaceReport>,
}

/// Snapshot counts for one datastore+namespace pair.
#[derive(Debug)]
pub struct NamespaceReport {
    pub namespace: String,
    /// Total number of snapshots in the namespace
    pub snapshot_count: u64,
    /// Snapshot count per distinct backup-source identifier
    pub source_counts: HashMap<String, u64>,
}

/// Run one full scrape against PBS.
///
/// Stage order: datastore usage listing, then every datastore sequentially
/// (namespace listing, then every non-root namespace's snapshots), then node
/// status. Any error at any stage returns immediately and later stages are
/// not attempted.
pub async fn run_scrape(client: &PbsClient) -> Result<Scrape> {
    let usages = client.get_datastore_usage().await?;
    debug!("usage listing returned {} datastores", usages.len());

    let mut datastores = Vec::with_capacity(usages.len());
    for usage in usages {
        let namespaces = collect_datastore(client, &usage).await?;
        datastores.push(DatastoreReport { usage, namespaces });
    }

    let host = client.get_node_status().await?;

    Ok(Scrape { datastores, host })
}

/// Collect the namespace reports for one datastore.
///
/// The empty-string namespace is the implicit root and is skipped during
/// enumeration so root totals are not double-counted as a named namespace.
async fn collect_datastore(
    client: &PbsClient,
    usage: &DatastoreUsage,
) -> Result<Vec<NamespaceReport>> {
    debug!("collecting datastore {}", usage.store);

    let entries = client.get_namespaces(&usage.store).await?;
    let mut reports = Vec::new();
    for entry in entries {
        if entry.ns.is_empty() {
            continue;
        }
        reports.push(collect_namespace(client, &usage.store, &entry.ns).await?);
    }

    Ok(reports)
}

/// Count the snapshots of one datastore+namespace pair.
///
/// An empty namespace requests the unfiltered (root) listing. No snapshots
/// is a valid result, not an error.
pub async fn collect_namespace(
    client: &PbsClient,
    store: &str,
    namespace: &str,
) -> Result<NamespaceReport> {
    debug!("collecting namespace {:?} of datastore {}", namespace, store);

    let snapshots = client.get_snapshots(store, namespace).await?;

    Ok(NamespaceReport {
        namespace: namespace.to_string(),
        snapshot_count: snapshots.len() as u64,
        source_counts: count_by_source(&snapshots),
    })
}

/// Group snapshots by backup-source identifier. Insertion order is
/// irrelevant; only the counts matter.
fn count_by_source(snapshots: &[SnapshotEntry]) -> HashMap<String, u64> {
    let mut counts = HashMap::new();
    for snapshot in snapshots {
        *counts.entry(snapshot.backup_id.clone()).or_insert(0) += 1;
    }
    counts
}
