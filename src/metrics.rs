//! Prometheus gauge definitions and text exposition.
//!
//! A fresh registry is built for every scrape from the collected [`Scrape`]
//! value. A failed scrape registers nothing but `pbs_up 0`, so no partial
//! sample set is ever published, and concurrent scrapes never share mutable
//! metric state.

use crate::collector::Scrape;
use crate::error::{ExporterError, Result};
use prometheus::{Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};

/// Encode one scrape outcome as Prometheus text exposition.
///
/// `Some(scrape)` produces the full gauge set plus `pbs_up 1`; `None`
/// produces `pbs_up 0` alone.
pub fn encode_scrape(scrape: Option<&Scrape>) -> Result<String> {
    let registry = Registry::new();

    let up = gauge(&registry, "pbs_up", "Was the last query of PBS successful.")?;
    if let Some(scrape) = scrape {
        let gauges = ScrapeGauges::register(&registry)?;
        gauges.record(scrape);
        up.set(1.0);
    }

    encode_registry(&registry)
}

/// The full gauge set of a successful scrape, registered on one registry.
struct ScrapeGauges {
    available: Gauge,
    size: Gauge,
    used: Gauge,
    snapshot_count: GaugeVec,
    snapshot_vm_count: GaugeVec,
    host_cpu_usage: Gauge,
    host_memory_free: Gauge,
    host_memory_total: Gauge,
    host_memory_used: Gauge,
    host_swap_free: Gauge,
    host_swap_total: Gauge,
    host_swap_used: Gauge,
    host_disk_available: Gauge,
    host_disk_total: Gauge,
    host_disk_used: Gauge,
    host_uptime: Gauge,
    host_io_wait: Gauge,
}

impl ScrapeGauges {
    fn register(registry: &Registry) -> Result<Self> {
        Ok(Self {
            available: gauge(
                registry,
                "pbs_available",
                "The available bytes of the underlying storage.",
            )?,
            size: gauge(
                registry,
                "pbs_size",
                "The size of the underlying storage in bytes.",
            )?,
            used: gauge(
                registry,
                "pbs_used",
                "The used bytes of the underlying storage.",
            )?,
            snapshot_count: gauge_vec(
                registry,
                "pbs_snapshot_count",
                "The total number of backups.",
                &["namespace"],
            )?,
            snapshot_vm_count: gauge_vec(
                registry,
                "pbs_snapshot_vm_count",
                "The total number of backups per VM.",
                &["namespace", "vm_id"],
            )?,
            host_cpu_usage: gauge(
                registry,
                "pbs_host_cpu_usage",
                "The CPU usage of the host.",
            )?,
            host_memory_free: gauge(
                registry,
                "pbs_host_memory_free",
                "The free memory of the host.",
            )?,
            host_memory_total: gauge(
                registry,
                "pbs_host_memory_total",
                "The total memory of the host.",
            )?,
            host_memory_used: gauge(
                registry,
                "pbs_host_memory_used",
                "The used memory of the host.",
            )?,
            host_swap_free: gauge(
                registry,
                "pbs_host_swap_free",
                "The free swap of the host.",
            )?,
            host_swap_total: gauge(
                registry,
                "pbs_host_swap_total",
                "The total swap of the host.",
            )?,
            host_swap_used: gauge(
                registry,
                "pbs_host_swap_used",
                "The used swap of the host.",
            )?,
            // Exposed name predates the pbs_host_disk_* family; kept so
            // existing dashboards keep working.
            host_disk_available: gauge(
                registry,
                "pbs_host_available_free",
                "The available disk of the local root disk in bytes.",
            )?,
            host_disk_total: gauge(
                registry,
                "pbs_host_disk_total",
                "The total disk of the local root disk in bytes.",
            )?,
            host_disk_used: gauge(
                registry,
                "pbs_host_disk_used",
                "The used disk of the local root disk in bytes.",
            )?,
            host_uptime: gauge(registry, "pbs_host_uptime", "The uptime of the host.")?,
            host_io_wait: gauge(registry, "pbs_host_io_wait", "The io wait of the host.")?,
        })
    }

    fn record(&self, scrape: &Scrape) {
        for report in &scrape.datastores {
            // Unlabeled by datastore name; with several datastores the last
            // one written wins. Known ambiguity, see DESIGN.md.
            self.available.set(report.usage.avail as f64);
            self.size.set(report.usage.total as f64);
            self.used.set(report.usage.used as f64);

            for ns in &report.namespaces {
                self.snapshot_count
                    .with_label_values(&[&ns.namespace])
                    .set(ns.snapshot_count as f64);

                for (vm_id, count) in &ns.source_counts {
                    self.snapshot_vm_count
                        .with_label_values(&[&ns.namespace, vm_id])
                        .set(*count as f64);
                }
            }
        }

        let host = &scrape.host;
        self.host_cpu_usage.set(host.cpu);
        self.host_memory_free.set(host.memory.free as f64);
        self.host_memory_total.set(host.memory.total as f64);
        self.host_memory_used.set(host.memory.used as f64);
        self.host_swap_free.set(host.swap.free as f64);
        self.host_swap_total.set(host.swap.total as f64);
        self.host_swap_used.set(host.swap.used as f64);
        self.host_disk_available.set(host.root.avail as f64);
        self.host_disk_total.set(host.root.total as f64);
        self.host_disk_used.set(host.root.used as f64);
        self.host_uptime.set(host.uptime as f64);
        self.host_io_wait.set(host.wait);
    }
}

fn gauge(registry: &Registry, name: &str, help: &str) -> Result<Gauge> {
    let gauge =
        Gauge::with_opts(Opts::new(name, help)).map_err(|e| ExporterError::Metrics(e.to_string()))?;
    registry
        .register(Box::new(gauge.clone()))
        .map_err(|e| ExporterError::Metrics(e.to_string()))?;
    Ok(gauge)
}

fn gauge_vec(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> Result<GaugeVec> {
    let gauge = GaugeVec::new(Opts::new(name, help), labels)
        .map_err(|e| ExporterError::Metrics(e.to_string()))?;
    registry
        .register(Box::new(gauge.clone()))
        .map_err(|e| ExporterError::Metrics(e.to_string()))?;
    Ok(gauge)
}

fn encode_registry(registry: &Registry) -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::with_capacity(4096);
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| ExporterError::Metrics(e.to_string()))?;

    String::from_utf8(buffer).map_err(|e| ExporterError::Metrics(e.to_string()))
}
