//! # PBS Metrics Exporter
//!
//! A Prometheus metrics exporter for Proxmox Backup Server.
//!
//! ## Overview
//!
//! Each scrape of the metrics endpoint triggers one bounded, strictly
//! sequential chain of PBS API calls:
//!
//! 1. datastore usage listing
//! 2. per datastore: namespace listing, then per non-root namespace the
//!    snapshot listing (counted per backup source)
//! 3. node status (CPU, memory, swap, root disk, uptime, I/O wait)
//!
//! The resulting value tree is flattened into independent gauge samples. Any
//! error at any stage aborts the scrape: the exposition then carries
//! `pbs_up 0` and nothing else. There is no retry, no caching and no state
//! shared between scrapes beyond the read-only client.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use pbs_metrics_exporter::{client::PbsClient, config::Settings, server};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::parse();
//!     settings.validate()?;
//!
//!     let client = PbsClient::new(&settings)?;
//!     let state = server::AppState {
//!         client: Arc::new(client),
//!         metrics_path: settings.metrics_path.clone(),
//!     };
//!
//!     server::start_server(&settings.listen_address, state).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`] - Flag/environment configuration surface
//! - [`error`] - Error types and handling
//! - [`client`] - PBS API client
//! - [`collector`] - The scrape pipeline (host, datastore, namespace)
//! - [`metrics`] - Per-scrape gauge registration and text exposition
//! - [`server`] - HTTP server exposing the metrics endpoint

pub mod client;
pub mod collector;
pub mod config;
pub mod error;
pub mod metrics;
pub mod server;

pub use error::{ExporterError, Result};
