//! Configuration for the exporter.
//!
//! Every setting is a command-line flag with a like-named `PBS_*` environment
//! variable override. Precedence: explicit flag > environment variable >
//! built-in default. Malformed boolean or duration values are fatal at
//! startup.

use crate::error::{ExporterError, Result};
use clap::{ArgAction, Parser};
use std::time::Duration;

/// Exporter settings, immutable after startup.
#[derive(Parser, Clone)]
#[command(
    name = "pbs-metrics-exporter",
    version,
    about = "Prometheus metrics exporter for Proxmox Backup Server",
    long_about = "Prometheus metrics exporter for Proxmox Backup Server.\n\n\
        Every option can also be set through the environment variable named\n\
        next to it; explicit command-line flags take precedence."
)]
pub struct Settings {
    /// PBS API endpoint URL
    #[arg(long, env = "PBS_ENDPOINT", default_value = "http://localhost:8007")]
    pub endpoint: String,

    /// PBS username the API token belongs to
    #[arg(long, env = "PBS_USERNAME", default_value = "root@pam")]
    pub username: String,

    /// PBS API token secret
    #[arg(long, env = "PBS_API_TOKEN", default_value = "", hide_env_values = true)]
    pub api_token: String,

    /// PBS API token name
    #[arg(long, env = "PBS_API_TOKEN_NAME", default_value = "pbs-exporter")]
    pub api_token_name: String,

    /// Request timeout for PBS API calls (e.g. "5s", "1m30s")
    #[arg(long, env = "PBS_TIMEOUT", default_value = "5s", value_parser = humantime::parse_duration)]
    pub timeout: Duration,

    /// Skip TLS certificate verification ("true" or "false")
    #[arg(long, env = "PBS_INSECURE", default_value_t = false, action = ArgAction::Set)]
    pub insecure: bool,

    /// Path under which to expose metrics
    #[arg(long, env = "PBS_METRICS_PATH", default_value = "/metrics")]
    pub metrics_path: String,

    /// Address on which to expose metrics
    #[arg(long, env = "PBS_LISTEN_ADDRESS", default_value = "0.0.0.0:9101")]
    pub listen_address: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "PBS_LOGLEVEL", default_value = "info")]
    pub log_level: String,

    /// Log the outbound Authorization header at debug level.
    /// WARNING: this writes the API token to the log output.
    #[arg(long, env = "PBS_LOG_AUTH_HEADER", action = ArgAction::SetTrue)]
    pub log_auth_header: bool,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("api_token", &"***REDACTED***")
            .field("api_token_name", &self.api_token_name)
            .field("timeout", &self.timeout)
            .field("insecure", &self.insecure)
            .field("metrics_path", &self.metrics_path)
            .field("listen_address", &self.listen_address)
            .field("log_level", &self.log_level)
            .field("log_auth_header", &self.log_auth_header)
            .finish()
    }
}

impl Settings {
    /// Validate settings that clap cannot check on its own.
    pub fn validate(&self) -> Result<()> {
        if !self.metrics_path.starts_with('/') {
            return Err(ExporterError::Config(format!(
                "metrics path must start with '/', got {:?}",
                self.metrics_path
            )));
        }

        if self.metrics_path == "/" {
            return Err(ExporterError::Config(
                "metrics path '/' collides with the info page".to_string(),
            ));
        }

        if self.endpoint.is_empty() {
            return Err(ExporterError::Config("endpoint cannot be empty".to_string()));
        }

        Ok(())
    }
}
