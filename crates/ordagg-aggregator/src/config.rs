//! Tuning knobs of the aggregation engine.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Size of the worker pool draining the application queue.
    pub max_parallel_application_processors: usize,
    /// Applications requested per page while enumerating the catalog.
    pub application_page_size: usize,
    /// Base URL of the tenant-less global registry. Sync is skipped when unset.
    pub global_registry_url: Option<String>,
    /// Concurrent specification downloads per application.
    pub max_parallel_spec_processors: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_parallel_application_processors: default_max_parallel_application_processors(),
            application_page_size: default_application_page_size(),
            global_registry_url: None,
            max_parallel_spec_processors: default_max_parallel_spec_processors(),
        }
    }
}

fn default_max_parallel_application_processors() -> usize {
    4
}

fn default_application_page_size() -> usize {
    200
}

fn default_max_parallel_spec_processors() -> usize {
    100
}

impl AggregatorConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_parallel_application_processors == 0 {
            return Err("aggregator.max_parallel_application_processors must be > 0".into());
        }
        if self.application_page_size == 0 {
            return Err("aggregator.application_page_size must be > 0".into());
        }
        if self.max_parallel_spec_processors == 0 {
            return Err("aggregator.max_parallel_spec_processors must be > 0".into());
        }
        if let Some(url) = &self.global_registry_url {
            url::Url::parse(url)
                .map_err(|e| format!("aggregator.global_registry_url is invalid: {e}"))?;
        }
        Ok(())
    }
}

/// HTTP settings shared by the document client and the spec fetcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub timeout_secs: u64,
    pub well_known_path: String,
    /// Documents of one provider downloaded concurrently.
    pub max_parallel_documents_per_application: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            well_known_path: "/.well-known/open-resource-discovery".to_string(),
            max_parallel_documents_per_application: 4,
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.timeout_secs == 0 {
            return Err("client.timeout_secs must be > 0".into());
        }
        if !self.well_known_path.starts_with('/') {
            return Err("client.well_known_path must start with '/'".into());
        }
        if self.max_parallel_documents_per_application == 0 {
            return Err("client.max_parallel_documents_per_application must be > 0".into());
        }
        Ok(())
    }
}

/// Per-job metrics of the operation entry points.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub job_name: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            job_name: "ord-aggregator".to_string(),
        }
    }
}
