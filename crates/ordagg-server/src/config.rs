use std::net::SocketAddr;
use std::time::Duration;

use ordagg_aggregator::{AggregatorConfig, ClientConfig, MetricsConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Worker pool, paging and global registry settings
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    /// HTTP settings for document and specification downloads
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Job metrics of the trigger endpoints
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        if self.scheduler.parallel_operation_processors > 0
            && self.scheduler.operation_processor_quiet_period_ms == 0
        {
            return Err("scheduler.operation_processor_quiet_period_ms must be > 0".into());
        }
        if self.metrics.job_name.trim().is_empty() {
            return Err("metrics.job_name must not be empty".into());
        }
        self.aggregator.validate()?;
        self.client.validate()?;
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Periodic jobs. An interval of zero disables the job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub aggregation_interval_secs: u64,
    #[serde(default)]
    pub maintain_operations_interval_secs: u64,
    /// Concurrent operation executors; zero disables them
    #[serde(default)]
    pub parallel_operation_processors: usize,
    /// Pause of an executor that found nothing to do
    #[serde(default = "default_quiet_period_ms")]
    pub operation_processor_quiet_period_ms: u64,
}

fn default_quiet_period_ms() -> u64 {
    5_000
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            aggregation_interval_secs: 0,
            maintain_operations_interval_secs: 0,
            parallel_operation_processors: 0,
            operation_processor_quiet_period_ms: default_quiet_period_ms(),
        }
    }
}

impl SchedulerConfig {
    pub fn aggregation_interval(&self) -> Option<Duration> {
        non_zero(self.aggregation_interval_secs)
    }

    pub fn maintain_operations_interval(&self) -> Option<Duration> {
        non_zero(self.maintain_operations_interval_secs)
    }

    pub fn operation_processor_quiet_period(&self) -> Duration {
        Duration::from_millis(self.operation_processor_quiet_period_ms)
    }
}

fn non_zero(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or("ordagg.toml"));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // e.g. ORDAGG__AGGREGATOR__MAX_PARALLEL_APPLICATION_PROCESSORS=8
        builder = builder.add_source(
            Environment::with_prefix("ORDAGG")
                .prefix_separator("__")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
