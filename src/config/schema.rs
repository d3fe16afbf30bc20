//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files and
//! default every field, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};

/// Root configuration for the exchange pipeline.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    /// Transport settings for the hyper adapter.
    pub transport: TransportConfig,

    /// Worker runtime settings.
    pub runtime: RuntimeConfig,

    /// Body draining limits.
    pub body: BodyConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,
}

/// Transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Deadline for a whole exchange, head and body included.
    pub request_timeout_secs: u64,

    /// Speak HTTP/2 with prior knowledge.
    pub http2_only: bool,

    /// Worker group that drives this transport's exchanges.
    pub worker_group: String,

    /// Largest request body frame reported as one upload event.
    pub upload_chunk_bytes: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            http2_only: false,
            worker_group: "default".to_string(),
            upload_chunk_bytes: 16 * 1024,
        }
    }
}

/// Worker runtime configuration, applied per worker group.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Worker threads per group.
    pub worker_threads: usize,

    /// Thread name prefix; the group name is appended.
    pub thread_name: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: 2,
            thread_name: "exchange-worker".to_string(),
        }
    }
}

/// Body configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BodyConfig {
    /// Maximum bytes `Body::collect_limited` accepts from the CLI.
    pub max_collect_bytes: usize,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            max_collect_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
    Pretty,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// `EnvFilter` directives; `RUST_LOG` takes precedence.
    pub log_filter: String,

    /// Log line format.
    pub format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "exchange_pipeline=info".to_string(),
            format: LogFormat::Full,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: PipelineConfig = toml::from_str("").unwrap();
        assert_eq!(config.transport.request_timeout_secs, 30);
        assert_eq!(config.runtime.worker_threads, 2);
        assert_eq!(config.observability.format, LogFormat::Full);
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let config: PipelineConfig = toml::from_str(
            r#"
            [transport]
            http2_only = true

            [observability]
            format = "compact"
            "#,
        )
        .unwrap();
        assert!(config.transport.http2_only);
        assert_eq!(config.transport.connect_timeout_secs, 10);
        assert_eq!(config.observability.format, LogFormat::Compact);
    }
}
