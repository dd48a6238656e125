use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{DocsliceError, DocsliceResult};
use crate::types::{ChunkSize, FileKind};

/// Top-level configuration (loaded from docslice.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DocsliceConfig {
    pub transfer: TransferConfig,
    pub host: HostConfig,
    pub logging: LoggingConfig,
}

/// Order in which slice entries are written to the report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportOrder {
    /// As responses arrive
    #[default]
    Arrival,
    /// Buffered and released in slice index order
    Index,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Default chunk size offered by the trigger, in MB (default: 4)
    pub chunk_size_mb: f64,
    /// Document kind requested from the host
    pub file_kind: FileKind,
    /// Report ordering: "arrival" or "index"
    pub report_order: ReportOrder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Largest slice the host will hand out (default: 4 MiB)
    pub max_slice_bytes: u64,
    /// Simulated latency for every slice request, in milliseconds
    pub slice_latency_ms: u64,
    /// Extra random latency per slice request, in milliseconds
    pub latency_jitter_ms: u64,
    /// Seed for the jitter RNG
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (default: info)
    pub log_level: String,
    /// Log format: "json" or "text"
    pub log_format: String,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size_mb: 4.0,
            file_kind: FileKind::Compressed,
            report_order: ReportOrder::Arrival,
        }
    }
}

impl TransferConfig {
    pub fn chunk_size(&self) -> DocsliceResult<ChunkSize> {
        ChunkSize::from_megabytes(self.chunk_size_mb)
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            max_slice_bytes: 4 * 1024 * 1024,
            slice_latency_ms: 0,
            latency_jitter_ms: 0,
            seed: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            log_format: "text".into(),
        }
    }
}

impl DocsliceConfig {
    /// Parse a TOML document. Missing sections and keys take defaults.
    pub fn from_toml(content: &str) -> DocsliceResult<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| DocsliceError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, or return defaults if the file does not exist.
    pub fn load(path: &Path) -> DocsliceResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| match e {
            DocsliceError::Config(msg) => {
                DocsliceError::Config(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    pub fn to_toml(&self) -> DocsliceResult<String> {
        toml::to_string_pretty(self).map_err(|e| DocsliceError::Config(e.to_string()))
    }

    fn validate(&self) -> DocsliceResult<()> {
        self.transfer
            .chunk_size()
            .map_err(|e| DocsliceError::Config(format!("transfer.chunk_size_mb: {e}")))?;
        if self.host.max_slice_bytes == 0 {
            return Err(DocsliceError::Config(
                "host.max_slice_bytes must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[transfer]
chunk_size_mb = 0.5
file_kind = "text"
report_order = "index"

[host]
max_slice_bytes = 1048576
slice_latency_ms = 5
latency_jitter_ms = 20
seed = 42

[logging]
log_level = "debug"
log_format = "json"
"#;
        let config = DocsliceConfig::from_toml(toml_str).unwrap();

        assert_eq!(config.transfer.chunk_size_mb, 0.5);
        assert_eq!(config.transfer.chunk_size().unwrap().bytes(), 524_288);
        assert_eq!(config.transfer.file_kind, FileKind::Text);
        assert_eq!(config.transfer.report_order, ReportOrder::Index);
        assert_eq!(config.host.max_slice_bytes, 1_048_576);
        assert_eq!(config.host.latency_jitter_ms, 20);
        assert_eq!(config.host.seed, 42);
        assert_eq!(config.logging.log_level, "debug");
        assert_eq!(config.logging.log_format, "json");
    }

    #[test]
    fn test_parse_defaults() {
        let config = DocsliceConfig::from_toml("").unwrap();

        assert_eq!(config.transfer.chunk_size().unwrap().bytes(), 4_194_304);
        assert_eq!(config.transfer.file_kind, FileKind::Compressed);
        assert_eq!(config.transfer.report_order, ReportOrder::Arrival);
        assert_eq!(config.host.max_slice_bytes, 4_194_304);
        assert_eq!(config.host.slice_latency_ms, 0);
        assert_eq!(config.logging.log_level, "info");
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
[host]
slice_latency_ms = 10
"#;
        let config = DocsliceConfig::from_toml(toml_str).unwrap();

        // Overridden
        assert_eq!(config.host.slice_latency_ms, 10);
        // Defaults
        assert_eq!(config.host.max_slice_bytes, 4_194_304);
        assert_eq!(config.transfer.chunk_size_mb, 4.0);
    }

    #[test]
    fn test_invalid_chunk_size_rejected() {
        let err = DocsliceConfig::from_toml("[transfer]\nchunk_size_mb = 0\n").unwrap_err();
        assert!(err.to_string().contains("chunk_size_mb"));

        let err = DocsliceConfig::from_toml("[host]\nmax_slice_bytes = 0\n").unwrap_err();
        assert!(err.to_string().contains("max_slice_bytes"));
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = DocsliceConfig::default();
        let toml_str = config.to_toml().unwrap();
        let parsed = DocsliceConfig::from_toml(&toml_str).unwrap();

        assert_eq!(config.transfer.chunk_size_mb, parsed.transfer.chunk_size_mb);
        assert_eq!(config.host.max_slice_bytes, parsed.host.max_slice_bytes);
        assert_eq!(config.logging.log_format, parsed.logging.log_format);
    }
}
