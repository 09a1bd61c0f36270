/// Configuration for the resolution engine and its logging.
///
/// Loaded from a TOML file; every field has a default so an empty file
/// (or no file at all) gives the standard behaviour:
///
/// ```toml
/// [resolution]
/// continuous_limit_secs = 300
/// max_periodic_group_size = 25
///
/// [logging]
/// level = "info"
/// file = "oceanval.log"
/// console_timestamps = false
///
/// [[columns]]
/// column_id = 12
/// sensor_type = { id = 1, name = "Sea Surface Temperature", column_code = "SST" }
/// ```
use crate::error::ConfigError;
use crate::logging::LogLevel;
use crate::store::{ColumnAssignment, SensorAssignments};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Maximum gap, in seconds, between two readings that still counts as
/// continuous. Also the limit for interpolating in time.
pub const DEFAULT_CONTINUOUS_LIMIT_SECS: i64 = 300;

/// Run length at or below which a bursty series is treated as periodic.
pub const DEFAULT_MAX_PERIODIC_GROUP_SIZE: usize = 25;

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Tuning of measurement-mode classification and grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolutionConfig {
    pub continuous_limit_secs: i64,
    pub max_periodic_group_size: usize,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        ResolutionConfig {
            continuous_limit_secs: DEFAULT_CONTINUOUS_LIMIT_SECS,
            max_periodic_group_size: DEFAULT_MAX_PERIODIC_GROUP_SIZE,
        }
    }
}

impl ResolutionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.continuous_limit_secs <= 0 {
            return Err(ConfigError::Invalid(format!(
                "continuous_limit_secs must be positive, got {}",
                self.continuous_limit_secs
            )));
        }
        if self.max_periodic_group_size == 0 {
            return Err(ConfigError::Invalid(
                "max_periodic_group_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: LogLevel,
    /// Append log lines to this file as well as the console.
    pub file: Option<String>,
    pub console_timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
            file: None,
            console_timestamps: false,
        }
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    pub resolution: ResolutionConfig,
    pub logging: LoggingConfig,
    /// Column → sensor type assignments for the instrument.
    pub columns: Vec<ColumnAssignment>,
}

impl ServiceConfig {
    pub fn sensor_assignments(&self) -> SensorAssignments {
        SensorAssignments::from_entries(self.columns.iter().cloned())
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Parses and validates configuration from TOML text.
pub fn parse_config(text: &str, source_name: &str) -> Result<ServiceConfig, ConfigError> {
    let config: ServiceConfig = toml::from_str(text).map_err(|e| ConfigError::Parse {
        path: source_name.to_string(),
        source: e,
    })?;
    config.resolution.validate()?;
    Ok(config)
}

/// Loads configuration from a TOML file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ServiceConfig, ConfigError> {
    let path = path.as_ref();
    let display = path.display().to_string();

    let text = fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: display.clone(),
        source: e,
    })?;

    let config = parse_config(&text, &display)?;
    log::info!(
        target: "config",
        "loaded {}: continuous limit {}s, max periodic group {}, {} column assignments",
        display,
        config.resolution.continuous_limit_secs,
        config.resolution.max_periodic_group_size,
        config.columns.len()
    );
    Ok(config)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SensorType;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("", "empty").expect("empty config should parse");
        assert_eq!(config.resolution.continuous_limit_secs, 300);
        assert_eq!(config.resolution.max_periodic_group_size, 25);
        assert_eq!(config.logging.level, LogLevel::Info);
        assert!(config.columns.is_empty());
    }

    #[test]
    fn test_partial_resolution_section_keeps_other_defaults() {
        let config = parse_config("[resolution]\ncontinuous_limit_secs = 120\n", "partial")
            .expect("partial config should parse");
        assert_eq!(config.resolution.continuous_limit_secs, 120);
        assert_eq!(config.resolution.max_periodic_group_size, 25);
    }

    #[test]
    fn test_non_positive_limit_is_rejected() {
        let result = parse_config("[resolution]\ncontinuous_limit_secs = 0\n", "zero");
        assert!(matches!(result, Err(ConfigError::Invalid(_))), "got {:?}", result);
    }

    #[test]
    fn test_unknown_key_is_a_parse_error() {
        let result = parse_config("[resolution]\ncontinuous_limit = 5\n", "typo");
        assert!(matches!(result, Err(ConfigError::Parse { .. })), "got {:?}", result);
    }

    #[test]
    fn test_column_assignments_build_lookup() {
        let text = r#"
            [[columns]]
            column_id = 12
            sensor_type = { id = 1, name = "Sea Surface Temperature", column_code = "SST" }

            [[columns]]
            column_id = 13
            sensor_type = { id = 1, name = "Sea Surface Temperature", column_code = "SST" }
        "#;
        let config = parse_config(text, "columns").expect("columns should parse");
        let assignments = config.sensor_assignments();
        let sst = SensorType::new(1, "Sea Surface Temperature", "SST");
        assert_eq!(assignments.columns_for(&sst), vec![12, 13]);
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "[logging]\nlevel = \"debug\"\nconsole_timestamps = true").unwrap();
        let config = load_config(file.path()).expect("file config should load");
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert!(config.logging.console_timestamps);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = load_config("/nonexistent/oceanval.toml");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
