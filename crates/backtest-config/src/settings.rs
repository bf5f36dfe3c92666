//! Host configuration structures.

use serde::{Deserialize, Serialize};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub data: DataSettings,
    #[serde(default)]
    pub output: OutputSettings,
}

/// General app settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    pub name: String,
    pub environment: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "backtest".to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Check if JSON log lines were requested.
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

/// Where the host reads candles from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSettings {
    /// Directory of per-symbol CSV files
    pub csv_dir: String,
    /// Also fetch higher-resolution detail candles
    pub detail: bool,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            csv_dir: "data".to_string(),
            detail: false,
        }
    }
}

/// Where the host writes results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    pub dir: String,
    pub pretty: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            dir: "results".to_string(),
            pretty: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [logging]
            level = "debug"
            format = "json"
            file = "logs/backtest.log"
            "#,
        )
        .unwrap();

        assert!(config.logging.is_json());
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.data.csv_dir, "data");
        assert_eq!(config.app.name, "backtest");
    }
}
