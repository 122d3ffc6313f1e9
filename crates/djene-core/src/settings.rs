//! Settings for djene applications.
//!
//! Settings are plain serde structs loaded from TOML, covering the small
//! surface this workspace consumes: debug mode, the log level, and the
//! database connection parameters.

use serde::Deserialize;

use crate::error::{DjeneError, DjeneResult};

/// Top-level application settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Debug mode. Controls the logging output format.
    pub debug: bool,
    /// The tracing filter directive (e.g. "info", "djene_db=debug").
    pub log_level: String,
    /// Database connection settings.
    pub database: DatabaseSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: false,
            log_level: "info".to_string(),
            database: DatabaseSettings::default(),
        }
    }
}

/// Database connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// The backend engine name. Only "sqlite" ships in this workspace.
    pub engine: String,
    /// The database name: a file path, or ":memory:" for an in-memory
    /// SQLite database.
    pub name: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            engine: "sqlite".to_string(),
            name: ":memory:".to_string(),
        }
    }
}

impl Settings {
    /// Parses settings from a TOML string.
    pub fn from_toml_str(content: &str) -> DjeneResult<Self> {
        toml::from_str(content)
            .map_err(|e| DjeneError::ImproperlyConfigured(format!("Invalid settings TOML: {e}")))
    }

    /// Loads settings from a TOML file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> DjeneResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert!(!settings.debug);
        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.database.engine, "sqlite");
        assert_eq!(settings.database.name, ":memory:");
    }

    #[test]
    fn test_from_toml_str() {
        let settings = Settings::from_toml_str(
            r#"
            debug = true
            log_level = "debug"

            [database]
            engine = "sqlite"
            name = "app.db"
            "#,
        )
        .unwrap();
        assert!(settings.debug);
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.database.name, "app.db");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let settings = Settings::from_toml_str("debug = true").unwrap();
        assert!(settings.debug);
        assert_eq!(settings.database.engine, "sqlite");
    }

    #[test]
    fn test_invalid_toml() {
        let err = Settings::from_toml_str("debug = ").unwrap_err();
        assert!(matches!(err, DjeneError::ImproperlyConfigured(_)));
    }
}
