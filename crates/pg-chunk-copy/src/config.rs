//! Configuration loading and validation.
//!
//! The engine's sizing constants are compiled in (see [`crate::plan`]); the
//! YAML file only describes the two storage endpoints.

use crate::error::{CopyError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source relation (read-only to the engine).
    pub source: EndpointConfig,

    /// Target relation (written by bulk upsert only).
    pub target: EndpointConfig,
}

/// One PostgreSQL endpoint plus the relation to read or write.
#[derive(Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    pub password: String,

    /// SSL mode: disable, require, verify-ca, verify-full (default: "require").
    #[serde(default = "default_require")]
    pub ssl_mode: String,

    /// Schema containing the relation.
    pub schema: String,

    /// Relation (table) name.
    pub table: String,
}

// Manual Debug so passwords never leak into logs or error output.
impl fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .field("schema", &self.schema)
            .field("table", &self.table)
            .finish()
    }
}

fn default_pg_port() -> u16 {
    5432
}

fn default_require() -> String {
    "require".to_string()
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validate_endpoint(&self.source, "source")?;
        validate_endpoint(&self.target, "target")?;

        // Source and target may share a database (the usual schema-to-schema
        // copy) but must not name the same relation.
        if self.source.host == self.target.host
            && self.source.port == self.target.port
            && self.source.database == self.target.database
            && self.source.schema == self.target.schema
            && self.source.table == self.target.table
        {
            return Err(CopyError::Config(
                "source and target cannot be the same relation".into(),
            ));
        }

        Ok(())
    }
}

fn validate_endpoint(endpoint: &EndpointConfig, name: &str) -> Result<()> {
    if endpoint.host.is_empty() {
        return Err(CopyError::Config(format!("{}.host is required", name)));
    }
    if endpoint.database.is_empty() {
        return Err(CopyError::Config(format!("{}.database is required", name)));
    }
    if endpoint.user.is_empty() {
        return Err(CopyError::Config(format!("{}.user is required", name)));
    }
    if endpoint.schema.is_empty() {
        return Err(CopyError::Config(format!("{}.schema is required", name)));
    }
    if endpoint.table.is_empty() {
        return Err(CopyError::Config(format!("{}.table is required", name)));
    }
    match endpoint.ssl_mode.as_str() {
        "disable" | "require" | "verify-ca" | "verify-full" => Ok(()),
        other => Err(CopyError::Config(format!(
            "{}.ssl_mode '{}' is invalid. Valid options: disable, require, verify-ca, verify-full",
            name, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(schema: &str) -> EndpointConfig {
        EndpointConfig {
            host: "localhost".to_string(),
            port: 5432,
            database: "appdb".to_string(),
            user: "postgres".to_string(),
            password: "password".to_string(),
            ssl_mode: "disable".to_string(),
            schema: schema.to_string(),
            table: "sample_data".to_string(),
        }
    }

    fn valid_config() -> Config {
        Config {
            source: endpoint("source_schema"),
            target: endpoint("target_schema"),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_missing_source_host() {
        let mut config = valid_config();
        config.source.host = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_target_table() {
        let mut config = valid_config();
        config.target.table = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_ssl_mode() {
        let mut config = valid_config();
        config.target.ssl_mode = "prefer".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_same_relation_rejected() {
        let mut config = valid_config();
        config.target.schema = "source_schema".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_same_database_different_schema_allowed() {
        // The reference deployment copies between two schemas of one database.
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_from_yaml_applies_defaults() {
        let yaml = r#"
source:
  host: localhost
  database: appdb
  user: postgres
  password: secret
  schema: source_schema
  table: sample_data
target:
  host: localhost
  database: appdb
  user: postgres
  password: secret
  schema: target_schema
  table: sample_data
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.source.port, 5432);
        assert_eq!(config.source.ssl_mode, "require");
    }

    #[test]
    fn test_debug_redacts_password() {
        let mut config = valid_config();
        config.source.password = "super_secret_password_123".to_string();
        let debug_output = format!("{:?}", config.source);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_password_123"));
    }
}
