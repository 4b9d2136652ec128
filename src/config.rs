//! This module provides functionality for loading and handling the application's configuration.
//!
//! It defines the `VaultConfig` struct, which holds the configuration parameters,
//! and a `load_config` function to load the configuration from a file.
//!
//! # Examples
//!
//! Loading the configuration from a file:
//!
//! ```no_run
//! use vulnvault::config::{VaultConfig, load_config};
//!
//! let config: VaultConfig = load_config("/path/to/config.yaml").unwrap();
//! println!("{:?}", config);
//! ```

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use crate::error::Result;

fn default_dimension() -> usize {
    1024
}

/// Represents the application's configuration.
///
/// This struct holds everything needed to open the store: where the SQLite
/// database lives, where (if anywhere) a local copy of the embedding model
/// sits, and the vector dimension the schema was created with. It can be
/// constructed by loading a YAML configuration file using [`load_config`].
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct VaultConfig {
    /// SQLite database URL (a file path, or `:memory:`).
    pub database_url: String,

    /// Optional local model directory; when `None` the model is fetched from
    /// the Hugging Face Hub.
    pub model_dir: Option<PathBuf>,

    /// Dimensionality of stored embeddings. Fixed at store-creation time and
    /// must match the provider's output (1024 for E5-large).
    #[serde(default = "default_dimension")]
    pub vector_dimension: usize,
}

/// Loads the application's configuration from a YAML file.
///
/// # Errors
/// I/O failure reading the file, or YAML that does not deserialize into
/// [`VaultConfig`].
pub fn load_config(file: &str) -> Result<VaultConfig> {
    let content = fs::read_to_string(file)?;
    let config: VaultConfig = serde_yaml::from_str(&content)
        .map_err(|e| crate::error::VaultError::Config(e.to_string()))?;
    Ok(config)
}

/// Open a SQLite connection with foreign-key enforcement on.
///
/// SQLite only honors `REFERENCES` clauses when `PRAGMA foreign_keys` is set
/// per connection, so every connection goes through here.
pub fn establish_connection(db_url: &str) -> Result<SqliteConnection> {
    let mut connection = SqliteConnection::establish(db_url)?;
    connection.batch_execute("PRAGMA foreign_keys = ON;")?;
    Ok(connection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_valid_file() {
        // Create a temporary file with a valid configuration.
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
database_url: "vulnvault.db"
model_dir: "/opt/models/e5-large-v2"
vector_dimension: 1024
"#
        )
        .unwrap();

        let config = load_config(temp_file.path().to_str().unwrap());

        assert!(config.is_ok());
        let config = config.unwrap();
        assert_eq!(config.database_url, "vulnvault.db");
        assert_eq!(
            config.model_dir,
            Some(PathBuf::from("/opt/models/e5-large-v2"))
        );
        assert_eq!(config.vector_dimension, 1024);
    }

    #[test]
    fn test_load_config_defaults_dimension() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, r#"database_url: "vulnvault.db""#).unwrap();

        let config = load_config(temp_file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.model_dir, None);
        assert_eq!(config.vector_dimension, 1024);
    }

    #[test]
    fn test_load_config_invalid_file() {
        // Try to load a configuration from a non-existent file path.
        let config = load_config("non/existent/path");
        assert!(config.is_err());
    }

    #[test]
    fn test_load_config_invalid_format() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, r#"invalid: config: format"#).unwrap();

        let config = load_config(temp_file.path().to_str().unwrap());
        assert!(config.is_err());
    }
}
