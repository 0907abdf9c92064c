//! Project configuration.
//!
//! A project may carry a `sqlmill.yml` file in its directory. Every key is
//! optional; missing keys take the defaults shown below.
//!
//! # Example YAML
//!
//! ```yaml
//! database_url: sqlite3://app.db
//! migrations_dir: migrations
//! routines_dir: routines
//! model:
//!   package_dir: models
//!   schema_name: null
//!   ignore_tables:
//!     - migrations
//!   include_docs: false
//!   keep_schema: false
//!   orm_type: sqlx
//!   tags: [json, validate]
//! ```

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// File name looked up in the project directory.
pub const CONFIG_FILE: &str = "sqlmill.yml";

/// Environment variable that overrides `database_url`.
pub const DATABASE_URL_ENV: &str = "SQLMILL_DATABASE_URL";

/// Settings for model and routine generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory, relative to the project, that receives generated models.
    pub package_dir: PathBuf,
    /// Schema to introspect; the dialect's default schema when unset.
    pub schema_name: Option<String>,
    /// Tables never emitted.
    pub ignore_tables: Vec<String>,
    /// Emit documentation comments on generated types and fields.
    pub include_docs: bool,
    /// Prefix type names with the schema name.
    pub keep_schema: bool,
    /// Database-facing attribute vocabulary (`sqlx`, `sea-orm` or `none`).
    pub orm_type: String,
    /// Serialization and validation tags (`json`, `xml`, `validate`).
    pub tags: Vec<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            package_dir: PathBuf::from("models"),
            schema_name: None,
            ignore_tables: vec!["migrations".to_string()],
            include_docs: false,
            keep_schema: false,
            orm_type: "sqlx".to_string(),
            tags: vec!["json".to_string(), "validate".to_string()],
        }
    }
}

/// Top-level project configuration.
///
/// # Examples
///
/// ```
/// use sqlmill_db::Config;
///
/// let config: Config = serde_yaml::from_str("database_url: sqlite3://app.db").unwrap();
/// assert_eq!(config.database_url.as_deref(), Some("sqlite3://app.db"));
/// assert_eq!(config.migrations_dir.to_str(), Some("migrations"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_url: Option<String>,
    /// Migration files, relative to the project directory.
    pub migrations_dir: PathBuf,
    /// Routine files, relative to the project directory.
    pub routines_dir: PathBuf,
    pub model: ModelConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            migrations_dir: PathBuf::from("migrations"),
            routines_dir: PathBuf::from("routines"),
            model: ModelConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](crate::DbError::Io) if the file cannot be read, or
    /// [`Config`](crate::DbError::Config) if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading configuration");
        let file = std::fs::File::open(path)?;
        let config = serde_yaml::from_reader(BufReader::new(file))?;
        Ok(config)
    }

    /// Loads `sqlmill.yml` from `project_dir`, or the defaults when the
    /// file does not exist.
    pub fn discover(project_dir: impl AsRef<Path>) -> Result<Self> {
        let path = project_dir.as_ref().join(CONFIG_FILE);
        if path.is_file() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Saves the configuration as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_yaml::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Picks the database URL: `flag`, then `env`, then the file.
    pub fn resolve_database_url(&self, flag: Option<&str>, env: Option<&str>) -> Option<String> {
        flag.or(env)
            .or(self.database_url.as_deref())
            .filter(|url| !url.trim().is_empty())
            .map(str::to_string)
    }
}
