use crate::error::ConfigurationError;
use crate::util;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Memory,
    Mongodb,
}

/// Superuser seeded into the user collection on start-up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapAdmin {
    pub username: String,
    pub code: String,
}

impl Default for BootstrapAdmin {
    fn default() -> Self {
        BootstrapAdmin {
            username: env::var("FLOW_ADMIN_USERNAME").unwrap_or("tamar".to_string()),
            code: env::var("FLOW_ADMIN_CODE").unwrap_or("4378".to_string()),
        }
    }
}

fn default_storage() -> StorageKind {
    match env::var("FLOW_STORAGE").as_deref() {
        Ok("memory") => StorageKind::Memory,
        _ => StorageKind::Mongodb,
    }
}

fn default_mongodb_uri() -> String {
    env::var("MONGODB_URI").unwrap_or("mongodb://localhost:27017".to_string())
}

fn default_mongodb_db() -> String {
    env::var("MONGODB_DB_NAME").unwrap_or("flow".to_string())
}

fn default_mongodb_collection() -> String {
    "flowData".to_string()
}

fn default_store_timeout_secs() -> u64 {
    10
}

fn default_max_write_attempts() -> u32 {
    5
}

fn default_session_ttl_hours() -> u64 {
    24 * 7
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip)]
    file_path: PathBuf,

    #[serde(default = "default_storage")]
    pub storage: StorageKind,
    #[serde(default = "default_mongodb_uri")]
    pub mongodb_uri: String,
    #[serde(default = "default_mongodb_db")]
    pub mongodb_db: String,
    #[serde(default = "default_mongodb_collection")]
    pub mongodb_collection: String,

    #[serde(default)]
    pub bootstrap_admin: BootstrapAdmin,

    #[serde(default = "default_store_timeout_secs")]
    pub store_timeout_secs: u64,
    #[serde(default = "default_max_write_attempts")]
    pub max_write_attempts: u32,
    /// Logins older than this are dropped.
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            file_path: config_dir().join("settings.yml"),
            storage: default_storage(),
            mongodb_uri: default_mongodb_uri(),
            mongodb_db: default_mongodb_db(),
            mongodb_collection: default_mongodb_collection(),
            bootstrap_admin: BootstrapAdmin::default(),
            store_timeout_secs: default_store_timeout_secs(),
            max_write_attempts: default_max_write_attempts(),
            session_ttl_hours: default_session_ttl_hours(),
        }
    }
}

#[inline]
fn config_dir() -> PathBuf {
    PathBuf::from(env::var("CONFIG_DIR").unwrap_or("./config".to_string()))
}

impl Config {
    pub fn load() -> Result<Config, ConfigurationError> {
        let config_file = util::find_first_subpath(
            config_dir(),
            &["settings.yml", "settings.yaml"],
            Path::exists,
        )
        .ok_or_else(|| ConfigurationError::NotFound(config_dir()))?;

        let file = File::open(&config_file)?;
        let mut config: Config = serde_yaml::from_reader(BufReader::new(file))?;
        config.file_path = config_file;

        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigurationError> {
        let file = File::create(&self.file_path)?;
        let mut out = BufWriter::new(file);
        serde_yaml::to_writer(&mut out, self)?;
        out.flush()?;
        Ok(())
    }

    /// In-memory configuration used by tests and local experiments.
    pub fn in_memory() -> Config {
        Config {
            storage: StorageKind::Memory,
            bootstrap_admin: BootstrapAdmin {
                username: "tamar".to_string(),
                code: "4378".to_string(),
            },
            ..Default::default()
        }
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_hours.saturating_mul(60 * 60))
    }
}
