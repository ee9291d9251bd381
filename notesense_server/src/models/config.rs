use std::collections::HashMap;
use std::fs::File;
use std::path::PathBuf;

use serde::Deserialize;

use crate::{extractor::ExtractorCommand, models::files::FileKind, utils};

/// Used when no config file is given. The JWT secret must then come from
/// the environment.
const DEFAULT_CONFIG: &str = r#"{"auth": {"jwt_secret": "${JWT_SECRET}"}}"#;

#[derive(Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "utils::default_server_binding_addr")]
    pub bind_addr: String,
    /// Origins allowed by CORS. Any origin is allowed when empty.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    #[serde(default = "utils::default_upload_dir")]
    pub upload_dir: PathBuf,
    #[serde(default = "utils::default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: utils::default_server_binding_addr(),
            cors_origins: vec![],
            upload_dir: utils::default_upload_dir(),
            max_upload_bytes: utils::default_max_upload_bytes(),
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret used to sign and verify access tokens.
    #[serde(deserialize_with = "utils::deserialize_with_envsubst")]
    pub jwt_secret: String,
    #[serde(default = "utils::default_access_token_expiry_mins")]
    pub access_token_expiry_mins: i64,
    #[serde(default = "utils::default_min_password_length")]
    pub min_password_length: usize,
}

#[derive(Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "utils::default_max_connect_retries")]
    pub max_connect_retries: u32,
    #[serde(default = "utils::default_blacklist_cleanup_interval_secs")]
    pub blacklist_cleanup_interval_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_connect_retries: utils::default_max_connect_retries(),
            blacklist_cleanup_interval_secs: utils::default_blacklist_cleanup_interval_secs(),
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct NoteSenseConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    /// External commands used to pull text out of uploaded files.
    #[serde(default)]
    pub extractors: HashMap<FileKind, ExtractorCommand>,
}

impl NoteSenseConfig {
    /// Load the config file at `NOTESENSE_CONFIG_PATH`, falling back to
    /// defaults when the variable isn't set.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config = match dotenvy::var("NOTESENSE_CONFIG_PATH") {
            Ok(config_path) => {
                let config_file = File::open(config_path)?;
                serde_json::from_reader(config_file)?
            }
            Err(_) => serde_json::from_str(DEFAULT_CONFIG)?,
        };
        Ok(config)
    }
}
