//! Application Configuration Module
//!
//! Settings come from the environment (optionally seeded from a `.env` file).

use std::path::PathBuf;

use crate::people::{DEFAULT_API_BASE_URL, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

pub const DEFAULT_REDIRECT_PORT: u16 = 8080;
const DB_FILE_NAME: &str = "contacts-import.db";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },

    #[error("Failed to determine the data directory; set CONTACTS_IMPORT_DATA_DIR")]
    NoDataDir,
}

/// Runtime settings for the importer
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_port: u16,
    pub page_size: u32,
    pub api_base_url: String,
    pub data_dir: PathBuf,
    pub template_path: PathBuf,
    pub output_dir: PathBuf,
}

impl AppConfig {
    /// Load settings from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through `lookup`, which maps a variable name to its value
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let client_id = get("GOOGLE_CLIENT_ID").ok_or(ConfigError::Missing("GOOGLE_CLIENT_ID"))?;
        let client_secret =
            get("GOOGLE_CLIENT_SECRET").ok_or(ConfigError::Missing("GOOGLE_CLIENT_SECRET"))?;

        let redirect_port = match get("CONTACTS_IMPORT_REDIRECT_PORT") {
            Some(value) => value.trim().parse::<u16>().map_err(|_| ConfigError::Invalid {
                key: "CONTACTS_IMPORT_REDIRECT_PORT",
                value,
            })?,
            None => DEFAULT_REDIRECT_PORT,
        };

        let page_size = match get("CONTACTS_IMPORT_PAGE_SIZE") {
            Some(value) => match value.trim().parse::<u32>() {
                Ok(size) if (1..=MAX_PAGE_SIZE).contains(&size) => size,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "CONTACTS_IMPORT_PAGE_SIZE",
                        value,
                    })
                }
            },
            None => DEFAULT_PAGE_SIZE,
        };

        let api_base_url = get("CONTACTS_IMPORT_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        url::Url::parse(&api_base_url).map_err(|_| ConfigError::Invalid {
            key: "CONTACTS_IMPORT_API_BASE_URL",
            value: api_base_url.clone(),
        })?;

        let data_dir = match get("CONTACTS_IMPORT_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => directories::ProjectDirs::from("com", "contacts-import", "contacts-import")
                .map(|dirs| dirs.data_dir().to_path_buf())
                .ok_or(ConfigError::NoDataDir)?,
        };

        let template_path = get("CONTACTS_IMPORT_TEMPLATE")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("template.txt"));
        let output_dir = get("CONTACTS_IMPORT_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("documents"));

        Ok(Self {
            client_id,
            client_secret,
            redirect_port,
            page_size,
            api_base_url,
            data_dir,
            template_path,
            output_dir,
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }
}
