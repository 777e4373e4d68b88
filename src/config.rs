//! API endpoint and credential resolution.
//!
//! Precedence, highest first: command-line flag, environment variable
//! (`NIMBUS_API_URL` / `NIMBUS_TOKEN`), then `~/.config/nimbus/config.toml`.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

pub const ENV_API_URL: &str = "NIMBUS_API_URL";
pub const ENV_TOKEN: &str = "NIMBUS_TOKEN";

/// `~/.config/nimbus/config.toml`
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub api: ApiSection,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiSection {
    pub url: Option<String>,
    pub token: Option<String>,
}

/// Resolved endpoint and credential for one run.
#[derive(Debug)]
pub struct ApiConfig {
    pub url: String,
    pub token: String,
}

impl FileConfig {
    fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("nimbus").join("config.toml"))
    }

    /// Load the config file, or defaults when there is none.
    pub fn load() -> Result<Self> {
        let Some(path) = Self::path() else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| Error::config(format!("could not read {}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| Error::config(format!("invalid config {}: {e}", path.display())))
    }
}

impl ApiConfig {
    /// Resolve endpoint and token from flags, environment and config file.
    pub fn resolve(url_flag: Option<String>, token_flag: Option<String>) -> Result<Self> {
        Self::resolve_with(url_flag, token_flag, |name| std::env::var(name).ok(), FileConfig::load()?)
    }

    fn resolve_with(
        url_flag: Option<String>,
        token_flag: Option<String>,
        env: impl Fn(&str) -> Option<String>,
        file: FileConfig,
    ) -> Result<Self> {
        let url = url_flag
            .or_else(|| env(ENV_API_URL))
            .or(file.api.url)
            .ok_or_else(|| Error::config("could not resolve API base url"))?;
        let token = token_flag
            .or_else(|| env(ENV_TOKEN))
            .or(file.api.token)
            .ok_or_else(|| Error::config("could not resolve access token"))?;
        Ok(Self { url, token })
    }
}
