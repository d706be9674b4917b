//! Client configuration.
//!
//! Layered lowest to highest: built-in defaults, `~/.mediashare/config.json`
//! (or `<config-dir>/config.json`), `MEDIASHARE_*` environment variables,
//! then command-line flags.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::api::DEFAULT_TIMEOUT_SECS;
use crate::upload::{
    ConcurrencyLimits, ResolveOptions, DEFAULT_FINALIZE_CONCURRENCY, DEFAULT_UPLOAD_CONCURRENCY,
};

pub const DEFAULT_SERVER_URL: &str = "http://localhost:3000/";

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server_url: String,
    /// Uploads left today. `None` is unlimited, `Some(0)` blocks uploading.
    pub daily_quota: Option<u32>,
    pub upload_concurrency: usize,
    pub finalize_concurrency: usize,
    pub compute_md5: bool,
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            daily_quota: None,
            upload_concurrency: DEFAULT_UPLOAD_CONCURRENCY,
            finalize_concurrency: DEFAULT_FINALIZE_CONCURRENCY,
            compute_md5: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Values given on the command line. `None` leaves the layer below alone.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub server_url: Option<String>,
    pub daily_quota: Option<u32>,
    pub upload_concurrency: Option<usize>,
    pub compute_md5: bool,
}

impl ClientConfig {
    /// Apply `MEDIASHARE_*` variables from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply `MEDIASHARE_*` variables read through `lookup`.
    ///
    /// Unparseable values are ignored with a warning.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("MEDIASHARE_SERVER_URL").filter(|v| !v.is_empty()) {
            self.server_url = url;
        }

        if let Some(raw) = lookup("MEDIASHARE_DAILY_QUOTA") {
            match raw.trim() {
                "" | "unlimited" => self.daily_quota = None,
                value => match value.parse() {
                    Ok(quota) => self.daily_quota = Some(quota),
                    Err(_) => warn!("Ignoring MEDIASHARE_DAILY_QUOTA={:?}", raw),
                },
            }
        }

        if let Some(raw) = lookup("MEDIASHARE_UPLOAD_CONCURRENCY") {
            match raw.trim().parse() {
                Ok(n) => self.upload_concurrency = n,
                Err(_) => warn!("Ignoring MEDIASHARE_UPLOAD_CONCURRENCY={:?}", raw),
            }
        }

        if let Some(raw) = lookup("MEDIASHARE_COMPUTE_MD5") {
            match raw.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.compute_md5 = true,
                "0" | "false" | "no" | "off" => self.compute_md5 = false,
                _ => warn!("Ignoring MEDIASHARE_COMPUTE_MD5={:?}", raw),
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(url) = &overrides.server_url {
            self.server_url = url.clone();
        }
        if overrides.daily_quota.is_some() {
            self.daily_quota = overrides.daily_quota;
        }
        if let Some(n) = overrides.upload_concurrency {
            self.upload_concurrency = n;
        }
        if overrides.compute_md5 {
            self.compute_md5 = true;
        }
    }

    pub fn limits(&self) -> ConcurrencyLimits {
        ConcurrencyLimits {
            upload: self.upload_concurrency,
            finalize: self.finalize_concurrency,
        }
    }

    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            compute_md5: self.compute_md5,
        }
    }
}

/// Reads and writes the config file.
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// # Arguments
    /// * `config_dir` - Optional custom directory. Defaults to ~/.mediashare
    pub fn new(config_dir: Option<&Path>) -> Result<Self> {
        let base_dir = match config_dir {
            Some(dir) => dir.to_path_buf(),
            None => dirs::home_dir()
                .context("Could not determine home directory")?
                .join(".mediashare"),
        };

        Ok(Self {
            path: base_dir.join(CONFIG_FILE),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the file layer. A missing file yields the defaults.
    pub fn load(&self) -> Result<ClientConfig> {
        if !self.path.exists() {
            debug!("No config file at {:?}, using defaults", self.path);
            return Ok(ClientConfig::default());
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read config file: {:?}", self.path))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", self.path))
    }

    pub fn save(&self, config: &ClientConfig) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {:?}", dir))?;
        }

        let content =
            serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write config file: {:?}", self.path))?;

        info!("Configuration saved to {:?}", self.path);
        Ok(())
    }

    /// File, environment and command-line layers merged.
    pub fn effective(&self, overrides: &ConfigOverrides) -> Result<ClientConfig> {
        let mut config = self.load()?;
        config.apply_env();
        config.apply_overrides(overrides);
        Ok(config)
    }
}
