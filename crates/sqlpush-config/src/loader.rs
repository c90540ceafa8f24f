use std::path::{Path, PathBuf};

use sqlpush_common::{Error, Result};
use tracing::{debug, warn};

use crate::model::{AppConfig, non_blank};

pub const URL_ENV: &str = "SUPABASE_URL";
pub const SERVICE_KEY_ENV: &str = "SUPABASE_SERVICE_ROLE_KEY";

/// Builds an `AppConfig` from an optional config file overlaid with the
/// process environment.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Read the file, if any, then overlay variables resolved through
    /// `lookup` (usually `std::env::var`).
    pub fn load_with<F>(&self, lookup: F) -> Result<AppConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match &self.path {
            Some(path) => {
                let config = read_config_file(path)?;
                if config.endpoint.service_key.is_some() {
                    warn!(
                        "service key is stored in {}; prefer the {SERVICE_KEY_ENV} environment variable",
                        path.display()
                    );
                }
                config
            }
            None => AppConfig::default(),
        };

        if let Some(url) = non_blank(lookup(URL_ENV)) {
            debug!("endpoint url taken from {URL_ENV}");
            config.endpoint.url = Some(url);
        }
        if let Some(key) = non_blank(lookup(SERVICE_KEY_ENV)) {
            debug!("service key taken from {SERVICE_KEY_ENV}");
            config.endpoint.service_key = Some(key);
        }

        if config.strategies.is_empty() {
            return Err(Error::Config(
                "at least one execution strategy must be configured".into(),
            ));
        }

        Ok(config)
    }
}

fn read_config_file(path: &Path) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.display().to_string(),
        source,
    })?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        "yml" | "yaml" => serde_yaml::from_str(&contents)
            .map_err(|e| Error::Config(format!("YAML parse error in {}: {e}", path.display()))),
        "toml" => toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("TOML parse error in {}: {e}", path.display()))),
        other => Err(Error::Config(format!(
            "unsupported config extension: {other}"
        ))),
    }
}
