use crate::utils::error::{RemoteBuildError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 30;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub farm: FarmConfig,
    pub monitor: Option<MonitorConfig>,
    pub upload: Option<UploadConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FarmConfig {
    pub url: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub poll_interval_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub exclude: Option<Vec<String>>,
}

impl TomlConfig {
    /// `<config dir>/snapcraft/remote-build.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("snapcraft").join("remote-build.toml"))
    }

    /// Load an explicit file, or the default file when it exists.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::from_file(path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        tracing::debug!("Loaded configuration from {}", path.as_ref().display());
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;
        Ok(toml::from_str(&processed_content)?)
    }

    /// 替換環境變數 (例如 ${SNAPCRAFT_REMOTE_BUILD_TOKEN})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| RemoteBuildError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn poll_interval(&self) -> Duration {
        let seconds = self
            .monitor
            .as_ref()
            .and_then(|m| m.poll_interval_seconds)
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECONDS);
        Duration::from_secs(seconds)
    }

    pub fn upload_excludes(&self) -> Vec<String> {
        self.upload
            .as_ref()
            .and_then(|u| u.exclude.clone())
            .unwrap_or_default()
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        if let Some(url) = &self.farm.url {
            validation::validate_url("farm.url", url)?;
        }
        if let Some(interval) = self.monitor.as_ref().and_then(|m| m.poll_interval_seconds) {
            validation::validate_positive_number("monitor.poll_interval_seconds", interval, 1)?;
        }
        for pattern in self.upload_excludes() {
            validation::validate_non_empty_string("upload.exclude", &pattern)?;
        }
        Ok(())
    }
}
