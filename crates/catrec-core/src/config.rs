use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::CatrecError;

/// Top-level catrec configuration, stored at `~/.catrec/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatrecConfig {
    /// Where reports and missing-key lists are written.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Report recipients, handed to the external delivery step.
    #[serde(default)]
    pub recipients: Vec<String>,

    #[serde(default)]
    pub grid: GridConfig,

    #[serde(default)]
    pub hub: HubConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub daily: DailyConfig,

    /// Datasets compared on every run.
    #[serde(default = "default_datasets")]
    pub datasets: Vec<DatasetConfig>,
}

/// Grid-processing file catalog (Source A).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    #[serde(default = "default_grid_url")]
    pub base_url: url::Url,

    /// Suffix carried by every raw grid identifier.
    #[serde(default = "default_grid_suffix")]
    pub suffix: String,
}

/// Open-search data hub (Source B).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    #[serde(default = "default_hub_url")]
    pub base_url: url::Url,

    #[serde(default)]
    pub username: String,

    /// Key used to look up the hub password in the OS keychain.
    #[serde(default = "default_credential_key")]
    pub credential_key: String,

    /// Rows requested per search page.
    #[serde(default = "default_window_size")]
    pub window_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts for total-count queries.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Attempts for identifier list queries, which are costlier to lose.
    #[serde(default = "default_list_max_attempts")]
    pub list_max_attempts: u32,

    /// Fixed pause between attempts.
    #[serde(default = "default_delay_secs")]
    pub delay_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyConfig {
    #[serde(default = "default_days_back")]
    pub days_back: u32,
}

/// One product family known to both catalogs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Dataset name in the grid catalog.
    pub name: String,
    pub platform_name: String,
    pub product_type: String,
    /// Hub timeliness filter, e.g. `Nominal`.
    #[serde(default)]
    pub timeliness: Option<String>,
}

impl DatasetConfig {
    pub fn hub_product(&self) -> String {
        format!("{}/{}", self.platform_name, self.product_type)
    }
}

fn default_grid_url() -> url::Url {
    url::Url::parse("http://grid-eo-catalog.esrin.esa.int/catalogue/gpod/")
        .expect("static url is valid")
}

fn default_hub_url() -> url::Url {
    url::Url::parse("https://cophub.copernicus.eu/dhus/").expect("static url is valid")
}

fn default_grid_suffix() -> String {
    ".zip".to_string()
}

fn default_credential_key() -> String {
    "catrec:hub".to_string()
}

fn default_window_size() -> u64 {
    99
}

fn default_max_attempts() -> u32 {
    3
}

fn default_list_max_attempts() -> u32 {
    10
}

fn default_delay_secs() -> u64 {
    5
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_days_back() -> u32 {
    6
}

fn default_datasets() -> Vec<DatasetConfig> {
    vec![DatasetConfig {
        name: "S2A_PRD_MSIL1C".to_string(),
        platform_name: "Sentinel-2".to_string(),
        product_type: "S2MSI1C".to_string(),
        timeliness: None,
    }]
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            base_url: default_grid_url(),
            suffix: default_grid_suffix(),
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            base_url: default_hub_url(),
            username: String::new(),
            credential_key: default_credential_key(),
            window_size: default_window_size(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            list_max_attempts: default_list_max_attempts(),
            delay_secs: default_delay_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl RetryConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for DailyConfig {
    fn default() -> Self {
        Self {
            days_back: default_days_back(),
        }
    }
}

impl Default for CatrecConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            recipients: Vec::new(),
            grid: GridConfig::default(),
            hub: HubConfig::default(),
            retry: RetryConfig::default(),
            daily: DailyConfig::default(),
            datasets: default_datasets(),
        }
    }
}

impl CatrecConfig {
    /// Returns the catrec home directory (`~/.catrec/`).
    pub fn home_dir() -> Result<PathBuf, CatrecError> {
        let base = dirs::home_dir().ok_or_else(|| CatrecError::Config {
            message: "could not determine home directory".into(),
        })?;
        Ok(base.join(".catrec"))
    }

    /// Returns the path to the config file.
    pub fn config_path() -> Result<PathBuf, CatrecError> {
        Ok(Self::home_dir()?.join("config.toml"))
    }

    /// Output directory, falling back to `~/.catrec/reports`.
    pub fn resolved_output_dir(&self) -> Result<PathBuf, CatrecError> {
        match &self.output_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::home_dir()?.join("reports")),
        }
    }

    /// Load config from the default location, or return defaults if not found.
    pub fn load() -> Result<Self, CatrecError> {
        let path = Self::config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, CatrecError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| CatrecError::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), CatrecError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| CatrecError::Serialization(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Initialize the catrec home directory with default config.
    pub fn init() -> Result<PathBuf, CatrecError> {
        let home = Self::home_dir()?;
        std::fs::create_dir_all(&home)?;

        let config_path = Self::config_path()?;
        if !config_path.exists() {
            Self::default().save_to(&config_path)?;
        }

        Ok(home)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), CatrecError> {
        if self.hub.window_size == 0 {
            return Err(CatrecError::Config {
                message: "hub.window_size must be greater than zero".into(),
            });
        }
        if self.retry.max_attempts == 0 || self.retry.list_max_attempts == 0 {
            return Err(CatrecError::Config {
                message: "retry attempts must be at least 1".into(),
            });
        }
        if self.datasets.is_empty() {
            return Err(CatrecError::Config {
                message: "no datasets configured".into(),
            });
        }
        Ok(())
    }

    pub fn dataset(&self, name: &str) -> Option<&DatasetConfig> {
        self.datasets.iter().find(|d| d.name == name)
    }
}
