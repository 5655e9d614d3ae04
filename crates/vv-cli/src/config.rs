use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use vv_spec::WizardConfig;

pub const DEFAULT_CONFIG_FILE: &str = "vetvisits.toml";
const ENV_PREFIX: &str = "VETVISITS_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("environment variable {key} has invalid value '{value}'")]
    InvalidEnv { key: String, value: String },
}

/// CLI settings: defaults, then the TOML file, then `VETVISITS_*` variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Catalog JSON file; the built-in catalog when unset.
    pub catalog_path: Option<PathBuf>,
    /// Where step commands keep in-progress flows.
    pub state_dir: PathBuf,
    /// Directory of `<view>.hbs` overrides for the text wizard.
    pub templates_dir: Option<PathBuf>,
    pub flow_ttl_seconds: Option<i64>,
    #[serde(flatten)]
    pub wizard: WizardConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            catalog_path: None,
            state_dir: PathBuf::from(".vetvisits/flows"),
            templates_dir: None,
            flow_ttl_seconds: Some(24 * 60 * 60),
            wizard: WizardConfig::default(),
        }
    }
}

impl Settings {
    /// Reads `explicit`, or `vetvisits.toml` in the working directory when it
    /// exists, and applies environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::from_file(fallback)?
                } else {
                    Self::default()
                }
            }
        };
        settings.apply_env(|key| env::var(key).ok())?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overrides fields from `VETVISITS_<FIELD>` variables found by `lookup`.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let var = |name: &str| {
            let key = format!("{ENV_PREFIX}{name}");
            lookup(&key).map(|value| (key, value))
        };

        if let Some((_, value)) = var("CATALOG_PATH") {
            self.catalog_path = Some(PathBuf::from(value));
        }
        if let Some((_, value)) = var("STATE_DIR") {
            self.state_dir = PathBuf::from(value);
        }
        if let Some((_, value)) = var("TEMPLATES_DIR") {
            self.templates_dir = Some(PathBuf::from(value));
        }
        if let Some((key, value)) = var("FLOW_TTL_SECONDS") {
            self.flow_ttl_seconds = Some(parse_env(key, value)?);
        }
        if let Some((_, value)) = var("SERVICE_NAME") {
            self.wizard.service_name = value;
        }
        if let Some((key, value)) = var("REJECT_ZERO_COUNTS") {
            self.wizard.reject_zero_counts = parse_env(key, value)?;
        }
        if let Some((key, value)) = var("MAX_COUNT") {
            self.wizard.max_count = Some(parse_env(key, value)?);
        }
        if let Some((_, value)) = var("REFERENCE_PREFIX") {
            self.wizard.reference_prefix = value;
        }
        Ok(())
    }

    /// Idle time after which a stored flow expires; zero or negative disables expiry.
    pub fn flow_ttl(&self) -> Option<TimeDelta> {
        self.flow_ttl_seconds
            .filter(|seconds| *seconds > 0)
            .and_then(TimeDelta::try_seconds)
    }
}

fn parse_env<T: std::str::FromStr>(key: String, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { key, value })
}
