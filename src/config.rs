use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000/query";
pub const DEFAULT_ERROR_PLACEHOLDER: &str = "Error retrieving data";
pub const ENDPOINT_ENV_VAR: &str = "RESEARCH_BACKEND_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },
    #[error("invalid backend endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_prompt")]
    pub prompt: String,
    #[serde(default = "default_error_placeholder")]
    pub error_placeholder: String,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_title() -> String {
    "LLM Research Assistant".to_string()
}

fn default_prompt() -> String {
    "Ask about recent LLM research...".to_string()
}

fn default_error_placeholder() -> String {
    DEFAULT_ERROR_PLACEHOLDER.to_string()
}

fn default_log_filter() -> String {
    "research_assistant=info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            ui: UiConfig::default(),
            log_filter: default_log_filter(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            prompt: default_prompt(),
            error_placeholder: default_error_placeholder(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML or JSON file, picked by extension.
    /// `${VAR}` placeholders are replaced from the environment first.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let bytes = fs::read(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let content = substitute_env_vars(&decode_text(&bytes));

        let path_lower = path.to_lowercase();
        let config: Config = if path_lower.ends_with(".jsonld") || path_lower.ends_with(".json") {
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.to_string(),
                message: e.to_string(),
            })?
        } else {
            serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.to_string(),
                message: e.to_string(),
            })?
        };

        config.validate()?;
        Ok(config)
    }

    /// Try each candidate in order and load the first file that exists.
    /// Falls back to defaults when none of them is present.
    pub fn discover<P: AsRef<Path>>(candidates: &[P]) -> Result<Discovered, ConfigError> {
        let mut skipped = Vec::new();
        for candidate in candidates {
            let candidate = candidate.as_ref();
            if !candidate.is_file() {
                skipped.push(candidate.to_path_buf());
                continue;
            }
            let path = candidate.to_string_lossy().to_string();
            let config = Self::load(&path)?;
            return Ok(Discovered {
                config,
                loaded_from: Some(path),
                skipped,
            });
        }
        Ok(Discovered {
            config: Self::default(),
            loaded_from: None,
            skipped,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Result<Self, ConfigError> {
        self.backend.endpoint = endpoint.into();
        self.validate()?;
        Ok(self)
    }

    /// Replace the endpoint when an override (normally `$RESEARCH_BACKEND_URL`) is set.
    pub fn with_endpoint_override(self, endpoint: Option<String>) -> Result<Self, ConfigError> {
        match endpoint {
            Some(endpoint) => self.with_endpoint(endpoint),
            None => Ok(self),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = &self.backend.endpoint;
        let url = reqwest::Url::parse(endpoint).map_err(|e| ConfigError::InvalidEndpoint {
            endpoint: endpoint.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEndpoint {
                endpoint: endpoint.clone(),
                reason: format!("unsupported scheme {}", url.scheme()),
            });
        }
        Ok(())
    }
}

/// Outcome of [`Config::discover`].
#[derive(Debug)]
pub struct Discovered {
    pub config: Config,
    pub loaded_from: Option<String>,
    /// Candidates checked before `loaded_from` that did not exist.
    pub skipped: Vec<PathBuf>,
}

/// Decode file bytes, honouring a UTF-8 or UTF-16 BOM when present.
fn decode_text(bytes: &[u8]) -> String {
    let (cow, _, _) = encoding_rs::UTF_8.decode(bytes);
    cow.into_owned()
}

/// Replace `${VAR_NAME}` with the environment value; unknown names stay as written.
fn substitute_env_vars(content: &str) -> String {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| Regex::new(r"\$\{(\w+)\}").unwrap());
    pattern
        .replace_all(content, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}
