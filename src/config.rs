// SPDX-License-Identifier: Apache-2.0
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::nonce::NonceIssuer;

/// Environment variable names for configuration overrides
pub const CONFIG_PATH_ENV: &str = "SEQGATE_CONFIG";
pub const API_KEY_ENV: &str = "SEQGATE_API_KEY";
pub const API_ENDPOINT_ENV: &str = "SEQGATE_API_ENDPOINT";
pub const BIND_ADDR_ENV: &str = "SEQGATE_BIND_ADDR";
pub const NONCE_SECRET_ENV: &str = "SEQGATE_NONCE_SECRET";
pub const ADMIN_TOKEN_ENV: &str = "SEQGATE_ADMIN_TOKEN";

const DEFAULT_CONFIG_PATH: &str = "config/sequence.toml";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:7870";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_NONCE_TTL_SECS: u64 = 24 * 60 * 60;
const MAX_NONCE_TTL_SECS: u64 = 30 * 24 * 60 * 60;

pub const DEFAULT_API_ENDPOINT: &str =
    "https://plankton-app-qivtq.ondigitalocean.app/api/v1/sequences/webhook";

pub const DEFAULT_CONTEXT: &str = "You are creating a daily journal prompt that will be sent via email. \
Be sure to create a prompt that is relevant to the included interests_and_topics and their goals_and_aspirations. \
Prompts should always be positive and encouraging. \
Be sure that your prompts are direct and give a very specific and actionable direction for what they should write today. \
Avoid giving non-writing tasks. \
Your job is to give them a jumping-off point for what to write in their journal today, so lean toward prompts that encourage introspection, future-casting, mindfulness, gratitude, overcoming challenges, challenging themselves, etc.";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for '{field}': {message}")]
    InvalidField { field: String, message: String },
}

/// Target word count for one section of a generated email.
/// Either a range such as `"100-250"` or a plain number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WordCount {
    Count(u64),
    Text(String),
}

/// One named section of every email in the sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailSection {
    pub name: String,
    pub word_count: WordCount,
    pub description: String,
}

/// Free-text question shown on the form, keyed by its field name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomInput {
    pub name: String,
    pub label: String,
}

/// Everything the form, the client script and the proxy need to know
/// about the sequence being offered.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    pub form_id: String,
    pub topic: String,
    #[serde(alias = "brevo_list_id")]
    pub list_id: i64,
    pub total_emails: i64,
    pub days_between_emails: i64,
    pub topic_depth: i64,
    pub email_structure: Vec<EmailSection>,
    /// Display order follows declaration order
    pub custom_inputs: Vec<CustomInput>,
    pub api_endpoint: String,
    pub api_key: Option<Secret<String>>,
    pub context: String,
    /// Where the browser goes after a successful submission
    pub success_url: Option<String>,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            form_id: "daily_journal_prompts".to_string(),
            topic: "Daily Journal Prompts".to_string(),
            list_id: 3,
            total_emails: 365,
            days_between_emails: 1,
            topic_depth: 10,
            email_structure: default_email_structure(),
            custom_inputs: vec![
                CustomInput {
                    name: "interests_and_topics".to_string(),
                    label: "What are your interests and topics?".to_string(),
                },
                CustomInput {
                    name: "goals_and_aspirations".to_string(),
                    label: "What are your goals and aspirations?".to_string(),
                },
            ],
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            api_key: None,
            context: DEFAULT_CONTEXT.to_string(),
            success_url: Some("/success".to_string()),
        }
    }
}

impl SequenceConfig {
    /// The API key, if one is configured and non-empty
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_ref()
            .map(|key| key.expose_secret().as_str())
            .filter(|key| !key.trim().is_empty())
    }

    pub fn set_api_key(&mut self, key: impl Into<String>) {
        self.api_key = Some(Secret::new(key.into()));
    }
}

pub fn default_email_structure() -> Vec<EmailSection> {
    vec![
        EmailSection {
            name: "journal_prompt".to_string(),
            word_count: WordCount::Text("100-250".to_string()),
            description: "The journal prompt for today.".to_string(),
        },
        EmailSection {
            name: "wrap_up".to_string(),
            word_count: WordCount::Text("50".to_string()),
            description: "A quick, inspirational or encouraging wrap up for today's email.".to_string(),
        },
    ]
}

/// Process-level settings plus the sequence itself
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bind_addr: String,
    /// Timeout for the outbound webhook call
    pub request_timeout_secs: u64,
    pub nonce_ttl_secs: u64,
    /// Directory served under `/static`
    pub static_dir: String,
    pub nonce_secret: Option<Secret<String>>,
    pub admin_token: Option<Secret<String>>,
    pub sequence: SequenceConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            nonce_ttl_secs: DEFAULT_NONCE_TTL_SECS,
            static_dir: "static".to_string(),
            nonce_secret: None,
            admin_token: None,
            sequence: SequenceConfig::default(),
        }
    }
}

impl AppConfig {
    /// Parse a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the file named by `SEQGATE_CONFIG` (or the default path), then
    /// apply environment overrides. A missing file means defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_file(Path::new(&path))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                info!(path = %path.display(), "Loaded configuration file");
                Self::from_toml_str(&text)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "No configuration file found, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn admin_token(&self) -> Option<Arc<str>> {
        self.admin_token
            .as_ref()
            .map(|token| Arc::from(token.expose_secret().as_str()))
    }

    /// Issuer for relay nonces, keyed by the configured secret or a random one
    pub fn nonce_issuer(&self) -> NonceIssuer {
        let ttl = Duration::from_secs(self.nonce_ttl_secs);
        match &self.nonce_secret {
            Some(secret) => NonceIssuer::new(secret.expose_secret().as_bytes(), ttl),
            None => {
                warn!("No nonce secret set, relay tokens will not survive a restart");
                NonceIssuer::random(ttl)
            }
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            debug!("API key taken from environment");
            self.sequence.set_api_key(key);
        }
        if let Ok(endpoint) = std::env::var(API_ENDPOINT_ENV) {
            self.sequence.api_endpoint = endpoint;
        }
        if let Ok(addr) = std::env::var(BIND_ADDR_ENV) {
            self.bind_addr = addr;
        }
        if let Ok(secret) = std::env::var(NONCE_SECRET_ENV) {
            self.nonce_secret = Some(Secret::new(secret));
        }
        if let Ok(token) = std::env::var(ADMIN_TOKEN_ENV) {
            self.admin_token = Some(Secret::new(token));
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidField {
                field: "request_timeout_secs".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.nonce_ttl_secs == 0 || self.nonce_ttl_secs > MAX_NONCE_TTL_SECS {
            return Err(ConfigError::InvalidField {
                field: "nonce_ttl_secs".to_string(),
                message: format!("must be between 1 and {}", MAX_NONCE_TTL_SECS),
            });
        }
        if self.sequence.api_endpoint.trim().is_empty() {
            return Err(ConfigError::InvalidField {
                field: "sequence.api_endpoint".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Shared, admin-writable holder for the sequence configuration.
/// Request handlers only ever see a snapshot.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    inner: Arc<RwLock<SequenceConfig>>,
}

impl ConfigStore {
    pub fn new(config: SequenceConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Copy of the current configuration
    pub fn snapshot(&self) -> SequenceConfig {
        match self.inner.read() {
            Ok(config) => config.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Apply `f` to the stored configuration under the write lock
    pub fn update<R>(&self, f: impl FnOnce(&mut SequenceConfig) -> R) -> R {
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }
}
