//! Secrets and runtime configuration.
//!
//! A secret is looked up in the process environment first and then in a file
//! named after it under the secrets directory (`/var/openfaas/secrets` unless
//! overridden). Values are trimmed; empty values count as unset.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::http_client::DEFAULT_TIMEOUT_MS;

pub const DEFAULT_SECRETS_DIR: &str = "/var/openfaas/secrets";
pub const SECRETS_DIR_VAR: &str = "PNLBOT_SECRETS_DIR";
pub const ENVIRONMENT_VAR: &str = "ENVIRONMENT";
pub const LOCAL_ENVIRONMENT: &str = "local";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("`{name}` environment variable is not set")]
    UnconfiguredEnvironment { name: String },

    #[error("failed to read secret file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where a secret lives: an environment key and a file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Secret {
    pub env_key: &'static str,
    pub file_name: &'static str,
}

impl Secret {
    /// Same name in the environment and on disk.
    pub const fn named(name: &'static str) -> Self {
        Self {
            env_key: name,
            file_name: name,
        }
    }
}

pub mod secrets {
    use super::Secret;

    pub const BLOOMBERG_API_URL: Secret = Secret::named("bloomberg-api-url");
    pub const EMAIL_LOGIN: Secret = Secret::named("email-login");
    pub const EMAIL_PASSWORD: Secret = Secret::named("email-password");
    pub const TEAMS_WEBHOOK_URL: Secret = Secret::named("teams-webhook-url");
    pub const STORE_URI: Secret = Secret {
        env_key: "MONGO_URI",
        file_name: "mongo-uri",
    };
}

#[derive(Debug, Clone)]
enum EnvSource {
    Process,
    Fixed(BTreeMap<String, String>),
}

/// Resolves named secrets from the environment with a file fallback.
#[derive(Debug, Clone)]
pub struct SecretResolver {
    secrets_dir: PathBuf,
    env: EnvSource,
}

impl Default for SecretResolver {
    fn default() -> Self {
        Self::from_process()
    }
}

impl SecretResolver {
    /// Process environment; secrets directory from `PNLBOT_SECRETS_DIR` or the default.
    pub fn from_process() -> Self {
        let secrets_dir = std::env::var_os(SECRETS_DIR_VAR)
            .map(PathBuf::from)
            .filter(|path| !path.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SECRETS_DIR));
        Self {
            secrets_dir,
            env: EnvSource::Process,
        }
    }

    /// Fixed variables instead of the process environment.
    pub fn with_vars<I, K, V>(secrets_dir: impl Into<PathBuf>, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            secrets_dir: secrets_dir.into(),
            env: EnvSource::Fixed(
                vars.into_iter()
                    .map(|(key, value)| (key.into(), value.into()))
                    .collect(),
            ),
        }
    }

    pub fn secrets_dir(&self) -> &Path {
        &self.secrets_dir
    }

    pub fn env_var(&self, key: &str) -> Option<String> {
        let value = match &self.env {
            EnvSource::Process => std::env::var(key).ok(),
            EnvSource::Fixed(vars) => vars.get(key).cloned(),
        };
        non_empty(value)
    }

    /// Whether the bot runs in local/dev mode (`ENVIRONMENT=local`).
    pub fn is_local(&self) -> bool {
        self.env_var(ENVIRONMENT_VAR).as_deref() == Some(LOCAL_ENVIRONMENT)
    }

    /// The secret value, or `None` when neither source has it.
    pub fn lookup(&self, secret: Secret) -> Result<Option<String>, ConfigError> {
        if let Some(value) = self.env_var(secret.env_key) {
            return Ok(Some(value));
        }

        let path = self.secrets_dir.join(secret.file_name);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(non_empty(Some(contents))),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ConfigError::Io { path, source }),
        }
    }

    pub fn resolve(&self, secret: Secret) -> Result<String, ConfigError> {
        self.lookup(secret)?
            .ok_or_else(|| ConfigError::UnconfiguredEnvironment {
                name: secret.env_key.to_string(),
            })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Resolved configuration of one bot run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotConfig {
    pub bloomberg_api_url: Option<String>,
    pub teams_webhook_url: Option<String>,
    /// Directory holding the log store databases.
    pub store_dir: Option<PathBuf>,
    pub local_mode: bool,
    pub use_test_db: bool,
    pub timeout_ms: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            bloomberg_api_url: None,
            teams_webhook_url: None,
            store_dir: None,
            local_mode: false,
            use_test_db: false,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl BotConfig {
    /// Every setting is optional here; callers decide which absence is fatal.
    pub fn resolve(resolver: &SecretResolver) -> Result<Self, ConfigError> {
        Ok(Self {
            bloomberg_api_url: resolver.lookup(secrets::BLOOMBERG_API_URL)?,
            teams_webhook_url: resolver.lookup(secrets::TEAMS_WEBHOOK_URL)?,
            store_dir: resolver.lookup(secrets::STORE_URI)?.map(PathBuf::from),
            local_mode: resolver.is_local(),
            ..Self::default()
        })
    }
}
