//! Provider credentials and tuning, read from the environment.

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::api::BrightboxClient;
use crate::error::{ConfigError, ReconcileError, Result};
use crate::lifecycle::ProviderMeta;
use crate::wait::DEFAULT_MIN_INTERVAL;

/// Default Brightbox API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.gb1.brightbox.com";

/// Environment variable names.
pub mod vars {
    /// OAuth client identifier.
    pub const CLIENT: &str = "BRIGHTBOX_CLIENT";
    /// OAuth client secret.
    pub const CLIENT_SECRET: &str = "BRIGHTBOX_CLIENT_SECRET";
    /// API endpoint.
    pub const API_URL: &str = "BRIGHTBOX_API_URL";
    /// Account to act on.
    pub const ACCOUNT: &str = "BRIGHTBOX_ACCOUNT";
    /// Timeout for every lifecycle operation, in seconds.
    pub const TIMEOUT_SECS: &str = "BRIGHTBOX_TIMEOUT_SECS";
    /// Minimum poll interval, in seconds.
    pub const MIN_REFRESH_SECS: &str = "BRIGHTBOX_MIN_REFRESH_SECS";
}

/// Connection settings for the Brightbox API.
#[derive(Clone)]
pub struct ProviderConfig {
    /// API endpoint.
    pub api_url: String,
    /// OAuth client identifier.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Account to act on, when the client can see several.
    pub account: Option<String>,
    /// Replaces every per-kind default timeout when set.
    pub timeout: Option<Duration>,
    /// Minimum interval between status polls.
    pub min_refresh: Duration,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_url", &self.api_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("account", &self.account)
            .field("timeout", &self.timeout)
            .field("min_refresh", &self.min_refresh)
            .finish()
    }
}

impl ProviderConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if credentials are missing or a number is malformed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if credentials are missing or a number is malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let require = |name: &str| {
            get(name).ok_or_else(|| {
                ReconcileError::Config(ConfigError::MissingEnvVar {
                    name: name.to_string(),
                })
            })
        };
        let seconds = |name: &str| -> Result<Option<Duration>> {
            get(name)
                .map(|value| {
                    value
                        .trim()
                        .parse::<u64>()
                        .ok()
                        .filter(|secs| *secs > 0)
                        .map(Duration::from_secs)
                        .ok_or_else(|| {
                            ReconcileError::Config(ConfigError::InvalidEnvVar {
                                name: name.to_string(),
                                value,
                            })
                        })
                })
                .transpose()
        };

        let config = Self {
            api_url: get(vars::API_URL).unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            client_id: require(vars::CLIENT)?,
            client_secret: require(vars::CLIENT_SECRET)?,
            account: get(vars::ACCOUNT),
            timeout: seconds(vars::TIMEOUT_SECS)?,
            min_refresh: seconds(vars::MIN_REFRESH_SECS)?.unwrap_or(DEFAULT_MIN_INTERVAL),
        };
        debug!("Provider configuration: {config:?}");
        Ok(config)
    }

    /// Builds the HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be constructed.
    pub fn client(&self) -> Result<BrightboxClient> {
        let client = BrightboxClient::new(&self.api_url, &self.client_id, &self.client_secret)?
            .with_account(self.account.clone());
        Ok(client)
    }

    /// Builds the shared provider state handed to lifecycle calls.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be constructed.
    pub fn meta(&self) -> Result<ProviderMeta> {
        let client = self.client()?;
        Ok(ProviderMeta::new(Arc::new(client)).with_min_refresh(self.min_refresh))
    }
}
