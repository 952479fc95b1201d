//! Façade configuration.
//!
//! Loaded from a JSON file or built in code. Every field has a default, so
//! `{}` is a complete configuration for local development.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sessionward_protocol::{FederatedProvider, FederatedSignIn, PromptMode};
use sessionward_session::SessionConfig;
use sessionward_store::StorageKeys;
use url::Url;

use crate::ConfigError;

/// How to ask one identity provider for consent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub scopes: Vec<String>,
    pub prompt: PromptMode,
    /// Extra provider-specific authorize parameters.
    #[serde(default)]
    pub query_params: BTreeMap<String, String>,
}

impl ProviderConfig {
    /// Offline access so the provider issues a refresh token, and an
    /// explicit consent screen.
    pub fn google() -> Self {
        Self {
            scopes: scopes(&["openid", "email", "profile"]),
            prompt: PromptMode::Consent,
            query_params: BTreeMap::from([("access_type".to_string(), "offline".to_string())]),
        }
    }

    pub fn microsoft() -> Self {
        Self {
            scopes: scopes(&["openid", "email", "profile", "offline_access"]),
            prompt: PromptMode::SelectAccount,
            query_params: BTreeMap::new(),
        }
    }
}

fn scopes(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Top-level configuration for [`AuthService`](crate::AuthService).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Public origin of the application. Redirect targets are built on it.
    pub site_url: String,
    pub callback_path: String,
    pub reset_password_path: String,
    pub google: ProviderConfig,
    pub microsoft: ProviderConfig,
    pub session: SessionConfig,
    pub storage: StorageKeys,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            site_url: "http://localhost:3000".into(),
            callback_path: "/auth/callback".into(),
            reset_password_path: "/reset-password".into(),
            google: ProviderConfig::google(),
            microsoft: ProviderConfig::microsoft(),
            session: SessionConfig::default(),
            storage: StorageKeys::default(),
        }
    }
}

impl AuthConfig {
    /// Default configuration for the given site.
    pub fn for_site(site_url: impl Into<String>) -> Self {
        Self {
            site_url: site_url.into(),
            ..Self::default()
        }
    }

    /// Reads and validates a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        tracing::debug!(path = %path.display(), site_url = %config.site_url, "auth config loaded");
        Ok(config)
    }

    /// Checks that every redirect target can be built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.callback_url()?;
        self.reset_password_url()?;
        Ok(())
    }

    /// Where providers and confirmation emails send the user back to.
    pub fn callback_url(&self) -> Result<Url, ConfigError> {
        self.site_path(&self.callback_path)
    }

    pub fn reset_password_url(&self) -> Result<Url, ConfigError> {
        self.site_path(&self.reset_password_path)
    }

    pub fn provider(&self, provider: FederatedProvider) -> &ProviderConfig {
        match provider {
            FederatedProvider::Google => &self.google,
            FederatedProvider::Microsoft => &self.microsoft,
        }
    }

    /// The backend request for a federated sign-in through `provider`.
    pub fn federated_request(
        &self,
        provider: FederatedProvider,
    ) -> Result<FederatedSignIn, ConfigError> {
        let settings = self.provider(provider);
        Ok(FederatedSignIn {
            provider,
            redirect_to: self.callback_url()?.to_string(),
            scopes: settings.scopes.clone(),
            prompt: settings.prompt,
            query_params: settings
                .query_params
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        })
    }

    fn site_path(&self, path: &str) -> Result<Url, ConfigError> {
        let base = Url::parse(&self.site_url).map_err(|source| ConfigError::SiteUrl {
            url: self.site_url.clone(),
            source,
        })?;
        base.join(path).map_err(|source| ConfigError::RedirectPath {
            path: path.to_string(),
            source,
        })
    }
}
