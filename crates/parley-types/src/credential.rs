//! Vendor credentials.
//!
//! A [`ProviderCredential`] has one of two lifetimes: the process-wide default
//! bound from the environment at startup, or a call-scoped credential built
//! by merging a caller's [`CredentialOverride`] over that default. Secret
//! values are wrapped in [`SecretString`] and never reach `Debug` output.

use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_MAX_RETRIES: u32 = 0;

/// Everything an adapter needs to authenticate against one vendor.
pub struct ProviderCredential {
    pub api_key: SecretString,
    /// Second half of a key pair (ERNIE client secret).
    pub secret_key: Option<SecretString>,
    pub endpoint: Option<String>,
    pub organization: Option<String>,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl ProviderCredential {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            secret_key: None,
            endpoint: None,
            organization: None,
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// A credential with no key, for vendors that need none (local models).
    pub fn anonymous() -> Self {
        Self::new(String::new())
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_secret_key(mut self, secret_key: impl Into<String>) -> Self {
        self.secret_key = Some(SecretString::from(secret_key.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.expose_secret().trim().is_empty()
    }

    /// Merge a caller override over this credential. Non-blank override
    /// fields win; everything else is taken from `self`.
    pub fn merged_with(&self, overrides: &CredentialOverride) -> Self {
        let api_key = non_blank(&overrides.api_key)
            .map(|k| SecretString::from(k.to_string()))
            .unwrap_or_else(|| clone_secret(&self.api_key));
        let secret_key = non_blank(&overrides.secret_key)
            .map(|k| SecretString::from(k.to_string()))
            .or_else(|| self.secret_key.as_ref().map(clone_secret));
        Self {
            api_key,
            secret_key,
            endpoint: non_blank(&overrides.endpoint)
                .map(str::to_string)
                .or_else(|| self.endpoint.clone()),
            organization: non_blank(&overrides.organization)
                .map(str::to_string)
                .or_else(|| self.organization.clone()),
            timeout: self.timeout,
            max_retries: self.max_retries,
        }
    }
}

impl Clone for ProviderCredential {
    fn clone(&self) -> Self {
        Self {
            api_key: clone_secret(&self.api_key),
            secret_key: self.secret_key.as_ref().map(clone_secret),
            endpoint: self.endpoint.clone(),
            organization: self.organization.clone(),
            timeout: self.timeout,
            max_retries: self.max_retries,
        }
    }
}

impl Default for ProviderCredential {
    fn default() -> Self {
        Self::anonymous()
    }
}

impl fmt::Debug for ProviderCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCredential")
            .field("api_key", &"[REDACTED]")
            .field("secret_key", &self.secret_key.as_ref().map(|_| "[REDACTED]"))
            .field("endpoint", &self.endpoint)
            .field("organization", &self.organization)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

fn clone_secret(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().to_string())
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Caller-supplied credential fields for one call. All optional.
#[derive(Clone, Default)]
pub struct CredentialOverride {
    pub api_key: Option<String>,
    pub secret_key: Option<String>,
    pub endpoint: Option<String>,
    pub organization: Option<String>,
}

impl CredentialOverride {
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// True when every field is absent or whitespace.
    pub fn is_blank(&self) -> bool {
        non_blank(&self.api_key).is_none()
            && non_blank(&self.secret_key).is_none()
            && non_blank(&self.endpoint).is_none()
            && non_blank(&self.organization).is_none()
    }
}

impl fmt::Debug for CredentialOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialOverride")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("secret_key", &self.secret_key.as_ref().map(|_| "[REDACTED]"))
            .field("endpoint", &self.endpoint)
            .field("organization", &self.organization)
            .finish()
    }
}
