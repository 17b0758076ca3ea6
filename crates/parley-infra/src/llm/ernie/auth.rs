//! OAuth client-credentials exchange for Baidu Qianfan.
//!
//! The access token is cached per adapter and re-exchanged when absent or
//! within [`EXPIRY_MARGIN`] of expiry. Short-lived tokens use half their
//! lifetime as the margin instead. The cache mutex is held across the
//! exchange, so concurrent callers wait on one in-flight request instead of
//! each starting their own.

use std::time::{Duration, Instant};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::Mutex;

use parley_types::llm::LlmError;

use crate::llm::http;

const PROVIDER: &str = "ernie";

/// Tokens this close to expiry are treated as expired.
pub const EXPIRY_MARGIN: Duration = Duration::from_secs(300);

/// Lifetime assumed when the token response omits `expires_in`.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(2_592_000);

/// How long a token with lifetime `ttl` may be reused.
fn usable_for(ttl: Duration) -> Duration {
    ttl - EXPIRY_MARGIN.min(ttl / 2)
}

/// Client id / secret pair.
///
/// Either given separately, or packed into the API key as `id:secret`.
pub struct ClientCredentials {
    pub client_id: SecretString,
    pub client_secret: Option<SecretString>,
}

impl ClientCredentials {
    pub fn new(api_key: &SecretString, secret_key: Option<&SecretString>) -> Self {
        let raw = api_key.expose_secret().trim();
        match (secret_key, raw.split_once(':')) {
            (Some(secret), _) => Self {
                client_id: SecretString::from(raw.to_string()),
                client_secret: Some(SecretString::from(secret.expose_secret().to_string())),
            },
            (None, Some((id, secret))) => Self {
                client_id: SecretString::from(id.to_string()),
                client_secret: Some(SecretString::from(secret.to_string())),
            },
            (None, None) => Self {
                client_id: SecretString::from(raw.to_string()),
                client_secret: None,
            },
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

struct CachedToken {
    access_token: SecretString,
    refresh_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() < self.refresh_at
    }
}

/// Per-adapter access-token cache.
pub struct TokenCache {
    client: reqwest::Client,
    token_url: String,
    credentials: ClientCredentials,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(client: reqwest::Client, token_url: String, credentials: ClientCredentials) -> Self {
        Self {
            client,
            token_url,
            credentials,
            cached: Mutex::new(None),
        }
    }

    /// A valid access token, exchanging credentials if needed.
    pub async fn access_token(&self) -> Result<SecretString, LlmError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(SecretString::from(token.access_token.expose_secret().to_string()));
        }

        let fresh = self.exchange().await?;
        let token = SecretString::from(fresh.access_token.expose_secret().to_string());
        *cached = Some(fresh);
        Ok(token)
    }

    /// Drop the cached token so the next call re-exchanges.
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    async fn exchange(&self) -> Result<CachedToken, LlmError> {
        let secret = self.credentials.client_secret.as_ref().ok_or_else(|| {
            LlmError::configuration(
                "ERNIE needs a client secret: set ERNIE_SECRET_KEY or use an 'id:secret' API key",
            )
        })?;

        tracing::debug!(provider = PROVIDER, "exchanging client credentials for access token");
        let request = self.client.post(&self.token_url).query(&[
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.client_id.expose_secret()),
            ("client_secret", secret.expose_secret()),
        ]);
        let response = http::send_checked(PROVIDER, request).await?;
        let body: TokenResponse = http::read_json(PROVIDER, response).await?;

        if let Some(error) = body.error {
            let detail = body.error_description.unwrap_or(error);
            return Err(LlmError::vendor(PROVIDER, 401, format!("token exchange failed: {detail}")));
        }
        let access_token = body
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| http::invalid_payload(PROVIDER, "token response without access_token"))?;
        let ttl = body.expires_in.map(Duration::from_secs).unwrap_or(DEFAULT_TOKEN_TTL);

        Ok(CachedToken {
            access_token: SecretString::from(access_token),
            refresh_at: Instant::now() + usable_for(ttl),
        })
    }
}
