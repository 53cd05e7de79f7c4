use async_trait::async_trait;
use log::{ debug, info };
use tokio::sync::Mutex;
use yup_oauth2::{ parse_service_account_key, AccessToken, ServiceAccountAuthenticator };

use crate::error::RelayError;

pub const CHAT_BOT_SCOPE: &str = "https://www.googleapis.com/auth/chat.bot";

#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// A bearer token valid for the chat.bot scope.
    async fn token(&self) -> Result<String, RelayError>;
}

/// Exchanges a service-account descriptor for chat.bot access tokens and
/// keeps the last one until it expires.
pub struct ServiceAccountTokenProvider {
    credentials: Option<String>,
    cached: Mutex<Option<AccessToken>>,
}

impl ServiceAccountTokenProvider {
    pub fn new(credentials: Option<String>) -> Self {
        Self {
            credentials: credentials.filter(|c| !c.trim().is_empty()),
            cached: Mutex::new(None),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    /// Runs the credential exchange, bypassing the cache.
    pub async fn authenticate(&self) -> Result<AccessToken, RelayError> {
        let raw = self.credentials
            .as_deref()
            .ok_or_else(|| RelayError::Config("GOOGLE_CREDENTIALS is not set".to_string()))?;

        let key = parse_service_account_key(raw).map_err(|e|
            RelayError::Config(format!("GOOGLE_CREDENTIALS is not a valid service account key: {}", e))
        )?;

        let auth = ServiceAccountAuthenticator::builder(key)
            .build().await
            .map_err(|e| RelayError::Auth(e.to_string()))?;

        let token = auth.token(&[CHAT_BOT_SCOPE]).await.map_err(|e| RelayError::Auth(e.to_string()))?;

        if token.token().is_none() {
            return Err(RelayError::Auth("OAuth token was None".to_string()));
        }
        info!("Obtained chat.bot access token");
        Ok(token)
    }
}

#[async_trait]
impl TokenProvider for ServiceAccountTokenProvider {
    async fn token(&self) -> Result<String, RelayError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| !t.is_expired()) {
            if let Some(value) = token.token() {
                debug!("Reusing cached chat.bot token");
                return Ok(value.to_string());
            }
        }

        let fresh = self.authenticate().await?;
        let value = fresh
            .token()
            .map(str::to_string)
            .ok_or_else(|| RelayError::Auth("OAuth token was None".to_string()))?;
        *cached = Some(fresh);
        Ok(value)
    }
}
