use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, StatusCode};

use super::types::TokenResponse;
use crate::core::config::EbayConfig;
use crate::core::error::ApiError;

#[derive(Debug, Clone)]
pub struct Credential {
    pub access_token: String,
    pub expiry: DateTime<Utc>,
    pub refresh_token: String,
}

impl Credential {
    fn usable_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.expiry - now > margin
    }
}

/// Owns the OAuth access token for the marketplace and refreshes it from the long-lived
/// refresh token. Takes `&mut self` everywhere: one owner, no locking.
pub struct CredentialManager {
    client: Client,
    token_url: String,
    app_id: String,
    cert_id: String,
    scope: String,
    refresh_token: String,
    safety_margin: Duration,
    cached: Option<Credential>,
}

impl CredentialManager {
    pub fn new(client: Client, config: &EbayConfig, safety_margin_secs: i64) -> Self {
        Self {
            client,
            token_url: config.token_url.clone(),
            app_id: config.app_id.clone(),
            cert_id: config.cert_id.clone(),
            scope: config.oauth_scope.clone(),
            refresh_token: config.refresh_token.clone(),
            safety_margin: Duration::seconds(safety_margin_secs),
            cached: None,
        }
    }

    /// Cached token if it is comfortably away from expiry, otherwise a freshly exchanged one.
    pub async fn get_valid_token(&mut self) -> Result<String, ApiError> {
        if let Some(credential) = &self.cached {
            if credential.usable_at(Utc::now(), self.safety_margin) {
                return Ok(credential.access_token.clone());
            }
            tracing::debug!("Access token expires at {}, refreshing", credential.expiry);
        }

        let credential = self.refresh().await?;
        let token = credential.access_token.clone();
        self.cached = Some(credential);
        Ok(token)
    }

    /// Drops the cached token; the next `get_valid_token` performs an exchange.
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    pub fn cached(&self) -> Option<&Credential> {
        self.cached.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn set_cached(&mut self, credential: Credential) {
        self.cached = Some(credential);
    }

    async fn refresh(&self) -> Result<Credential, ApiError> {
        tracing::info!("🔑 Refreshing marketplace access token");

        let basic = general_purpose::STANDARD.encode(format!("{}:{}", self.app_id, self.cert_id));
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", self.refresh_token.as_str()),
            ("scope", self.scope.as_str()),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .header("Authorization", format!("Basic {basic}"))
            .form(&form)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Token refresh rejected: {} - {}", status, body);
            return Err(classify_token_failure(status, body));
        }

        let issued_at = Utc::now();
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Data(format!("token response: {e}")))?;

        if token.access_token.is_empty() {
            return Err(ApiError::Data("token response without access_token".to_string()));
        }
        if token.expires_in <= 0 {
            return Err(ApiError::Auth(format!(
                "token endpoint issued a token with expires_in={}",
                token.expires_in
            )));
        }

        let expiry = issued_at + Duration::seconds(token.expires_in);
        tracing::info!("✅ Access token refreshed (valid until {})", expiry);

        Ok(Credential {
            access_token: token.access_token,
            expiry,
            refresh_token: self.refresh_token.clone(),
        })
    }
}

fn classify_token_failure(status: StatusCode, body: String) -> ApiError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => ApiError::transient(Some(status.as_u16()), body),
        s if s.is_server_error() => ApiError::transient(Some(s.as_u16()), body),
        s => ApiError::Auth(format!("token exchange rejected ({s}): {body}")),
    }
}
