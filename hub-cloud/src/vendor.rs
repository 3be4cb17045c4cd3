//! `TokenRefresher` over HTTPS to a vendor's OAuth2 token endpoint —
//! spec.md §6's "HTTPS to vendor APIs" outbound network contract. One
//! instance is configured per provider (Sonos Cloud, Apple Music,
//! Spotify); all three speak the same refresh_token grant shape.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use hub_store::types::CloudToken;
use serde::Deserialize;

use crate::error::{CloudError, Result};
use crate::token_manager::TokenRefresher;

#[derive(Debug, Clone)]
pub struct VendorEndpoint {
    pub provider: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
}

/// Generic OAuth2 refresh_token-grant client, TLS-verified per spec.md
/// §6 (`reqwest`'s `rustls-tls` feature, same as `hub-soap-client`).
pub struct HttpTokenRefresher {
    http: reqwest::Client,
    endpoints: Vec<VendorEndpoint>,
}

impl HttpTokenRefresher {
    pub fn new(endpoints: Vec<VendorEndpoint>) -> Self {
        Self { http: reqwest::Client::new(), endpoints }
    }

    fn endpoint_for(&self, provider: &str) -> Option<&VendorEndpoint> {
        self.endpoints.iter().find(|e| e.provider == provider)
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, provider: &str, current: Option<&CloudToken>) -> Result<CloudToken> {
        let endpoint = self
            .endpoint_for(provider)
            .ok_or_else(|| CloudError::RefreshFailed(format!("no vendor endpoint configured for {provider}")))?;
        let refresh_token = current
            .and_then(|t| t.refresh_token.clone())
            .ok_or_else(|| CloudError::RefreshFailed(format!("no refresh_token on file for {provider}")))?;

        let response = self
            .http
            .post(&endpoint.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
                ("client_id", endpoint.client_id.as_str()),
                ("client_secret", endpoint.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| CloudError::RefreshFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CloudError::RefreshFailed(format!("{provider} refresh returned {}", response.status())));
        }

        let body: TokenResponse = response.json().await.map_err(|e| CloudError::RefreshFailed(e.to_string()))?;

        Ok(CloudToken {
            provider: provider.to_string(),
            access_token: body.access_token,
            refresh_token: body.refresh_token.or(Some(refresh_token)),
            expires_at: Utc::now() + Duration::seconds(body.expires_in),
        })
    }
}
