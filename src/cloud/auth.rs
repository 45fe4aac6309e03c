// ABOUTME: IAM token exchange for the Power Virtual Server API.
// ABOUTME: Trades a long-lived API key for a short-lived bearer token.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use super::error::CloudError;

const GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";

/// A bearer token and the moment it stops being accepted.
#[derive(Clone)]
pub struct BearerToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl BearerToken {
    /// True when the token expires within `margin` of `now`.
    pub fn is_expiring(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        now + margin >= self.expires_at
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerToken")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

/// Client for the IAM identity token endpoint.
#[derive(Debug, Clone)]
pub struct IamAuthenticator {
    http: reqwest::Client,
    endpoint: String,
}

impl IamAuthenticator {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn get_token(&self, api_key: &str) -> Result<BearerToken, CloudError> {
        let url = format!("{}/identity/token", self.endpoint);

        let response = self
            .http
            .post(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[("grant_type", GRANT_TYPE), ("apikey", api_key)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CloudError::Auth(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| CloudError::Auth(format!("malformed token response: {e}")))?;

        tracing::debug!(expires_in = token.expires_in, "obtained IAM bearer token");

        Ok(BearerToken {
            access_token: token.access_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        })
    }
}
