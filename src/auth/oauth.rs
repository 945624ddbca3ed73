use async_trait::async_trait;
use serde::Deserialize;

use crate::{BridgeError, Result};

/// APS OAuth scopes used by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    ViewablesRead,
    BucketCreate,
    BucketRead,
    DataRead,
    DataWrite,
    DataCreate,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::ViewablesRead => "viewables:read",
            Scope::BucketCreate => "bucket:create",
            Scope::BucketRead => "bucket:read",
            Scope::DataRead => "data:read",
            Scope::DataWrite => "data:write",
            Scope::DataCreate => "data:create",
        }
    }

    pub fn join(scopes: &[Scope]) -> String {
        scopes
            .iter()
            .map(|scope| scope.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Scopes handed to browsers (viewer only).
pub const PUBLIC_SCOPES: &[Scope] = &[Scope::ViewablesRead];

/// Scopes used server side for storage and derivative calls.
pub const INTERNAL_SCOPES: &[Scope] = &[
    Scope::BucketCreate,
    Scope::BucketRead,
    Scope::DataRead,
    Scope::DataWrite,
    Scope::DataCreate,
];

#[derive(Clone)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

impl std::fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedToken")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Source of fresh scoped tokens. `TwoLeggedAuth` is the HTTP implementation.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    async fn issue_token(&self, scopes: &[Scope]) -> Result<IssuedToken>;
}

#[derive(Clone)]
pub struct TwoLeggedAuth {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl std::fmt::Debug for TwoLeggedAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwoLeggedAuth")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

impl TwoLeggedAuth {
    pub const TOKEN_PATH: &'static str = "authentication/v2/token";

    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self> {
        let client_id = client_id.into();
        let client_secret = client_secret.into();

        if base_url.trim().is_empty() {
            return Err(BridgeError::Config("aps base_url is required".to_string()));
        }
        if client_id.trim().is_empty() {
            return Err(BridgeError::Config("aps client_id is required".to_string()));
        }
        if client_secret.trim().is_empty() {
            return Err(BridgeError::Config(
                "aps client_secret is required".to_string(),
            ));
        }

        Ok(Self {
            http,
            token_url: format!("{}/{}", base_url.trim_end_matches('/'), Self::TOKEN_PATH),
            client_id,
            client_secret,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[async_trait]
impl TokenIssuer for TwoLeggedAuth {
    async fn issue_token(&self, scopes: &[Scope]) -> Result<IssuedToken> {
        let form = [
            ("grant_type", "client_credentials".to_string()),
            ("scope", Scope::join(scopes)),
        ];
        let req = self
            .http
            .post(self.token_url.as_str())
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header("accept", "application/json")
            .form(&form);

        let parsed = crate::utils::http::send_checked_json::<TokenResponse>(req).await?;
        let access_token = parsed
            .access_token
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| {
                BridgeError::InvalidResponse("token response missing access_token".to_string())
            })?;
        let expires_in = parsed.expires_in.ok_or_else(|| {
            BridgeError::InvalidResponse("token response missing expires_in".to_string())
        })?;
        let token_type = parsed
            .token_type
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| "Bearer".to_string());

        Ok(IssuedToken {
            access_token,
            token_type,
            expires_in,
        })
    }
}
