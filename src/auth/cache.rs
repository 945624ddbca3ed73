use std::sync::{Arc, Mutex, PoisonError};

use time::{Duration, OffsetDateTime};

use super::oauth::{INTERNAL_SCOPES, PUBLIC_SCOPES, Scope, TokenIssuer};
use crate::{BridgeError, Result};

pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// A bearer token together with the instant it stops being usable.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub access_token: String,
    pub expires_at: OffsetDateTime,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl AccessToken {
    /// Valid strictly before `expires_at`; the expiry instant itself is stale.
    pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
        now < self.expires_at
    }

    /// Whole seconds left, rounded half to even. Negative once expired.
    pub fn expires_in_secs(&self, now: OffsetDateTime) -> i64 {
        (self.expires_at - now).as_seconds_f64().round_ties_even() as i64
    }
}

struct TokenSlot {
    label: &'static str,
    scopes: &'static [Scope],
    current: Mutex<Option<AccessToken>>,
}

impl TokenSlot {
    fn new(label: &'static str, scopes: &'static [Scope]) -> Self {
        Self {
            label,
            scopes,
            current: Mutex::new(None),
        }
    }

    // The lock is only held to copy or swap the value, never across an await.
    fn valid_at(&self, now: OffsetDateTime) -> Option<AccessToken> {
        let guard = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        guard.as_ref().filter(|token| token.is_valid_at(now)).cloned()
    }

    fn replace(&self, token: AccessToken) {
        let mut guard = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(token);
    }
}

/// Holds the public (viewer) and internal (storage/derivative) tokens of one
/// facade instance and refreshes each lazily.
///
/// Refreshes are not serialised: two callers that both observe an expired
/// token will both hit the token endpoint and the later result wins. Either
/// token is valid, so the duplicate work is accepted.
pub struct TokenCache {
    issuer: Arc<dyn TokenIssuer>,
    clock: Arc<dyn Clock>,
    public: TokenSlot,
    internal: TokenSlot,
}

impl std::fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCache").finish_non_exhaustive()
    }
}

impl TokenCache {
    pub fn with_clock(issuer: Arc<dyn TokenIssuer>, clock: Arc<dyn Clock>) -> Self {
        Self {
            issuer,
            clock,
            public: TokenSlot::new("public", PUBLIC_SCOPES),
            internal: TokenSlot::new("internal", INTERNAL_SCOPES),
        }
    }

    pub fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }

    pub async fn public_token(&self) -> Result<AccessToken> {
        self.resolve(&self.public).await
    }

    pub async fn internal_token(&self) -> Result<AccessToken> {
        self.resolve(&self.internal).await
    }

    async fn resolve(&self, slot: &TokenSlot) -> Result<AccessToken> {
        if let Some(token) = slot.valid_at(self.clock.now()) {
            tracing::debug!(slot = slot.label, "reusing cached aps token");
            return Ok(token);
        }

        let issued = match self.issuer.issue_token(slot.scopes).await {
            Ok(issued) => issued,
            Err(err) => {
                tracing::warn!(slot = slot.label, error = %err, "aps token issuance failed");
                return Err(BridgeError::auth(err));
            }
        };

        let lifetime = Duration::seconds(i64::try_from(issued.expires_in).unwrap_or(i64::MAX));
        let expires_at = self.clock.now().checked_add(lifetime).ok_or_else(|| {
            BridgeError::auth(BridgeError::InvalidResponse(format!(
                "token lifetime out of range: {}s",
                issued.expires_in
            )))
        })?;
        let token = AccessToken {
            access_token: issued.access_token,
            expires_at,
        };
        slot.replace(token.clone());
        tracing::debug!(
            slot = slot.label,
            expires_in = issued.expires_in,
            "refreshed aps token"
        );
        Ok(token)
    }
}
