//! Two-legged APS authentication and the dual-scope token cache.

pub mod cache;
pub mod oauth;

pub use cache::{AccessToken, Clock, SystemClock, TokenCache};
pub use oauth::{INTERNAL_SCOPES, IssuedToken, PUBLIC_SCOPES, Scope, TokenIssuer, TwoLeggedAuth};
