//! Server-side facade over Autodesk Platform Services: cached two-legged
//! tokens, OSS bucket storage and Model Derivative translation jobs.

pub mod auth;
pub mod config;
pub mod derivative;
mod error;
mod facade;
pub mod oss;
pub mod utils;

#[cfg(feature = "server")]
pub mod server;

pub use auth::{AccessToken, Clock, Scope, SystemClock, TokenCache, TokenIssuer, TwoLeggedAuth};
pub use config::{BridgeConfig, Env, Region};
pub use derivative::{Job, JobPayload, TranslationStatus, urn_from_object_id};
pub use error::{BridgeError, Lookup, Result, recover_not_found};
pub use facade::{Aps, ApsBuilder};
pub use oss::{ContinuationToken, ObjectDetails, Page, PolicyKey};
