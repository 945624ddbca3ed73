use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("api error ({status}): {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid config: {0}")]
    Config(String),
    #[error("token issuance failed: {0}")]
    Auth(#[source] Box<BridgeError>),
    #[error("failed to parse json: {0}")]
    Json(#[from] serde_json::Error),
}

impl BridgeError {
    pub(crate) fn auth(err: BridgeError) -> Self {
        match err {
            already @ BridgeError::Auth(_) => already,
            other => BridgeError::Auth(Box::new(other)),
        }
    }

    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            BridgeError::Api { status, .. } => Some(*status),
            BridgeError::Http(err) => err.status(),
            BridgeError::Auth(inner) => inner.status(),
            _ => None,
        }
    }

    /// True for a remote 404. Auth failures never count, even when the token
    /// endpoint itself answered 404.
    pub fn is_not_found(&self) -> bool {
        match self {
            BridgeError::Api { status, .. } => *status == reqwest::StatusCode::NOT_FOUND,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Outcome of a remote lookup where "not found" is an expected answer rather
/// than a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

/// Turns a remote 404 into `Lookup::NotFound`; every other error is returned
/// unchanged.
pub fn recover_not_found<T>(result: Result<T>) -> Result<Lookup<T>> {
    match result {
        Ok(value) => Ok(Lookup::Found(value)),
        Err(err) if err.is_not_found() => Ok(Lookup::NotFound),
        Err(err) => Err(err),
    }
}
