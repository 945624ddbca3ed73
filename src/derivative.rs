//! Model Derivative: translation jobs and their manifests.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;
use crate::auth::AccessToken;
use crate::config::Region;
use crate::utils::http::{endpoint, send_checked_json};

/// Status reported for jobs the service does not know about (yet).
pub const STATUS_NOT_AVAILABLE: &str = "n/a";

/// Job-input URN for an OSS object id: standard Base64 of the UTF-8 bytes with
/// the trailing `=` padding removed.
pub fn urn_from_object_id(object_id: &str) -> String {
    STANDARD_NO_PAD.encode(object_id.as_bytes())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum View {
    #[serde(rename = "2d")]
    TwoD,
    #[serde(rename = "3d")]
    ThreeD,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutputFormat {
    Svf2 { views: Vec<View> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInput {
    pub urn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compressed_urn: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_filename: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutput {
    pub formats: Vec<OutputFormat>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPayload {
    pub input: JobInput,
    pub output: JobOutput,
}

impl JobPayload {
    /// SVF2 translation (2D and 3D views) of the object. A non-blank
    /// `root_filename` marks the object as a zip bundle with that entry point.
    pub fn svf2(object_id: &str, root_filename: Option<&str>) -> Self {
        let root_filename = root_filename
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        Self {
            input: JobInput {
                urn: urn_from_object_id(object_id),
                compressed_urn: root_filename.as_ref().map(|_| true),
                root_filename,
            },
            output: JobOutput {
                formats: vec![OutputFormat::Svf2 {
                    views: vec![View::TwoD, View::ThreeD],
                }],
            },
        }
    }
}

/// Accepted job as returned by the job endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub result: String,
    pub urn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_jobs: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub progress: String,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationStatus {
    pub status: String,
    pub progress: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<String>>,
}

impl TranslationStatus {
    pub fn not_available() -> Self {
        Self {
            status: STATUS_NOT_AVAILABLE.to_string(),
            progress: String::new(),
            messages: None,
        }
    }

    pub fn is_not_available(&self) -> bool {
        self.status == STATUS_NOT_AVAILABLE
    }
}

impl From<Manifest> for TranslationStatus {
    fn from(manifest: Manifest) -> Self {
        Self {
            status: manifest.status,
            progress: manifest.progress,
            messages: Some(Vec::new()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DerivativeClient {
    http: reqwest::Client,
    base_url: String,
    region: Region,
}

impl DerivativeClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, region: Region) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            region,
        }
    }

    fn url(&self, rest: &[&str]) -> Result<reqwest::Url> {
        let segments = self
            .region
            .derivative_prefix()
            .split('/')
            .chain(rest.iter().copied());
        endpoint(&self.base_url, segments)
    }

    pub async fn start_job(&self, payload: &JobPayload, token: &AccessToken) -> Result<Job> {
        let url = self.url(&["job"])?;
        let req = self
            .http
            .post(url)
            .bearer_auth(&token.access_token)
            .json(payload);
        let job = send_checked_json::<Job>(req).await?;
        tracing::info!(urn = %job.urn, result = %job.result, "translation job submitted");
        Ok(job)
    }

    pub async fn manifest(&self, urn: &str, token: &AccessToken) -> Result<Manifest> {
        let url = self.url(&[urn, "manifest"])?;
        send_checked_json(self.http.get(url).bearer_auth(&token.access_token)).await
    }
}
