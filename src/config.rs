use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{BridgeError, Result};

pub const DEFAULT_BASE_URL: &str = "https://developer.api.autodesk.com";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_UPLOAD_PART_SIZE: usize = 5 * 1024 * 1024;
/// S3 rejects every part but the last when it is smaller than this.
pub const MIN_UPLOAD_PART_SIZE: usize = 5 * 1024 * 1024;

const ENV_CLIENT_ID: &str = "APS_CLIENT_ID";
const ENV_CLIENT_SECRET: &str = "APS_CLIENT_SECRET";
const ENV_BUCKET: &str = "APS_BUCKET";
const ENV_BASE_URL: &str = "APS_BASE_URL";
const ENV_REGION: &str = "APS_REGION";

/// Key/value source for configuration: a parsed `.env` file first, the
/// process environment second.
#[derive(Clone, Default)]
pub struct Env {
    pub dotenv: BTreeMap<String, String>,
}

impl std::fmt::Debug for Env {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<&str> = self.dotenv.keys().map(String::as_str).collect();
        f.debug_struct("Env").field("dotenv_keys", &keys).finish()
    }
}

impl Env {
    pub fn from_dotenv_str(contents: &str) -> Self {
        Self {
            dotenv: parse_dotenv(contents),
        }
    }

    pub fn load_dotenv(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(Self::from_dotenv_str(&contents))
    }

    pub fn get(&self, key: &str) -> Option<String> {
        if let Some(value) = self.dotenv.get(key) {
            return Some(value.clone());
        }
        std::env::var(key)
            .ok()
            .filter(|value| !value.trim().is_empty())
    }
}

/// Minimal `.env` reader: `KEY=value` lines, optional `export ` prefix,
/// matching single or double quotes stripped, blank values skipped.
pub fn parse_dotenv(contents: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for line in contents.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").map(str::trim).unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = unquote(value.trim());
        if key.is_empty() || value.trim().is_empty() {
            continue;
        }
        out.insert(key.to_string(), value.to_string());
    }
    out
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

/// Data-center region used for bucket creation and derivative jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Region {
    #[default]
    Us,
    Emea,
}

impl Region {
    pub fn as_header_value(self) -> &'static str {
        match self {
            Region::Us => "US",
            Region::Emea => "EMEA",
        }
    }

    /// Path prefix of the Model Derivative API for this region.
    pub fn derivative_prefix(self) -> &'static str {
        match self {
            Region::Us => "modelderivative/v2/designdata",
            Region::Emea => "modelderivative/v2/regions/eu/designdata",
        }
    }

    fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "US" => Ok(Region::Us),
            "EMEA" | "EU" => Ok(Region::Emea),
            other => Err(BridgeError::Config(format!("unknown region {other:?}"))),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub region: Region,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    #[serde(default = "default_upload_part_size")]
    pub upload_part_size: usize,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

fn default_upload_part_size() -> usize {
    DEFAULT_UPLOAD_PART_SIZE
}

impl std::fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("base_url", &self.base_url)
            .field("region", &self.region)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("upload_part_size", &self.upload_part_size)
            .finish()
    }
}

impl BridgeConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            bucket: None,
            base_url: default_base_url(),
            region: Region::default(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            upload_part_size: DEFAULT_UPLOAD_PART_SIZE,
        }
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_region(mut self, region: Region) -> Self {
        self.region = region;
        self
    }

    pub fn with_upload_part_size(mut self, bytes: usize) -> Self {
        self.upload_part_size = bytes;
        self
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str::<Self>(contents)
            .map_err(|err| BridgeError::Config(format!("failed to parse config toml: {err}")))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Fills every field the file left empty from `env`. Values already present
    /// win. The result is validated.
    pub fn resolve(mut self, env: &Env) -> Result<Self> {
        if self.client_id.trim().is_empty() {
            self.client_id = env.get(ENV_CLIENT_ID).unwrap_or_default();
        }
        if self.client_secret.trim().is_empty() {
            self.client_secret = env.get(ENV_CLIENT_SECRET).unwrap_or_default();
        }
        if self.bucket.as_deref().is_none_or(|b| b.trim().is_empty()) {
            self.bucket = env.get(ENV_BUCKET);
        }
        if self.base_url == DEFAULT_BASE_URL {
            if let Some(base_url) = env.get(ENV_BASE_URL) {
                self.base_url = base_url;
            }
        }
        if let Some(region) = env.get(ENV_REGION) {
            self.region = Region::parse(&region)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn from_env(env: &Env) -> Result<Self> {
        Self::new("", "").resolve(env)
    }

    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(BridgeError::Config(format!(
                "client_id is required (set {ENV_CLIENT_ID})"
            )));
        }
        if self.client_secret.trim().is_empty() {
            return Err(BridgeError::Config(format!(
                "client_secret is required (set {ENV_CLIENT_SECRET})"
            )));
        }
        if self.base_url.trim().is_empty() {
            return Err(BridgeError::Config("base_url must not be empty".to_string()));
        }
        if self.upload_part_size < MIN_UPLOAD_PART_SIZE {
            return Err(BridgeError::Config(format!(
                "upload_part_size must be at least {MIN_UPLOAD_PART_SIZE} bytes, got {}",
                self.upload_part_size
            )));
        }
        Ok(())
    }

    /// Configured bucket, or `<client id in lower case>-basic-app`.
    pub fn bucket_key(&self) -> String {
        match self.bucket.as_deref().map(str::trim) {
            Some(bucket) if !bucket.is_empty() => bucket.to_string(),
            _ => format!("{}-basic-app", self.client_id.to_lowercase()),
        }
    }
}
