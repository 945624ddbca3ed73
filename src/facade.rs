use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncRead;

use crate::auth::{AccessToken, Clock, SystemClock, TokenCache, TokenIssuer, TwoLeggedAuth};
use crate::config::BridgeConfig;
use crate::derivative::{DerivativeClient, Job, JobPayload, TranslationStatus};
use crate::oss::{ObjectDetails, OssClient, PolicyKey};
use crate::{BridgeError, Lookup, Result, recover_not_found};

/// Server-side entry point to APS: owns the token caches of one tenant and
/// the storage/derivative clients that use them.
pub struct Aps {
    bucket: String,
    tokens: TokenCache,
    oss: OssClient,
    derivative: DerivativeClient,
}

impl std::fmt::Debug for Aps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aps")
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl Aps {
    pub fn new(config: &BridgeConfig) -> Result<Self> {
        ApsBuilder::new(config.clone()).build()
    }

    pub fn builder(config: BridgeConfig) -> ApsBuilder {
        ApsBuilder::new(config)
    }

    pub fn bucket_key(&self) -> &str {
        &self.bucket
    }

    pub fn now(&self) -> time::OffsetDateTime {
        self.tokens.now()
    }

    /// Viewer token (`viewables:read`), safe to hand to browsers.
    pub async fn public_token(&self) -> Result<AccessToken> {
        self.tokens.public_token().await
    }

    pub(crate) async fn internal_token(&self) -> Result<AccessToken> {
        self.tokens.internal_token().await
    }

    /// Creates the bucket with a persistent policy when OSS reports it missing.
    pub async fn ensure_bucket_exists(&self, bucket_key: &str) -> Result<()> {
        let token = self.internal_token().await?;
        match recover_not_found(self.oss.bucket_details(bucket_key, &token).await)? {
            Lookup::Found(_) => Ok(()),
            Lookup::NotFound => {
                tracing::info!(bucket = bucket_key, "bucket missing, creating it");
                self.oss
                    .create_bucket(bucket_key, PolicyKey::Persistent, &token)
                    .await?;
                Ok(())
            }
        }
    }

    pub async fn upload_model<R>(&self, object_key: &str, reader: R) -> Result<ObjectDetails>
    where
        R: AsyncRead + Unpin + Send,
    {
        if object_key.trim().is_empty() {
            return Err(BridgeError::InvalidInput(
                "object key must not be empty".to_string(),
            ));
        }
        self.ensure_bucket_exists(&self.bucket).await?;
        let token = self.internal_token().await?;
        self.oss
            .upload_object(&self.bucket, object_key, reader, &token)
            .await
    }

    pub async fn list_objects(&self) -> Result<Vec<ObjectDetails>> {
        self.ensure_bucket_exists(&self.bucket).await?;
        let token = self.internal_token().await?;
        self.oss.list_all_objects(&self.bucket, &token).await
    }

    pub async fn translate_model(
        &self,
        object_id: &str,
        root_filename: Option<&str>,
    ) -> Result<Job> {
        let token = self.internal_token().await?;
        let payload = JobPayload::svf2(object_id, root_filename);
        self.derivative.start_job(&payload, &token).await
    }

    /// Current state of the translation for `urn`; an unknown urn yields the
    /// `"n/a"` status instead of an error.
    pub async fn translation_status(&self, urn: &str) -> Result<TranslationStatus> {
        let token = self.internal_token().await?;
        match recover_not_found(self.derivative.manifest(urn, &token).await)? {
            Lookup::Found(manifest) => Ok(manifest.into()),
            Lookup::NotFound => {
                tracing::debug!(urn, "no manifest yet");
                Ok(TranslationStatus::not_available())
            }
        }
    }
}

pub struct ApsBuilder {
    config: BridgeConfig,
    http: Option<reqwest::Client>,
    issuer: Option<Arc<dyn TokenIssuer>>,
    clock: Arc<dyn Clock>,
}

impl ApsBuilder {
    fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            http: None,
            issuer: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    /// Replaces the HTTP token endpoint, e.g. with a shared or fake issuer.
    pub fn token_issuer(mut self, issuer: Arc<dyn TokenIssuer>) -> Self {
        self.issuer = Some(issuer);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Result<Aps> {
        let config = self.config;
        config.validate()?;

        let http = match self.http {
            Some(http) => http,
            None => reqwest::Client::builder()
                .timeout(Duration::from_secs(config.http_timeout_secs))
                .build()
                .map_err(BridgeError::Http)?,
        };
        let issuer: Arc<dyn TokenIssuer> = match self.issuer {
            Some(issuer) => issuer,
            None => Arc::new(TwoLeggedAuth::new(
                http.clone(),
                &config.base_url,
                config.client_id.as_str(),
                config.client_secret.as_str(),
            )?),
        };

        Ok(Aps {
            bucket: config.bucket_key(),
            tokens: TokenCache::with_clock(issuer, self.clock),
            oss: OssClient::new(http.clone(), config.base_url.as_str(), config.region)
                .with_part_size(config.upload_part_size),
            derivative: DerivativeClient::new(http, config.base_url.as_str(), config.region),
        })
    }
}
