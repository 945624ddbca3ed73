use std::collections::VecDeque;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};

use super::{ObjectDetails, OssClient};
use crate::auth::AccessToken;
use crate::utils::http::{send_checked, send_checked_json};
use crate::{BridgeError, Result};

/// OSS hands out at most this many signed part URLs per request.
const MAX_URLS_PER_REQUEST: u32 = 25;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignedUpload {
    upload_key: String,
    #[serde(default)]
    urls: Vec<String>,
}

#[derive(Debug, PartialEq, Eq)]
struct SentParts {
    upload_key: String,
    parts: u32,
    bytes: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompleteUpload<'a> {
    upload_key: &'a str,
}

async fn read_part<R>(reader: &mut R, part_size: usize) -> Result<Bytes>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(part_size);
    reader.take(part_size as u64).read_to_end(&mut buf).await?;
    Ok(Bytes::from(buf))
}

impl OssClient {
    async fn signed_upload_urls(
        &self,
        bucket_key: &str,
        object_key: &str,
        first_part: u32,
        upload_key: Option<&str>,
        token: &AccessToken,
    ) -> Result<SignedUpload> {
        let url = self.bucket_url(bucket_key, &["objects", object_key, "signeds3upload"])?;
        let mut req = self
            .http
            .get(url)
            .bearer_auth(&token.access_token)
            .query(&[("firstPart", first_part), ("parts", MAX_URLS_PER_REQUEST)]);
        if let Some(upload_key) = upload_key {
            req = req.query(&[("uploadKey", upload_key)]);
        }
        let signed = send_checked_json::<SignedUpload>(req).await?;
        if signed.urls.is_empty() {
            return Err(BridgeError::InvalidResponse(format!(
                "no signed upload urls returned for part {first_part}"
            )));
        }
        Ok(signed)
    }

    /// PUTs `reader` part by part and returns what was sent. Parts are
    /// `part_size` bytes except the last; an empty reader still produces one
    /// (empty) part.
    async fn send_parts<R>(
        &self,
        bucket_key: &str,
        object_key: &str,
        mut reader: R,
        token: &AccessToken,
    ) -> Result<SentParts>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut upload_key: Option<String> = None;
        let mut urls = VecDeque::<String>::new();
        let mut part_number: u32 = 1;
        let mut parts: u32 = 0;
        let mut bytes: u64 = 0;

        loop {
            let part = read_part(&mut reader, self.part_size).await?;
            if part.is_empty() && part_number > 1 {
                break;
            }

            if urls.is_empty() {
                let signed = self
                    .signed_upload_urls(
                        bucket_key,
                        object_key,
                        part_number,
                        upload_key.as_deref(),
                        token,
                    )
                    .await?;
                upload_key = Some(signed.upload_key);
                urls.extend(signed.urls);
            }
            let Some(url) = urls.pop_front() else {
                return Err(BridgeError::InvalidResponse(format!(
                    "ran out of signed urls at part {part_number}"
                )));
            };

            let len = part.len();
            // Signed URLs carry their own credentials; no bearer header here.
            send_checked(self.http.put(url).body(part)).await?;
            parts += 1;
            bytes += len as u64;
            tracing::debug!(object = object_key, part = part_number, bytes = len, "uploaded part");

            if len < self.part_size {
                break;
            }
            part_number += 1;
        }

        let Some(upload_key) = upload_key else {
            return Err(BridgeError::InvalidResponse(
                "upload finished without an upload key".to_string(),
            ));
        };
        Ok(SentParts {
            upload_key,
            parts,
            bytes,
        })
    }

    /// Streams `reader` into `bucket_key/object_key` through signed S3 part
    /// URLs and finalises the upload.
    pub async fn upload_object<R>(
        &self,
        bucket_key: &str,
        object_key: &str,
        reader: R,
        token: &AccessToken,
    ) -> Result<ObjectDetails>
    where
        R: AsyncRead + Unpin + Send,
    {
        let sent = self
            .send_parts(bucket_key, object_key, reader, token)
            .await?;

        let url = self.bucket_url(bucket_key, &["objects", object_key, "signeds3upload"])?;
        let req = self
            .http
            .post(url)
            .bearer_auth(&token.access_token)
            .json(&CompleteUpload {
                upload_key: &sent.upload_key,
            });
        let details = send_checked_json::<ObjectDetails>(req).await?;
        tracing::info!(
            bucket = bucket_key,
            object = object_key,
            parts = sent.parts,
            bytes = sent.bytes,
            "upload completed"
        );
        Ok(details)
    }
}
