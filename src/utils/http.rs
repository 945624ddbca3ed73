use futures_util::StreamExt;
use reqwest::Url;
use serde::de::DeserializeOwned;

use crate::{BridgeError, Result};

const MAX_ERROR_BODY_BYTES: usize = 64 * 1024;

/// Appends `segments` to `base_url`, percent-encoding each one (a `/` inside a
/// segment becomes `%2F`).
pub(crate) fn endpoint<'a>(
    base_url: &str,
    segments: impl IntoIterator<Item = &'a str>,
) -> Result<Url> {
    let mut url = Url::parse(base_url).map_err(|err| {
        BridgeError::Config(format!("invalid aps base_url {base_url:?}: {err}"))
    })?;
    url.path_segments_mut()
        .map_err(|()| BridgeError::Config(format!("aps base_url {base_url:?} cannot be a base")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Reads at most `max_bytes` of an error body; APS error pages can be large
/// HTML documents and only the head is useful in a log line.
pub(crate) async fn error_body_truncated(response: reqwest::Response, max_bytes: usize) -> String {
    let max_bytes = max_bytes.max(1);
    let mut collected = Vec::<u8>::new();
    let mut truncated = false;

    let mut stream = response.bytes_stream();
    while let Some(next) = stream.next().await {
        let Ok(chunk) = next else {
            break;
        };
        let remaining = max_bytes.saturating_sub(collected.len());
        if chunk.len() > remaining {
            collected.extend_from_slice(&chunk[..remaining]);
            truncated = true;
            break;
        }
        collected.extend_from_slice(&chunk);
    }

    let mut body = String::from_utf8_lossy(&collected).into_owned();
    if truncated {
        if !body.is_empty() {
            body.push('\n');
        }
        body.push_str("...(truncated)");
    }
    body
}

/// Sends the request and turns any non-2xx answer into `BridgeError::Api`.
pub(crate) async fn send_checked(req: reqwest::RequestBuilder) -> Result<reqwest::Response> {
    let response = req.send().await?;
    let status = response.status();
    if !status.is_success() {
        let url = response.url().path().to_string();
        let body = error_body_truncated(response, MAX_ERROR_BODY_BYTES).await;
        tracing::debug!(%status, path = %url, "aps request failed");
        return Err(BridgeError::Api { status, body });
    }
    Ok(response)
}

pub(crate) async fn send_checked_json<T: DeserializeOwned>(
    req: reqwest::RequestBuilder,
) -> Result<T> {
    let response = send_checked(req).await?;
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice::<T>(&bytes)?)
}
