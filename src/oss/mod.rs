//! Object Storage Service (OSS v2): buckets, paginated listing and uploads.

mod pagination;
mod upload;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use pagination::{ContinuationToken, Page, collect_pages};

use crate::Result;
use crate::auth::AccessToken;
use crate::config::{DEFAULT_UPLOAD_PART_SIZE, Region};
use crate::utils::http::{endpoint, send_checked_json};

/// Page size used for object listings.
pub const LIST_PAGE_SIZE: u32 = 64;

/// Retention policy of a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKey {
    Transient,
    Temporary,
    Persistent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketDetails {
    pub bucket_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_key: Option<PolicyKey>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// One stored object as OSS describes it. Unknown fields are kept in `extra`
/// so the value can be passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectDetails {
    #[serde(default)]
    pub bucket_key: String,
    pub object_key: String,
    pub object_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateBucketPayload<'a> {
    bucket_key: &'a str,
    policy_key: PolicyKey,
}

#[derive(Debug, Deserialize)]
struct ObjectsPage {
    #[serde(default)]
    items: Vec<ObjectDetails>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OssClient {
    http: reqwest::Client,
    base_url: String,
    region: Region,
    part_size: usize,
}

impl OssClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, region: Region) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            region,
            part_size: DEFAULT_UPLOAD_PART_SIZE,
        }
    }

    pub fn with_part_size(mut self, part_size: usize) -> Self {
        self.part_size = part_size.max(1);
        self
    }

    fn bucket_url(&self, bucket_key: &str, rest: &[&str]) -> Result<reqwest::Url> {
        let mut segments = vec!["oss", "v2", "buckets", bucket_key];
        segments.extend_from_slice(rest);
        endpoint(&self.base_url, segments)
    }

    pub async fn bucket_details(
        &self,
        bucket_key: &str,
        token: &AccessToken,
    ) -> Result<BucketDetails> {
        let url = self.bucket_url(bucket_key, &["details"])?;
        send_checked_json(self.http.get(url).bearer_auth(&token.access_token)).await
    }

    pub async fn create_bucket(
        &self,
        bucket_key: &str,
        policy_key: PolicyKey,
        token: &AccessToken,
    ) -> Result<BucketDetails> {
        let url = endpoint(&self.base_url, ["oss", "v2", "buckets"])?;
        let req = self
            .http
            .post(url)
            .bearer_auth(&token.access_token)
            .header("x-ads-region", self.region.as_header_value())
            .json(&CreateBucketPayload {
                bucket_key,
                policy_key,
            });
        let details = send_checked_json::<BucketDetails>(req).await?;
        tracing::info!(bucket = bucket_key, region = ?self.region, "created aps bucket");
        Ok(details)
    }

    pub async fn list_objects_page(
        &self,
        bucket_key: &str,
        limit: u32,
        start_at: Option<&ContinuationToken>,
        token: &AccessToken,
    ) -> Result<Page<ObjectDetails>> {
        let url = self.bucket_url(bucket_key, &["objects"])?;
        let mut req = self
            .http
            .get(url)
            .bearer_auth(&token.access_token)
            .query(&[("limit", limit)]);
        if let Some(start_at) = start_at {
            req = req.query(&[(ContinuationToken::QUERY_KEY, start_at.as_str())]);
        }

        let page = send_checked_json::<ObjectsPage>(req).await?;
        tracing::debug!(
            bucket = bucket_key,
            items = page.items.len(),
            has_next = page.next.as_deref().is_some_and(|n| !n.trim().is_empty()),
            "fetched object page"
        );
        Ok(Page {
            items: page.items,
            next: ContinuationToken::from_next_link(page.next.as_deref())?,
        })
    }

    /// Every object of the bucket, following continuation links to the end.
    pub async fn list_all_objects(
        &self,
        bucket_key: &str,
        token: &AccessToken,
    ) -> Result<Vec<ObjectDetails>> {
        collect_pages(|cursor| async move {
            self.list_objects_page(bucket_key, LIST_PAGE_SIZE, cursor.as_ref(), token)
                .await
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, Method::POST, MockServer};
    use serde_json::json;
    use time::OffsetDateTime;

    fn token() -> AccessToken {
        AccessToken {
            access_token: "internal-tok".to_string(),
            expires_at: OffsetDateTime::now_utc() + time::Duration::hours(1),
        }
    }

    #[test]
    fn object_details_keep_unknown_fields() -> Result<()> {
        let raw = json!({
            "bucketKey": "b",
            "objectKey": "house.rvt",
            "objectId": "urn:adsk.objects:os.object:b/house.rvt",
            "sha1": "abc",
            "size": 42,
            "location": "https://developer.api.autodesk.com/oss/v2/buckets/b/objects/house.rvt",
            "customMeta": {"owner": "ops"}
        });
        let parsed: ObjectDetails = serde_json::from_value(raw.clone())?;
        assert_eq!(parsed.size, 42);
        assert_eq!(parsed.extra.get("customMeta"), Some(&json!({"owner": "ops"})));
        assert_eq!(serde_json::to_value(&parsed)?, raw);
        Ok(())
    }

    #[tokio::test]
    async fn create_bucket_sends_region_and_persistent_policy() -> Result<()> {
        if crate::utils::test_support::should_skip_httpmock() {
            return Ok(());
        }
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/oss/v2/buckets")
                    .header("authorization", "Bearer internal-tok")
                    .header("x-ads-region", "EMEA")
                    .json_body(json!({"bucketKey": "models", "policyKey": "persistent"}));
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"bucketKey":"models","bucketOwner":"id","createdDate":1,"policyKey":"persistent"}"#);
            })
            .await;

        let oss = OssClient::new(reqwest::Client::new(), server.base_url(), Region::Emea);
        let details = oss
            .create_bucket("models", PolicyKey::Persistent, &token())
            .await?;
        mock.assert_async().await;
        assert_eq!(details.policy_key, Some(PolicyKey::Persistent));
        Ok(())
    }

    #[tokio::test]
    async fn list_page_passes_limit_and_cursor() -> Result<()> {
        if crate::utils::test_support::should_skip_httpmock() {
            return Ok(());
        }
        let server = MockServer::start_async().await;
        let next = format!("{}/oss/v2/buckets/b/objects?startAt=k3&limit=2", server.base_url());
        let body = json!({
            "items": [
                {"bucketKey": "b", "objectKey": "k1", "objectId": "urn:1", "size": 1},
                {"bucketKey": "b", "objectKey": "k2", "objectId": "urn:2", "size": 2}
            ],
            "next": next
        });
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/oss/v2/buckets/b/objects")
                    .query_param("limit", "2")
                    .query_param("startAt", "k1");
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(body);
            })
            .await;

        let oss = OssClient::new(reqwest::Client::new(), server.base_url(), Region::Us);
        let page = oss
            .list_objects_page("b", 2, Some(&ContinuationToken::new("k1")), &token())
            .await?;
        mock.assert_async().await;
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.next, Some(ContinuationToken::new("k3")));
        Ok(())
    }
}
