use std::sync::Arc;

use async_trait::async_trait;
use aps_bridge::auth::IssuedToken;
use aps_bridge::utils::test_support::should_skip_httpmock;
use aps_bridge::{Aps, BridgeConfig, BridgeError, Scope, TokenIssuer, urn_from_object_id};
use httpmock::{Method::GET, Method::POST, MockServer};
use serde_json::json;

struct StaticIssuer;

#[async_trait]
impl TokenIssuer for StaticIssuer {
    async fn issue_token(&self, _scopes: &[Scope]) -> aps_bridge::Result<IssuedToken> {
        Ok(IssuedToken {
            access_token: "internal-tok".to_string(),
            token_type: "Bearer".to_string(),
            expires_in: 3600,
        })
    }
}

fn aps(server: &MockServer) -> aps_bridge::Result<Aps> {
    let config = BridgeConfig::new("client-a", "secret-a").with_base_url(server.base_url());
    Aps::builder(config).token_issuer(Arc::new(StaticIssuer)).build()
}

#[tokio::test]
async fn translate_model_submits_svf2_job() -> aps_bridge::Result<()> {
    if should_skip_httpmock() {
        return Ok(());
    }
    let server = MockServer::start_async().await;
    let object_id = "urn:adsk.objects:os.object:client-a-basic-app/site.zip";
    let urn = urn_from_object_id(object_id);
    let job = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/modelderivative/v2/designdata/job")
                .header("authorization", "Bearer internal-tok")
                .json_body(json!({
                    "input": {"urn": urn, "compressedUrn": true, "rootFilename": "site/main.rvt"},
                    "output": {"formats": [{"type": "svf2", "views": ["2d", "3d"]}]}
                }));
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"result": "success", "urn": urn}));
        })
        .await;

    let accepted = aps(&server)?
        .translate_model(object_id, Some("site/main.rvt"))
        .await?;
    job.assert_async().await;
    assert_eq!(accepted.urn, urn);
    Ok(())
}

#[tokio::test]
async fn unknown_urn_reports_not_available() -> aps_bridge::Result<()> {
    if should_skip_httpmock() {
        return Ok(());
    }
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/modelderivative/v2/designdata/bm9wZQ/manifest");
            then.status(404)
                .header("content-type", "application/json")
                .json_body(json!({"diagnostic": "Requested file not found"}));
        })
        .await;

    let status = aps(&server)?.translation_status("bm9wZQ").await?;
    assert!(status.is_not_available());
    assert_eq!(status.progress, "");
    assert_eq!(status.messages, None);
    Ok(())
}

#[tokio::test]
async fn manifest_status_and_progress_are_passed_through() -> aps_bridge::Result<()> {
    if should_skip_httpmock() {
        return Ok(());
    }
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/modelderivative/v2/designdata/dXJu/manifest");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "type": "manifest",
                    "status": "inprogress",
                    "progress": "40% complete",
                    "derivatives": []
                }));
        })
        .await;

    let status = aps(&server)?.translation_status("dXJu").await?;
    assert_eq!(status.status, "inprogress");
    assert_eq!(status.progress, "40% complete");
    assert_eq!(status.messages, Some(Vec::new()));
    Ok(())
}

#[tokio::test]
async fn manifest_server_error_is_not_masked() -> aps_bridge::Result<()> {
    if should_skip_httpmock() {
        return Ok(());
    }
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/modelderivative/v2/designdata/dXJu/manifest");
            then.status(500).body("upstream exploded");
        })
        .await;

    let err = aps(&server)?
        .translation_status("dXJu")
        .await
        .expect_err("500 must propagate");
    assert!(matches!(err, BridgeError::Api { status, .. } if status.as_u16() == 500));
    Ok(())
}
