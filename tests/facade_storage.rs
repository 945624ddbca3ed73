use aps_bridge::utils::test_support::should_skip_httpmock;
use aps_bridge::{Aps, BridgeConfig, BridgeError, Region};
use httpmock::{Method::GET, Method::POST, Method::PUT, MockServer};
use serde_json::json;

const BUCKET: &str = "client-a-basic-app";

async fn mock_token(server: &MockServer) {
    server
        .mock_async(|when, then| {
            when.method(POST).path("/authentication/v2/token");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "access_token": "internal-tok",
                    "token_type": "Bearer",
                    "expires_in": 3599
                }));
        })
        .await;
}

fn aps(server: &MockServer) -> aps_bridge::Result<Aps> {
    let config = BridgeConfig::new("Client-A", "secret-a").with_base_url(server.base_url());
    Aps::new(&config)
}

fn object(key: &str) -> serde_json::Value {
    json!({
        "bucketKey": BUCKET,
        "objectKey": key,
        "objectId": format!("urn:adsk.objects:os.object:{BUCKET}/{key}"),
        "size": 1
    })
}

#[tokio::test]
async fn existing_bucket_is_not_recreated() -> aps_bridge::Result<()> {
    if should_skip_httpmock() {
        return Ok(());
    }
    let server = MockServer::start_async().await;
    mock_token(&server).await;
    let details = server
        .mock_async(|when, then| {
            when.method(GET)
                .path(format!("/oss/v2/buckets/{BUCKET}/details"))
                .header("authorization", "Bearer internal-tok");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"bucketKey": BUCKET, "policyKey": "persistent"}));
        })
        .await;
    let create = server
        .mock_async(|when, then| {
            when.method(POST).path("/oss/v2/buckets");
            then.status(200);
        })
        .await;

    let aps = aps(&server)?;
    assert_eq!(aps.bucket_key(), BUCKET);
    aps.ensure_bucket_exists(BUCKET).await?;
    aps.ensure_bucket_exists(BUCKET).await?;

    details.assert_hits_async(2).await;
    create.assert_hits_async(0).await;
    Ok(())
}

#[tokio::test]
async fn missing_bucket_is_created_persistent() -> aps_bridge::Result<()> {
    if should_skip_httpmock() {
        return Ok(());
    }
    let server = MockServer::start_async().await;
    mock_token(&server).await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/oss/v2/buckets/models/details");
            then.status(404)
                .header("content-type", "application/json")
                .json_body(json!({"reason": "Bucket not found"}));
        })
        .await;
    let create = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/oss/v2/buckets")
                .header("x-ads-region", "US")
                .json_body(json!({"bucketKey": "models", "policyKey": "persistent"}));
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"bucketKey": "models", "policyKey": "persistent"}));
        })
        .await;

    aps(&server)?.ensure_bucket_exists("models").await?;
    create.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn bucket_lookup_failure_other_than_404_propagates() -> aps_bridge::Result<()> {
    if should_skip_httpmock() {
        return Ok(());
    }
    let server = MockServer::start_async().await;
    mock_token(&server).await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/oss/v2/buckets/models/details");
            then.status(403).body("forbidden");
        })
        .await;
    let create = server
        .mock_async(|when, then| {
            when.method(POST).path("/oss/v2/buckets");
            then.status(200);
        })
        .await;

    let err = aps(&server)?
        .ensure_bucket_exists("models")
        .await
        .expect_err("403 must not be treated as missing");
    assert!(matches!(err, BridgeError::Api { status, .. } if status.as_u16() == 403));
    create.assert_hits_async(0).await;
    Ok(())
}

#[tokio::test]
async fn list_objects_follows_every_page() -> aps_bridge::Result<()> {
    if should_skip_httpmock() {
        return Ok(());
    }
    let server = MockServer::start_async().await;
    mock_token(&server).await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/oss/v2/buckets/{BUCKET}/details"));
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"bucketKey": BUCKET}));
        })
        .await;

    let objects_path = format!("/oss/v2/buckets/{BUCKET}/objects");
    let first = server
        .mock_async(|when, then| {
            when.method(GET)
                .path(objects_path.as_str())
                .query_param("limit", "64")
                .query_param_missing("startAt");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "items": [object("a.rvt"), object("b.rvt")],
                    "next": server.url(format!("{objects_path}?startAt=c.rvt&limit=64"))
                }));
        })
        .await;
    let second = server
        .mock_async(|when, then| {
            when.method(GET)
                .path(objects_path.as_str())
                .query_param("startAt", "c.rvt");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "items": [object("c.rvt")],
                    "next": server.url(format!("{objects_path}?startAt=d.rvt&limit=64"))
                }));
        })
        .await;
    let third = server
        .mock_async(|when, then| {
            when.method(GET)
                .path(objects_path.as_str())
                .query_param("startAt", "d.rvt");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"items": [object("d.rvt")]}));
        })
        .await;

    let objects = aps(&server)?.list_objects().await?;
    let keys: Vec<&str> = objects.iter().map(|o| o.object_key.as_str()).collect();
    assert_eq!(keys, ["a.rvt", "b.rvt", "c.rvt", "d.rvt"]);
    first.assert_async().await;
    second.assert_async().await;
    third.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn upload_model_creates_bucket_then_streams_parts() -> aps_bridge::Result<()> {
    if should_skip_httpmock() {
        return Ok(());
    }
    let server = MockServer::start_async().await;
    mock_token(&server).await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/oss/v2/buckets/models/details");
            then.status(404).body("{}");
        })
        .await;
    let create = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/oss/v2/buckets")
                .header("x-ads-region", "EMEA");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"bucketKey": "models"}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/oss/v2/buckets/models/objects/tower-v2.ifc/signeds3upload");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"uploadKey": "up-9", "urls": [server.url("/s3/only")]}));
        })
        .await;
    let part = server
        .mock_async(|when, then| {
            when.method(PUT).path("/s3/only").body("IFC-DATA");
            then.status(200);
        })
        .await;
    let complete = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/oss/v2/buckets/models/objects/tower-v2.ifc/signeds3upload")
                .json_body(json!({"uploadKey": "up-9"}));
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "bucketKey": "models",
                    "objectKey": "tower-v2.ifc",
                    "objectId": "urn:adsk.objects:os.object:models/tower-v2.ifc",
                    "size": 8
                }));
        })
        .await;

    let config = BridgeConfig::new("client-a", "secret-a")
        .with_base_url(server.base_url())
        .with_bucket("models")
        .with_region(Region::Emea);
    let aps = Aps::new(&config)?;
    let details = aps.upload_model("tower-v2.ifc", &b"IFC-DATA"[..]).await?;

    create.assert_async().await;
    part.assert_async().await;
    complete.assert_async().await;
    assert_eq!(details.object_key, "tower-v2.ifc");
    assert_eq!(details.size, 8);
    Ok(())
}

#[tokio::test]
async fn blank_object_key_is_rejected_before_any_request() -> aps_bridge::Result<()> {
    let config = BridgeConfig::new("client-a", "secret-a").with_base_url("http://127.0.0.1:9");
    let aps = Aps::new(&config)?;
    let err = aps
        .upload_model("  ", &b""[..])
        .await
        .expect_err("blank key");
    assert!(matches!(err, BridgeError::InvalidInput(_)));
    Ok(())
}
