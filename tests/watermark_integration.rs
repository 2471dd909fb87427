//! Watermark providers against mocked vendor APIs.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use harvester::Harvester;
use harvester::models::{BaiduConfig, Config, PageJob, TencentConfig};
use harvester::services::watermark::{TencentProvider, WatermarkProvider};
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::{gallery, mount_html, mount_png, png_bytes, test_config};

fn baidu_config(dir: &TempDir, endpoint: String) -> Config {
    let mut config = test_config(dir.path());
    config.watermark.enabled = true;
    config.watermark.default_provider = "baidu".into();
    config.watermark.max_retry = 0;
    config.watermark.retry_delay_ms = 1;
    config.watermark.baidu = BaiduConfig {
        enabled: true,
        api_key: "key".into(),
        secret_key: "secret".into(),
        endpoint,
    };
    config
}

async fn mount_baidu(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/oauth/2.0/token"))
        .and(query_param("grant_type", "client_credentials"))
        .and(query_param("client_id", "key"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"{"access_token":"tok","expires_in":2592000}"#, "application/json"),
        )
        .expect(1)
        .mount(server)
        .await;

    let cleaned = serde_json::json!({ "image": STANDARD.encode(b"cleaned-bytes") }).to_string();
    Mock::given(method("POST"))
        .and(path("/rest/2.0/image-process/v1/remove_watermark"))
        .and(query_param("access_token", "tok"))
        .and(body_string_contains("image="))
        .respond_with(ResponseTemplate::new(200).set_body_raw(cleaned, "application/json"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_page_with_baidu_writes_original_and_cleaned() {
    let server = MockServer::start().await;
    mount_html(&server, "/wm", &gallery(&["/img/a.png", "/img/b.png"])).await;
    mount_png(&server, "/img/a.png").await;
    mount_png(&server, "/img/b.png").await;
    mount_baidu(&server).await;
    let dir = TempDir::new().unwrap();

    let harvester = Harvester::new(baidu_config(&dir, server.uri())).unwrap();
    let job = PageJob::new(format!("{}/wm", server.uri())).remove_watermark(None);
    let result = harvester.run_page(&job).await;

    assert!(result.success, "{}", result.message);
    assert_eq!(result.success_count, 2);
    for name in ["a.jpg", "b.jpg"] {
        let original = std::fs::read(dir.path().join("original").join(name)).unwrap();
        assert_eq!(image::guess_format(&original).unwrap(), image::ImageFormat::Jpeg);
        let cleaned = std::fs::read(dir.path().join("cleaned").join(name)).unwrap();
        assert_eq!(cleaned, b"cleaned-bytes");
    }

    let stats = result.watermark_stats.unwrap();
    assert!(stats.enabled);
    assert_eq!(stats.provider, "baidu");
    assert_eq!((stats.processed_count, stats.success_count, stats.fail_count), (2, 2, 0));
    assert_eq!(harvester.watermark_service().usage_count("baidu"), 2);
}

#[tokio::test]
async fn test_baidu_error_keeps_original() {
    let server = MockServer::start().await;
    mount_html(&server, "/wm", &gallery(&["/img/a.png"])).await;
    mount_png(&server, "/img/a.png").await;
    Mock::given(method("GET"))
        .and(path("/oauth/2.0/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"{"access_token":"tok","expires_in":2592000}"#, "application/json"),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/2.0/image-process/v1/remove_watermark"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"error_code":17,"error_msg":"Open api daily request limit reached"}"#,
            "application/json",
        ))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();

    let harvester = Harvester::new(baidu_config(&dir, server.uri())).unwrap();
    let job = PageJob::new(format!("{}/wm", server.uri())).remove_watermark(None);
    let result = harvester.run_page(&job).await;

    assert!(result.success);
    assert_eq!(result.success_count, 1);
    assert!(dir.path().join("original").join("a.jpg").exists());
    assert!(!dir.path().join("cleaned").join("a.jpg").exists());

    let stats = result.watermark_stats.unwrap();
    assert_eq!((stats.processed_count, stats.fail_count), (1, 1));
    assert!(stats.failure_reasons[0].contains("daily request limit"));
}

#[tokio::test]
async fn test_disabled_provider_is_not_counted() {
    let server = MockServer::start().await;
    mount_html(&server, "/wm", &gallery(&["/img/a.png"])).await;
    mount_png(&server, "/img/a.png").await;
    let dir = TempDir::new().unwrap();

    let harvester = Harvester::new(test_config(dir.path())).unwrap();
    let job = PageJob::new(format!("{}/wm", server.uri())).remove_watermark(None);
    let result = harvester.run_page(&job).await;

    assert!(result.success);
    let stats = result.watermark_stats.unwrap();
    assert!(!stats.enabled);
    assert_eq!(stats.provider, "disabled");
    assert_eq!(stats.processed_count, 0);
    assert!(dir.path().join("original").join("a.jpg").exists());
}

fn tencent(endpoint: String) -> TencentProvider {
    TencentProvider::new(
        reqwest::Client::new(),
        TencentConfig {
            enabled: true,
            secret_id: "AKIDEXAMPLE".into(),
            secret_key: "SECRETEXAMPLE".into(),
            region: "ap-shanghai".into(),
            endpoint,
        },
    )
}

#[tokio::test]
async fn test_tencent_signed_request() {
    let server = MockServer::start().await;
    let body = serde_json::json!({
        "Response": { "WatermarkFreeImage": STANDARD.encode(b"clean"), "RequestId": "r-1" }
    })
    .to_string();
    Mock::given(method("POST"))
        .and(path("/"))
        .and(header("x-tc-action", "RemoveWatermark"))
        .and(header("x-tc-version", "2019-05-29"))
        .and(header("x-tc-region", "ap-shanghai"))
        .and(header_exists("x-tc-timestamp"))
        .and(header_exists("authorization"))
        .and(body_string_contains("\"Image\""))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/json"))
        .expect(1)
        .mount(&server)
        .await;

    let provider = tencent(server.uri());
    assert!(provider.is_available());
    let cleaned = provider.remove(&png_bytes()).await.unwrap();
    assert_eq!(cleaned, b"clean");
}

#[tokio::test]
async fn test_tencent_error_is_reported() {
    let server = MockServer::start().await;
    let body = serde_json::json!({
        "Response": {
            "Error": { "Code": "AuthFailure.SignatureFailure", "Message": "bad signature" },
            "RequestId": "r-2"
        }
    })
    .to_string();
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/json"))
        .mount(&server)
        .await;

    let err = tencent(server.uri()).remove(b"img").await.unwrap_err();
    assert!(err.to_string().contains("AuthFailure.SignatureFailure"));
}
