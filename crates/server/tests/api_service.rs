//! Health, config and provider API tests.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{TestConfig, TestFixture, SECRET_KEY};

#[tokio::test]
async fn test_health_reports_engine_state() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/health").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
    assert_eq!(response.body["engine_running"], false);
    assert!(response.body["dependencies"]["tools"].is_array());
}

#[tokio::test]
async fn test_health_with_running_engine() {
    let fixture = TestFixture::with_config(TestConfig::with_engine()).await;

    let response = fixture.get("/api/v1/health").await;
    assert_eq!(response.body["engine_running"], true);

    fixture.engine.stop().await;
    let response = fixture.get("/api/v1/health").await;
    assert_eq!(response.body["engine_running"], false);
}

#[tokio::test]
async fn test_config_hides_api_keys() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/config").await;

    assert_status!(response, StatusCode::OK);
    let raw = response.body.to_string();
    assert!(!raw.contains(SECRET_KEY), "API key leaked: {}", raw);
    assert_eq!(
        response.body["providers"]["openrouter"]["api_key_configured"],
        true
    );
    assert_eq!(response.body["providers"]["default"], "openrouter");
    assert_eq!(response.body["engine"]["workers"], 1);
    assert!(response.body["providers"].get("openai").is_none());
}

#[tokio::test]
async fn test_list_providers() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/providers").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["default"], "openrouter");
    assert_eq!(response.body["providers"], json!(["ollama", "openrouter"]));
}

#[tokio::test]
async fn test_update_credentials_reaches_provider() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .put(
            "/api/v1/providers/openrouter/credentials",
            json!({ "api_key": "sk-or-rotated" }),
        )
        .await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["provider"], "openrouter");
    assert_eq!(response.body["updated"], true);
    assert_eq!(fixture.provider.credential_updates(), 1);
    assert!(!response.body.to_string().contains("sk-or-rotated"));
}

#[tokio::test]
async fn test_update_credentials_unknown_provider() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .put(
            "/api/v1/providers/anthropic/credentials",
            json!({ "api_key": "sk-test" }),
        )
        .await;

    assert_status!(response, StatusCode::NOT_FOUND);
    assert_eq!(response.body["error"], "Provider not found: anthropic");
}

#[tokio::test]
async fn test_update_credentials_unsupported_by_provider() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .put(
            "/api/v1/providers/ollama/credentials",
            json!({ "api_key": "sk-test" }),
        )
        .await;

    assert_status!(response, StatusCode::UNPROCESSABLE_ENTITY);

    let response = fixture
        .put(
            "/api/v1/providers/ollama/credentials",
            json!({ "api_base": "http://gpu-box:11434" }),
        )
        .await;
    assert_status!(response, StatusCode::OK);
}

#[tokio::test]
async fn test_update_credentials_requires_a_field() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .put("/api/v1/providers/openrouter/credentials", json!({}))
        .await;

    assert_status!(response, StatusCode::BAD_REQUEST);
    assert_eq!(fixture.provider.credential_updates(), 0);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/lectures").await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
}
