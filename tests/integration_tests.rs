//! End-to-end tests for deppkg
//! Builds the full application against mocked feed and session services and
//! the in-memory store

use axum::http::{HeaderValue, StatusCode, header};
use axum_test::TestServer;
use mockito::{Mock, Server, ServerGuard};
use serde_json::{Value, json};

use deppkg::config::StoreBackend;
use deppkg::{App, Config, create_app};

mod fixtures {
    //! Test fixtures and sample data

    pub const FEED: &str = r#"{
        "$meta": {"advisory": "metadata", "timestamp": 1700000000},
        "django": [
            {"id": "pyup.io-12345", "cve": "CVE-2021-0001", "v": "<3.2.1"},
            {"id": "pyup.io-22222", "cve": null, "v": "<2.0"}
        ],
        "jinja2": [
            {"id": "pyup.io-39525", "cve": "CVE-2019-10906", "v": "<2.10.1"}
        ]
    }"#;

    pub const SAFETY_V2_REPORT: &str = r#"{
        "report_meta": {"scan_target": "environment"},
        "vulnerabilities": [
            {
                "vulnerability_id": "12345",
                "package_name": "django",
                "analyzed_version": "3.2.0",
                "advisory": "SQL injection in QuerySet.order_by"
            },
            {
                "vulnerability_id": 39525,
                "package_name": "Jinja2",
                "analyzed_version": "2.10",
                "advisory": "Sandbox escape"
            },
            {
                "vulnerability_id": "51000",
                "package_name": "urllib3",
                "analyzed_version": "1.24",
                "advisory": "CRLF injection"
            }
        ]
    }"#;

    pub const CYCLONEDX_BOM: &str = r#"{
        "bomFormat": "CycloneDX",
        "specVersion": "1.4",
        "components": [
            {"name": "left-pad", "version": "1.3.0", "licenses": [{"license": {"id": "MIT"}}]},
            {"name": "lodash", "version": "4.17.21", "licenses": [{"expression": "MIT OR CC0-1.0"}]},
            {"name": "internal-utils", "version": "0.1.0", "description": "in-house helpers"}
        ]
    }"#;
}

struct Harness {
    server: TestServer,
    app: App,
    _feed: (ServerGuard, Mock),
    validator: ServerGuard,
}

async fn feed_server() -> (ServerGuard, Mock) {
    let mut feed = Server::new_async().await;
    let mock = feed
        .mock("GET", "/insecure_full.json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(fixtures::FEED)
        .create_async()
        .await;
    (feed, mock)
}

fn test_config(feed: &ServerGuard, validator: &ServerGuard) -> Config {
    let mut config = Config::default();
    config.database.backend = StoreBackend::Memory;
    config.feed.url = format!("{}/insecure_full.json", feed.url());
    config.auth.validator_url = format!("{}/msapi/validateuser", validator.url());
    config.resilience.retry_delay_ms = 1;
    config
}

async fn harness() -> Harness {
    let feed = feed_server().await;
    let validator = Server::new_async().await;
    let config = test_config(&feed.0, &validator);

    let app = create_app(&config).await.expect("Failed to create app");
    let server = TestServer::new(app.router.clone()).expect("Failed to create test server");

    Harness {
        server,
        app,
        _feed: feed,
        validator,
    }
}

async fn accept_session(validator: &mut ServerGuard) -> Mock {
    validator
        .mock("GET", "/msapi/validateuser")
        .match_header("cookie", "session=valid")
        .with_status(200)
        .create_async()
        .await
}

fn cookie() -> HeaderValue {
    HeaderValue::from_static("session=valid")
}

fn body(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap()
}

#[tokio::test]
async fn test_bom_upload_and_replace() {
    let mut harness = harness().await;
    let _session = accept_session(&mut harness.validator).await;

    let response = harness
        .server
        .post("/msapi/deppkg")
        .add_query_param("compid", 101)
        .add_query_param("deptype", "sbom")
        .add_header(header::COOKIE, cookie())
        .json(&body(fixtures::CYCLONEDX_BOM))
        .await;

    response.assert_status_ok();
    let payload: Value = response.json();
    assert_eq!(payload["component_id"], 101);
    assert_eq!(payload["dependency_type"], "license");
    assert_eq!(payload["count"], 3);

    // A second upload replaces the generation instead of appending
    let response = harness
        .server
        .post("/msapi/deppkg")
        .add_query_param("compid", 101)
        .add_query_param("deptype", "license")
        .add_header(header::COOKIE, cookie())
        .json(&json!({"components": [{"name": "left-pad", "version": "1.3.1"}]}))
        .await;

    response.assert_status_ok();
    let payload: Value = response.json();
    assert_eq!(payload["count"], 1);

    harness.app.shutdown();
}

#[tokio::test]
async fn test_scan_upload_resolves_cves() {
    let mut harness = harness().await;
    let _session = accept_session(&mut harness.validator).await;

    let response = harness
        .server
        .post("/msapi/deppkg")
        .add_query_param("compid", 202)
        .add_query_param("deptype", "cve")
        .add_header(header::COOKIE, cookie())
        .json(&body(fixtures::SAFETY_V2_REPORT))
        .await;

    response.assert_status_ok();
    let payload: Value = response.json();
    assert_eq!(payload["dependency_type"], "cve");
    assert_eq!(payload["count"], 3);
}

#[tokio::test]
async fn test_missing_session_is_unauthorized() {
    let harness = harness().await;

    let response = harness
        .server
        .post("/msapi/deppkg")
        .add_query_param("compid", 101)
        .add_query_param("deptype", "license")
        .json(&body(fixtures::CYCLONEDX_BOM))
        .expect_failure()
        .await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    let payload: Value = response.json();
    assert_eq!(payload["code"], "AUTHORIZATION_ERROR");
}

#[tokio::test]
async fn test_rejected_session_is_unauthorized() {
    let mut harness = harness().await;
    let _reject = harness
        .validator
        .mock("GET", "/msapi/validateuser")
        .with_status(403)
        .create_async()
        .await;

    let response = harness
        .server
        .delete("/msapi/deppkg")
        .add_query_param("compid", 101)
        .add_header(header::COOKIE, HeaderValue::from_static("session=stale"))
        .expect_failure()
        .await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_delete_single_type_then_component() {
    let mut harness = harness().await;
    let _session = accept_session(&mut harness.validator).await;

    for (deptype, report) in [
        ("license", fixtures::CYCLONEDX_BOM),
        ("cve", fixtures::SAFETY_V2_REPORT),
    ] {
        harness
            .server
            .post("/msapi/deppkg")
            .add_query_param("comp_id", 303)
            .add_query_param("deptype", deptype)
            .add_header(header::COOKIE, cookie())
            .json(&body(report))
            .await
            .assert_status_ok();
    }

    let response = harness
        .server
        .delete("/msapi/deppkg")
        .add_query_param("compid", 303)
        .add_query_param("deptype", "cve")
        .add_header(header::COOKIE, cookie())
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["count"], 3);

    let response = harness
        .server
        .delete("/msapi/deppkg")
        .add_query_param("compid", 303)
        .add_header(header::COOKIE, cookie())
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["count"], 3);
}

#[tokio::test]
async fn test_malformed_report_is_rejected() {
    let mut harness = harness().await;
    let _session = accept_session(&mut harness.validator).await;

    let response = harness
        .server
        .post("/msapi/deppkg")
        .add_query_param("compid", 404)
        .add_query_param("deptype", "scan")
        .add_header(header::COOKIE, cookie())
        .json(&json!([{"package_name": "django"}]))
        .expect_failure()
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let payload: Value = response.json();
    assert_eq!(payload["code"], "CLIENT_INPUT_ERROR");
    assert!(
        payload["details"]["error"]
            .as_str()
            .unwrap()
            .contains("findings[0].vulnerability_id")
    );
}

#[tokio::test]
async fn test_startup_fails_without_feed() {
    let mut feed = Server::new_async().await;
    let _mock = feed
        .mock("GET", "/insecure_full.json")
        .with_status(500)
        .create_async()
        .await;
    let validator = Server::new_async().await;

    let result = create_app(&test_config(&feed, &validator)).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_startup_fails_with_empty_feed() {
    let mut feed = Server::new_async().await;
    let _mock = feed
        .mock("GET", "/insecure_full.json")
        .with_status(200)
        .with_body(r#"{"$meta": {"advisory": "metadata"}}"#)
        .create_async()
        .await;
    let validator = Server::new_async().await;

    let result = create_app(&test_config(&feed, &validator)).await;
    assert!(result.is_err());
}
