#![allow(clippy::unwrap_used)]
// Integration tests for `RestconfClient` and `SystemPersistence` using wiremock.

use pretty_assertions::assert_eq;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use netconfd_api::{Credentials, Error, RestconfClient, SystemPersistence};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, RestconfClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = RestconfClient::with_client(reqwest::Client::new(), base_url, None);
    (server, client)
}

// ── Reads ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_get_list_entry() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/restconf/data/sonic-port:sonic-port/PORT/PORT_LIST=Ethernet0"))
        .and(header("accept", "application/yang-data+json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sonic-port:PORT_LIST": [{ "name": "Ethernet0", "mtu": 9100 }]
        })))
        .mount(&server)
        .await;

    let value = client
        .get("/sonic-port:sonic-port/PORT/PORT_LIST[name=Ethernet0]")
        .await
        .unwrap();
    assert_eq!(value["sonic-port:PORT_LIST"][0]["mtu"], json!(9100));
}

#[tokio::test]
async fn test_get_no_content_is_empty_object() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/restconf/data/sonic-vlan:sonic-vlan"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let value = client.get("/sonic-vlan:sonic-vlan").await.unwrap();
    assert_eq!(value, json!({}));
}

#[tokio::test]
async fn test_not_found_is_classified() {
    let (server, client) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/restconf/data/sonic-vlan:sonic-vlan/VLAN/VLAN_LIST=Vlan10"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "ietf-restconf:errors": { "error": [{
                "error-type": "application",
                "error-tag": "data-missing",
                "error-message": "Resource not found"
            }]}
        })))
        .mount(&server)
        .await;

    let err = client
        .delete("/sonic-vlan:sonic-vlan/VLAN/VLAN_LIST[name=Vlan10]")
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "expected not-found, got: {err:?}");
    assert_eq!(err.to_string(), "Resource not found");
}

#[tokio::test]
async fn test_modules_state() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/restconf/data/ietf-yang-library:modules-state"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ietf-yang-library:modules-state": {
                "module-set-id": "a1b2",
                "module": [{
                    "name": "sonic-port",
                    "revision": "2019-07-01",
                    "namespace": "http://github.com/Azure/sonic-port",
                    "conformance-type": "implement"
                }]
            }
        })))
        .mount(&server)
        .await;

    let modules = client.modules_state().await.unwrap();
    assert_eq!(modules.module_set_id, "a1b2");
    assert_eq!(modules.module.len(), 1);
    assert_eq!(modules.module[0].name, "sonic-port");
    assert_eq!(modules.module[0].conformance_type.as_deref(), Some("implement"));
}

// ── Writes ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_merge_sends_patch_with_basic_auth() {
    let server = MockServer::start().await;
    let client = RestconfClient::with_client(
        reqwest::Client::new(),
        Url::parse(&server.uri()).unwrap(),
        Some(Credentials {
            username: "admin".into(),
            password: "secret".to_string().into(),
        }),
    );
    let body = json!({ "sonic-port:PORT": { "PORT_LIST": [{ "name": "Ethernet0", "mtu": 9100 }] } });

    Mock::given(method("PATCH"))
        .and(path("/restconf/data/sonic-port:sonic-port"))
        .and(header("authorization", "Basic YWRtaW46c2VjcmV0"))
        .and(body_json(body.clone()))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client.merge("/sonic-port:sonic-port", &body).await.unwrap();
}

#[tokio::test]
async fn test_create_conflict_surfaces_server_message() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/restconf/data/sonic-vlan:sonic-vlan"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "ietf-restconf:errors": { "error": [{
                "error-tag": "resource-denied",
                "error-message": "Entry already exists"
            }]}
        })))
        .mount(&server)
        .await;

    let result = client.create("/sonic-vlan:sonic-vlan", &json!({})).await;
    assert!(
        matches!(result, Err(Error::Restconf { status: 409, ref message, .. }) if message == "Entry already exists"),
        "unexpected result: {result:?}"
    );
}

#[tokio::test]
async fn test_invoke_action() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/restconf/operations/sonic-rpc:clear-counters"))
        .and(body_json(json!({ "sonic-rpc:input": { "interface": "Ethernet0" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sonic-rpc:output": { "status": 0 }
        })))
        .mount(&server)
        .await;

    let out = client
        .invoke(
            "/sonic-rpc:clear-counters",
            &json!({ "sonic-rpc:input": { "interface": "Ethernet0" } }),
        )
        .await
        .unwrap();
    assert_eq!(out["sonic-rpc:output"]["status"], json!(0));
}

// ── Persistence ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_upload_startup_accepts_created() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let startup = dir.path().join("config_db.json");
    std::fs::write(&startup, r#"{"PORT":{}}"#).unwrap();

    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let persistence = SystemPersistence::with_client(reqwest::Client::new(), "true", &startup);
    persistence
        .upload_startup(&format!("{}/upload", server.uri()))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_upload_startup_rejects_other_statuses() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let startup = dir.path().join("config_db.json");
    std::fs::write(&startup, "{}").unwrap();

    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let persistence = SystemPersistence::with_client(reqwest::Client::new(), "true", &startup);
    let result = persistence
        .upload_startup(&format!("{}/upload", server.uri()))
        .await;
    assert!(matches!(result, Err(Error::UploadRejected { status: 202, .. })));
}

#[tokio::test]
async fn test_save_running_reports_command_failure() {
    let persistence =
        SystemPersistence::with_client(reqwest::Client::new(), "echo boom >&2; exit 3", "/nonexistent");
    let err = persistence.save_running().await.unwrap_err();
    assert!(
        matches!(&err, Error::Command { message, .. } if message.contains("exit status 3") && message.contains("boom")),
        "unexpected error: {err:?}"
    );
}
