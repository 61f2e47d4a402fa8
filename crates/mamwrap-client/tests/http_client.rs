//! PlatformClient against a scripted local HTTP server.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use serde_json::{json, Value};
use tiny_http::{Response, Server};

use mamwrap_client::{ClientConfig, PlatformClient, RegionConfig, Session, Transport};
use mamwrap_contracts::{
    error::MamError,
    ids::Psk,
    job::{SigningStatus, WrapStatus, WrapSubmission},
    policy::{ActiveFlagMap, FlagValue},
    rule::ReconciliationAction,
};
use mamwrap_core::traits::{
    AppDetailService, PolicyQueryService, PublishService, SigningService, Uploader, WrapService,
};
use mamwrap_core::Publisher;

// ── Harness ──────────────────────────────────────────────────────────────────

struct Recorded {
    method: String,
    url: String,
    headers: Vec<(String, String)>,
    body: String,
}

impl Recorded {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    fn json(&self) -> Value {
        serde_json::from_str(&self.body).expect("request body is JSON")
    }
}

/// Serve one scripted reply per expected request, then hand back what was
/// received.
fn serve(replies: Vec<(u16, &str)>) -> (String, JoinHandle<Vec<Recorded>>) {
    let server = Server::http("127.0.0.1:0").expect("http server");
    let base = format!("http://{}", server.server_addr());
    let replies: Vec<(u16, String)> = replies.into_iter().map(|(s, b)| (s, b.to_string())).collect();

    let handle = thread::spawn(move || {
        let mut seen = Vec::new();
        for (status, body) in replies {
            let mut request = server.recv().expect("request");
            let mut received = String::new();
            request.as_reader().read_to_string(&mut received).expect("read body");
            seen.push(Recorded {
                method: request.method().to_string(),
                url: request.url().to_string(),
                headers: request
                    .headers()
                    .iter()
                    .map(|h| (h.field.as_str().to_string(), h.value.as_str().to_string()))
                    .collect(),
                body: received,
            });
            request
                .respond(Response::from_string(body).with_status_code(status))
                .expect("respond");
        }
        seen
    });

    (base, handle)
}

fn config_for(base: &str) -> ClientConfig {
    let mut config = ClientConfig::default();
    config.regions.insert(
        "local".to_string(),
        RegionConfig {
            rpc_url: format!("{}/rpc", base),
            rest_url: base.to_string(),
            uploader_url: format!("{}/files", base),
        },
    );
    config.region = "local".to_string();
    config.timeout_secs = 5;
    config
}

fn client_for(base: &str) -> PlatformClient {
    let session = Session::new(
        "rest-token".to_string().into(),
        "rpc-token".to_string().into(),
        Some(Psk::new("55")),
    );
    PlatformClient::with_session(&config_for(base), session).expect("client")
}

// ── Session ──────────────────────────────────────────────────────────────────

#[test]
fn login_authenticates_against_both_apis() {
    let (base, server) = serve(vec![
        (200, r#"{"token": "rest-abc", "user_psk": 55}"#),
        (200, r#"{"result": {"token": "rpc-xyz"}}"#),
    ]);

    let transport = Transport::new(&config_for(&base)).unwrap();
    let session = Session::login(&transport, "ops@example.com", &"hunter2".to_string().into()).unwrap();
    let seen = server.join().unwrap();

    assert_eq!(session.user_psk(), Some(&Psk::new("55")));
    assert!(!format!("{:?}", session).contains("rpc-xyz"));

    assert_eq!(seen[0].method, "POST");
    assert_eq!(seen[0].url, "/users/authenticate/");
    assert_eq!(seen[0].json(), json!({ "user_id": "ops@example.com", "password": "hunter2" }));

    assert_eq!(seen[1].url, "/rpc");
    assert_eq!(seen[1].header("X-Ds-Client-Type"), Some("9"));
    let rpc = seen[1].json();
    assert_eq!(rpc["method"], "com.apperian.eas.user.authenticateuser");
    assert_eq!(rpc["jsonrpc"], "2.0");
    assert_eq!(rpc["apiVersion"], "1.0");
    assert_eq!(rpc["params"], json!({ "email": "ops@example.com", "password": "hunter2" }));
}

#[test]
fn login_rejected_by_rpc_is_api_error() {
    let (base, server) = serve(vec![
        (200, r#"{"token": "rest-abc"}"#),
        (200, r#"{"error": {"message": "Invalid credentials"}}"#),
    ]);

    let transport = Transport::new(&config_for(&base)).unwrap();
    let result = Session::login(&transport, "ops@example.com", &"wrong".to_string().into());
    server.join().unwrap();

    match result {
        Err(MamError::Api { message }) => assert_eq!(message, "Invalid credentials"),
        other => panic!("expected Api error, got {:?}", other),
    }
}

#[test]
fn client_token_header_sent_when_configured() {
    let (base, server) = serve(vec![(200, r#"{"result": {"ver_status": 2}}"#)]);

    let mut config = config_for(&base);
    config.client_token = Some("client-secret".to_string().into());
    let session = Session::new("r".to_string().into(), "p".to_string().into(), None);
    let client = PlatformClient::with_session(&config, session).unwrap();

    client.wrap_status(&Psk::new("7")).unwrap();
    let seen = server.join().unwrap();
    assert_eq!(seen[0].header("X-HTTP-Token"), Some("client-secret"));
}

// ── Wrap ─────────────────────────────────────────────────────────────────────

#[test]
fn wrap_status_parses_result() {
    let (base, server) = serve(vec![(
        200,
        r#"{"result": {"ver_status": 4, "ver_psk": 70, "apperian_wrapper_info": {"wrapper_version": "3.2.1"}}}"#,
    )]);

    let status = client_for(&base).wrap_status(&Psk::new("7")).unwrap();
    let seen = server.join().unwrap();

    assert_eq!(status.status(), WrapStatus::CompletedNoPolicies);
    assert_eq!(status.apperian_wrapper_info.wrapper_version, json!("3.2.1"));

    let rpc = seen[0].json();
    assert_eq!(rpc["method"], "com.apperian.eas.apps.getversionstatus");
    assert_eq!(rpc["params"], json!({ "appPsk": "7", "token": "rpc-token" }));
    assert!(seen[0].header("X-TOKEN").is_none());
}

#[test]
fn submit_wrap_sends_flags_policy_and_credentials() {
    let (base, server) = serve(vec![(200, r#"{"result": {"status": "queued"}}"#)]);

    let mut flags = BTreeMap::new();
    flags.insert("com.apperian.datawipe".to_string(), FlagValue::On);
    flags.insert("com.apperian.emmcompliance".to_string(), FlagValue::Off);
    let submission = WrapSubmission {
        app_psk: Psk::new("7"),
        version_psk: Psk::new("70"),
        active_flags: ActiveFlagMap::new(flags),
        action: ReconciliationAction::None,
        wrapper_version: json!("3.2.1"),
    };

    client_for(&base).submit_wrap(&submission).unwrap();
    let seen = server.join().unwrap();

    let rpc = seen[0].json();
    assert_eq!(rpc["method"], "com.apperian.eas.apps.wrapappasync");
    let params = &rpc["params"];
    assert_eq!(params["appPsk"], "7");
    assert_eq!(params["data"], json!({ "com.apperian.datawipe": 1, "com.apperian.emmcompliance": 0 }));
    assert_eq!(
        params["dynamicPolicyInfo"],
        json!({ "policy_data": { "action": "nothing", "policy_data": null } })
    );
    assert_eq!(params["apperianWrapperVersion"], "3.2.1");
    assert_eq!(params["userPsk"], "55");
    assert_eq!(params["pythonAuthToken"], "rpc-token");
    assert_eq!(params["token"], "rpc-token");
}

/// Psks go back to the platform as the JSON type they arrived as.
#[test]
fn submit_wrap_echoes_numeric_psks() {
    let (base, server) = serve(vec![
        (200, r#"{"token": "rest-abc", "user_psk": 55}"#),
        (200, r#"{"result": {"token": "rpc-xyz"}}"#),
        (200, r#"{"result": {"status": "queued"}}"#),
    ]);

    let config = config_for(&base);
    let session = Session::login(&Transport::new(&config).unwrap(), "ops@example.com", &"hunter2".to_string().into())
        .unwrap();
    let client = PlatformClient::with_session(&config, session).unwrap();
    let submission = WrapSubmission {
        app_psk: serde_json::from_value(json!(7)).unwrap(),
        version_psk: Psk::new("70"),
        active_flags: ActiveFlagMap::new(BTreeMap::new()),
        action: ReconciliationAction::None,
        wrapper_version: Value::Null,
    };
    client.submit_wrap(&submission).unwrap();
    let seen = server.join().unwrap();

    let params = &seen[2].json()["params"];
    assert_eq!(params["userPsk"], json!(55));
    assert_eq!(params["appPsk"], json!(7));
    assert_eq!(params["pythonAuthToken"], "rpc-xyz");
}

#[test]
fn submit_wrap_error_key_fails() {
    let (base, server) = serve(vec![(200, r#"{"error": "App is locked"}"#)]);

    let submission = WrapSubmission {
        app_psk: Psk::new("7"),
        version_psk: Psk::new("70"),
        active_flags: ActiveFlagMap::new(BTreeMap::new()),
        action: ReconciliationAction::None,
        wrapper_version: Value::Null,
    };
    let result = client_for(&base).submit_wrap(&submission);
    server.join().unwrap();

    assert!(matches!(result, Err(MamError::Api { message }) if message == "App is locked"));
}

// ── Policy query and app detail ──────────────────────────────────────────────

#[test]
fn existing_policy_reads_snapshot() {
    let (base, server) = serve(vec![(
        200,
        r#"{"policies": [{"psk": 900, "rules": [{"psk": 901, "name": "Datawipe"}]}]}"#,
    )]);

    let snapshot = client_for(&base).existing_policy(&Psk::new("70")).unwrap();
    let seen = server.join().unwrap();

    assert_eq!(seen[0].method, "GET");
    assert_eq!(seen[0].url, "/rpc/policies/dynamic/policy/version/70");
    assert_eq!(seen[0].header("X-Ds-Client-Type"), Some("9"));
    assert_eq!(snapshot.policy_psk(), Some(&Psk::new("900")));
    assert!(snapshot.rule_named("Datawipe").is_some());
}

#[test]
fn existing_policy_not_found_is_empty() {
    let (base, server) = serve(vec![(404, r#"{"detail": "Not found"}"#)]);

    let snapshot = client_for(&base).existing_policy(&Psk::new("70")).unwrap();
    server.join().unwrap();

    assert!(!snapshot.has_rules());
    assert!(snapshot.policy_psk().is_none());
}

#[test]
fn existing_policy_server_error_propagates() {
    let (base, server) = serve(vec![(500, "Internal Server Error")]);

    let result = client_for(&base).existing_policy(&Psk::new("70"));
    server.join().unwrap();

    assert!(matches!(result, Err(MamError::Http { status: 500, .. })));
}

#[test]
fn version_detail_uses_rest_token() {
    let (base, server) = serve(vec![(
        200,
        r#"{"application": {"version": {"psk": 70, "signing_status": "in_progress"}}}"#,
    )]);

    let detail = client_for(&base).version_detail(&Psk::new("7")).unwrap();
    let seen = server.join().unwrap();

    assert_eq!(seen[0].url, "/v1/applications/7");
    assert_eq!(seen[0].header("X-TOKEN"), Some("rest-token"));
    assert_eq!(detail.psk, Psk::new("70"));
    assert_eq!(detail.signing_status, Some(SigningStatus::InProgress));
}

#[test]
fn version_detail_missing_version_is_malformed() {
    let (base, server) = serve(vec![(200, r#"{"application": {}}"#)]);

    let result = client_for(&base).version_detail(&Psk::new("7"));
    server.join().unwrap();

    match result {
        Err(MamError::MalformedResponse { reason, .. }) => {
            assert_eq!(reason, "missing key 'application.version'")
        }
        other => panic!("expected MalformedResponse, got {:?}", other),
    }
}

// ── Signing and credentials ──────────────────────────────────────────────────

#[test]
fn submit_signing_puts_credential() {
    let (base, server) = serve(vec![(200, r#"{"signing_status": "in_progress"}"#)]);

    let status = client_for(&base)
        .submit_signing(&Psk::new("7"), &Psk::new("cred-1"))
        .unwrap();
    let seen = server.join().unwrap();

    assert_eq!(seen[0].method, "PUT");
    assert_eq!(seen[0].url, "/v1/applications/7/credentials/cred-1");
    assert_eq!(status, SigningStatus::InProgress);
}

#[test]
fn submit_signing_without_status_is_not_started() {
    let (base, server) = serve(vec![(200, "{}")]);

    let status = client_for(&base)
        .submit_signing(&Psk::new("7"), &Psk::new("cred-1"))
        .unwrap();
    server.join().unwrap();

    assert_eq!(status, SigningStatus::NotStarted);
}

#[test]
fn credentials_lists_entries() {
    let (base, server) = serve(vec![(
        200,
        r#"{"credentials": [{"psk": 3, "description": "Enterprise 2026", "platform": 1}]}"#,
    )]);

    let credentials = client_for(&base).credentials().unwrap();
    let seen = server.join().unwrap();

    assert_eq!(seen[0].url, "/v1/credentials/");
    assert_eq!(credentials.len(), 1);
    assert_eq!(credentials[0].psk, Psk::new("3"));
    assert_eq!(credentials[0].description.as_deref(), Some("Enterprise 2026"));
}

// ── Publishing ───────────────────────────────────────────────────────────────

#[test]
fn upload_posts_multipart_file() {
    let (base, server) = serve(vec![(200, r#"{"fileID": "file-77"}"#)]);

    let mut binary = tempfile::NamedTempFile::new().unwrap();
    binary.write_all(b"binary-bytes").unwrap();

    let file_id = client_for(&base).upload("tx-9", binary.path()).unwrap();
    let seen = server.join().unwrap();

    assert_eq!(file_id, "file-77");
    assert_eq!(seen[0].method, "POST");
    assert_eq!(seen[0].url, "/files/upload?transactionID=tx-9");
    assert!(seen[0].header("Content-Type").unwrap_or_default().starts_with("multipart/form-data"));
    assert!(seen[0].body.contains("name=\"LUuploadFile\""));
    assert!(seen[0].body.contains("binary-bytes"));
}

#[test]
fn upload_failure_carries_fallback_command() {
    let (base, server) = serve(vec![(500, "disk full")]);

    let binary = tempfile::NamedTempFile::new().unwrap();
    let result = client_for(&base).upload("tx-9", binary.path());
    server.join().unwrap();

    match result {
        Err(MamError::Upload { raw, fallback_command }) => {
            assert_eq!(raw, "disk full");
            assert_eq!(
                fallback_command,
                format!(
                    "curl --form LUuploadFile=@{} {}/files/upload?transactionID=tx-9",
                    binary.path().display(),
                    base
                )
            );
        }
        other => panic!("expected Upload error, got {:?}", other),
    }
}

#[test]
fn upload_of_missing_file_fails_without_request() {
    let client = client_for("http://127.0.0.1:9");
    let result = client.upload("tx-9", std::path::Path::new("/nonexistent/app.ipa"));
    assert!(matches!(result, Err(MamError::Upload { .. })));
}

#[test]
fn publish_runs_transaction_upload_publish() {
    let (base, server) = serve(vec![
        (200, r#"{"result": {"transactionID": "tx-1"}}"#),
        (200, r#"{"fileID": "file-2"}"#),
        (200, r#"{"result": {"appID": 3001}}"#),
    ]);

    let mut binary = tempfile::NamedTempFile::new().unwrap();
    binary.write_all(b"apk").unwrap();

    let client = Arc::new(client_for(&base));
    let publisher = Publisher::new(client.clone(), client);
    let metadata = json!({ "name": "Field Notes", "version": "2.0" });
    let app_id = publisher.publish(binary.path(), &metadata).unwrap();
    let seen = server.join().unwrap();

    assert_eq!(app_id, Psk::new("3001"));
    assert!(app_id.is_numeric());
    assert_eq!(seen[0].json()["method"], "com.apperian.eas.apps.create");
    assert_eq!(seen[1].url, "/files/upload?transactionID=tx-1");
    let publish = seen[2].json();
    assert_eq!(publish["method"], "com.apperian.eas.apps.publish");
    assert_eq!(
        publish["params"],
        json!({
            "EASEmetadata": metadata,
            "files": { "application": "file-2" },
            "transactionID": "tx-1",
            "token": "rpc-token",
        })
    );
}

#[test]
fn create_transaction_missing_id_is_malformed() {
    let (base, server) = serve(vec![(200, r#"{"result": {}}"#)]);

    let result = client_for(&base).create_transaction();
    server.join().unwrap();

    assert!(matches!(result, Err(MamError::MalformedResponse { .. })));
}

#[test]
fn unreachable_host_is_transport_error() {
    let result = client_for("http://127.0.0.1:9").wrap_status(&Psk::new("7"));
    assert!(matches!(result, Err(MamError::Transport { .. })));
}
