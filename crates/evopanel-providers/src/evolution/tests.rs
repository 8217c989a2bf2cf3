use super::*;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// What the fake Evolution server saw: (path, apikey header, query, body).
type Seen = Arc<Mutex<Vec<(String, String, HashMap<String, String>, Value)>>>;

fn record(seen: &Seen, path: String, headers: &HeaderMap, query: HashMap<String, String>, body: Value) {
    let key = headers
        .get("apikey")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    seen.lock().unwrap().push((path, key, query, body));
}

async fn send_text(
    State(seen): State<Seen>,
    Path(instance): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    record(&seen, format!("/message/sendText/{instance}"), &headers, HashMap::new(), body);
    if instance == "broken" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"status": 404, "error": "Not Found"})),
        );
    }
    (StatusCode::CREATED, Json(json!({"key": {"id": "MSG1"}, "status": "PENDING"})))
}

async fn send_media(
    State(seen): State<Seen>,
    Path(instance): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    record(&seen, format!("/message/sendMedia/{instance}"), &headers, HashMap::new(), body);
    Json(json!({"key": {"id": "MSG2"}}))
}

async fn create(State(seen): State<Seen>, headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    let name = body["instanceName"].as_str().unwrap_or_default().to_string();
    record(&seen, "/instance/create".into(), &headers, HashMap::new(), body);
    if name == "anonymous" {
        return Json(json!({"hash": "abc"}));
    }
    Json(json!({"instance": {"instanceName": name, "status": "created"}}))
}

async fn connect(Path(instance): Path<String>) -> Json<Value> {
    Json(json!({"instance": {"instanceName": instance, "status": "CONNECTING"}, "qrcode": "2@xyz"}))
}

async fn state(Path(_instance): Path<String>) -> Json<Value> {
    Json(json!({"instance": {"state": "open"}}))
}

async fn groups(
    State(seen): State<Seen>,
    Path(instance): Path<String>,
    headers: HeaderMap,
    Query(q): Query<HashMap<String, String>>,
) -> Json<Value> {
    record(&seen, format!("/group/fetchAllGroups/{instance}"), &headers, q, Value::Null);
    Json(json!([{"id": "1@g.us", "subject": "Vendas"}, {"id": "2@g.us"}]))
}

async fn participants(
    State(seen): State<Seen>,
    Path(instance): Path<String>,
    headers: HeaderMap,
    Query(q): Query<HashMap<String, String>>,
) -> Json<Value> {
    record(&seen, format!("/group/participants/{instance}"), &headers, q, Value::Null);
    Json(json!({"participants": [{"id": "5511999990000@s.whatsapp.net", "pushName": "Ana"}]}))
}

/// Spawn the fake server and return a client pointed at it.
async fn fake_evolution() -> (EvolutionClient, Seen) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/", get(|| async { Json(json!({"status": 200, "message": "Welcome"})) }))
        .route("/message/sendText/{instance}", post(send_text))
        .route("/message/sendMedia/{instance}", post(send_media))
        .route("/instance/create", post(create))
        .route("/instance/connect/{instance}", get(connect))
        .route("/instance/connectionState/{instance}", get(state))
        .route("/group/fetchAllGroups/{instance}", get(groups))
        .route("/group/participants/{instance}", get(participants))
        .with_state(seen.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = EvolutionClient::from_config(&EvolutionConfig {
        base_url: format!("http://{addr}/"),
        api_key: "evo-key".into(),
    });
    (client, seen)
}

#[test]
fn test_strip_data_uri() {
    assert_eq!(strip_data_uri("data:image/png;base64,iVBORw0KGgo="), "iVBORw0KGgo=");
    assert_eq!(strip_data_uri("https://cdn.example.com/a.jpg"), "https://cdn.example.com/a.jpg");
    assert_eq!(strip_data_uri("iVBORw0KGgo="), "iVBORw0KGgo=");
    // No comma: nothing to strip.
    assert_eq!(strip_data_uri("data:broken"), "data:broken");
}

#[test]
fn test_endpoint_encodes_segments() {
    let client = EvolutionClient::from_config(&EvolutionConfig {
        base_url: "http://evo.local/api/".into(),
        api_key: String::new(),
    });
    let url = client.endpoint(&["message", "sendText", "loja centro"]).unwrap();
    assert_eq!(url.as_str(), "http://evo.local/api/message/sendText/loja%20centro");
}

#[test]
fn test_endpoint_invalid_base() {
    let client = EvolutionClient::from_config(&EvolutionConfig {
        base_url: "not a url".into(),
        api_key: String::new(),
    });
    assert!(matches!(client.endpoint(&["x"]), Err(PanelError::Config(_))));
}

#[test]
fn test_provider_name() {
    let client = EvolutionClient::from_config(&EvolutionConfig::default());
    assert_eq!(client.name(), "evolution");
}

#[tokio::test]
async fn test_send_text_posts_number_and_text() {
    let (client, seen) = fake_evolution().await;
    let receipt = client
        .send_text("loja", "5511999990000", "oi")
        .await
        .unwrap();
    assert_eq!(receipt.0["key"]["id"], "MSG1");

    let seen = seen.lock().unwrap();
    let (path, key, _, body) = &seen[0];
    assert_eq!(path, "/message/sendText/loja");
    assert_eq!(key, "evo-key");
    assert_eq!(body, &json!({"number": "5511999990000", "text": "oi"}));
}

#[tokio::test]
async fn test_send_text_non_2xx_is_provider_error() {
    let (client, _seen) = fake_evolution().await;
    let err = client.send_text("broken", "1", "oi").await.unwrap_err();
    match err {
        PanelError::Provider { status, body } => {
            assert_eq!(status, Some(404));
            assert!(body.contains("Not Found"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_send_media_strips_data_uri() {
    let (client, seen) = fake_evolution().await;
    client
        .send_media("loja", "120363@g.us", "data:image/jpeg;base64,/9j/4AAQ", "promo")
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    let (path, _, _, body) = &seen[0];
    assert_eq!(path, "/message/sendMedia/loja");
    assert_eq!(
        body,
        &json!({
            "number": "120363@g.us",
            "mediatype": "image",
            "media": "/9j/4AAQ",
            "fileName": "imagem.jpg",
            "caption": "promo"
        })
    );
}

#[tokio::test]
async fn test_transport_failure_has_no_status() {
    let client = EvolutionClient::from_config(&EvolutionConfig {
        // Port 9 (discard) on localhost is closed in test environments.
        base_url: "http://127.0.0.1:9".into(),
        api_key: String::new(),
    });
    let err = client.send_text("x", "1", "oi").await.unwrap_err();
    assert!(matches!(err, PanelError::Provider { status: None, .. }));
}

#[tokio::test]
async fn test_deliver_attaches_context() {
    use evopanel_core::message::{DispatchJob, JobContent};
    use std::time::Duration;

    let (client, _seen) = fake_evolution().await;
    let job = DispatchJob::new(
        "broken",
        "5511999990000",
        JobContent::Text { body: "oi".into() },
        Duration::ZERO,
    );
    let err = client.deliver(&job).await.unwrap_err();
    assert!(err.to_string().contains("text to 5511999990000"));
}

#[tokio::test]
async fn test_create_instance_extracts_ref() {
    let (client, seen) = fake_evolution().await;
    let created = client.create_instance("loja").await.unwrap();
    assert_eq!(created.instance_ref, "loja");
    assert_eq!(created.raw["instance"]["status"], "created");

    let seen = seen.lock().unwrap();
    assert_eq!(
        seen[0].3,
        json!({"instanceName": "loja", "qrcode": true, "integration": "WHATSAPP-BAILEYS"})
    );
}

#[tokio::test]
async fn test_create_instance_without_ref_fails() {
    let (client, _seen) = fake_evolution().await;
    let err = client.create_instance("anonymous").await.unwrap_err();
    assert!(err.to_string().contains("could not identify"));
}

#[tokio::test]
async fn test_connect_and_state() {
    let (client, _seen) = fake_evolution().await;
    let qr = client.connect("loja").await.unwrap();
    assert_eq!(qr.qrcode.as_deref(), Some("2@xyz"));
    assert_eq!(qr.derived_status("pending"), "connecting");

    let state = client.connection_state("loja").await.unwrap();
    assert_eq!(state.panel_status().as_deref(), Some("connected"));
}

#[tokio::test]
async fn test_fetch_groups_and_participants() {
    let (client, seen) = fake_evolution().await;
    let groups = client.fetch_groups("loja").await.unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].name, "Vendas");

    let people = client.fetch_participants("loja", "1@g.us").await.unwrap();
    assert_eq!(people[0].phone, "5511999990000");
    assert_eq!(people[0].name.as_deref(), Some("Ana"));

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].2.get("getParticipants").map(String::as_str), Some("false"));
    assert_eq!(seen[1].2.get("groupJid").map(String::as_str), Some("1@g.us"));
}

#[tokio::test]
async fn test_ping() {
    let (client, _seen) = fake_evolution().await;
    assert!(client.ping().await);
}
