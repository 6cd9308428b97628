//! Integration tests for the HTTP store against an in-process fake CouchDB.
//!
//! The fake implements just enough of the CouchDB document API (revisions,
//! conflicts, `_find` equality selectors, basic-auth gate) to exercise the
//! client end to end over real sockets.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::put;
use axum::{Json, Router};
use couch_proto::{CouchError, Document, DocumentStore, FindQuery, HttpStore};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct FakeCouch {
    databases: HashSet<String>,
    docs: HashMap<String, Value>,
    require_auth: bool,
}

type Shared = Arc<Mutex<FakeCouch>>;

fn couch_error(status: StatusCode, error: &str, reason: &str) -> Response {
    (status, Json(json!({ "error": error, "reason": reason }))).into_response()
}

fn unauthorized(state: &FakeCouch, headers: &HeaderMap) -> Option<Response> {
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("Basic "))
        .unwrap_or(false);
    if state.require_auth && !authorized {
        Some(couch_error(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "Name or password is incorrect.",
        ))
    } else {
        None
    }
}

fn rev_generation(rev: &str) -> u64 {
    rev.split('-').next().and_then(|n| n.parse().ok()).unwrap_or(0)
}

async fn create_db(State(state): State<Shared>, Path(db): Path<String>, headers: HeaderMap) -> Response {
    let mut state = state.lock().unwrap();
    if let Some(resp) = unauthorized(&state, &headers) {
        return resp;
    }
    if !state.databases.insert(db) {
        return couch_error(
            StatusCode::PRECONDITION_FAILED,
            "file_exists",
            "The database could not be created, the file already exists.",
        );
    }
    (StatusCode::CREATED, Json(json!({ "ok": true }))).into_response()
}

async fn get_doc(
    State(state): State<Shared>,
    Path((_db, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let state = state.lock().unwrap();
    if let Some(resp) = unauthorized(&state, &headers) {
        return resp;
    }
    match state.docs.get(&id) {
        Some(doc) => (StatusCode::OK, Json(doc.clone())).into_response(),
        None => couch_error(StatusCode::NOT_FOUND, "not_found", "missing"),
    }
}

async fn put_doc(
    State(state): State<Shared>,
    Path((_db, id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(mut body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    if let Some(resp) = unauthorized(&state, &headers) {
        return resp;
    }

    let sent_rev = body.get("_rev").and_then(Value::as_str).map(str::to_string);
    let stored_rev = state
        .docs
        .get(&id)
        .and_then(|d| d.get("_rev"))
        .and_then(Value::as_str)
        .map(str::to_string);

    if sent_rev != stored_rev {
        return couch_error(StatusCode::CONFLICT, "conflict", "Document update conflict.");
    }

    let generation = stored_rev.as_deref().map(rev_generation).unwrap_or(0) + 1;
    let rev = format!("{generation}-fake");
    body["_id"] = json!(id);
    body["_rev"] = json!(rev);
    state.docs.insert(id.clone(), body);

    (StatusCode::CREATED, Json(json!({ "ok": true, "id": id, "rev": rev }))).into_response()
}

async fn delete_doc(
    State(state): State<Shared>,
    Path((_db, id)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let mut state = state.lock().unwrap();
    if let Some(resp) = unauthorized(&state, &headers) {
        return resp;
    }

    let Some(stored) = state.docs.get(&id) else {
        return couch_error(StatusCode::NOT_FOUND, "not_found", "deleted");
    };
    if stored.get("_rev").and_then(Value::as_str) != params.get("rev").map(String::as_str) {
        return couch_error(StatusCode::CONFLICT, "conflict", "Document update conflict.");
    }
    state.docs.remove(&id);
    (StatusCode::OK, Json(json!({ "ok": true }))).into_response()
}

/// `POST /{db}/_find` shares the `/{db}/{id}` route; anything else is rejected.
async fn find_docs(
    State(state): State<Shared>,
    Path((_db, id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if id != "_find" {
        return couch_error(StatusCode::METHOD_NOT_ALLOWED, "method_not_allowed", "Only GET,PUT,DELETE allowed");
    }
    let state = state.lock().unwrap();
    if let Some(resp) = unauthorized(&state, &headers) {
        return resp;
    }

    let selector = body["selector"].as_object().cloned().unwrap_or_default();
    let mut docs: Vec<Value> = state
        .docs
        .values()
        .filter(|doc| {
            selector
                .iter()
                .all(|(field, cond)| doc.get(field) == cond.get("$eq"))
        })
        .cloned()
        .collect();
    if let Some(limit) = body["limit"].as_u64() {
        docs.truncate(limit as usize);
    }
    (StatusCode::OK, Json(json!({ "docs": docs }))).into_response()
}

async fn spawn_fake(require_auth: bool) -> (String, Shared) {
    let state: Shared = Arc::new(Mutex::new(FakeCouch {
        require_auth,
        ..Default::default()
    }));

    let app = Router::new()
        .route("/:db", put(create_db))
        .route("/:db/:id", put(put_doc).get(get_doc).delete(delete_doc).post(find_docs))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), state)
}

fn property_doc(id: &str) -> Document {
    let mut doc = Document::new(id);
    doc.set("id", json!(id));
    doc.set("value", Value::Null);
    doc.set("expected", Value::Null);
    doc.set("pending", json!(false));
    doc
}

#[tokio::test]
async fn test_ensure_database_is_idempotent() {
    let (server, _) = spawn_fake(false).await;
    let store = HttpStore::builder(server, "state_storage").build().unwrap();

    assert!(store.ensure_database().await.unwrap());
    assert!(!store.ensure_database().await.unwrap());
}

#[tokio::test]
async fn test_document_lifecycle() {
    let (server, _) = spawn_fake(false).await;
    let store = HttpStore::builder(server, "state_storage").build().unwrap();

    let id = "0b8e4f52-5f7e-4a59-9d4b-1c1f0a7e2c11";
    let rev = store.insert(&property_doc(id)).await.unwrap();
    assert_eq!(rev.generation(), Some(1));

    let mut current = store.get(id).await.unwrap().expect("stored document");
    assert_eq!(current.revision(), Some(&rev));
    assert_eq!(current.value_of("pending"), &json!(false));

    current.set("value", json!("21.5"));
    let rev2 = store.update(&current).await.unwrap();
    assert_eq!(rev2.generation(), Some(2));

    // The copy still holds generation 1 and must lose.
    let err = store.update(&current).await.unwrap_err();
    assert!(err.is_conflict());

    let latest = store.get(id).await.unwrap().unwrap();
    assert_eq!(latest.value_of("value"), &json!("21.5"));
    store.delete(&latest).await.unwrap();

    assert!(store.get(id).await.unwrap().is_none());
    assert!(store.delete(&latest).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_find_by_field() {
    let (server, _) = spawn_fake(false).await;
    let store = HttpStore::builder(server, "state_storage").build().unwrap();

    store.insert(&property_doc("a")).await.unwrap();
    store.insert(&property_doc("b")).await.unwrap();

    let found = store
        .find(&FindQuery::field_eq("id", json!("b")).limit(1))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id(), "b");
    assert!(found[0].revision().is_some());

    let none = store.find(&FindQuery::field_eq("id", json!("zzz"))).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_duplicate_insert_is_conflict() {
    let (server, _) = spawn_fake(false).await;
    let store = HttpStore::builder(server, "state_storage").build().unwrap();

    store.insert(&property_doc("a")).await.unwrap();
    assert!(store.insert(&property_doc("a")).await.unwrap_err().is_conflict());
}

#[tokio::test]
async fn test_credentials_are_sent() {
    let (server, _) = spawn_fake(true).await;

    let anonymous = HttpStore::builder(server.clone(), "state_storage").build().unwrap();
    match anonymous.get("a").await.unwrap_err() {
        CouchError::Status { status, error, .. } => {
            assert_eq!(status, 401);
            assert_eq!(error, "unauthorized");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let authed = HttpStore::builder(server, "state_storage")
        .credentials("guest", Some("guest".to_string()))
        .build()
        .unwrap();
    assert!(authed.get("a").await.unwrap().is_none());
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    // Bind and drop to get a port nobody listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let store = HttpStore::builder(format!("http://{addr}"), "state_storage")
        .build()
        .unwrap();
    let err = store.get("a").await.unwrap_err();
    assert!(matches!(err, CouchError::Transport(_)));
    assert_eq!(err.code(), couch_proto::error::CODE_TRANSPORT);
}
