//! Runs the HTTP checks against an in-process book-store API.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use loadbench_core::ApiEnvironment;
use loadbench_http::{crud_walkthrough, discover, reset_via_api, smoke_test, ApiClient, HttpError, Outcome};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Store {
    next_id: i64,
    rows: BTreeMap<String, BTreeMap<i64, Value>>,
}

type Shared = Arc<Mutex<Store>>;

fn known(kind: &str) -> bool {
    matches!(kind, "Authors" | "Books")
}

async fn health() -> &'static str {
    "Healthy"
}

async fn list(State(store): State<Shared>, Path(kind): Path<String>) -> Result<Json<Vec<Value>>, StatusCode> {
    if !known(&kind) {
        return Err(StatusCode::NOT_FOUND);
    }
    let store = store.lock().unwrap();
    let rows = store.rows.get(&kind).map(|r| r.values().cloned().collect()).unwrap_or_default();
    Ok(Json(rows))
}

async fn create(
    State(store): State<Shared>,
    Path(kind): Path<String>,
    Json(mut body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    if !known(&kind) {
        return Err(StatusCode::NOT_FOUND);
    }
    let mut store = store.lock().unwrap();
    store.next_id += 1;
    let id = store.next_id;
    body["Id"] = json!(id);
    store.rows.entry(kind).or_default().insert(id, body.clone());
    Ok((StatusCode::CREATED, Json(body)))
}

async fn get_one(State(store): State<Shared>, Path((kind, id)): Path<(String, i64)>) -> Result<Json<Value>, StatusCode> {
    let store = store.lock().unwrap();
    store
        .rows
        .get(&kind)
        .and_then(|rows| rows.get(&id))
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn update(
    State(store): State<Shared>,
    Path((kind, id)): Path<(String, i64)>,
    Json(body): Json<Value>,
) -> StatusCode {
    let mut store = store.lock().unwrap();
    match store.rows.get_mut(&kind).and_then(|rows| rows.get_mut(&id)) {
        Some(row) => {
            *row = body;
            StatusCode::NO_CONTENT
        }
        None => StatusCode::NOT_FOUND,
    }
}

async fn remove(State(store): State<Shared>, Path((kind, id)): Path<(String, i64)>) -> StatusCode {
    let mut store = store.lock().unwrap();
    match store.rows.get_mut(&kind).and_then(|rows| rows.remove(&id)) {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}

fn bookstore(store: Shared) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/:kind", get(list).post(create))
        .route("/api/:kind/:id", get(get_one).put(update).delete(remove))
        .with_state(store)
}

async fn serve(app: Router) -> ApiClient {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let env: ApiEnvironment = serde_json::from_value(json!({
        "base_url": format!("http://{addr}"),
        "timeout": 5.0,
    }))
    .unwrap();
    ApiClient::new(env).unwrap()
}

fn count(store: &Shared, kind: &str) -> usize {
    store.lock().unwrap().rows.get(kind).map(BTreeMap::len).unwrap_or(0)
}

#[tokio::test]
async fn test_smoke_all_probes_pass() {
    let client = serve(bookstore(Shared::default())).await;
    let report = smoke_test(&client).await;

    assert_eq!(report.total(), 4);
    assert!(report.all_passed());
    let by_id = &report.results[1];
    assert_eq!(by_id.status, Some(404));
    assert!(by_id.url.ends_with("/api/Authors/1"));
}

#[tokio::test]
async fn test_crud_walkthrough_passes() {
    let store = Shared::default();
    let client = serve(bookstore(store.clone())).await;
    let report = crud_walkthrough(&client).await;

    assert_eq!(report.steps.len(), 10);
    assert!(report.steps.iter().all(|s| s.outcome == Outcome::Pass), "{:?}", report.steps);
    assert_eq!(report.success_rate(), 100.0);
    // only the author created for the book steps is left behind
    assert_eq!(count(&store, "Authors"), 1);
    assert_eq!(count(&store, "Books"), 0);
}

#[tokio::test]
async fn test_crud_skips_item_steps_without_id() {
    // no POST route: creates fail with 405 and item steps are skipped
    let app = Router::new()
        .route("/api/:kind", get(list))
        .with_state(Shared::default());
    let client = serve(app).await;
    let report = crud_walkthrough(&client).await;

    let skipped = report.steps.iter().filter(|s| s.outcome == Outcome::Skipped).count();
    assert_eq!(skipped, 6);
    assert_eq!(report.steps[1].outcome, Outcome::Fail(405));
    assert_eq!(report.attempted(), 4);
}

#[tokio::test]
async fn test_discover_known_and_extra_routes() {
    let client = serve(bookstore(Shared::default())).await;
    let discovery = discover(&client, &BTreeMap::new()).await;

    let available: Vec<_> = discovery.available.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(available, vec!["/api/Authors", "/api/Books"]);
    assert!(discovery.unavailable.is_empty());
    assert_eq!(discovery.untested.len(), 8);

    let extra: Vec<_> = discovery.extra.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(extra, vec!["/health"]);
}

#[tokio::test]
async fn test_reset_replaces_data() {
    let store = Shared::default();
    {
        let mut guard = store.lock().unwrap();
        for id in 100..104 {
            guard.rows.entry("Authors".into()).or_default().insert(id, json!({ "Id": id }));
            guard.rows.entry("Books".into()).or_default().insert(id + 10, json!({ "id": id + 10 }));
        }
        guard.next_id = 200;
    }
    let client = serve(bookstore(store.clone())).await;
    let report = reset_via_api(&client).await.unwrap();

    assert_eq!(report.books_deleted, 4);
    assert_eq!(report.authors_deleted, 4);
    assert_eq!(report.authors_created.len(), 5);
    assert_eq!(report.books_created.len(), 3);
    assert!(report.warnings.is_empty());
    assert_eq!(count(&store, "Authors"), 5);
    assert_eq!(count(&store, "Books"), 3);

    let guard = store.lock().unwrap();
    let book = guard.rows["Books"].values().next().unwrap();
    assert_eq!(book["authorId"], json!(report.authors_created[0]));
}

#[tokio::test]
async fn test_reset_requires_running_api() {
    let client = serve(Router::new()).await;
    let err = reset_via_api(&client).await.unwrap_err();
    assert!(matches!(err, HttpError::Unavailable { .. }));
}
