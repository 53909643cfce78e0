//! Local HTTP server for the browser UI.
//!
//! Handlers only extract parameters, hand the work to [`browse`],
//! [`loader`], [`query`], or [`sample`], and translate errors. Database and
//! filesystem calls block, so they run on tokio's blocking pool.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | The UI page |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/browse?path=` | Directory listing as JSON |
//! | `GET`  | `/browse/view?path=` | Directory listing as an HTML fragment |
//! | `POST` | `/load` | Load a CSV/Parquet file into a table |
//! | `POST` | `/query/run` | Execute SQL |
//! | `GET`  | `/tables/json` | Loaded tables and their schemas |
//! | `POST` | `/rename` | Rename a table |
//! | `POST` | `/connect` | Switch between in-memory and file databases |
//! | `POST` | `/generate` | Write a random sample CSV |
//!
//! # Error Contract
//!
//! ```json
//! { "ok": false, "error": { "code": "query_error", "message": "..." } }
//! ```
//!
//! Codes: `bad_request` (400), `unsupported_format` (400), `query_error`
//! (400), `forbidden` (403), `not_found` (404), `load_error` (422),
//! `internal` (500). A body that is not valid JSON for the endpoint is a
//! `bad_request`. `/browse/view` answers with an HTML error fragment
//! instead.
//!
//! [`browse`]: crate::browse
//! [`loader`]: crate::loader
//! [`query`]: crate::query
//! [`sample`]: crate::sample

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::browse::PathBrowser;
use crate::config::{Config, DbMode};
use crate::db::Database;
use crate::error::LoaderError;
use crate::models::{ColumnInfo, DirectoryListing, LoadedTable, QueryResult};
use crate::sample::SampleSpec;
use crate::{loader, query, sample, views};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    db: Arc<Database>,
    browser: Arc<PathBrowser>,
}

impl AppState {
    pub fn new(config: Config, db: Arc<Database>) -> Result<Self, LoaderError> {
        let browser = PathBrowser::from_config(&config.browser)?;
        Ok(Self {
            config: Arc::new(config),
            db,
            browser: Arc::new(browser),
        })
    }
}

/// Builds the router. Exposed separately from [`run_server`] so tests can
/// drive it without binding a socket.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/browse", get(handle_browse))
        .route("/browse/view", get(handle_browse_view))
        .route("/load", post(handle_load))
        .route("/query/run", post(handle_query))
        .route("/tables/json", get(handle_tables))
        .route("/rename", post(handle_rename))
        .route("/connect", post(handle_connect))
        .route("/generate", post(handle_generate))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Opens the database, binds to `[server].bind`, and serves until Ctrl-C.
/// The database handle is dropped (and a file database closed) on the way
/// out.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.bind_addr()?;

    let db = Arc::new(Database::open(config)?);
    let state = AppState::new(config.clone(), db.clone())?;

    if !state.browser.is_confined() {
        warn!("No browser.root configured: every path readable by this process can be browsed");
    }

    let app = router(state);

    println!("WARNING: This app can access any path on this machine. Do not expose it on a shared network.");
    println!("DuckDB loader listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped, closing database");
    drop(db);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

/// Runs a blocking closure on the blocking pool and flattens both error
/// layers into an [`AppError`].
async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, LoaderError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| internal(format!("worker task failed: {}", e)))?
        .map_err(AppError::from)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    ok: bool,
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            ok: false,
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<LoaderError> for AppError {
    fn from(err: LoaderError) -> Self {
        let status = match &err {
            LoaderError::Access { .. } => StatusCode::FORBIDDEN,
            LoaderError::FileNotFound(_) => StatusCode::NOT_FOUND,
            LoaderError::Load { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            LoaderError::NotADirectory(_)
            | LoaderError::UnsupportedFormat { .. }
            | LoaderError::Query(_)
            | LoaderError::InvalidTableName(_)
            | LoaderError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            LoaderError::Connect(_) | LoaderError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!(error = %err, "Request failed");
        }
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

/// Returns the trimmed value of a required string field.
fn required(value: Option<String>, field: &str) -> Result<String, AppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| bad_request(format!("{} is required", field)))
}

// ============ GET / and /health ============

async fn handle_index() -> Html<&'static str> {
    Html(views::INDEX_HTML)
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /browse ============

#[derive(Debug, Deserialize)]
struct BrowseParams {
    #[serde(default)]
    path: Option<String>,
}

impl BrowseParams {
    fn path(&self) -> Option<PathBuf> {
        self.path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }
}

async fn list_directory(
    state: &AppState,
    params: &BrowseParams,
) -> Result<DirectoryListing, AppError> {
    let browser = state.browser.clone();
    let path = params.path();
    blocking(move || browser.browse(path.as_deref())).await
}

async fn handle_browse(
    State(state): State<AppState>,
    Query(params): Query<BrowseParams>,
) -> Result<Json<DirectoryListing>, AppError> {
    Ok(Json(list_directory(&state, &params).await?))
}

async fn handle_browse_view(
    State(state): State<AppState>,
    Query(params): Query<BrowseParams>,
) -> Response {
    match list_directory(&state, &params).await {
        Ok(listing) => Html(views::render_listing(&listing)).into_response(),
        Err(e) => (e.status, Html(views::render_error(&e.message))).into_response(),
    }
}

// ============ POST /load ============

#[derive(Debug, Deserialize)]
struct LoadRequest {
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    table_name: Option<String>,
}

#[derive(Serialize)]
struct LoadResponse {
    ok: bool,
    table: LoadedTable,
}

async fn handle_load(
    State(state): State<AppState>,
    body: Result<Json<LoadRequest>, JsonRejection>,
) -> Result<Json<LoadResponse>, AppError> {
    let Json(request) = body?;
    let path = PathBuf::from(required(request.path, "path")?);
    let table_name = request.table_name;
    let db = state.db.clone();
    let table = blocking(move || loader::load_table(&db, &path, table_name.as_deref())).await?;
    Ok(Json(LoadResponse { ok: true, table }))
}

// ============ POST /query/run ============

#[derive(Debug, Deserialize)]
struct QueryRequest {
    #[serde(default)]
    sql: Option<String>,
}

#[derive(Serialize)]
struct QueryResponse {
    ok: bool,
    #[serde(flatten)]
    result: QueryResult,
}

async fn handle_query(
    State(state): State<AppState>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, AppError> {
    let Json(request) = body?;
    let sql = required(request.sql, "sql")?;
    let max_rows = state.config.query.max_rows;
    let db = state.db.clone();
    let result = blocking(move || query::run_query(&db, &sql, max_rows)).await?;
    Ok(Json(QueryResponse { ok: true, result }))
}

// ============ GET /tables/json ============

#[derive(Serialize)]
struct TablesResponse {
    ok: bool,
    tables: Vec<String>,
    schemas: BTreeMap<String, Vec<ColumnInfo>>,
}

async fn handle_tables(State(state): State<AppState>) -> Result<Json<TablesResponse>, AppError> {
    let db = state.db.clone();
    let described = blocking(move || db.table_schemas()).await?;
    let tables = described.iter().map(|(name, _)| name.clone()).collect();
    let schemas: BTreeMap<_, _> = described.into_iter().collect();
    Ok(Json(TablesResponse {
        ok: true,
        tables,
        schemas,
    }))
}

// ============ POST /rename ============

#[derive(Debug, Deserialize)]
struct RenameRequest {
    #[serde(default)]
    old: Option<String>,
    #[serde(default)]
    new: Option<String>,
}

#[derive(Serialize)]
struct OkResponse {
    ok: bool,
}

async fn handle_rename(
    State(state): State<AppState>,
    body: Result<Json<RenameRequest>, JsonRejection>,
) -> Result<Json<OkResponse>, AppError> {
    let Json(request) = body?;
    let old = required(request.old, "old")?;
    let new = required(request.new, "new")?;
    let db = state.db.clone();
    blocking(move || db.rename_table(&old, &new)).await?;
    Ok(Json(OkResponse { ok: true }))
}

// ============ POST /connect ============

#[derive(Debug, Deserialize)]
struct ConnectRequest {
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    db_path: Option<String>,
}

async fn handle_connect(
    State(state): State<AppState>,
    body: Result<Json<ConnectRequest>, JsonRejection>,
) -> Result<Json<OkResponse>, AppError> {
    let Json(request) = body?;
    let mode = match required(request.mode, "mode")?.as_str() {
        "memory" => DbMode::Memory,
        "file" => DbMode::File,
        _ => return Err(bad_request("mode must be 'memory' or 'file'")),
    };
    let db_path = match mode {
        DbMode::File => Some(PathBuf::from(required(request.db_path, "db_path")?)),
        DbMode::Memory => None,
    };
    let db = state.db.clone();
    blocking(move || db.connect(mode, db_path.as_deref())).await?;
    Ok(Json(OkResponse { ok: true }))
}

// ============ POST /generate ============

#[derive(Serialize)]
struct GenerateResponse {
    ok: bool,
    path: PathBuf,
}

async fn handle_generate(
    State(state): State<AppState>,
    body: Result<Json<SampleSpec>, JsonRejection>,
) -> Result<Json<GenerateResponse>, AppError> {
    let Json(spec) = body?;
    let dir = state.config.sample.dir.clone();
    let path = blocking(move || sample::generate_sample_csv(&dir, &spec)).await?;
    Ok(Json(GenerateResponse { ok: true, path }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use std::fs;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn test_app(tmp: &TempDir) -> Router {
        let mut config = Config::minimal();
        config.sample.dir = tmp.path().join("samples");
        let db = Arc::new(Database::open_in_memory().unwrap());
        router(AppState::new(config, db).unwrap())
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let tmp = TempDir::new().unwrap();
        let (status, body) = send(&test_app(&tmp), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_index_serves_html() {
        let tmp = TempDir::new().unwrap();
        let response = test_app(&tmp).oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("<title>DuckDB Loader</title>"));
    }

    #[tokio::test]
    async fn test_browse_json_and_view() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("data.csv"), "id\n1\n").unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        let app = test_app(&tmp);

        let uri = format!("/browse?path={}", tmp.path().display());
        let (status, body) = send(&app, get(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        let entries = body["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["name"], "sub");
        assert_eq!(entries[1]["extension"], "csv");

        let uri = format!("/browse/view?path={}", tmp.path().display());
        let response = app.clone().oneshot(get(&uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let html = String::from_utf8_lossy(&bytes);
        assert!(html.contains("data.csv"));
        assert!(html.contains("sub/"));
    }

    #[tokio::test]
    async fn test_browse_errors() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("data.csv");
        fs::write(&file, "id\n1\n").unwrap();
        let app = test_app(&tmp);

        let (status, body) = send(&app, get(&format!("/browse?path={}", file.display()))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("not a directory"));

        let missing = tmp.path().join("nope");
        let response = app
            .clone()
            .oneshot(get(&format!("/browse/view?path={}", missing.display())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(String::from_utf8_lossy(&bytes).starts_with("<div class=\"error\">"));
    }

    #[tokio::test]
    async fn test_load_query_and_tables() {
        let tmp = TempDir::new().unwrap();
        let csv = tmp.path().join("people.csv");
        fs::write(&csv, "id,name\n1,a\n2,b\n").unwrap();
        let app = test_app(&tmp);

        let (status, body) = send(
            &app,
            post_json("/load", json!({ "path": csv, "table_name": "people" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["table"]["table_name"], "people");
        assert_eq!(body["table"]["row_count"], 2);
        assert_eq!(body["table"]["columns"].as_array().unwrap().len(), 2);

        let (status, body) = send(
            &app,
            post_json(
                "/query/run",
                json!({ "sql": "SELECT id, name FROM people ORDER BY id" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["columns"], json!(["id", "name"]));
        assert_eq!(body["rows"], json!([[1, "a"], [2, "b"]]));
        assert_eq!(body["row_count"], 2);

        let (status, body) = send(&app, get("/tables/json")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tables"], json!(["people"]));
        assert_eq!(body["schemas"]["people"][1]["name"], "name");
    }

    #[tokio::test]
    async fn test_load_errors() {
        let tmp = TempDir::new().unwrap();
        let txt = tmp.path().join("notes.txt");
        fs::write(&txt, "hello").unwrap();
        let app = test_app(&tmp);

        let (status, body) = send(&app, post_json("/load", json!({ "path": txt }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "unsupported_format");

        let (status, body) = send(
            &app,
            post_json("/load", json!({ "path": tmp.path().join("ghost.csv") })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "not_found");

        let (status, body) = send(&app, post_json("/load", json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "path is required");

        let (_, body) = send(&app, get("/tables/json")).await;
        assert_eq!(body["tables"], json!([]));
    }

    #[tokio::test]
    async fn test_query_errors() {
        let tmp = TempDir::new().unwrap();
        let app = test_app(&tmp);

        let (status, body) = send(&app, post_json("/query/run", json!({ "sql": "SELEC 1" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"]["code"], "query_error");
        assert!(body.get("rows").is_none());

        let (status, body) = send(&app, post_json("/query/run", json!({ "sql": "   " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "sql is required");
    }

    #[tokio::test]
    async fn test_rename_and_connect() {
        let tmp = TempDir::new().unwrap();
        let app = test_app(&tmp);

        send(
            &app,
            post_json("/query/run", json!({ "sql": "CREATE TABLE a AS SELECT 1 AS x" })),
        )
        .await;
        let (status, _) = send(&app, post_json("/rename", json!({ "old": "a", "new": "b" }))).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = send(&app, get("/tables/json")).await;
        assert_eq!(body["tables"], json!(["b"]));

        let (status, body) = send(&app, post_json("/connect", json!({ "mode": "cloud" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "mode must be 'memory' or 'file'");

        let (status, _) = send(&app, post_json("/connect", json!({ "mode": "file" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let db_file = tmp.path().join("loader.duckdb");
        let (status, _) = send(
            &app,
            post_json("/connect", json!({ "mode": "file", "db_path": db_file })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = send(&app, get("/tables/json")).await;
        assert_eq!(body["tables"], json!([]));
    }

    #[tokio::test]
    async fn test_generate_then_load() {
        let tmp = TempDir::new().unwrap();
        let app = test_app(&tmp);

        let (status, body) = send(
            &app,
            post_json(
                "/generate",
                json!({ "rows": 20, "string_cols": 1, "double_cols": 2, "distribution": "normal" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        let path = body["path"].as_str().unwrap().to_string();
        assert!(path.ends_with("sample_20_1_2.csv"));

        let (status, body) = send(&app, post_json("/load", json!({ "path": path }))).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["table"]["table_name"], "sample_20_1_2");
        assert_eq!(body["table"]["row_count"], 20);

        let (status, _) = send(
            &app,
            post_json("/generate", json!({ "rows": 0, "string_cols": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_bodies_use_error_payload() {
        let tmp = TempDir::new().unwrap();
        let app = test_app(&tmp);

        let not_json = Request::builder()
            .method("POST")
            .uri("/query/run")
            .header("content-type", "application/json")
            .body(Body::from("not json"))
            .unwrap();
        let (status, body) = send(&app, not_json).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"]["code"], "bad_request");

        let no_content_type = Request::builder()
            .method("POST")
            .uri("/load")
            .body(Body::from(r#"{"path": "/tmp/x.csv"}"#))
            .unwrap();
        let (status, body) = send(&app, no_content_type).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "bad_request");

        let (status, body) = send(&app, post_json("/generate", json!({ "rows": -5 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"]["code"], "bad_request");

        let (status, body) = send(&app, post_json("/rename", json!({ "old": 1, "new": "b" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "bad_request");
    }

    #[tokio::test]
    async fn test_generate_without_rows() {
        let tmp = TempDir::new().unwrap();
        let app = test_app(&tmp);

        let (status, body) = send(&app, post_json("/generate", json!({ "string_cols": 1 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "bad_request");
        assert_eq!(body["error"]["message"], "rows must be between 1 and 1000000");
    }

    #[tokio::test]
    async fn test_ddl_reports_query_executed() {
        let tmp = TempDir::new().unwrap();
        let app = test_app(&tmp);

        let (status, body) = send(
            &app,
            post_json("/query/run", json!({ "sql": "CREATE TABLE c (x INTEGER)" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Query executed");
        assert_eq!(body["columns"], json!([]));
    }
}
