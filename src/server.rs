//! HTTP API server.
//!
//! Exposes the car store, single-record admission, and ingestion cycles
//! over a JSON HTTP API. Every handler shares one SQLite pool and one
//! candidate source through [`AppState`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/api/cars` | All cars (newest first) and aggregate stats |
//! | `POST` | `/api/cars` | Admit one listing |
//! | `GET`  | `/api/cars/similar` | Cars near `price` (`tolerance`, `limit` optional) |
//! | `GET`  | `/api/history` | Recent searches (`limit`, default 10) |
//! | `POST` | `/api/ingest` | Run an ingestion cycle (`query`, `tolerance` optional) |
//! | `GET`  | `/api/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "missing required field `model`" },
//!   "required": ["make", "model", "year", "price"] }
//! ```
//!
//! `required` is present only for admission validation failures.
//! Error codes: `bad_request` (400), `internal` (500), `source_unavailable` (502).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser dashboards
//! can call the API directly.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use car_scout_core::candidate::{RawCandidate, REQUIRED_FIELDS};
use car_scout_core::pipeline::{admit_one, run_cycle, CycleReport};
use car_scout_core::{AdmitError, CandidateSource, CycleError, IngestionEvent, VehicleRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::cars::{history, list_cars, similar_cars, CarListing, DEFAULT_HISTORY_LIMIT};
use crate::config::{validate_tolerance, Config};
use crate::source::{create_source, DisabledSource};
use crate::sqlite_store::SqliteStore;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    store: Arc<SqliteStore>,
    source: Arc<dyn CandidateSource>,
}

impl AppState {
    pub fn new(config: Config, store: SqliteStore, source: Arc<dyn CandidateSource>) -> Self {
        Self {
            config: Arc::new(config),
            store: Arc::new(store),
            source,
        }
    }
}

/// Starts the HTTP server with the source selected by `[source]`.
///
/// A source that cannot be constructed (typically a missing
/// `OPENAI_API_KEY`) does not stop the server; ingestion requests then
/// fail with `502` while the read endpoints keep working.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let source: Arc<dyn CandidateSource> = match create_source(config) {
        Ok(source) => Arc::from(source),
        Err(e) => {
            warn!(error = %format!("{:#}", e), "candidate source unavailable; ingestion disabled");
            Arc::new(DisabledSource)
        }
    };
    run_server_with_source(config, source).await
}

/// Starts the HTTP server with an explicit candidate source.
///
/// Binds to `[server].bind`, applies migrations, and serves until the
/// process is terminated.
pub async fn run_server_with_source(
    config: &Config,
    source: Arc<dyn CandidateSource>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let store = SqliteStore::open(config).await?;
    let state = AppState::new(config.clone(), store, source);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "server listening");
    println!("Car Scout server listening on http://{}", bind_addr);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Build the router for the given state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/cars", get(handle_list_cars).post(handle_add_car))
        .route("/api/cars/similar", get(handle_similar))
        .route("/api/history", get(handle_history))
        .route("/api/ingest", post(handle_ingest))
        .route("/api/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
    #[serde(skip_serializing_if = "Option::is_none")]
    required: Option<Vec<&'static str>>,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
    required: Option<Vec<&'static str>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
            required: self.required,
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
        required: None,
    }
}

fn internal(err: anyhow::Error) -> AppError {
    error!(error = %format!("{:#}", err), "request failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: format!("{:#}", err),
        required: None,
    }
}

fn source_unavailable(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "source_unavailable",
        message: message.into(),
        required: None,
    }
}

impl From<CycleError> for AppError {
    fn from(err: CycleError) -> Self {
        match err {
            CycleError::Source(e) => source_unavailable(e.to_string()),
            CycleError::Store(e) => internal(e),
        }
    }
}

impl From<AdmitError> for AppError {
    fn from(err: AdmitError) -> Self {
        match err {
            AdmitError::Invalid(e) => AppError {
                required: Some(REQUIRED_FIELDS.to_vec()),
                ..bad_request(e.to_string())
            },
            AdmitError::Store(e) => internal(e),
        }
    }
}

// ============ GET /api/health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    source: String,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        source: state.source.name().to_string(),
    })
}

// ============ /api/cars ============

async fn handle_list_cars(State(state): State<AppState>) -> Result<Json<CarListing>, AppError> {
    let listing = list_cars(state.store.as_ref()).await.map_err(internal)?;
    Ok(Json(listing))
}

#[derive(Serialize)]
struct AddCarResponse {
    success: bool,
    duplicate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
    message: String,
}

/// Handler for `POST /api/cars`.
///
/// Takes the body as untyped JSON so a non-object body is reported as a
/// validation failure rather than an extractor rejection. Duplicates are a
/// `200` with `success: false`.
async fn handle_add_car(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<AddCarResponse>, AppError> {
    let raw = RawCandidate::from_value(body);
    let admission = admit_one(
        state.store.as_ref(),
        &raw,
        &state.config.search.manual_source,
    )
    .await?;

    let message = if admission.admitted {
        format!("Successfully added {}", admission.label)
    } else {
        format!("{} already exists in database", admission.label)
    };

    Ok(Json(AddCarResponse {
        success: admission.admitted,
        duplicate: admission.duplicate,
        id: admission.id,
        message,
    }))
}

// ============ GET /api/cars/similar ============

#[derive(Deserialize)]
struct SimilarParams {
    price: f64,
    tolerance: Option<f64>,
    limit: Option<usize>,
}

#[derive(Serialize)]
struct SimilarResponse {
    price: f64,
    tolerance: f64,
    cars: Vec<VehicleRecord>,
}

async fn handle_similar(
    State(state): State<AppState>,
    Query(params): Query<SimilarParams>,
) -> Result<Json<SimilarResponse>, AppError> {
    let tolerance = params
        .tolerance
        .unwrap_or(state.config.search.price_tolerance);
    let limit = params.limit.unwrap_or(state.config.search.group_limit);

    // Input problems are the caller's; store failures are ours.
    if let Err(e) = validate_tolerance(tolerance) {
        return Err(bad_request(e.to_string()));
    }
    if !params.price.is_finite() || params.price <= 0.0 || limit == 0 {
        return Err(bad_request("price must be > 0 and limit >= 1"));
    }

    let cars = similar_cars(state.store.as_ref(), params.price, tolerance, limit)
        .await
        .map_err(internal)?;

    Ok(Json(SimilarResponse {
        price: params.price,
        tolerance,
        cars,
    }))
}

// ============ GET /api/history ============

#[derive(Deserialize)]
struct HistoryParams {
    limit: Option<usize>,
}

#[derive(Serialize)]
struct HistoryResponse {
    history: Vec<IngestionEvent>,
}

async fn handle_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResponse>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let events = history(state.store.as_ref(), limit)
        .await
        .map_err(internal)?;
    Ok(Json(HistoryResponse { history: events }))
}

// ============ POST /api/ingest ============

#[derive(Deserialize, Default)]
struct IngestRequest {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    tolerance: Option<f64>,
}

/// Handler for `POST /api/ingest`. An empty body runs the default query.
async fn handle_ingest(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<CycleReport>, AppError> {
    let req: IngestRequest = if body.iter().all(u8::is_ascii_whitespace) {
        IngestRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| bad_request(format!("invalid body: {}", e)))?
    };

    let query = match req.query {
        Some(q) if !q.trim().is_empty() => q,
        Some(_) => return Err(bad_request("query must not be empty")),
        None => state.config.search.default_query.clone(),
    };
    if let Some(t) = req.tolerance {
        validate_tolerance(t).map_err(|e| bad_request(e.to_string()))?;
    }

    let settings = state.config.cycle_settings(req.tolerance);
    let report = run_cycle(
        state.store.as_ref(),
        state.source.as_ref(),
        &query,
        &settings,
    )
    .await?;

    Ok(Json(report))
}
