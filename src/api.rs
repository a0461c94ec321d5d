//! REST API server for SecureChain
//!
//! HTTP surface over the transaction store: submission with fraud scoring,
//! paginated queries, the full ledger, and on-demand chain audits.

use axum::{
    extract::{Path, Query, Request, State},
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::error::ChainError;
use crate::ledger::Block;
use crate::store::{ListQuery, TransactionStore};
use crate::transaction::{Transaction, TxStatus};

/// Shared application state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<TransactionStore>,
    api_stats: Arc<RwLock<ApiStats>>,
}

#[derive(Debug, Default)]
struct ApiStats {
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    transactions_submitted: u64,
    start_time: Option<Instant>,
}

impl ApiStats {
    fn new() -> Self {
        ApiStats {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    fn record_request(&mut self, success: bool) {
        self.total_requests += 1;
        if success {
            self.successful_requests += 1;
        } else {
            self.failed_requests += 1;
        }
    }
}

impl AppState {
    pub fn new(store: Arc<TransactionStore>) -> Self {
        AppState {
            store,
            api_stats: Arc::new(RwLock::new(ApiStats::new())),
        }
    }
}

// ============================================================================
// API Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    InvalidInput(String),
    NotFound(String),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::InvalidTransaction(msg) => ApiError::InvalidInput(msg),
            ChainError::NotFound(msg) => ApiError::NotFound(msg),
            other => ApiError::InternalError(other.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct SubmitRequest {
    pub sender: String,
    pub receiver: String,
    pub amount: f64,
}

#[derive(Deserialize)]
struct ListParams {
    #[serde(default = "default_page")]
    page: usize,
    #[serde(default = "default_per_page")]
    per_page: usize,
    search: Option<String>,
    status: Option<String>,
}

fn default_page() -> usize {
    1
}

fn default_per_page() -> usize {
    10
}

/// Wire shape for a transaction: score band derived at read time, block
/// hashes hex-encoded.
fn transaction_json(tx: &Transaction, state: &AppState) -> serde_json::Value {
    serde_json::json!({
        "id": tx.id,
        "sender": tx.sender,
        "receiver": tx.receiver,
        "amount": tx.amount,
        "fraudScore": (tx.fraud_score * 1000.0).round() / 1000.0,
        "status": tx.status(&state.store.config().scoring).as_str(),
        "timestamp": tx.timestamp,
    })
}

fn block_json(block: &Block) -> serde_json::Value {
    serde_json::json!({
        "index": block.index,
        "transactionId": block.transaction_id,
        "previousHash": hex::encode(block.previous_hash),
        "currentHash": hex::encode(block.current_hash),
        "timestamp": block.timestamp,
    })
}

// ============================================================================
// Middleware
// ============================================================================

/// Request logging and statistics middleware
async fn stats_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let response = next.run(req).await;

    let success = response.status().is_success();
    let mut stats = state.api_stats.write().await;
    stats.record_request(success);

    response
}

async fn logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        "api.request"
    );

    response
}

// ============================================================================
// API Server
// ============================================================================

/// Build the API router with all endpoints (also used by tests)
pub fn build_api_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(vec![http::Method::GET, http::Method::POST, http::Method::OPTIONS])
        .allow_headers(vec![http::header::CONTENT_TYPE])
        .allow_credentials(true);

    let api_routes = Router::new()
        // Transaction endpoints
        .route("/transactions", post(submit_transaction).get(list_transactions))
        .route("/transactions/:id", get(get_transaction))
        .route("/fraud-alerts", get(get_fraud_alerts))
        // Ledger endpoints
        .route("/chain", get(get_chain))
        .route("/chain/validate", get(validate_chain))
        // Model endpoints
        .route("/model/status", get(get_model_status))
        // System endpoints
        .route("/health", get(health_check))
        .route("/stats", get(get_api_stats))
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), stats_middleware))
        .with_state(state)
        .layer(cors.clone());

    Router::new().nest("/api", api_routes).layer(cors)
}

/// Run the API server until the process is stopped.
pub async fn run_api_server(state: AppState, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_api_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn submit_transaction(
    State(state): State<AppState>,
    Json(req): Json<SubmitRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state.store.submit(&req.sender, &req.receiver, req.amount)?;

    {
        let mut stats = state.api_stats.write().await;
        stats.transactions_submitted += 1;
    }

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "transaction": transaction_json(&record.transaction, &state),
            "block": block_json(&record.block),
            "model": state.store.model_status(),
        })),
    ))
}

async fn list_transactions(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let status = match params.status.as_deref().filter(|s| !s.is_empty()) {
        Some(label) => Some(
            TxStatus::parse(label)
                .ok_or_else(|| ApiError::InvalidInput(format!("unknown status filter: {}", label)))?,
        ),
        None => None,
    };

    let page = state.store.list(&ListQuery {
        page: params.page,
        per_page: params.per_page,
        search: params.search,
        status,
    });

    let items: Vec<_> = page.items.iter().map(|tx| transaction_json(tx, &state)).collect();
    Ok(Json(serde_json::json!({
        "transactions": items,
        "total": page.total,
        "page": page.page,
        "perPage": page.per_page,
        "totalPages": page.total_pages,
    })))
}

async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state
        .store
        .get(&id)
        .ok_or_else(|| ApiError::NotFound(format!("Transaction {} not found", id)))?;

    let mut transaction = transaction_json(&record.transaction, &state);
    transaction["block"] = block_json(&record.block);
    Ok(Json(serde_json::json!({ "transaction": transaction })))
}

async fn get_fraud_alerts(State(state): State<AppState>) -> impl IntoResponse {
    let alerts = state.store.fraud_alerts();
    let items: Vec<_> = alerts.iter().map(|tx| transaction_json(tx, &state)).collect();
    Json(serde_json::json!({
        "alerts": items,
        "total": items.len(),
    }))
}

async fn get_chain(State(state): State<AppState>) -> impl IntoResponse {
    let blocks: Vec<_> = state.store.chain().iter().map(block_json).collect();
    Json(serde_json::json!({
        "chain": blocks,
        "length": blocks.len(),
    }))
}

async fn validate_chain(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.store.validate_chain();
    Json(serde_json::json!({
        "valid": report.valid,
        "errors": report.errors,
        "totalBlocks": report.total_blocks,
    }))
}

async fn get_model_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.store.model_status())
}

async fn get_api_stats(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.api_stats.read().await;
    let uptime = stats.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0);

    Json(serde_json::json!({
        "total_requests": stats.total_requests,
        "successful_requests": stats.successful_requests,
        "failed_requests": stats.failed_requests,
        "transactions_submitted": stats.transactions_submitted,
        "uptime_seconds": uptime,
        "chain_length": state.store.transaction_count(),
    }))
}
