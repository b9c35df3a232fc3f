// OCR Ledger - Web Server
// REST API with Axum

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use ocr_ledger::{
    get_entries_by_source, get_source_file_stats, insert_entries, open_database, process_page,
    LedgerEntry, LookupTables, PipelineConfig, SourceFileStat, StoredEntry,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
    config: Arc<PipelineConfig>,
    tables: Arc<LookupTables>,
}

impl AppState {
    fn conn(&self) -> Result<MutexGuard<'_, Connection>, String> {
        self.db.lock().map_err(|_| "database lock poisoned".to_string())
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    fn err(data: T, message: String) -> Self {
        Self {
            success: false,
            data,
            error: Some(message),
        }
    }
}

fn failure<T: Serialize>(status: StatusCode, empty: T, message: String) -> Response {
    error!(%message, "request failed");
    (status, Json(ApiResponse::err(empty, message))).into_response()
}

/// POST /api/extract body
#[derive(Deserialize)]
struct ExtractRequest {
    source_file: String,
    text: String,
    /// Also write the entries to the local store
    #[serde(default)]
    store: bool,
}

#[derive(Serialize, Default)]
struct ExtractResponse {
    source_file: String,
    blocks: usize,
    empty_blocks: usize,
    stored: usize,
    entries: Vec<LedgerEntry>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// POST /api/extract - Run one page of OCR text through the pipeline
async fn extract(State(state): State<AppState>, Json(request): Json<ExtractRequest>) -> Response {
    let page = match process_page(&request.text, &request.source_file, &state.config, &state.tables) {
        Ok(page) => page,
        Err(e) => {
            return failure(StatusCode::UNPROCESSABLE_ENTITY, ExtractResponse::default(), e.to_string())
        }
    };

    let mut stored = 0;
    if request.store {
        let conn = match state.conn() {
            Ok(conn) => conn,
            Err(e) => return failure(StatusCode::INTERNAL_SERVER_ERROR, ExtractResponse::default(), e),
        };
        match insert_entries(&conn, &page.entries) {
            Ok(summary) => stored = summary.inserted,
            Err(e) => {
                return failure(StatusCode::INTERNAL_SERVER_ERROR, ExtractResponse::default(), e.to_string())
            }
        }
    }

    let response = ExtractResponse {
        source_file: page.source_file,
        blocks: page.blocks,
        empty_blocks: page.empty_blocks,
        stored,
        entries: page.entries,
    };
    (StatusCode::OK, Json(ApiResponse::ok(response))).into_response()
}

/// GET /api/sources - Source files in the store
async fn get_sources(State(state): State<AppState>) -> Response {
    let conn = match state.conn() {
        Ok(conn) => conn,
        Err(e) => return failure(StatusCode::INTERNAL_SERVER_ERROR, Vec::<SourceFileStat>::new(), e),
    };

    match get_source_file_stats(&conn) {
        Ok(stats) => (StatusCode::OK, Json(ApiResponse::ok(stats))).into_response(),
        Err(e) => failure(StatusCode::INTERNAL_SERVER_ERROR, Vec::<SourceFileStat>::new(), e.to_string()),
    }
}

/// GET /api/sources/:filename - Entries from a specific source file
async fn get_source_entries(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Response {
    let conn = match state.conn() {
        Ok(conn) => conn,
        Err(e) => return failure(StatusCode::INTERNAL_SERVER_ERROR, Vec::<StoredEntry>::new(), e),
    };

    // Decode URL-encoded filename
    let decoded_filename = urlencoding::decode(&filename)
        .unwrap_or_else(|_| filename.clone().into())
        .into_owned();

    match get_entries_by_source(&conn, &decoded_filename) {
        Ok(entries) => (StatusCode::OK, Json(ApiResponse::ok(entries))).into_response(),
        Err(e) => failure(StatusCode::INTERNAL_SERVER_ERROR, Vec::<StoredEntry>::new(), e.to_string()),
    }
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ocr_ledger=info,ledger_server=info")),
        )
        .init();

    println!("🌐 OCR Ledger - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = match std::env::var("OCR_LEDGER_CONFIG") {
        Ok(path) => PipelineConfig::from_file(&path)
            .with_context(|| format!("Failed to load config: {}", path))?,
        Err(_) => PipelineConfig::default(),
    }
    .apply_env();

    let tables = LookupTables::load(
        config.accounts_configuration.as_deref(),
        config.units_renamed.as_deref(),
    )?;

    let conn = open_database(&config.db_path)?;
    println!("✓ Database opened: {:?}", config.db_path);

    // Create shared state
    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
        config: Arc::new(config),
        tables: Arc::new(tables),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/extract", post(extract))
        .route("/sources", get(get_sources))
        .route("/sources/:filename", get(get_source_entries))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    // Start server
    let addr = std::env::var("OCR_LEDGER_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to address {}", addr))?;

    info!(%addr, "server listening");
    println!("\n🚀 Server running on http://{}", addr);
    println!("   API: http://{}/api/health", addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}
