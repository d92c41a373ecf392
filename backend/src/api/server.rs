//! HTTP Server for the cadastro API.
//!
//! Provides REST endpoints to run the intake pipeline on uploaded files.
//!
//! # API Endpoints
//!
//! | Method | Path              | Description                                   |
//! |--------|-------------------|-----------------------------------------------|
//! | GET    | `/health`         | Health check                                  |
//! | POST   | `/api/process`    | Upload `incoming` and `system` sheets and run |
//! | GET    | `/api/logs`       | SSE stream for real-time logs                 |

use axum::{
    extract::Multipart,
    http::{header, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_info, LOG_BROADCASTER};
use super::types::{error_response, ProcessResponse};
use crate::cep::ViaCepClient;
use crate::error::{PipelineError, ServerError, ServerResult};
use crate::parser::read_table_bytes;
use crate::transform::pipeline::{run, MemorySink, MemorySource, ProcessOptions};
use crate::validation::FieldValidator;

/// Multipart field carrying the intake spreadsheet.
const INCOMING_FIELD: &str = "incoming";

/// Multipart field carrying the system-of-record export.
const SYSTEM_FIELD: &str = "system";

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::BadRequest(_)
            | ServerError::Pipeline(PipelineError::Sheet(_))
            | ServerError::Pipeline(PipelineError::EmptyInput) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        eprintln!("❌ Process error: {}", self);
        (status, Json(error_response(&self.to_string()))).into_response()
    }
}

/// Build the application router.
pub fn router() -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/process", post(process_upload))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
}

/// Start the HTTP server
pub async fn start_server(port: u16) -> ServerResult<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 Cadastro server running on http://localhost:{}", port);
    println!("   POST /api/process - Upload incoming + system sheets");
    println!("   GET  /api/logs    - SSE log stream");
    println!("   GET  /health      - Health check");
    println!();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router()).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "cadastro",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "process": "POST /api/process",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// An uploaded file.
struct Upload {
    name: String,
    bytes: Vec<u8>,
}

/// Pull the two named file fields out of the form.
async fn read_uploads(mut multipart: Multipart) -> ServerResult<(Upload, Upload)> {
    let mut incoming = None;
    let mut system = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name != INCOMING_FIELD && name != SYSTEM_FIELD {
            continue;
        }

        let file_name = field.file_name().unwrap_or(name.as_str()).to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?
            .to_vec();

        let upload = Upload { name: file_name, bytes };
        if name == INCOMING_FIELD {
            incoming = Some(upload);
        } else {
            system = Some(upload);
        }
    }

    let incoming = incoming
        .ok_or_else(|| ServerError::BadRequest(format!("No '{}' file provided", INCOMING_FIELD)))?;
    let system = system
        .ok_or_else(|| ServerError::BadRequest(format!("No '{}' file provided", SYSTEM_FIELD)))?;
    Ok((incoming, system))
}

/// Process endpoint: run the whole pipeline in memory
async fn process_upload(multipart: Multipart) -> ServerResult<Json<ProcessResponse>> {
    let (incoming, system) = read_uploads(multipart).await?;

    println!("\n{}", "=".repeat(70));
    println!(
        "📄 NEW BATCH: {} ({} bytes) vs {} ({} bytes)",
        incoming.name,
        incoming.bytes.len(),
        system.name,
        system.bytes.len()
    );
    println!("{}\n", "=".repeat(70));

    let incoming_table =
        read_table_bytes(&incoming.name, &incoming.bytes).map_err(PipelineError::from)?;
    let system_table = read_table_bytes(&system.name, &system.bytes).map_err(PipelineError::from)?;
    log_info(format!(
        "Columns: {}",
        incoming_table.headers.join(", ")
    ));

    let source = MemorySource {
        incoming: incoming_table.records,
        system: system_table.records,
    };
    let mut sink = MemorySink::default();
    let options = ProcessOptions::default();
    let validator = FieldValidator::new(ViaCepClient::from_env()).with_today(options.run_date());

    let stats = run(&source, &mut sink, &validator, &options).await?;

    println!("\n{}", "=".repeat(70));
    println!("📊 SUMMARY");
    println!("{}", "=".repeat(70));
    println!("   Incoming rows:  {}", stats.incoming_rows);
    println!("   Inserts:        {}", stats.inserts);
    println!("   Alterations:    {}", stats.alterations);
    println!("   Rejected:       {}", stats.rejected);
    println!("{}\n", "=".repeat(70));

    Ok(Json(ProcessResponse::new(&stats, sink)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_reports_service() {
        let Json(body) = health().await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "cadastro");
    }

    #[test]
    fn test_error_status_mapping() {
        let response = ServerError::BadRequest("missing".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = ServerError::Pipeline(PipelineError::EmptyInput).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        let response = ServerError::Io(io).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
