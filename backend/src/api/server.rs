//! HTTP Server for the pivotload API.
//!
//! Provides REST endpoints for survey upload and conversion.
//!
//! # API Endpoints
//!
//! | Method | Path              | Description                            |
//! |--------|-------------------|----------------------------------------|
//! | GET    | `/health`         | Health check                           |
//! | POST   | `/api/convert`    | Upload a survey, download the xlsx     |
//! | POST   | `/api/preview`    | Upload a survey, get the first rows    |
//! | GET    | `/api/logs`       | SSE stream for real-time logs          |
//!
//! Both upload endpoints take a multipart form with a `file` field and
//! the optional fields `template`, `phase`, `threshold` and `profile`.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, HeaderValue, Method, StatusCode},
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

use super::logs::{log_error, LOG_BROADCASTER};
use super::types::{error_response, PreviewResponse, UploadForm, PREVIEW_ROWS};
use crate::config::{ConvertOptions, Profile};
use crate::error::{PipelineError, ServerError, ServerResult};
use crate::transform::pipeline::{convert_to_xlsx, ConversionResult};

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Largest accepted request body, survey and template together.
pub const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// All routes; `defaults` seeds the options of every request.
pub fn router(defaults: ConvertOptions) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/convert", post(convert_upload))
        .route("/api/preview", post(preview_upload))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(defaults)
}

/// Start the HTTP server
pub async fn start_server(
    port: u16,
    defaults: ConvertOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(defaults);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 Pivotload server running on http://localhost:{}", port);
    println!("   POST /api/convert - Upload survey, download xlsx");
    println!("   POST /api/preview - Upload survey, preview rows");
    println!("   GET  /api/logs    - SSE log stream");
    println!("   GET  /health      - Health check");
    println!();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "pivotload",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "convert": "POST /api/convert",
            "preview": "POST /api/preview",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    // Lagged receivers skip what they missed
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

// =============================================================================
// Upload handling
// =============================================================================

type Rejection = (StatusCode, Json<Value>);

fn reject(err: ServerError) -> Rejection {
    let status = match &err {
        ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        ServerError::Pipeline(PipelineError::Read(_))
        | ServerError::Pipeline(PipelineError::Convert(_))
        | ServerError::Pipeline(PipelineError::Config(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        ServerError::Pipeline(PipelineError::Writer(_)) | ServerError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    log_error(err.to_string());
    (status, Json(error_response(&err.to_string())))
}

/// Collect the multipart fields of an upload.
async fn read_form(mut multipart: Multipart) -> ServerResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        let file_name = field.file_name().map(|s| s.to_string());
        let data = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Read error on '{}': {}", name, e)))?;

        match name.as_str() {
            "file" => {
                form.file_name = file_name;
                form.file = Some(data.to_vec());
            }
            "template" if !data.is_empty() => form.template = Some(data.to_vec()),
            "phase" => form.phase = non_empty(&data),
            "threshold" => {
                form.threshold = match non_empty(&data) {
                    Some(text) => Some(text.parse().map_err(|_| {
                        ServerError::BadRequest(format!("threshold '{}' is not an integer", text))
                    })?),
                    None => None,
                }
            }
            "profile" => form.profile = non_empty(&data),
            _ => {}
        }
    }

    Ok(form)
}

fn non_empty(data: &Bytes) -> Option<String> {
    let text = String::from_utf8_lossy(data).trim().to_string();
    (!text.is_empty()).then_some(text)
}

/// Request options on top of the server defaults.
fn form_options(form: &UploadForm, defaults: &ConvertOptions) -> ServerResult<ConvertOptions> {
    let mut options = defaults.clone();
    if let Some(phase) = &form.phase {
        options.phase = phase.clone();
    }
    if let Some(threshold) = form.threshold {
        options.continuity_threshold = threshold;
    }
    if let Some(profile) = &form.profile {
        options.profile = profile.parse::<Profile>().map_err(ServerError::BadRequest)?;
    }
    Ok(options)
}

/// Parse the form and run the conversion off the async runtime.
async fn run_upload(
    multipart: Multipart,
    defaults: ConvertOptions,
) -> ServerResult<(String, Vec<u8>, ConversionResult)> {
    let form = read_form(multipart).await?;
    let options = form_options(&form, &defaults)?;

    let file_name = form.file_name.clone().unwrap_or_else(|| "upload.xlsx".to_string());
    let bytes = form
        .file
        .ok_or_else(|| ServerError::BadRequest("No file provided".to_string()))?;

    println!("\n{}", "=".repeat(70));
    println!("📄 NEW UPLOAD: {} ({} bytes)", file_name, bytes.len());
    println!("{}\n", "=".repeat(70));

    let template = form.template;
    let name = file_name.clone();
    let (xlsx, result) = tokio::task::spawn_blocking(move || {
        convert_to_xlsx(&bytes, &name, &options, template.as_deref())
    })
    .await
    .map_err(|e| ServerError::Internal(e.to_string()))??;

    print_summary(&result);
    Ok((file_name, xlsx, result))
}

fn print_summary(result: &ConversionResult) {
    println!("\n{}", "=".repeat(70));
    println!("📊 SUMMARY");
    println!("{}", "=".repeat(70));
    println!("   Functions rows:  {}", result.functions.len());
    if let Some(transfers) = &result.transfers {
        println!("   Transfer rows:   {}", transfers.len());
    }
    println!("   Participants:    {}", result.stats.participants);
    println!("   Malformed:       {}", result.stats.functions.malformed_scores);
    println!("{}\n", "=".repeat(70));
}

/// Output file name for an input, e.g. `anket.csv` -> `anket_rapor.xlsx`.
pub fn output_file_name(input: &str) -> String {
    let stem = std::path::Path::new(input)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("pivotload");
    format!("{}_rapor.xlsx", stem)
}

/// Convert endpoint: responds with the xlsx as an attachment
async fn convert_upload(
    State(defaults): State<ConvertOptions>,
    multipart: Multipart,
) -> Result<Response, Rejection> {
    let (file_name, xlsx, _) = run_upload(multipart, defaults).await.map_err(reject)?;

    let disposition = format!("attachment; filename=\"{}\"", output_file_name(&file_name));
    let disposition = HeaderValue::from_str(&disposition)
        .unwrap_or_else(|_| HeaderValue::from_static("attachment; filename=\"pivotload_rapor.xlsx\""));

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(XLSX_MIME)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        xlsx,
    )
        .into_response())
}

/// Preview endpoint: responds with the first rows of each table
async fn preview_upload(
    State(defaults): State<ConvertOptions>,
    multipart: Multipart,
) -> Result<Json<PreviewResponse>, Rejection> {
    let (file_name, _, result) = run_upload(multipart, defaults).await.map_err(reject)?;
    Ok(Json(PreviewResponse::new(&file_name, &result, PREVIEW_ROWS)))
}
