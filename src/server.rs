//! HTTP surface of the service.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use crate::engine::{probe, CommandEngineFactory, EngineError};
use crate::pipeline::{OcrPipeline, PageReport};
use crate::registry::EngineRegistry;
use crate::types::Settings;
use crate::upload::{StoredUpload, UploadError, ALLOWED_EXTENSIONS};

const SERVICE_NAME: &str = "PaddleOCR Server";

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("No file provided")]
    NoFile,

    #[error("Invalid file")]
    InvalidFile,

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Upload(UploadError),
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::InvalidFile => ApiError::InvalidFile,
            other => ApiError::Upload(other),
        }
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NoFile | Self::InvalidFile | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Engine(EngineError::UnsupportedLanguage(_)) => StatusCode::BAD_REQUEST,
            Self::Engine(EngineError::Image(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Engine(EngineError::NoTierAvailable { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub struct AppState {
    pipeline: OcrPipeline,
    upload_dir: Option<PathBuf>,
}

impl AppState {
    pub fn new(settings: &Settings, registry: Arc<EngineRegistry>) -> Self {
        Self {
            pipeline: OcrPipeline::new(settings, registry),
            upload_dir: settings.server.upload_dir.clone(),
        }
    }

    pub fn registry(&self) -> &EngineRegistry {
        self.pipeline.registry()
    }
}

pub fn router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/process", post(process_file))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

/// Builds the command-bridge engines and serves until Ctrl-C.
pub async fn serve(settings: Settings) -> std::io::Result<()> {
    let factory = Arc::new(CommandEngineFactory::new(settings.engine.clone()));
    let registry = Arc::new(EngineRegistry::new(&settings.engine, factory));

    if settings.server.eager_init {
        let ready = registry.warm_up().await;
        tracing::info!(ready, total = registry.languages().len(), "engines initialized");
    }

    let state = Arc::new(AppState::new(&settings, registry));
    let app = router(state, settings.server.max_upload_bytes);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr).await?;
    let local: SocketAddr = listener.local_addr()?;
    tracing::info!(%local, "OCR server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

async fn index(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "service": SERVICE_NAME,
        "endpoints": ["/health", "/process", "/status"],
        "languages": state.registry().languages(),
    }))
}

async fn health(State(state): State<Arc<AppState>>) -> Response {
    let registry = state.registry();
    let result = match registry.engine(registry.default_language()).await {
        Ok(active) => probe(active.engine.as_ref()).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(()) => Json(json!({
            "status": "healthy",
            "languages": registry.languages(),
        }))
        .into_response(),
        Err(err) => {
            tracing::warn!(%err, "health probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unhealthy" })),
            )
                .into_response()
        }
    }
}

async fn status(State(state): State<Arc<AppState>>) -> Json<Value> {
    let registry = state.registry();
    Json(json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "languages": registry.languages(),
        "formats": ALLOWED_EXTENSIONS,
        "engines": registry.status(),
    }))
}

#[derive(Serialize)]
struct ProcessResponse<'a> {
    success: bool,
    filename: &'a str,
    language: &'a str,
    tier: &'a str,
    #[serde(flatten)]
    page: &'a PageReport,
    elapse: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw_result: Option<&'a Value>,
}

struct UploadForm {
    file: Option<(String, Vec<u8>)>,
    language: Option<String>,
    raw: bool,
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm {
        file: None,
        language: None,
        raw: true,
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                form.file = Some((filename, data.to_vec()));
            }
            "language" | "raw" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                if name == "language" {
                    form.language = Some(value);
                } else {
                    form.raw = !matches!(value.trim(), "false" | "0" | "no");
                }
            }
            _ => {}
        }
    }
    Ok(form)
}

async fn process_file(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let form = read_form(multipart).await?;

    let (original_name, data) = form.file.ok_or(ApiError::NoFile)?;
    if original_name.is_empty() {
        return Err(ApiError::InvalidFile);
    }
    let language = state.registry().resolve_language(form.language.as_deref())?;

    let upload = StoredUpload::store(state.upload_dir.as_deref(), &original_name, &data).await?;
    tracing::info!(filename = upload.filename(), language, bytes = data.len(), "processing upload");

    let run = state
        .pipeline
        .run(upload.path(), language, upload.scratch_dir())
        .await?;

    let body = ProcessResponse {
        success: true,
        filename: upload.filename(),
        language,
        tier: &run.tier,
        page: &run.report,
        elapse: run.elapse,
        raw_result: form.raw.then_some(&run.raw),
    };
    Ok(Json(body).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::NoFile.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::from(UploadError::InvalidFile).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(EngineError::UnsupportedLanguage("fr".into())).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(EngineError::Image("bad".into())).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::from(EngineError::NoTierAvailable { language: "es".into() }).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::from(EngineError::UnrecognizedOutput("?".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_message() {
        assert_eq!(ApiError::NoFile.to_string(), "No file provided");
        assert_eq!(
            ApiError::from(EngineError::UnsupportedLanguage("fr".into())).to_string(),
            "unsupported language: fr"
        );
    }
}
