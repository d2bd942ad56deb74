//! # podctx Build-Context Receiver
//!
//! File: cli/src/commands/srv/server_logic.rs
//!
//! ## Overview
//!
//! A minimal HTTP endpoint that accepts what `podctx play` sends and reports
//! what it received. It never builds or runs anything.
//!
//! - `POST /play/kube`: compat route. Unknown content types are logged and the
//!   body is treated as an archive (unless `strict_content_type` is set).
//! - `POST /libpod/play/kube`: native route. Unknown content types are `400`.
//!
//! ## Request lifecycle
//!
//! 1. Classify the body by `Content-Type`: `application/json` is a bare
//!    manifest; `application/x-tar`, `application/tar` or no header at all
//!    is a gzipped tar build context.
//! 2. Create a per-request scratch directory (`podctx_kube*`).
//! 3. For archives, stream the body into `<scratch>/build` and locate the
//!    manifest in it. Running out of space maps to "context directory may be
//!    too large".
//! 4. Decode the manifest and answer with a JSON [`PlayReport`].
//! 5. The scratch directory is removed when the request ends, whatever the
//!    outcome.
//!
use super::config::ServerConfig;
use super::utils;
use crate::common::archive;
use crate::common::fs::io::read_file_bytes;
use crate::common::fs::scratch::ScratchDir;
use crate::common::kube::manifest;
use crate::core::error::{PodctxError, Result};
use anyhow::Context;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header::CONTENT_TYPE, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use futures_util::TryStreamExt;
use serde::{Deserialize, Serialize};
use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::io::StreamReader;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{error, info, warn, Level};

/// Prefix of the per-request scratch directories.
const SCRATCH_PREFIX: &str = "podctx_kube";

/// Upper bound for a bare manifest body.
const MANIFEST_BODY_LIMIT: usize = 16 * 1024 * 1024;

/// # Run HTTP Server (`run_server`)
///
/// Binds the first free port starting at the configured one and serves the
/// receiver routes until Ctrl+C or SIGTERM.
///
/// ## Errors
///
/// - No free port within 10 attempts.
/// - Binding the listener fails.
/// - The server itself fails.
pub async fn run_server(config: ServerConfig) -> Result<()> {
    let max_port_attempts = 10;
    let addr = find_available_port(config.host, config.port, max_port_attempts).await?;

    let scratch_display = config
        .scratch_root
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| std::env::temp_dir().display().to_string());
    let app = create_app(config);

    println!("\n=================================================================");
    println!("📦 Receiving build contexts on http://{}", addr);
    println!("   POST /play/kube          (compat)");
    println!("   POST /libpod/play/kube   (native)");
    println!("🗂  Scratch directory root: {}", scratch_display);
    println!("=================================================================\n");

    info!("Starting receiver on {}", addr);
    println!("Server starting! Press Ctrl+C to stop.");

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind TCP listener to address {}", addr))?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    println!("\nServer shutdown complete.");
    Ok(())
}

/// # Handle Shutdown Signal (`shutdown_signal`)
///
/// Resolves on Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, initiating graceful shutdown..."),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
                info!("Received SIGTERM, initiating graceful shutdown...");
            }
            Err(e) => {
                error!(
                    "Failed to install SIGTERM handler: {}. Shutdown on SIGTERM might not work.",
                    e
                );
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// # Find Available Port (`find_available_port`)
///
/// Tries `start_port` and the following ports, up to `max_attempts` in total.
async fn find_available_port(
    req_host: std::net::IpAddr,
    start_port: u16,
    max_attempts: u8,
) -> Result<SocketAddr> {
    let mut current_port = start_port;

    for attempt in 0..max_attempts {
        let addr = SocketAddr::new(req_host, current_port);
        match TcpListener::bind(addr).await {
            Ok(listener) => {
                drop(listener);
                if attempt > 0 {
                    info!(
                        "Port {} was unavailable, successfully bound to available port {}.",
                        start_port, current_port
                    );
                }
                return Ok(addr);
            }
            Err(e) => {
                warn!(
                    "Attempt {}: Port {} on host {} is unavailable (Error: {}). Trying next port...",
                    attempt + 1,
                    current_port,
                    req_host,
                    e
                );
                current_port = current_port.checked_add(1).ok_or_else(|| {
                    anyhow::anyhow!("Ran out of ports while searching from {}", start_port)
                })?;
            }
        }
    }

    anyhow::bail!(
        "Could not find an available port on host {} starting from port {} after trying {} ports.",
        req_host,
        start_port,
        max_attempts
    )
}

/// # Create Axum Application (`create_app`)
///
/// Builds the receiver router with request tracing.
pub fn create_app(config: ServerConfig) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::default().include_headers(true))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/play/kube", post(play_kube_compat))
        .route("/libpod/play/kube", post(play_kube_native))
        .layer(trace_layer)
        .with_state(Arc::new(config))
}

/// Which route a request came in on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Compat,
    Native,
}

/// How a request body is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Payload {
    Manifest,
    Archive,
}

async fn play_kube_compat(
    State(config): State<Arc<ServerConfig>>,
    headers: HeaderMap,
    body: Body,
) -> std::result::Result<Json<PlayReport>, ApiError> {
    play_kube(&config, Route::Compat, &headers, body).await
}

async fn play_kube_native(
    State(config): State<Arc<ServerConfig>>,
    headers: HeaderMap,
    body: Body,
) -> std::result::Result<Json<PlayReport>, ApiError> {
    play_kube(&config, Route::Native, &headers, body).await
}

async fn play_kube(
    config: &ServerConfig,
    route: Route,
    headers: &HeaderMap,
    body: Body,
) -> std::result::Result<Json<PlayReport>, ApiError> {
    let strict = route == Route::Native || config.strict_content_type;
    let payload = classify_payload(headers, strict)?;

    let scratch = ScratchDir::new(SCRATCH_PREFIX, config.scratch_root.as_deref())
        .map_err(ApiError::internal)?;

    let report = match payload {
        Payload::Manifest => {
            let raw = axum::body::to_bytes(body, MANIFEST_BODY_LIMIT)
                .await
                .map_err(|e| ApiError::bad_request(format!("reading request body: {e}")))?;
            build_report(&raw, None).map_err(ApiError::playing)?
        }
        Payload::Archive => {
            let build_dir = scratch.path().join("build");
            utils::create_build_dir(&build_dir).map_err(ApiError::internal)?;

            let reader = StreamReader::new(body.into_data_stream().map_err(io::Error::other));
            archive::extract_stream(reader, build_dir.clone())
                .await
                .map_err(|e| ApiError::internal(PodctxError::from_extract_error(e)))?;
            utils::log_directory_contents(&build_dir);

            tokio::task::spawn_blocking(move || report_from_build_dir(&build_dir))
                .await
                .map_err(|e| ApiError::internal(anyhow::anyhow!("report worker failed: {e}")))??
        }
    };

    scratch.close();
    info!(
        "Received {} document(s), {} pod(s)",
        report.documents,
        report.pods.len()
    );
    Ok(Json(report))
}

/// Decides how to read the body from its `Content-Type`.
fn classify_payload(headers: &HeaderMap, strict: bool) -> std::result::Result<Payload, ApiError> {
    let Some(value) = headers.get(CONTENT_TYPE) else {
        return Ok(Payload::Archive);
    };
    let raw = String::from_utf8_lossy(value.as_bytes());
    let media_type = raw.split(';').next().unwrap_or_default().trim();

    match media_type {
        "application/json" => Ok(Payload::Manifest),
        "application/x-tar" => Ok(Payload::Archive),
        "application/tar" => {
            info!(
                "tar file content type is {}, should use \"application/x-tar\" content type",
                media_type
            );
            Ok(Payload::Archive)
        }
        other if strict => Err(ApiError::bad_request(format!(
            "Content-Type: {other} is not supported. Should be \"application/x-tar\""
        ))),
        other => {
            info!(
                "tar file content type is {}, should use \"application/x-tar\" content type",
                other
            );
            Ok(Payload::Archive)
        }
    }
}

fn report_from_build_dir(build_dir: &Path) -> std::result::Result<PlayReport, ApiError> {
    let manifest_path = utils::locate_manifest(build_dir).ok_or_else(|| {
        ApiError::bad_request("build context does not contain a play.yaml manifest".to_string())
    })?;
    let raw = read_file_bytes(&manifest_path).map_err(ApiError::internal)?;
    build_report(&raw, Some(build_dir)).map_err(ApiError::playing)
}

/// What the receiver found in a request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayReport {
    /// Number of non-empty YAML documents.
    pub documents: usize,
    /// `kind` of every document, in order.
    pub kinds: Vec<String>,
    pub pods: Vec<PodReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PodReport {
    pub name: String,
    pub containers: Vec<ContainerReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContainerReport {
    pub name: String,
    pub image: String,
    /// Build file inside the received context, relative to it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_file: Option<String>,
}

/// Decodes `raw` and, given a received context, resolves build files in it.
fn build_report(raw: &[u8], build_dir: Option<&Path>) -> Result<PlayReport> {
    let documents = manifest::split_documents(raw)?;
    let mut report = PlayReport {
        documents: documents.len(),
        kinds: Vec::with_capacity(documents.len()),
        pods: Vec::new(),
    };

    for document in &documents {
        let kind = manifest::document_kind(document)?;
        report.kinds.push(kind.clone());
        if kind != manifest::KIND_POD {
            continue;
        }

        let pod = manifest::decode_pod(document)?;
        let mut containers = Vec::with_capacity(pod.spec.containers.len());
        for container in &pod.spec.containers {
            let image = container.image.clone().unwrap_or_default();
            let build_file = match build_dir {
                Some(dir) if !image.is_empty() => manifest::resolve_build_file(&image, dir)?
                    .and_then(|path| {
                        path.strip_prefix(dir)
                            .ok()
                            .map(|rel| rel.to_string_lossy().replace('\\', "/"))
                    }),
                _ => None,
            };
            containers.push(ContainerReport {
                name: container.name.clone().unwrap_or_default(),
                image,
                build_file,
            });
        }
        report.pods.push(PodReport {
            name: pod.metadata.name.unwrap_or_default(),
            containers,
        });
    }

    Ok(report)
}

/// # API Error (`ApiError`)
///
/// Error response body: `{"cause": ..., "message": ..., "response": <status>}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    cause: String,
    message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub cause: String,
    pub message: String,
    pub response: u16,
}

impl ApiError {
    fn bad_request(message: String) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            cause: message.clone(),
            message,
        }
    }

    fn internal(err: impl Into<anyhow::Error>) -> Self {
        let err = err.into();
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            cause: err.root_cause().to_string(),
            message: format!("{err:#}"),
        }
    }

    /// Manifest processing failure.
    fn playing(err: anyhow::Error) -> Self {
        Self::internal(err.context("playing YAML file"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("Request failed: {}", self.message);
        } else {
            warn!("Request rejected: {}", self.message);
        }
        let body = ErrorBody {
            cause: self.cause,
            message: self.message,
            response: self.status.as_u16(),
        };
        (self.status, Json(body)).into_response()
    }
}
