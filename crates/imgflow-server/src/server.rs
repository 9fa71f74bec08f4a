// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP binding for the image operation engine.
//
// The server listens on raw TCP and parses just enough HTTP/1.1 to serve
// three routes:
//
//   - POST    /process   run one operation, reply `{result}` or `{detail}`
//   - GET     /health    liveness probe, `{"status":"ok"}`
//   - OPTIONS *          CORS preflight, 204
//
// Each connection is handled in its own task; the pixel work for a request
// runs on the blocking pool so the accept loop stays responsive.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::Serialize;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};

use imgflow_core::error::{ImgflowError, Result};
use imgflow_core::types::{
    ErrorResponse, OperationRequest, ProcessResponse, RequestId, ServerStatus,
};
use imgflow_core::ServerConfig;

use crate::http::{self, HttpRequest, HttpResponse};

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
}

fn error_response(err: &ImgflowError) -> HttpResponse {
    HttpResponse::json(
        err.status_code(),
        &ErrorResponse {
            detail: err.to_string(),
        },
    )
}

// ---------------------------------------------------------------------------
// Shared state passed to connection handlers
// ---------------------------------------------------------------------------

/// State shared across all connection-handling tasks.
struct SharedState {
    /// Largest accepted request body.
    max_body_bytes: usize,
    /// Value of `Access-Control-Allow-Origin` on every response.
    cors_allow_origin: String,
    /// Counter of active connections.
    active_connections: Arc<AtomicU32>,
}

// ---------------------------------------------------------------------------
// ProcessServer
// ---------------------------------------------------------------------------

/// The `POST /process` service.
pub struct ProcessServer {
    config: ServerConfig,
    /// Current lifecycle state of the server.
    status: ServerStatus,
    /// Notification handle used to signal a graceful shutdown.
    shutdown_signal: Arc<Notify>,
    /// Handle to the Tokio task running the accept loop.
    task_handle: Option<JoinHandle<()>>,
    /// Counter of currently active TCP connections.
    active_connections: Arc<AtomicU32>,
    /// Address actually bound, known once running.
    local_addr: Option<SocketAddr>,
}

impl ProcessServer {
    /// Create a server in `Stopped` state. Call [`start`](Self::start) to
    /// begin accepting connections.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            status: ServerStatus::Stopped,
            shutdown_signal: Arc::new(Notify::new()),
            task_handle: None,
            active_connections: Arc::new(AtomicU32::new(0)),
            local_addr: None,
        }
    }

    /// Configured port. Port 0 asks the OS for a free one; see
    /// [`local_addr`](Self::local_addr) for the result.
    pub fn port(&self) -> u16 {
        self.config.port
    }

    pub fn status(&self) -> ServerStatus {
        self.status
    }

    pub fn active_connections(&self) -> u32 {
        self.active_connections.load(Ordering::Relaxed)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Bind the listener and spawn the accept loop.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is already in use or the listener
    /// cannot be created.
    pub async fn start(&mut self) -> Result<()> {
        if self.status == ServerStatus::Running {
            debug!(port = self.config.port, "server already running");
            return Ok(());
        }

        self.status = ServerStatus::Starting;

        let bind_addr = SocketAddr::new(self.config.bind_address, self.config.port);
        let listener = match TcpListener::bind(bind_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                self.status = ServerStatus::Error;
                return Err(ImgflowError::Server(format!("bind {bind_addr}: {e}")));
            }
        };
        let local_addr = listener.local_addr()?;
        self.local_addr = Some(local_addr);

        info!(
            addr = %local_addr,
            max_body_bytes = self.config.max_body_bytes,
            "imgflow listening"
        );

        let shutdown = Arc::clone(&self.shutdown_signal);
        let shared = Arc::new(SharedState {
            max_body_bytes: self.config.max_body_bytes,
            cors_allow_origin: self.config.cors_allow_origin.clone(),
            active_connections: Arc::clone(&self.active_connections),
        });

        let handle = tokio::spawn(async move {
            Self::accept_loop(listener, shutdown, shared).await;
        });

        self.task_handle = Some(handle);
        self.status = ServerStatus::Running;
        Ok(())
    }

    /// Gracefully stop the server.
    ///
    /// Signals the accept loop to exit and awaits it. Requests already being
    /// processed run to completion.
    pub async fn stop(&mut self) -> Result<()> {
        if self.status != ServerStatus::Running {
            return Ok(());
        }

        info!(addr = ?self.local_addr, "stopping imgflow server");
        self.shutdown_signal.notify_one();

        if let Some(handle) = self.task_handle.take() {
            handle
                .await
                .map_err(|e| ImgflowError::Server(format!("task join: {e}")))?;
        }

        self.status = ServerStatus::Stopped;
        info!("imgflow server stopped");
        Ok(())
    }

    /// The main accept loop. Runs until the shutdown signal is received.
    async fn accept_loop(listener: TcpListener, shutdown: Arc<Notify>, shared: Arc<SharedState>) {
        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    debug!("accept loop received shutdown signal");
                    break;
                }

                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer_addr)) => {
                            let request_id = RequestId::new();
                            let span = info_span!("request", id = %request_id, peer = %peer_addr);
                            let state = Arc::clone(&shared);
                            tokio::spawn(
                                async move {
                                    state.active_connections.fetch_add(1, Ordering::Relaxed);
                                    if let Err(e) = Self::handle_connection(stream, &state).await {
                                        warn!(error = %e, "connection handler error");
                                    }
                                    state.active_connections.fetch_sub(1, Ordering::Relaxed);
                                }
                                .instrument(span),
                            );
                        }
                        Err(e) => {
                            error!(error = %e, "failed to accept connection");
                        }
                    }
                }
            }
        }
    }

    /// Read one request, route it and write the reply.
    async fn handle_connection(mut stream: TcpStream, state: &SharedState) -> Result<()> {
        let response = match http::read_request(&mut stream, state.max_body_bytes).await {
            Ok(Some(request)) => {
                debug!(
                    method = %request.method,
                    path = %request.path,
                    body_bytes = request.body.len(),
                    "request received"
                );
                route(request).await
            }
            Ok(None) => {
                debug!("empty connection, closing");
                return Ok(());
            }
            Err(ImgflowError::Io(e)) => return Err(ImgflowError::Io(e)),
            Err(e) => {
                warn!(error = %e, "unreadable request");
                error_response(&e)
            }
        };

        http::write_response(&mut stream, &response, &state.cors_allow_origin).await?;
        info!(status = response.status, bytes = response.body.len(), "response sent");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Map a request to its response.
pub async fn route(request: HttpRequest) -> HttpResponse {
    if request.method == "OPTIONS" {
        return HttpResponse::no_content();
    }

    match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/health") => HttpResponse::json(200, &Health { status: "ok" }),
        ("POST", "/process") => process(request.body).await,
        (_, "/health") | (_, "/process") => error_response(&ImgflowError::InvalidRequest(
            format!("method {} not allowed", request.method),
        ))
        .with_status(405),
        (_, path) => HttpResponse::json(
            404,
            &ErrorResponse {
                detail: format!("no route for {path}"),
            },
        ),
    }
}

async fn process(body: Vec<u8>) -> HttpResponse {
    let request: OperationRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "request body is not a valid operation request");
            return error_response(&ImgflowError::InvalidRequest(format!("invalid JSON body: {e}")));
        }
    };

    run_blocking(move || imgflow_ops::process(&request)).await
}

/// Run `job` on the blocking pool and turn its outcome into a reply. A panic
/// inside the job becomes a `Transform` error (500).
async fn run_blocking<F>(job: F) -> HttpResponse
where
    F: FnOnce() -> Result<ProcessResponse> + Send + 'static,
{
    match tokio::task::spawn_blocking(job).await {
        Ok(Ok(reply)) => HttpResponse::json(200, &reply),
        Ok(Err(e)) => error_response(&e),
        Err(join) if join.is_panic() => {
            error!(error = %join, "transform panicked");
            error_response(&ImgflowError::Transform(format!("operation aborted: {join}")))
        }
        Err(join) => error_response(&ImgflowError::Server(format!("processing task failed: {join}"))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
