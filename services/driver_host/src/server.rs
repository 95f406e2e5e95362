//! Unix Socket Server
//!
//! Accepts controller connections and answers newline-delimited JSON requests.
//! Each connection is served by its own task; requests on one connection are
//! answered in order. Invocations block, so every request runs on the blocking
//! pool behind a semaphore sized by `server.max_concurrent_requests`.
//!
//! ```text
//! controller ──line──▶ connection task ──permit──▶ spawn_blocking(handle_request)
//!            ◀─line──                  ◀──────────── Response
//! ```
//!
//! Shutdown is signalled through a [`Notify`]: the accept loop stops, open
//! connections finish the request in flight and close, and the socket file is
//! removed.

use crate::protocol::{handle_request, parse_request, Request, Response, INTERNAL_ERROR};
use anyhow::{Context, Result};
use driver_config::ServerSettings;
use driver_invoker::Invoker;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{watch, Notify, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn, Instrument};

/// How long open connections get to finish after shutdown is requested
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

static CONNECTION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

pub struct DriverServer {
    invoker: Arc<Invoker>,
    settings: ServerSettings,
    shutdown: Arc<Notify>,
    requests: Arc<Semaphore>,
}

impl DriverServer {
    pub fn new(invoker: Arc<Invoker>, settings: ServerSettings, shutdown: Arc<Notify>) -> Self {
        let requests = Arc::new(Semaphore::new(settings.max_concurrent_requests));
        Self {
            invoker,
            settings,
            shutdown,
            requests,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.settings.socket_path
    }

    /// Bind the configured socket, replacing a stale socket file
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(&self) -> Result<UnixListener> {
        let path = self.socket_path();
        if path.exists() {
            std::fs::remove_file(path)
                .with_context(|| format!("Failed to remove existing socket {:?}", path))?;
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create socket directory {:?}", parent))?;
        }

        let listener =
            UnixListener::bind(path).with_context(|| format!("Failed to bind Unix socket {:?}", path))?;
        info!("Driver host listening on: {:?}", path);
        Ok(listener)
    }

    /// Serve connections until shutdown is signalled
    pub async fn serve(&self, listener: UnixListener) -> Result<()> {
        let (closing_tx, closing_rx) = watch::channel(false);
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = self.shutdown.notified() => {
                    info!("Shutdown requested");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let connection_id = CONNECTION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
                        debug!(connection_id, "Accepted controller connection");
                        let span = tracing::info_span!("connection", connection_id);
                        connections.spawn(
                            serve_connection(
                                stream,
                                self.invoker.clone(),
                                self.requests.clone(),
                                closing_rx.clone(),
                            )
                            .instrument(span),
                        );
                    }
                    Err(e) => warn!(error = %e, "Failed to accept connection"),
                },
                Some(finished) = connections.join_next(), if !connections.is_empty() => {
                    log_connection_end(finished);
                }
            }
        }

        let _ = closing_tx.send(true);
        let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
            while let Some(finished) = connections.join_next().await {
                log_connection_end(finished);
            }
        })
        .await;
        if drained.is_err() {
            warn!(open = connections.len(), "Aborting connections still open after grace period");
            connections.abort_all();
        }

        self.remove_socket();
        Ok(())
    }

    fn remove_socket(&self) {
        let path = self.socket_path();
        if path.exists() {
            if let Err(e) = std::fs::remove_file(path) {
                warn!(error = %e, "Failed to remove socket file {:?}", path);
            }
        }
    }
}

fn log_connection_end(finished: std::result::Result<Result<()>, tokio::task::JoinError>) {
    match finished {
        Ok(Ok(())) => debug!("Controller connection closed"),
        Ok(Err(e)) => warn!(error = %e, "Controller connection failed"),
        Err(e) => error!(error = %e, "Connection task failed"),
    }
}

async fn serve_connection(
    stream: UnixStream,
    invoker: Arc<Invoker>,
    requests: Arc<Semaphore>,
    mut closing: watch::Receiver<bool>,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read request")?,
            _ = closing.changed() => break,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        let response = match parse_request(&line) {
            Ok(request) => dispatch(&invoker, &requests, request).await,
            Err(response) => {
                warn!("Rejected malformed request");
                response
            }
        };

        let mut encoded = serde_json::to_string(&response).context("Failed to encode response")?;
        encoded.push('\n');
        writer
            .write_all(encoded.as_bytes())
            .await
            .context("Failed to write response")?;
    }

    Ok(())
}

async fn dispatch(invoker: &Arc<Invoker>, requests: &Semaphore, request: Request) -> Response {
    let _permit = match requests.acquire().await {
        Ok(permit) => permit,
        Err(_) => return Response::error(INTERNAL_ERROR, "request limiter closed"),
    };

    let op = request.op();
    let invoker = invoker.clone();
    match tokio::task::spawn_blocking(move || handle_request(&invoker, request)).await {
        Ok(response) => response,
        Err(e) => {
            error!(op, error = %e, "Request task failed");
            Response::error(INTERNAL_ERROR, e.to_string())
        }
    }
}
