//! # RPC Server
//!
//! - `POST /`: JSON-RPC 2.0, single or batch
//! - `GET /events`: websocket forwarding every bus event as JSON text

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use serde_json::{json, Value};
use shared_bus::{EventFilter, EventStream};
use shared_types::NetAddress;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::context::RpcContext;
use super::routes::{self, RpcFault};

/// Time allowed for in-flight requests after shutdown is requested.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Failed to bind RPC listener on {addr}: {source}")]
    Bind {
        addr: NetAddress,
        #[source]
        source: std::io::Error,
    },
}

/// A running RPC server.
#[derive(Debug)]
pub struct RpcServerHandle {
    local_addr: SocketAddr,
    closing: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RpcServerHandle {
    /// The bound address, with the real port when 0 was requested.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting, close event sockets and wait for the server task.
    pub async fn shutdown(mut self) {
        let _ = self.closing.send(true);
        if tokio::time::timeout(SHUTDOWN_GRACE, &mut self.task).await.is_err() {
            warn!("RPC server did not drain in time, aborting");
            self.task.abort();
        }
    }
}

#[derive(Clone)]
struct AppState {
    ctx: RpcContext,
    closing: watch::Receiver<bool>,
}

/// Bind `addr` and serve in the background. Returns once the socket is
/// bound.
pub async fn serve(addr: &NetAddress, ctx: RpcContext) -> Result<RpcServerHandle, RpcError> {
    let bind_error = |source| RpcError::Bind {
        addr: addr.clone(),
        source,
    };
    let listener = TcpListener::bind((addr.host.as_str(), addr.port))
        .await
        .map_err(bind_error)?;
    let local_addr = listener.local_addr().map_err(bind_error)?;

    let (closing, closing_rx) = watch::channel(false);
    let router = build_router(AppState {
        ctx,
        closing: closing_rx.clone(),
    });

    let task = tokio::spawn(async move {
        let mut closing = closing_rx;
        let shutdown = async move {
            let _ = closing.wait_for(|c| *c).await;
        };
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
        {
            error!(error = %e, "RPC server error");
        }
        info!("RPC server stopped");
    });

    info!(addr = %local_addr, "RPC server listening");
    Ok(RpcServerHandle {
        local_addr,
        closing,
        task,
    })
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", post(handle_json_rpc))
        .route("/events", get(events_ws))
        .with_state(state)
}

fn error_response(id: Value, fault: RpcFault) -> Value {
    json!({
        "jsonrpc": "2.0",
        "error": fault,
        "id": id,
    })
}

async fn handle_json_rpc(State(state): State<AppState>, body: String) -> impl IntoResponse {
    let request: Value = match serde_json::from_str(&body) {
        Ok(v) => v,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(error_response(Value::Null, RpcFault::parse_error(e))),
            );
        }
    };

    let response = match request {
        Value::Array(requests) if requests.is_empty() => {
            error_response(Value::Null, RpcFault::invalid_request("empty batch"))
        }
        Value::Array(requests) => Value::Array(
            requests
                .iter()
                .map(|r| process_single_request(&state.ctx, r))
                .collect(),
        ),
        single => process_single_request(&state.ctx, &single),
    };
    (StatusCode::OK, Json(response))
}

fn process_single_request(ctx: &RpcContext, request: &Value) -> Value {
    let id = request.get("id").cloned().unwrap_or(Value::Null);
    if !(id.is_null() || id.is_string() || id.is_number()) {
        return error_response(
            Value::Null,
            RpcFault::invalid_request("id must be a string, a number or null"),
        );
    }
    if request.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
        return error_response(id, RpcFault::invalid_request("jsonrpc must be \"2.0\""));
    }
    let Some(method) = request.get("method").and_then(Value::as_str) else {
        return error_response(id, RpcFault::invalid_request("missing method"));
    };
    let params = request.get("params").unwrap_or(&Value::Null);

    match routes::dispatch(ctx, method, params) {
        Ok(result) => json!({
            "jsonrpc": "2.0",
            "result": result,
            "id": id,
        }),
        Err(fault) => error_response(id, fault),
    }
}

async fn events_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let events = state.ctx.bus.event_stream(EventFilter::all());
    let closing = state.closing;
    ws.on_upgrade(move |socket| forward_events(socket, events, closing))
}

async fn forward_events(mut socket: WebSocket, mut events: EventStream, mut closing: watch::Receiver<bool>) {
    debug!("Event socket opened");
    loop {
        tokio::select! {
            _ = closing.changed() => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }

            event = events.next() => {
                let Some(event) = event else { break };
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "Failed to encode event");
                        continue;
                    }
                };
                if socket.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }

            incoming = socket.recv() => match incoming {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                Some(Ok(_)) => {}
            },
        }
    }
    debug!("Event socket closed");
}
