use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use session::SessionId;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::channels::{session_channel, SessionWriteTx};
use crate::protocol::{parse_client_message, ClientMessage, ServerMessage};

/// How long a closing session waits for its writer to flush queued frames.
const WRITER_DRAIN: Duration = Duration::from_millis(500);

/// Receives the events of every WebSocket session, in per-connection order.
#[async_trait]
pub trait SessionHandler: Send + Sync + 'static {
    async fn on_connect(&self, session_id: SessionId, outbound: SessionWriteTx);
    async fn on_message(&self, session_id: SessionId, message: ClientMessage);
    async fn on_disconnect(&self, session_id: SessionId);
}

/// Shared state for the axum WebSocket handler.
#[derive(Clone)]
struct AppState {
    next_session_id: Arc<AtomicU64>,
    handler: Arc<dyn SessionHandler>,
    max_input_length: usize,
    shutdown_rx: watch::Receiver<bool>,
}

/// Build a router exposing `/ws`. Session ids start at 1.
pub fn ws_router(
    handler: Arc<dyn SessionHandler>,
    max_input_length: usize,
    shutdown_rx: watch::Receiver<bool>,
) -> Router {
    let state = AppState {
        next_session_id: Arc::new(AtomicU64::new(1)),
        handler,
        max_input_length,
        shutdown_rx,
    };

    Router::new()
        .route("/ws", get(ws_upgrade_handler))
        .with_state(state)
}

/// Serve `app` on `listener` until the shutdown flag flips.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Web server listening on {}", addr);
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            wait_for_shutdown(&mut shutdown_rx).await;
            tracing::info!("Web server shutting down gracefully");
        })
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
}

/// Resolve once `rx` carries `true`.
pub async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            // Sender gone without signalling: never shut down from here.
            std::future::pending::<()>().await;
        }
    }
}

async fn ws_upgrade_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

async fn handle_ws_connection(socket: WebSocket, state: AppState) {
    let session_id = SessionId(state.next_session_id.fetch_add(1, Ordering::Relaxed));
    tracing::info!(session_id = %session_id, "New WebSocket connection");

    let (mut ws_writer, mut ws_reader) = socket.split();
    let (write_tx, mut write_rx) = session_channel();
    let reply_tx = write_tx.clone();

    state.handler.on_connect(session_id, write_tx).await;

    // Writer task: forward queued frames as WS text frames
    let mut writer_handle = tokio::spawn(async move {
        while let Some(text) = write_rx.recv().await {
            if ws_writer.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let mut shutdown_rx = state.shutdown_rx.clone();
    loop {
        let frame = tokio::select! {
            frame = ws_reader.next() => frame,
            _ = wait_for_shutdown(&mut shutdown_rx) => break,
        };

        match frame {
            Some(Ok(Message::Text(text))) => {
                match decode_frame(session_id, text.as_str(), state.max_input_length) {
                    Ok(msg) => state.handler.on_message(session_id, msg).await,
                    Err(reason) => {
                        let _ = reply_tx.send(ServerMessage::error(reason).to_json());
                    }
                }
            }
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {} // Ignore binary, ping, pong
            Some(Err(e)) => {
                tracing::debug!(session_id = %session_id, "WebSocket read error: {}", e);
                break;
            }
        }
    }

    state.handler.on_disconnect(session_id).await;
    drop(reply_tx);

    if tokio::time::timeout(WRITER_DRAIN, &mut writer_handle)
        .await
        .is_err()
    {
        writer_handle.abort();
    }
    tracing::info!(session_id = %session_id, "WebSocket session ended");
}

/// Validate and decode one text frame. The error string is sent back to the
/// client as an `error` event.
pub(crate) fn decode_frame(
    session_id: SessionId,
    text: &str,
    max_input_length: usize,
) -> Result<ClientMessage, String> {
    if text.len() > max_input_length {
        tracing::debug!(
            session_id = %session_id,
            len = text.len(),
            "Frame exceeds max input length"
        );
        return Err("Message too long".to_string());
    }

    parse_client_message(text).map_err(|e| {
        tracing::debug!(session_id = %session_id, "Invalid client message: {}", e);
        "Invalid message".to_string()
    })
}
