//! `WebSocket` handler for the live brick stream.
//!
//! Viewers connect to `GET /ws/stream` and receive one JSON
//! [`StreamPacket`](crate::packet::StreamPacket) text frame per streamed
//! snapshot. A viewer steers the camera by sending a
//! `{"camPos":[..],"camDir":[..]}` text message; malformed messages are
//! logged and ignored, the socket stays open.
//!
//! If a viewer falls behind, lagged frames are skipped and the viewer
//! resumes from the most recent one.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::camera::Camera;
use crate::state::AppState;

/// Upgrade an HTTP request to a `WebSocket` connection and begin
/// streaming packets.
///
/// # Route
///
/// `GET /ws/stream`
pub async fn ws_stream(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

/// Apply one viewer text message to the shared camera.
///
/// Returns the new camera, or `None` if the message was rejected.
pub fn apply_viewer_message(state: &AppState, text: &str) -> Option<Camera> {
    match Camera::from_viewer_message(text) {
        Ok(camera) => {
            state.set_camera(camera);
            debug!(cam_pos = ?camera.cam_pos, cam_dir = ?camera.cam_dir, "Camera moved");
            Some(camera)
        }
        Err(e) => {
            state.stats.record_rejected_message();
            warn!(error = %e, "Ignoring malformed viewer message");
            None
        }
    }
}

async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    let mut rx = state.transport.subscribe();
    info!(viewers = state.viewer_count(), "Viewer connected");

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(frame) => {
                        let msg = Message::Text(frame.to_string().into());
                        if socket.send(msg).await.is_err() {
                            debug!("Viewer disconnected (send failed)");
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        debug!(skipped = n, "Viewer lagged, skipping ahead");
                    }
                    Err(RecvError::Closed) => {
                        debug!("Transport closed, shutting down socket");
                        break;
                    }
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Viewer disconnected");
                        break;
                    }
                    Some(Ok(Message::Text(text))) => {
                        apply_viewer_message(&state, text.as_str());
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!("Viewer disconnected (pong failed)");
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket error: {e}");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    drop(rx);
    info!(viewers = state.viewer_count(), "Viewer left");
}
