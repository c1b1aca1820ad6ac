//! HTTP endpoint handlers for the stream server.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/api/status` | Stream counters, viewers, camera, consumer lag |

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::{Html, IntoResponse};
use causet_pipeline::LagReading;
use chrono::Utc;
use serde::Serialize;

use crate::camera::Camera;
use crate::state::{AppState, StatsReading};

/// Body of `GET /api/status`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// Run being streamed.
    pub run_id: String,
    /// Seconds since the server state was created.
    pub uptime_seconds: i64,
    /// Sockets currently connected.
    pub viewers: usize,
    /// Current camera.
    pub camera: Camera,
    /// Lag of each registered consumer, by name.
    pub consumers: BTreeMap<String, LagReading>,
    /// Stream counters.
    #[serde(flatten)]
    pub stats: StatsReading,
}

impl StatusResponse {
    /// Capture the current status.
    pub fn capture(state: &AppState) -> Self {
        Self {
            run_id: state.run_id.to_string(),
            uptime_seconds: Utc::now()
                .signed_duration_since(state.started_at)
                .num_seconds(),
            viewers: state.viewer_count(),
            camera: state.camera(),
            consumers: state.consumer_lag(),
            stats: state.stats.read(),
        }
    }
}

/// `GET /api/status`
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse::capture(&state))
}

/// Serve a minimal HTML page showing stream status.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let status = StatusResponse::capture(&state);
    let last_tick = status
        .stats
        .last_tick
        .map_or_else(|| String::from("-"), |t| t.to_string());
    let [x, y, z] = status.camera.cam_pos;
    let packets = status.stats.packets_sent;
    let viewers = status.viewers;
    let run_id = &status.run_id;

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Causet Stream</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; margin-bottom: 0.25rem; }}
        .subtitle {{ color: #8b949e; margin-top: 0; }}
        .metric {{
            display: inline-block;
            background: #161b22;
            border: 1px solid #30363d;
            border-radius: 6px;
            padding: 1rem 1.5rem;
            margin: 0.5rem 0.5rem 0.5rem 0;
            min-width: 120px;
        }}
        .metric .label {{ color: #8b949e; font-size: 0.85rem; }}
        .metric .value {{ color: #58a6ff; font-size: 1.5rem; font-weight: bold; }}
        a {{ color: #58a6ff; text-decoration: none; }}
        code {{ color: #7ee787; }}
    </style>
</head>
<body>
    <h1>Causet Stream</h1>
    <p class="subtitle">Run {run_id}</p>

    <div>
        <div class="metric">
            <div class="label">Last tick</div>
            <div class="value">{last_tick}</div>
        </div>
        <div class="metric">
            <div class="label">Packets</div>
            <div class="value">{packets}</div>
        </div>
        <div class="metric">
            <div class="label">Viewers</div>
            <div class="value">{viewers}</div>
        </div>
        <div class="metric">
            <div class="label">Camera</div>
            <div class="value">{x:.1}, {y:.1}, {z:.1}</div>
        </div>
    </div>

    <p><a href="/api/status">/api/status</a> -- stream status JSON</p>
    <p><code>ws://host:port/ws/stream</code> -- live brick packets</p>
</body>
</html>"#
    ))
}
