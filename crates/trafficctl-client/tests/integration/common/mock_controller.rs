//! Mock traffic controller HTTP server for integration tests.
//!
//! Serves the four controller endpoints from in-memory state:
//! - `GET /api/status` returns the held status (or a scripted error code)
//! - `GET /api/camera/{index}` returns scripted frames
//! - `GET /api/analytics` returns the held analytics or 404
//! - `POST /api/control` records bodies and flips `running`

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};

#[derive(Default)]
struct Inner {
    status: Value,
    status_error: Option<u16>,
    frames: HashMap<usize, Option<String>>,
    analytics: Option<Value>,
    controls: Vec<Value>,
}

type Shared = Arc<Mutex<Inner>>;

/// A mock controller bound to an ephemeral local port.
pub struct MockController {
    addr: SocketAddr,
    state: Shared,
    shutdown_tx: oneshot::Sender<()>,
}

pub fn sample_status() -> Value {
    json!({
        "running": false,
        "manual_override": false,
        "current_states": ["RED", "RED", "RED", "RED"],
        "vehicle_counts": [4, 0, 2, 1],
        "extra_counts": [0, 3, 0, 0],
        "current_direction": 0,
        "remaining_time": 0,
        "direction_names": ["North", "East", "South", "West"]
    })
}

fn error(code: StatusCode, message: &str) -> Response {
    (code, Json(json!({ "error": message }))).into_response()
}

async fn status(State(state): State<Shared>) -> Response {
    let inner = state.lock().await;
    match inner.status_error {
        Some(code) => error(
            StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            "status unavailable",
        ),
        None => Json(inner.status.clone()).into_response(),
    }
}

async fn camera(Path(index): Path<usize>, State(state): State<Shared>) -> Response {
    let inner = state.lock().await;
    match inner.frames.get(&index) {
        Some(frame) => Json(json!({ "image": frame })).into_response(),
        None => error(StatusCode::BAD_REQUEST, "Invalid camera ID"),
    }
}

async fn analytics(State(state): State<Shared>) -> Response {
    let inner = state.lock().await;
    match &inner.analytics {
        Some(body) => Json(body.clone()).into_response(),
        None => error(StatusCode::NOT_FOUND, "No data available"),
    }
}

async fn control(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut inner = state.lock().await;
    inner.controls.push(body.clone());

    let message = match body.get("action").and_then(Value::as_str) {
        Some("start") => {
            inner.status["running"] = json!(true);
            "System started"
        }
        Some("stop") => {
            inner.status["running"] = json!(false);
            "System stopped"
        }
        Some("manual_override") => {
            let enabled = body.get("enabled").cloned().unwrap_or(json!(false));
            if enabled == json!(true) {
                if let Some(states) = body.get("states") {
                    inner.status["current_states"] = states.clone();
                }
            }
            inner.status["manual_override"] = enabled;
            "Manual override updated"
        }
        _ => return error(StatusCode::BAD_REQUEST, "Invalid action"),
    };
    Json(json!({ "message": message })).into_response()
}

impl MockController {
    /// Start a mock controller on an available port.
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(Inner {
            status: sample_status(),
            ..Default::default()
        }));

        let app = Router::new()
            .route("/api/status", get(status))
            .route("/api/camera/{index}", get(camera))
            .route("/api/analytics", get(analytics))
            .route("/api/control", post(control))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown_tx,
        }
    }

    /// Controller origin (`http://127.0.0.1:<port>`).
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn set_status(&self, status: Value) {
        self.state.lock().await.status = status;
    }

    pub async fn set_status_error(&self, code: Option<u16>) {
        self.state.lock().await.status_error = code;
    }

    pub async fn set_frame(&self, index: usize, image: Option<&str>) {
        self.state
            .lock()
            .await
            .frames
            .insert(index, image.map(str::to_string));
    }

    pub async fn set_analytics(&self, body: Value) {
        self.state.lock().await.analytics = Some(body);
    }

    /// Control bodies received so far.
    pub async fn controls(&self) -> Vec<Value> {
        self.state.lock().await.controls.clone()
    }

    /// Shutdown the server.
    pub fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
    }
}
