use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};
use axum::http::{HeaderValue, Method, StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::Stream;
use futures::stream;
use tokio::sync::watch;
use tokio::time::Interval;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::assets::{self, StaticResponseError};
use crate::config::ServerConfig;
use crate::form::{FormConfig, FormResponse};
use crate::gate::{ResolutionGate, SessionOutcome};

/// Per-session shared state. Nothing here outlives one interaction.
#[derive(Clone)]
pub(crate) struct AppState {
    form: Arc<FormConfig>,
    gate: Arc<ResolutionGate>,
    /// Monotonic id of the most recently opened disconnect stream; older
    /// streams notice they were superseded and end without firing the gate.
    stream_epoch: Arc<AtomicU64>,
    static_dir: Arc<PathBuf>,
    heartbeat_interval: Duration,
    ack_grace: Duration,
}

impl AppState {
    pub(crate) fn new(form: FormConfig, gate: Arc<ResolutionGate>, config: &ServerConfig) -> Self {
        Self {
            form: Arc::new(form),
            gate,
            stream_epoch: Arc::new(AtomicU64::new(0)),
            static_dir: Arc::new(config.static_dir.clone()),
            heartbeat_interval: config.heartbeat_interval,
            ack_grace: config.ack_grace,
        }
    }
}

pub(crate) fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/connection", get(connection_stream))
        .route("/api/config", get(form_config))
        .route("/api/submit", post(submit_response))
        .fallback(static_or_spa)
        .with_state(state)
        .layer(middleware::from_fn(cors_gate))
        .layer(TraceLayer::new_for_http())
}

/// The consuming page is served by this same ephemeral server; the
/// permissive headers exist only so the loopback UI never trips a browser
/// CORS check.
async fn cors_gate(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}

async fn form_config(State(state): State<AppState>) -> Json<FormConfig> {
    Json(state.form.as_ref().clone())
}

/// Accepts the one structured submission. Malformed bodies get a 400 and do
/// not touch the gate, so the human can retry. A well-formed payload claims
/// the gate synchronously, then delivers (and shuts the listener down) after
/// the ack grace delay so this request's 200 reaches the UI first. A valid
/// payload arriving after the gate already fired is acknowledged and
/// discarded.
async fn submit_response(State(state): State<AppState>, body: Bytes) -> Response {
    let value: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(_) => return validation_failure("Invalid JSON"),
    };
    let response: FormResponse = match serde_json::from_value(value) {
        Ok(response) => response,
        Err(_) => return validation_failure("Invalid form response"),
    };

    if state.gate.try_claim() {
        let gate = state.gate.clone();
        let grace = state.ack_grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            gate.deliver(SessionOutcome::Resolved(response));
        });
    } else {
        debug!("submission arrived after resolution; discarding");
    }

    (StatusCode::OK, Json(serde_json::json!({"success": true}))).into_response()
}

fn validation_failure(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({"error": message})),
    )
        .into_response()
}

struct DisconnectStream {
    guard: DisconnectGuard,
    interval: Interval,
    shutdown: watch::Receiver<bool>,
    connected_sent: bool,
}

/// Dropped when the stream ends for any reason. A drop while this stream is
/// still the active one means the browser window went away without
/// submitting, which is the skip signal.
struct DisconnectGuard {
    epoch: u64,
    epochs: Arc<AtomicU64>,
    gate: Arc<ResolutionGate>,
}

impl DisconnectGuard {
    fn superseded(&self) -> bool {
        self.epochs.load(Ordering::SeqCst) != self.epoch
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if self.superseded() {
            debug!(epoch = self.epoch, "superseded disconnect stream ended");
            return;
        }
        if self
            .gate
            .resolve(SessionOutcome::Resolved(FormResponse::skipped()))
        {
            debug!("disconnect stream closed without a submission; resolving with skip");
        }
    }
}

/// Long-lived stream the UI opens on load. There is no client-side goodbye
/// message: the browser severing this connection is the close signal, and
/// heartbeats exist only to keep intermediaries from cutting it earlier.
async fn connection_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let epoch = state.stream_epoch.fetch_add(1, Ordering::SeqCst) + 1;
    debug!(epoch, "disconnect stream opened");

    let period = state.heartbeat_interval;
    let stream_state = DisconnectStream {
        guard: DisconnectGuard {
            epoch,
            epochs: state.stream_epoch.clone(),
            gate: state.gate.clone(),
        },
        interval: tokio::time::interval_at(tokio::time::Instant::now() + period, period),
        shutdown: state.gate.shutdown_signal(),
        connected_sent: false,
    };

    let stream = stream::unfold(stream_state, |mut s| async move {
        if !s.connected_sent {
            s.connected_sent = true;
            return Some((Ok(Event::default().event("connected").data("{}")), s));
        }

        let event = tokio::select! {
            _ = s.interval.tick() => {
                if s.guard.superseded() {
                    None
                } else {
                    Some(Event::default().event("heartbeat").data("{}"))
                }
            }
            _ = s.shutdown.wait_for(|stop| *stop) => None,
        };
        event.map(|event| (Ok(event), s))
    });

    Sse::new(stream)
}

/// GET anything else: exact asset first, then the single-page-application
/// fallback to index.html, then 404. Non-GET methods on unrouted paths are
/// refused.
async fn static_or_spa(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    if method != Method::GET {
        return (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed").into_response();
    }

    let path = uri.path();
    let requested = if path == "/" { "index.html" } else { path };

    match assets::serve_asset(&state.static_dir, requested).await {
        Ok(response) => return response,
        Err(StaticResponseError::NotFound(_)) => {}
        Err(error) => {
            warn!(%error, "failed to serve static asset");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
        }
    }

    match assets::serve_asset(&state.static_dir, "index.html").await {
        Ok(response) => response,
        Err(_) => (StatusCode::NOT_FOUND, "Not Found").into_response(),
    }
}
