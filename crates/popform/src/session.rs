use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::browser::{self, CommandRunner, SystemRunner};
use crate::config::ServerConfig;
use crate::form::{FormConfig, FormResponse};
use crate::gate::{ResolutionGate, SessionOutcome};
use crate::server::{AppState, build_router};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to bind a loopback listener: {0}")]
    Bind(#[source] io::Error),
    #[error("form session transport failed: {0}")]
    Transport(String),
    #[error("form session was closed before a response arrived")]
    Closed,
}

/// Handle that can end a running session from outside, for example from a
/// Ctrl-C handler. Closing an already-resolved session is a no-op.
#[derive(Clone)]
pub struct SessionCloser {
    gate: Arc<ResolutionGate>,
}

impl SessionCloser {
    /// Returns true if this call is what ended the session.
    pub fn force_close(&self) -> bool {
        self.gate.resolve(SessionOutcome::Closed)
    }
}

/// One live form session: an ephemeral loopback listener plus the gate its
/// handlers resolve through. Consumed by `await_response`; the listener never
/// outlives the outcome.
pub struct ActiveSession {
    local_addr: SocketAddr,
    gate: Arc<ResolutionGate>,
    outcome_rx: oneshot::Receiver<SessionOutcome>,
    server: JoinHandle<()>,
}

impl ActiveSession {
    /// Binds 127.0.0.1 on an OS-assigned port and starts serving `form`.
    /// The session is live once this returns; the URL from `url()` is
    /// immediately reachable.
    pub async fn bind(form: FormConfig, config: &ServerConfig) -> Result<Self, SessionError> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .map_err(SessionError::Bind)?;
        let local_addr = listener.local_addr().map_err(SessionError::Bind)?;

        let (gate, outcome_rx) = ResolutionGate::new();
        let gate = Arc::new(gate);
        let app = build_router(AppState::new(form, gate.clone(), config));

        let mut shutdown = gate.shutdown_signal();
        let server_gate = gate.clone();
        let server = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown.wait_for(|stop| *stop).await;
                })
                .await;
            if let Err(error) = result {
                // If the gate already fired this is a no-op and the real
                // outcome stands.
                server_gate.resolve(SessionOutcome::TransportFailed(error.to_string()));
            }
        });

        info!(%local_addr, "form session listening");
        Ok(Self {
            local_addr,
            gate,
            outcome_rx,
            server,
        })
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    pub fn closer(&self) -> SessionCloser {
        SessionCloser {
            gate: self.gate.clone(),
        }
    }

    /// Opens the form in a browser without blocking the session. If every
    /// launch strategy fails the human can never answer, so the session
    /// resolves with a synthesized skip instead of hanging forever.
    pub fn launch_browser(&self, runner: Arc<dyn CommandRunner>) {
        let url = self.url();
        let gate = self.gate.clone();
        tokio::spawn(async move {
            if let Err(error) = browser::open_browser(&url, runner.as_ref()).await {
                warn!(%error, "could not open a browser; resolving with skip");
                gate.resolve(SessionOutcome::Resolved(FormResponse::skipped()));
            }
        });
    }

    /// Blocks until the session resolves, then waits for the listener task
    /// to finish draining so the port is released before returning.
    pub async fn await_response(self) -> Result<FormResponse, SessionError> {
        let outcome = self
            .outcome_rx
            .await
            .map_err(|_| SessionError::Transport("resolution channel dropped".to_string()))?;

        if let Err(error) = self.server.await {
            debug!(%error, "server task ended abnormally");
        }

        match outcome {
            SessionOutcome::Resolved(response) => Ok(response),
            SessionOutcome::TransportFailed(message) => Err(SessionError::Transport(message)),
            SessionOutcome::Closed => Err(SessionError::Closed),
        }
    }
}

/// Presents `form` to the human and returns their single answer: bind, open
/// a browser window, wait for exactly one resolution, tear down.
pub async fn serve_form_and_await_response(
    form: FormConfig,
    config: &ServerConfig,
) -> Result<FormResponse, SessionError> {
    serve_form_with_runner(form, config, Arc::new(SystemRunner)).await
}

pub async fn serve_form_with_runner(
    form: FormConfig,
    config: &ServerConfig,
    runner: Arc<dyn CommandRunner>,
) -> Result<FormResponse, SessionError> {
    let session = ActiveSession::bind(form, config).await?;
    session.launch_browser(runner);
    session.await_response().await
}
