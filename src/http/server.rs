//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with a single fallback handler
//! - Wire up middleware (tracing, timeout, request ID)
//! - Bind server to listener
//! - Convert requests, dispatch them through the application, convert back
//! - Swap in a rebuilt application when the config changes
//!
//! # Design Decisions
//! - Dispatch is synchronous and runs on the blocking pool
//! - The application sits behind `ArcSwap`; in-flight requests keep the
//!   instance they started with
//! - Listener, timeouts and body limits are fixed at startup; a reload only
//!   replaces the application

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, Semaphore};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::app::{build_application, Application, Setup};
use crate::config::schema::AppConfig;
use crate::http::request::Request;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub app: Arc<ArcSwap<Application>>,
    pub max_body_size: usize,
    pub limiter: Arc<Semaphore>,
}

/// HTTP front end for an [`Application`].
pub struct HttpServer {
    router: Router,
    app: Arc<ArcSwap<Application>>,
    setup: Setup,
}

impl HttpServer {
    /// Create a server for `app`. `setup` is re-run on every application
    /// rebuilt from a reloaded config.
    pub fn new(app: Application, setup: Setup) -> Self {
        let config = app.config().clone();
        let app = Arc::new(ArcSwap::from_pointee(app));
        let state = AppState {
            app: app.clone(),
            max_body_size: config.listener.max_body_size,
            limiter: Arc::new(Semaphore::new(config.listener.max_connections.max(1))),
        };
        let router = Self::build_router(&config, state);
        Self { router, app, setup }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &AppConfig, state: AppState) -> Router {
        Router::new()
            .fallback(dispatch_handler)
            .with_state(state)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Shared handle to the live application.
    pub fn application(&self) -> Arc<ArcSwap<Application>> {
        self.app.clone()
    }

    /// Run the server until `shutdown` fires, rebuilding the application for
    /// every config received on `config_updates`.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<AppConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.app.clone();
        let setup = self.setup.clone();
        let reloader = tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                match build_application(config, &*setup) {
                    Ok(rebuilt) => {
                        app.store(Arc::new(rebuilt));
                        tracing::info!("Application reloaded");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Rebuild failed, keeping current application");
                    }
                }
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                // A closed channel means no one can trigger shutdown any more
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown requested");
            })
            .await?;

        reloader.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Single entry point: every method and path lands here.
async fn dispatch_handler(State(state): State<AppState>, request: axum::extract::Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, state.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "Rejecting request body");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };
    let request = Request::from_parts(parts, body);

    let permit = match state.limiter.clone().acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => return StatusCode::SERVICE_UNAVAILABLE.into_response(),
    };
    let app = state.app.load_full();
    let request_id = request.id().to_string();

    match tokio::task::spawn_blocking(move || {
        let _permit = permit;
        app.handle(request)
    })
    .await
    {
        Ok(response) => response.into_response(),
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Dispatch task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
