//! Generation HTTP server with axum router and graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::error::ServerError;
use super::handlers::{get_generate, get_generation, get_generation_events, post_cancel, AppState};
use crate::config::ServerConfig;
use crate::generation::{GenerationStore, Generator};

/// Shortest allowed interval between store sweeps.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// HTTP server exposing generations for starting, polling and streaming.
pub struct GenerationServer {
    /// Server configuration.
    config: ServerConfig,
    /// Application state shared across handlers.
    state: AppState,
    /// Cancellation token for graceful shutdown.
    cancel: CancellationToken,
}

impl GenerationServer {
    /// Create a server whose store uses the configured retention.
    #[must_use]
    pub fn new(generator: Arc<Generator>, config: ServerConfig) -> Self {
        let store = Arc::new(GenerationStore::new(Duration::from_secs(
            config.retention_secs,
        )));
        Self {
            config,
            state: AppState::new(generator, store),
            cancel: CancellationToken::new(),
        }
    }

    /// Use an external shutdown token (builder pattern).
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Get the configured address as a string.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// The generation store served by this server.
    #[must_use]
    pub fn store(&self) -> &Arc<GenerationStore> {
        &self.state.store
    }

    /// Build the axum router with all routes and middleware.
    pub fn build_router(&self) -> Router {
        let router = Router::new()
            .route("/api/generate", get(get_generate))
            .route("/api/generations/:id", get(get_generation))
            .route("/api/generations/:id/events", get(get_generation_events))
            .route("/api/generations/:id/cancel", post(post_cancel))
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http());

        if self.config.cors_permissive {
            router.layer(CorsLayer::permissive())
        } else {
            router
        }
    }

    /// Run the server, binding to the configured address.
    ///
    /// A background task sweeps expired generations on the configured
    /// interval. Both stop when the cancellation token is triggered.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind or serve.
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = self.address();
        let cancel = self.cancel.clone();
        let app = self.build_router();

        let interval = Duration::from_secs(self.config.sweep_interval_secs).max(MIN_SWEEP_INTERVAL);
        tokio::spawn(sweep_loop(
            Arc::clone(&self.state.store),
            interval,
            cancel.clone(),
        ));

        tracing::info!(address = %addr, "Starting generation server");

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::BindError {
                address: addr.clone(),
                source,
            })?;

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel.cancelled().await;
                tracing::info!("Generation server shutting down gracefully");
            })
            .await?;
        Ok(())
    }
}

/// Periodically evict expired generations until cancelled.
pub async fn sweep_loop(store: Arc<GenerationStore>, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately.
    ticker.tick().await;
    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                store.sweep();
            }
        }
    }
    tracing::debug!("Sweep task stopped");
}
