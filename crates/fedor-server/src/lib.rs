//! HTTP surface of the review service: the GitHub webhook endpoint, the
//! liveness probe, and the scheduler that turns bursts of deliveries into
//! single agent runs.

pub mod debounce;
pub mod error;
pub mod reviewer;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub use debounce::{Action, Debouncer};
pub use reviewer::{run_config, Reviewer};
pub use state::AppState;

/// Build the axum Router. Used by `serve_on()` and by integration tests.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(routes::webhook::receive))
        .route("/health", get(routes::health::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve on a pre-bound listener until `shutdown` resolves, then cancel
/// every pending debounce timer.
pub async fn serve_on<F>(
    state: AppState,
    listener: tokio::net::TcpListener,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let port = listener.local_addr()?.port();
    let scheduler = state.scheduler.clone();
    let app = build_router(state);

    tracing::info!("fedor listening on http://0.0.0.0:{port}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    let cancelled = scheduler.shutdown();
    tracing::info!(cancelled, "shutdown: pending reviews cancelled");
    Ok(())
}
