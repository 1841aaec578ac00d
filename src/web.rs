use std::any::Any;
use std::time::Duration;

use anyhow::Context;
use axum::{Router, extract::DefaultBodyLimit, response::Response};
use tokio::net::TcpListener;
use tokio_util::sync::{CancellationToken, DropGuard};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use crate::error::ErrorMapper;

/// Inbound bodies are a single small JSON object. Enforced by the body
/// extractor, so handlers see oversize bodies as a rejection.
const MAX_BODY_BYTES: usize = 16 * 1024;

/// Cancellation for one inbound request.
///
/// The token fires when the returned guard is dropped, which happens when the
/// handler finishes or when the connection goes away, and when `deadline`
/// elapses first.
pub fn request_cancellation(deadline: Duration) -> (CancellationToken, DropGuard) {
    let token = CancellationToken::new();
    let timer = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            () = tokio::time::sleep(deadline) => {
                tracing::warn!("request deadline of {:?} elapsed", deadline);
                timer.cancel();
            }
            () = timer.cancelled() => {}
        }
    });
    let guard = token.clone().drop_guard();
    (token, guard)
}

fn panic_response(_: Box<dyn Any + Send + 'static>) -> Response {
    tracing::error!("handler panicked");
    ErrorMapper::internal_response()
}

/// Wrap a service router with the layers every service shares
pub fn with_common_layers(router: Router) -> Router {
    router
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl-C: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!("failed to listen for SIGTERM: {e}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

pub async fn run(port: u16, app: Router) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Web server running at http://localhost:{}", port);

    axum::serve(listener, with_common_layers(app))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Web server failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_guard_drop_cancels_token() {
        let (token, guard) = request_cancellation(Duration::from_secs(60));
        assert!(!token.is_cancelled());
        drop(guard);
        assert!(token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cancels_token() {
        let (token, _guard) = request_cancellation(Duration::from_secs(2));
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(token.is_cancelled());
    }
}
