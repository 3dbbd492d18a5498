//! JSON HTTP API over [`LedgerService`].

use std::sync::Arc;
use std::time::Instant;

use axum::{Extension, Router, extract::Request, middleware::Next, response::Response};
use tokio::net::TcpListener;
use tracing::Instrument;

use crate::application::LedgerService;

pub mod dto;
pub mod errors;
pub mod routes;

/// Build the application router around a shared service.
pub fn build_app(service: Arc<LedgerService>) -> Router {
    routes::router()
        .layer(Extension(service))
        .layer(axum::middleware::from_fn(trace_request))
}

async fn trace_request(req: Request, next: Next) -> Response {
    let span = tracing::info_span!(
        "http_request",
        method = %req.method(),
        path = %req.uri().path(),
    );

    async move {
        let started = Instant::now();
        let response = next.run(req).await;
        tracing::info!(
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request completed"
        );
        response
    }
    .instrument(span)
    .await
}

/// Serve until Ctrl-C.
pub async fn serve(listener: TcpListener, service: Arc<LedgerService>) -> anyhow::Result<()> {
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, build_app(service))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}
