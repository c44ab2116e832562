use std::{
    future::{Future, IntoFuture},
    io,
    time::Duration,
};

use axum::{routing::get, Json, Router};
use tokio::sync::oneshot;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::users::{self, dto::MessageResponse};

pub fn build_app(state: AppState) -> Router {
    let base_path = state.config.application.base_path();
    Router::new()
        .nest(
            &base_path,
            Router::new()
                .merge(users::router())
                .route("/healthz", get(healthz)),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

async fn healthz() -> Json<MessageResponse> {
    Json(MessageResponse::new("OK"))
}

pub async fn serve(app: Router, address: &str, shutdown_timeout: Duration) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(address).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    let (signalled_tx, signalled_rx) = oneshot::channel();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = signalled_tx.send(());
        })
        .into_future();
    drain_with_deadline(server, signalled_rx, shutdown_timeout).await?;
    Ok(())
}

/// Runs `server` until it stops on its own, or gives it `deadline` to drain
/// once `signalled` fires.
async fn drain_with_deadline<F>(
    server: F,
    signalled: oneshot::Receiver<()>,
    deadline: Duration,
) -> io::Result<()>
where
    F: Future<Output = io::Result<()>>,
{
    tokio::pin!(server);
    tokio::select! {
        res = &mut server => return res,
        _ = signalled => {}
    }
    match tokio::time::timeout(deadline, server).await {
        Ok(res) => res,
        Err(_) => {
            tracing::warn!(?deadline, "connections still open after shutdown deadline; dropping them");
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
