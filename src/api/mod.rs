//! HTTP adapter over the ledger ports.

pub mod handlers;
pub mod response;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::application::{BalanceReader, Ledger, TransactionsReader, TransferMaker, WalletsReader};

/// Handler state: one capability per use site.
#[derive(Clone)]
pub struct AppState {
    pub balances: Arc<dyn BalanceReader>,
    pub transactions: Arc<dyn TransactionsReader>,
    pub transfers: Arc<dyn TransferMaker>,
    pub wallets: Arc<dyn WalletsReader>,
}

impl AppState {
    /// Serve every capability from one backend.
    pub fn from_ledger<L: Ledger + 'static>(ledger: Arc<L>) -> Self {
        Self {
            balances: ledger.clone(),
            transactions: ledger.clone(),
            transfers: ledger.clone(),
            wallets: ledger,
        }
    }
}

/// Build the API router with request ids, tracing, panic recovery and a
/// per-request deadline.
pub fn create_router(state: AppState, request_timeout: Duration) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::new(request_timeout));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/wallets", get(handlers::list_wallets))
        .route("/api/wallet/:address/balance", get(handlers::get_balance))
        .route("/api/transactions", get(handlers::get_last_transactions))
        .route("/api/send", post(handlers::send))
        .with_state(state)
        .layer(middleware)
}

/// Serve `router` on `listener` until `shutdown` resolves, then give in-flight
/// requests up to `grace` to finish.
pub async fn serve<F>(
    listener: TcpListener,
    router: Router,
    shutdown: F,
    grace: Duration,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let address = listener.local_addr().context("Listener has no local address")?;
    let (stop_tx, mut stop_rx) = watch::channel(false);

    let mut server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.changed().await;
            })
            .await
    });

    info!(%address, "http server started");
    shutdown.await;
    info!("stopping http server");
    let _ = stop_tx.send(true);

    match tokio::time::timeout(grace, &mut server).await {
        Ok(Ok(Ok(()))) => info!("http server stopped"),
        Ok(Ok(Err(e))) => return Err(e).context("HTTP server failed"),
        Ok(Err(e)) => return Err(e).context("HTTP server task panicked"),
        Err(_) => {
            server.abort();
            let _ = server.await;
            warn!(
                grace_secs = grace.as_secs_f64(),
                "graceful shutdown timed out, in-flight requests dropped"
            );
        }
    }
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpStream;

    #[tokio::test]
    async fn test_serve_returns_when_a_request_outlives_the_grace_period() {
        let router = Router::new().route("/stuck", get(|| std::future::pending::<()>()));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(serve(
            listener,
            router,
            async move {
                let _ = started_rx.await;
            },
            Duration::from_millis(100),
        ));

        let mut client = TcpStream::connect(address).await.unwrap();
        client
            .write_all(b"GET /stuck HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        started_tx.send(()).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("serve did not give up after the grace period")
            .unwrap();
        assert!(result.is_ok());
    }
}
