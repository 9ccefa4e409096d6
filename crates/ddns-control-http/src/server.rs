// # Control Listeners
//
// Plain HTTP goes through `axum::serve`. HTTPS runs its own accept loop:
// each connection is TLS-terminated with rustls and then handed to a
// hyper connection builder, with the peer address inserted as
// `ConnectInfo` so handlers see the same extractor either way.

use axum::extract::ConnectInfo;
use hyper::Request;
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tower::Service;
use tracing::{debug, info, warn};

use ddns_core::{ControlPlane, Result};

use crate::router;

/// Pause after a failed accept, typically out of file descriptors
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Serve the control API over plain HTTP until the listener fails
pub async fn serve_http(listener: TcpListener, plane: Arc<ControlPlane>) -> Result<()> {
    info!("Control API listening on http://{}", listener.local_addr()?);

    axum::serve(
        listener,
        router(plane).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Serve the control API over HTTPS
///
/// Failed handshakes only affect their own connection. A failed accept
/// pauses the loop for a second before it accepts again.
pub async fn serve_https(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    plane: Arc<ControlPlane>,
) -> Result<()> {
    info!("Control API listening on https://{}", listener.local_addr()?);

    let app = router(plane);

    loop {
        let (stream, peer) = accept_next(|| listener.accept()).await;

        let acceptor = acceptor.clone();
        let app = app.clone();

        tokio::spawn(async move {
            let stream = match acceptor.accept(stream).await {
                Ok(stream) => stream,
                Err(e) => {
                    debug!("TLS handshake with {} failed: {}", peer, e);
                    return;
                }
            };

            let service = hyper::service::service_fn(move |mut request: Request<Incoming>| {
                request.extensions_mut().insert(ConnectInfo(peer));
                app.clone().call(request)
            });

            if let Err(e) = Builder::new(TokioExecutor::new())
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                debug!("Control connection from {} ended with error: {}", peer, e);
            }
        });
    }
}

/// Retry `accept` until it yields a connection, pausing after each failure
async fn accept_next<F, Fut, T>(mut accept: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<T>>,
{
    loop {
        match accept().await {
            Ok(accepted) => return accepted,
            Err(e) => {
                warn!("Failed to accept control connection: {}", e);
                tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_accept_error_pauses_before_retry() {
        let started = Instant::now();
        let mut attempts = 0;

        let accepted = accept_next(|| {
            attempts += 1;
            let attempt = attempts;
            async move {
                if attempt == 1 {
                    Err(io::Error::other("Too many open files"))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(accepted, 2);
        assert!(started.elapsed() >= ACCEPT_ERROR_BACKOFF);
    }
}
