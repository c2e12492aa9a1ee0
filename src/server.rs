//! HTTP server and graceful shutdown.
//!
//! Every connection is served on its own tokio task and every request on it
//! is one independent pass through the booted [`App`]. The app is shared
//! read-only behind an `Arc`; nothing else is shared between requests.
//!
//! When a client disconnects mid-request, hyper drops the request future.
//! Stages never hold a lock or session handle across an `.await`, so dropping
//! the future releases everything the pipeline had in hand.
//!
//! # Graceful shutdown
//!
//! On SIGTERM or Ctrl-C (or the future passed to
//! [`Server::serve_with_shutdown`]) the server:
//! 1. stops accepting new connections,
//! 2. lets every in-flight connection task run to completion,
//! 3. returns from `serve`.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::app::App;
use crate::error::Error;
use crate::request::Request;
use crate::response::Response;

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
    listener: Option<TcpListener>,
}

impl Server {
    /// Configures the server to bind to `addr` when it starts serving.
    ///
    /// ```rust
    /// use turnstile::Server;
    /// let server = Server::bind("0.0.0.0:3000").unwrap();
    /// ```
    pub fn bind(addr: &str) -> Result<Self, Error> {
        let parsed: SocketAddr = addr
            .parse()
            .map_err(|_| Error::InvalidAddress(addr.to_owned()))?;
        Ok(Self { addr: parsed, listener: None })
    }

    /// Serves on an already-bound listener (e.g. one bound to port 0).
    pub fn from_listener(listener: TcpListener) -> Result<Self, Error> {
        let addr = listener.local_addr()?;
        Ok(Self { addr, listener: Some(listener) })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serves `app` until SIGTERM or Ctrl-C, then drains in-flight requests.
    pub async fn serve(self, app: App) -> Result<(), Error> {
        self.serve_with_shutdown(app, shutdown_signal()).await
    }

    /// Serves `app` until `signal` resolves, then drains in-flight requests.
    pub async fn serve_with_shutdown(
        self,
        app: App,
        signal: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let listener = match self.listener {
            Some(listener) => listener,
            None => TcpListener::bind(self.addr).await?,
        };
        let app = Arc::new(app);

        info!(addr = %listener.local_addr()?, "turnstile listening");

        let mut tasks = tokio::task::JoinSet::new();
        tokio::pin!(signal);

        loop {
            tokio::select! {
                // Check shutdown first so a signal stops accepting immediately.
                biased;

                () = &mut signal => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let app = Arc::clone(&app);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        let svc = service_fn(move |req| {
                            let app = Arc::clone(&app);
                            async move { handle(app, req).await }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the set stays bounded.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("turnstile stopped");
        Ok(())
    }
}

// ── Request handling ─────────────────────────────────────────────────────────

/// Reads the body, then hands the request to the app. Never fails: every
/// outcome is a response.
async fn handle(
    app: Arc<App>,
    req: hyper::Request<Incoming>,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(path = parts.uri.path(), "failed to read request body: {e}");
            return Ok(Response::status(StatusCode::BAD_REQUEST).into_inner());
        }
    };

    let req = Request::from_http(http::Request::from_parts(parts, body));
    Ok(app.dispatch(req).await.into_inner())
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on SIGTERM (Unix) or Ctrl-C. A handler that cannot be installed
/// is logged and its arm never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c  => {}
        () = sigterm => {}
    }
}
