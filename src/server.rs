//! HTTP server and graceful shutdown.
//!
//! # Graceful shutdown
//!
//! On **SIGTERM** or **Ctrl-C** (or when the future passed to
//! [`Server::serve_with_shutdown`] resolves) the server:
//! 1. Immediately stops `listener.accept()`, so no new connections are made.
//! 2. Lets every in-flight connection task run to completion.
//! 3. Returns from `serve`, which lets `main` exit cleanly.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::app::App;
use crate::config::Config;
use crate::error::{Error, Result};

/// The HTTP server.
#[derive(Debug)]
pub struct Server {
    addr: String,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called. The address is checked there and reported as
    /// [`Error::InvalidAddr`].
    ///
    /// ```rust,no_run
    /// use actio::Server;
    /// let server = Server::bind("0.0.0.0:3000");
    /// ```
    pub fn bind(addr: &str) -> Self {
        Self { addr: addr.to_owned() }
    }

    /// Binds to the configured address.
    pub fn with_config(config: &Config) -> Self {
        Self::bind(&config.addr)
    }

    /// Serves `app` until SIGTERM or Ctrl-C, then drains in-flight requests.
    pub async fn serve(self, app: App) -> Result<()> {
        self.serve_with_shutdown(app, shutdown_signal()).await
    }

    /// Serves `app` until `signal` resolves, then drains in-flight requests.
    pub async fn serve_with_shutdown(
        self,
        app: App,
        signal: impl Future<Output = ()> + Send,
    ) -> Result<()> {
        let addr: SocketAddr = self.addr.parse().map_err(|_| Error::InvalidAddr(self.addr.clone()))?;
        let listener = TcpListener::bind(addr).await?;
        Self::serve_on(listener, app, signal).await
    }

    /// Serves `app` on an already bound listener. Useful with port `0`.
    pub async fn serve_on(
        listener: TcpListener,
        app: App,
        signal: impl Future<Output = ()> + Send,
    ) -> Result<()> {
        let app = Arc::new(app);
        info!(addr = %listener.local_addr()?, "actio listening");

        // Tracks every spawned connection task so shutdown can wait for them.
        let mut tasks = tokio::task::JoinSet::new();

        tokio::pin!(signal);

        loop {
            tokio::select! {
                // Checked first so a shutdown stops accepting even when more
                // connections are queued.
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
                        // Called once per request on the connection.
                        let svc = service_fn(move |req: hyper::Request<Incoming>| {
                            let app = Arc::clone(&app);
                            async move { Ok::<_, Infallible>(app.dispatch(req).await) }
                        });

                        // HTTP/1.1 or HTTP/2, whichever the client speaks.
                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the set does not grow
                // without bound.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("actio stopped");
        Ok(())
    }
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or SIGINT (Ctrl-C). On Windows only Ctrl-C
/// is available. A handler that cannot be installed is logged and never
/// fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl-C: {e}");
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
                warn!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AppContext;

    #[tokio::test]
    async fn bad_address_is_an_error() {
        let app = App::new(|_ctx: AppContext| async { "unused" });
        let err = Server::bind("not an address")
            .serve_with_shutdown(app, async {})
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAddr(a) if a == "not an address"));
    }
}
