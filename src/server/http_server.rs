//! HTTP server implementation.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::signal;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;

use crate::parser::{HttpRequest, Method};
use crate::server::config::ServerConfig;
use crate::server::connection::Connection;
use crate::server::error::Error;
use crate::server::response::HttpResponse;
use crate::server::router::Router;

/// An HTTP server.
///
/// Routes are registered on the server before it starts; starting consumes the
/// server, so the route table cannot change while connections are being served.
pub struct HttpServer {
    /// The server configuration.
    pub config: ServerConfig,
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            router: Router::new(),
        }
    }

    /// Register a handler for `method` and `path`, replacing any earlier one.
    ///
    /// Registrations for [`Method::Unsupported`] are ignored with a warning.
    pub fn add_route<F>(&mut self, method: Method, path: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&HttpRequest, &mut HttpResponse) + Send + Sync + 'static,
    {
        let path = path.into();
        if !self.router.register(method, path.clone(), handler) {
            warn!("Ignoring route for unsupported method: {path}");
        }
        self
    }

    /// Register a GET handler.
    pub fn register_get<F>(&mut self, path: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&HttpRequest, &mut HttpResponse) + Send + Sync + 'static,
    {
        self.add_route(Method::GET, path, handler)
    }

    /// Register a POST handler.
    pub fn register_post<F>(&mut self, path: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&HttpRequest, &mut HttpResponse) + Send + Sync + 'static,
    {
        self.add_route(Method::POST, path, handler)
    }

    /// The routes registered so far.
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Log the registered endpoints.
    fn display_server_info(&self) {
        info!("Registered endpoints:");
        for (method, path) in self.router().routes() {
            info!("  {method:<4} {path}");
        }
    }

    /// Set up the TCP listener.
    async fn setup_listener(&self) -> Result<TcpListener, Error> {
        let addr = self.config.addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Setup { addr, source })?;
        info!("Server listening on http://{addr}");
        Ok(listener)
    }

    /// Resolve on Ctrl+C. If the handler cannot be installed, never resolve.
    async fn ctrl_c() {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, initiating graceful shutdown"),
            Err(e) => {
                error!("Error setting up Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    }

    /// Forward the completion of `shutdown` to the accept loop.
    fn setup_shutdown_handler<F>(shutdown: F, shutdown_tx: mpsc::Sender<()>, tasks: &mut JoinSet<()>)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tasks.spawn(async move {
            shutdown.await;
            let _ = shutdown_tx.send(()).await;
        });
    }

    /// Wait for a free connection slot, then for the next client.
    async fn accept(
        listener: &TcpListener,
        semaphore: Arc<Semaphore>,
    ) -> io::Result<(TcpStream, SocketAddr, OwnedSemaphorePermit)> {
        let permit = semaphore.acquire_owned().await.map_err(io::Error::other)?;
        let (socket, addr) = listener.accept().await?;
        Ok((socket, addr, permit))
    }

    /// Handle accept errors. The server keeps running; a short pause avoids spinning
    /// on persistent failures such as descriptor exhaustion.
    async fn handle_accept_error(e: io::Error) {
        error!("Error accepting connection: {e}");
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }

    /// Perform graceful shutdown.
    async fn perform_shutdown(tasks: &mut JoinSet<()>) {
        info!("Waiting for {len} active connections to complete...", len = tasks.len());
        let shutdown_timeout = tokio::time::Duration::from_secs(30);
        let _ = tokio::time::timeout(shutdown_timeout, async {
            while let Some(res) = tasks.join_next().await {
                if let Err(e) = res {
                    error!("Task failed during shutdown: {e}");
                }
            }
        })
        .await;

        info!("Server shutdown complete");
    }

    /// Bind the configured address and serve until Ctrl+C.
    ///
    /// Fails only if the listening socket cannot be set up.
    pub async fn start(self) -> Result<(), Error> {
        let listener = self.setup_listener().await?;
        self.serve(listener).await
    }

    /// Serve connections accepted on `listener` until Ctrl+C.
    pub async fn serve(self, listener: TcpListener) -> Result<(), Error> {
        self.serve_until(listener, Self::ctrl_c()).await
    }

    /// Serve connections accepted on `listener` until `shutdown` resolves.
    ///
    /// Shutdown stops accepting, then waits (bounded) for open connections to finish.
    pub async fn serve_until<F>(self, listener: TcpListener, shutdown: F) -> Result<(), Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.display_server_info();

        let config = Arc::new(self.config);
        let router = Arc::new(self.router);
        let semaphore = Arc::new(Semaphore::new(config.max_connections.max(1)));

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        // Use JoinSet to keep track of all spawned tasks
        let mut tasks = JoinSet::new();
        Self::setup_shutdown_handler(shutdown, shutdown_tx, &mut tasks);

        loop {
            tokio::select! {
                Some(()) = shutdown_rx.recv() => {
                    info!("Shutting down server...");
                    break;
                }

                Some(res) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = res {
                        error!("Connection task failed: {e}");
                    }
                }

                accept_result = Self::accept(&listener, semaphore.clone()) => {
                    match accept_result {
                        Ok((socket, addr, permit)) => {
                            debug!("Accepted connection from {addr}");
                            let router = router.clone();
                            let config = config.clone();
                            tasks.spawn(async move {
                                // The permit is dropped when the task completes, releasing the slot
                                let _permit = permit;
                                match Self::handle_connection(socket, router, &config).await {
                                    Ok(served) => debug!("Connection from {addr} closed after {served} request(s)"),
                                    Err(e) => warn!("Error handling connection from {addr}: {e}"),
                                }
                            });
                        }
                        Err(e) => Self::handle_accept_error(e).await,
                    }
                }
            }
        }

        Self::perform_shutdown(&mut tasks).await;

        Ok(())
    }

    /// Serve every request arriving on one connection, then close it.
    ///
    /// Returns the number of responses written.
    pub async fn handle_connection<S>(stream: S, router: Arc<Router>, config: &ServerConfig) -> Result<usize, Error>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        Connection::new(stream, router, config).run().await
    }
}
