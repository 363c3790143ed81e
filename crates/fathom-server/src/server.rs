//! Listener and event loop.
//!
//! [`Server::builder`] binds the socket, initializes shared state and
//! validates the route table. [`Server::start`] launches the worker pool and
//! the accept loop and returns a [`RunningServer`] that can be shut down and
//! joined.
//!
//! # Example
//!
//! ```rust,no_run
//! use fathom_core::{Handler, HandlerError, Request, Response};
//! use fathom_router::RouteTable;
//! use fathom_server::{Server, ServerConfig};
//! use std::sync::Arc;
//!
//! struct Ping;
//!
//! impl Handler<()> for Ping {
//!     type RequestBody = ();
//!     type Query = ();
//!     type ResponseBody = String;
//!     type State = ();
//!
//!     fn new(_config: Arc<()>, _state: ()) -> Self {
//!         Ping
//!     }
//!
//!     fn handle(&mut self, _: &Request<()>, response: &mut Response<String>) -> Result<(), HandlerError> {
//!         response.set_body("pong".to_string());
//!         Ok(())
//!     }
//! }
//!
//! # fn main() -> Result<(), fathom_server::ServerError> {
//! let server = Server::builder(())
//!     .config(ServerConfig::builder().host("127.0.0.1").port(8080).build())
//!     .routes(RouteTable::new().get::<Ping>("/ping"))
//!     .build()?;
//!
//! server.run()
//! # }
//! ```

use std::io;
use std::net::{SocketAddr, TcpListener as StdTcpListener, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use fathom_core::StateRegistry;
use fathom_router::{RouteTable, Router};
use fathom_telemetry::fields;
use http::HeaderValue;
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Runtime;
use tokio::sync::oneshot;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::ServerConfig;
use crate::connection::{Connection, ConnectionSettings};
use crate::error::{ServerError, ServerResult};
use crate::shutdown::{watch_os_signals, ConnectionCounter, ShutdownHandle};

/// Pause after an accept error such as running out of file descriptors.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Builder for [`Server`].
pub struct ServerBuilder<C> {
    app_config: Arc<C>,
    config: ServerConfig,
    registry: StateRegistry<C>,
    routes: RouteTable<C>,
}

impl<C: Send + Sync + 'static> ServerBuilder<C> {
    /// Sets the server configuration.
    #[must_use]
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the shared-state factories.
    #[must_use]
    pub fn state(mut self, registry: StateRegistry<C>) -> Self {
        self.registry = registry;
        self
    }

    /// Sets the route table.
    #[must_use]
    pub fn routes(mut self, routes: RouteTable<C>) -> Self {
        self.routes = routes;
        self
    }

    /// Binds the listener, initializes shared state and builds the router.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Resolve`] or [`ServerError::Bind`] if the
    /// address is unusable, [`ServerError::InvalidSetting`] for a bad
    /// `Server` header, and [`ServerError::Configuration`] if a pattern is
    /// invalid or a handler needs state that was not provided.
    pub fn build(self) -> ServerResult<Server<C>> {
        let Self {
            app_config,
            config,
            registry,
            routes,
        } = self;

        let server_header = HeaderValue::from_str(config.server_header()).map_err(|_| {
            ServerError::InvalidSetting(format!(
                "server header {:?} is not a valid header value",
                config.server_header()
            ))
        })?;

        let listener = bind(&config.addr())?;
        let local_addr = listener.local_addr().map_err(|source| ServerError::Bind {
            addr: config.addr(),
            source,
        })?;
        debug!(addr = %local_addr, "Listener bound");

        let state = Arc::new(registry.initialize(&app_config));
        debug!(services = state.len(), "Shared state initialized");

        let router = Router::new(routes, app_config, state)?;

        let settings = ConnectionSettings {
            keep_alive_timeout: config.keep_alive_timeout(),
            server_header,
            limits: config.limits(),
            http10_keep_alive: config.http10_keep_alive(),
        };

        Ok(Server {
            config,
            listener,
            local_addr,
            router: Arc::new(router),
            settings: Arc::new(settings),
        })
    }
}

fn bind(addr: &str) -> ServerResult<StdTcpListener> {
    let resolved = addr
        .to_socket_addrs()
        .map_err(|source| ServerError::Resolve {
            addr: addr.to_string(),
            source,
        })?
        .next()
        .ok_or_else(|| ServerError::Resolve {
            addr: addr.to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "no addresses found"),
        })?;

    // std enables SO_REUSEADDR on Unix listeners.
    let listener = StdTcpListener::bind(resolved).map_err(|source| ServerError::Bind {
        addr: resolved.to_string(),
        source,
    })?;
    listener
        .set_nonblocking(true)
        .map_err(|source| ServerError::Bind {
            addr: resolved.to_string(),
            source,
        })?;
    Ok(listener)
}

/// A bound server that has not started accepting yet.
pub struct Server<C> {
    config: ServerConfig,
    listener: StdTcpListener,
    local_addr: SocketAddr,
    router: Arc<Router<C>>,
    settings: Arc<ConnectionSettings>,
}

impl<C: Send + Sync + 'static> Server<C> {
    /// Starts building a server around the application configuration.
    pub fn builder(app_config: C) -> ServerBuilder<C> {
        Self::builder_shared(Arc::new(app_config))
    }

    /// Like [`Server::builder`], for configuration the caller also keeps.
    pub fn builder_shared(app_config: Arc<C>) -> ServerBuilder<C> {
        ServerBuilder {
            app_config,
            config: ServerConfig::default(),
            registry: StateRegistry::new(),
            routes: RouteTable::new(),
        }
    }

    /// Returns the bound address. Useful when port 0 was requested.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the router.
    #[must_use]
    pub fn router(&self) -> &Arc<Router<C>> {
        &self.router
    }

    /// Launches the worker pool and begins accepting connections.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Runtime`] if the worker threads cannot be
    /// started or the listener cannot be registered with them.
    pub fn start(self) -> ServerResult<RunningServer> {
        let workers = self.config.workers();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(workers)
            .thread_name("fathom-worker")
            .enable_all()
            .build()
            .map_err(ServerError::Runtime)?;

        let listener = {
            let _guard = runtime.enter();
            TcpListener::from_std(self.listener).map_err(ServerError::Runtime)?
        };

        let shutdown = ShutdownHandle::new();
        if self.config.handle_signals() {
            runtime.spawn(watch_os_signals(shutdown.clone()));
        }

        let connections = ConnectionCounter::new();
        let (stopped_tx, stopped_rx) = oneshot::channel();
        let acceptor = Acceptor {
            listener,
            router: self.router,
            settings: self.settings,
            shutdown: shutdown.clone(),
            connections: connections.clone(),
        };
        let grace = self.config.graceful_shutdown();
        runtime.spawn(async move {
            acceptor.run(grace).await;
            let _ = stopped_tx.send(());
        });

        info!(addr = %self.local_addr, workers, "Server started");

        Ok(RunningServer {
            runtime: Some(runtime),
            local_addr: self.local_addr,
            shutdown,
            connections,
            stopped: Some(stopped_rx),
        })
    }

    /// Starts the server and blocks until it has shut down.
    ///
    /// # Errors
    ///
    /// See [`Server::start`].
    pub fn run(self) -> ServerResult<()> {
        self.start()?.join();
        Ok(())
    }
}

impl<C> std::fmt::Debug for Server<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("local_addr", &self.local_addr)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

struct Acceptor<C> {
    listener: TcpListener,
    router: Arc<Router<C>>,
    settings: Arc<ConnectionSettings>,
    shutdown: ShutdownHandle,
    connections: ConnectionCounter,
}

impl<C: Send + Sync + 'static> Acceptor<C> {
    async fn run(self, grace: Duration) {
        let mut next_id: u64 = 0;
        loop {
            tokio::select! {
                biased;
                () = self.shutdown.wait() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, remote_addr)) => {
                        next_id += 1;
                        self.spawn_connection(next_id, stream, remote_addr);
                    }
                    Err(err) => {
                        warn!({ fields::ERROR } = %err, "Failed to accept connection");
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                },
            }
        }

        let Self {
            listener,
            connections,
            ..
        } = self;
        drop(listener);

        info!(
            grace_secs = grace.as_secs_f64(),
            active_connections = connections.active(),
            "Shutting down server gracefully"
        );
        tokio::time::sleep(grace).await;

        let abandoned = connections.active();
        if abandoned > 0 {
            warn!(abandoned, "Grace period elapsed with connections still open");
        }
        info!("Server stopped");
    }

    fn spawn_connection(&self, id: u64, stream: TcpStream, remote_addr: SocketAddr) {
        if let Err(err) = stream.set_nodelay(true) {
            debug!({ fields::ERROR } = %err, "Failed to set TCP_NODELAY");
        }

        let guard = self.connections.open();
        let connection = Connection::new(
            stream,
            Some(remote_addr),
            Arc::clone(&self.router),
            Arc::clone(&self.settings),
        );
        let span = info_span!(
            "connection",
            { fields::CONNECTION_ID } = id,
            { fields::REMOTE_ADDR } = %remote_addr
        );

        tokio::spawn(
            async move {
                let _guard = guard;
                debug!("Connection accepted");
                connection.run().await;
            }
            .instrument(span),
        );
    }
}

/// A server whose event loop is running.
///
/// Dropping it without calling [`RunningServer::join`] stops the event loop
/// immediately.
#[derive(Debug)]
pub struct RunningServer {
    runtime: Option<Runtime>,
    local_addr: SocketAddr,
    shutdown: ShutdownHandle,
    connections: ConnectionCounter,
    stopped: Option<oneshot::Receiver<()>>,
}

impl RunningServer {
    /// Returns the bound address.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns a handle that triggers graceful shutdown from any thread.
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Triggers graceful shutdown.
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    /// Returns the number of open connections.
    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.connections.active()
    }

    /// Blocks until shutdown has been triggered and the grace period has
    /// elapsed, then stops the event loop. Connections still open are
    /// dropped.
    ///
    /// # Panics
    ///
    /// Panics when called from inside an async runtime.
    #[doc(alias = "wait")]
    pub fn join(mut self) {
        if let Some(stopped) = self.stopped.take() {
            // An error means the accept task is gone, so there is nothing to wait for.
            let _ = stopped.blocking_recv();
        }
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
            debug!("Event loop stopped");
        }
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_ephemeral_port() {
        let listener = bind("127.0.0.1:0").unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[test]
    fn test_bind_unresolvable_host() {
        let err = bind("host.invalid:80").unwrap_err();
        assert!(matches!(err, ServerError::Resolve { .. }));
    }

    #[test]
    fn test_invalid_server_header_rejected() {
        let result = Server::builder(())
            .config(
                ServerConfig::builder()
                    .host("127.0.0.1")
                    .port(0)
                    .server_header("bad\nheader")
                    .build(),
            )
            .build();
        assert!(matches!(result, Err(ServerError::InvalidSetting(_))));
    }

    #[test]
    fn test_start_and_stop_empty_server() {
        let server = Server::builder(())
            .config(
                ServerConfig::builder()
                    .host("127.0.0.1")
                    .port(0)
                    .graceful_shutdown(Duration::from_millis(10))
                    .handle_signals(false)
                    .build(),
            )
            .build()
            .unwrap();
        let addr = server.local_addr();
        assert_ne!(addr.port(), 0);

        let running = server.start().unwrap();
        assert_eq!(running.local_addr(), addr);
        running.shutdown();
        running.join();
    }
}
