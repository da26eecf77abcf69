//! The front door binding the engine to a [`Dispatcher`].
//!
//! ```no_run
//! use cex_web::route::{self, handler_fn};
//! use cex_web::{Dispatcher, Server, ServerConfig};
//! use http::StatusCode;
//!
//! let dispatcher = Dispatcher::builder()
//!     .route_all(route::get(handler_fn(|_req, res, _next| res.send(StatusCode::OK, "hello"))))
//!     .build();
//!
//! Server::builder()
//!     .dispatcher(dispatcher)
//!     .config(ServerConfig { port: 3000, ..ServerConfig::default() })
//!     .build()
//!     .unwrap()
//!     .run()
//!     .unwrap();
//! ```

use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, mpsc};
use std::thread::JoinHandle;

use cex_http::connection::HttpConnection;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tokio::sync::oneshot;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use crate::dispatcher::Dispatcher;
use crate::error::ServerError;

/// Listener and runtime settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: String,
    /// 0 binds an ephemeral port
    pub port: u16,
    /// pick response compression from `Accept-Encoding`
    pub compress: bool,
    /// size of the blocking pool lifecycle callbacks run on
    pub thread_count: usize,
    /// tokio worker threads; `None` keeps tokio's default
    pub io_threads: Option<usize>,
    /// largest buffered request body in bytes
    pub max_body_size: Option<usize>,
    /// response frames queued per connection before handlers block
    pub channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_owned(),
            port: 8080,
            compress: true,
            thread_count: 4,
            io_threads: None,
            max_body_size: None,
            channel_capacity: 16,
        }
    }
}

impl ServerConfig {
    /// Parses a JSON document; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ServerError> {
        let config: ServerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ServerError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), ServerError> {
        if self.thread_count == 0 {
            return Err(ServerError::invalid_config("thread_count must be greater than 0"));
        }
        if self.io_threads == Some(0) {
            return Err(ServerError::invalid_config("io_threads must be greater than 0"));
        }
        if self.channel_capacity == 0 {
            return Err(ServerError::invalid_config("channel_capacity must be greater than 0"));
        }
        Ok(())
    }

    fn runtime(&self) -> Result<Runtime, ServerError> {
        let mut builder = tokio::runtime::Builder::new_multi_thread();
        builder.enable_all().thread_name("cex-worker").max_blocking_threads(self.thread_count);
        if let Some(io_threads) = self.io_threads {
            builder.worker_threads(io_threads);
        }
        Ok(builder.build()?)
    }
}

#[derive(Debug, Default)]
pub struct ServerBuilder {
    dispatcher: Option<Dispatcher>,
    config: Option<ServerConfig>,
}

impl ServerBuilder {
    fn new() -> Self {
        Self::default()
    }

    pub fn dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Sets the server configuration.
    ///
    /// An explicit config overrides the dispatcher's compression setting, and its
    /// body limit when `max_body_size` is set.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<Server, ServerError> {
        let mut dispatcher = self.dispatcher.ok_or(ServerError::MissingDispatcher)?;

        let config = match self.config {
            Some(config) => {
                config.validate()?;
                dispatcher.set_auto_compress(config.compress);
                if config.max_body_size.is_some() {
                    dispatcher.set_body_limit(config.max_body_size);
                }
                config
            }
            None => ServerConfig::default(),
        };

        Ok(Server { dispatcher: Arc::new(dispatcher), config })
    }
}

/// An HTTP server running a [`Dispatcher`].
#[derive(Debug)]
pub struct Server {
    dispatcher: Arc<Dispatcher>,
    config: ServerConfig,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Serves on the current tokio runtime until the process ends.
    pub async fn start(self) -> Result<(), ServerError> {
        init_logging();
        let listener = bind(&self.config).await?;
        serve(listener, self.dispatcher, self.config.channel_capacity).await;
        Ok(())
    }

    /// Builds a runtime sized from the config and serves on it, blocking the
    /// calling thread.
    pub fn run(self) -> Result<(), ServerError> {
        let runtime = self.config.runtime()?;
        runtime.block_on(self.start())
    }

    /// Starts serving on a background thread with its own runtime.
    ///
    /// The listener is bound before this returns, so the handle's
    /// [`local_addr`](ServerHandle::local_addr) is immediately connectable. Binding
    /// happens on the server thread, which makes this callable from within another
    /// tokio runtime.
    pub fn listen(self) -> Result<ServerHandle, ServerError> {
        init_logging();
        let runtime = self.config.runtime()?;
        let Self { dispatcher, config } = self;

        let (bound_sender, bound_receiver) = mpsc::sync_channel(1);
        let (stop_sender, stop_receiver) = oneshot::channel::<()>();

        let thread = std::thread::Builder::new().name("cex-server".to_owned()).spawn(move || {
            runtime.block_on(async move {
                let bound = bind(&config).await.and_then(|listener| Ok((listener.local_addr()?, listener)));
                let (local_addr, listener) = match bound {
                    Ok(bound) => bound,
                    Err(e) => {
                        let _ = bound_sender.send(Err(e));
                        return;
                    }
                };
                let _ = bound_sender.send(Ok(local_addr));

                tokio::select! {
                    () = serve(listener, dispatcher, config.channel_capacity) => {}
                    _ = stop_receiver => info!(%local_addr, "stop requested"),
                }
            });
            runtime.shutdown_background();
        })?;

        let local_addr = match bound_receiver.recv() {
            Ok(bound) => bound?,
            Err(_) => {
                error!("server thread exited before binding");
                return Err(io::Error::other("server thread exited before binding").into());
            }
        };

        Ok(ServerHandle { local_addr, stop: Some(stop_sender), thread: Some(thread) })
    }
}

/// A server started with [`Server::listen`]. Dropping the handle stops it.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    stop: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting connections and waits for the server thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            error!(local_addr = %self.local_addr, "server thread panicked");
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn init_logging() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        debug!("global tracing subscriber already installed");
    }
}

async fn bind(config: &ServerConfig) -> Result<TcpListener, ServerError> {
    match TcpListener::bind((config.address.as_str(), config.port)).await {
        Ok(listener) => {
            info!(address = %config.address, port = config.port, "start listening");
            Ok(listener)
        }
        Err(e) => {
            error!(cause = %e, address = %config.address, port = config.port, "bind server error");
            Err(e.into())
        }
    }
}

async fn serve(listener: TcpListener, dispatcher: Arc<Dispatcher>, channel_capacity: usize) {
    loop {
        let (tcp_stream, remote_addr) = match listener.accept().await {
            Ok(stream_and_addr) => stream_and_addr,
            Err(e) => {
                warn!(cause = %e, "failed to accept");
                continue;
            }
        };

        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            let (reader, writer) = tcp_stream.into_split();
            let connection = HttpConnection::new(reader, writer).channel_capacity(channel_capacity);
            match connection.process(dispatcher).await {
                Ok(()) => {
                    info!(%remote_addr, "finished process, connection shutdown");
                }
                Err(e) => {
                    error!(%remote_addr, cause = %e, "service has error, connection shutdown");
                }
            }
        });
    }
}
