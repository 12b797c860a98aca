//! `RoomcastServer` builder and accept loop.
//!
//! Ties the layers together: transport → handshake → room → client pumps.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use roomcast_protocol::{JsonRenderer, Renderer};
use roomcast_room::{RoomConfig, RoomManager};
use roomcast_transport::{Connection, Transport, TransportError, WebSocketTransport};

use crate::handler::handle_connection;
use crate::{Authenticator, ClientConfig, MessageStore, RoomcastError, ServerConfig};

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<A, S, R> {
    pub(crate) rooms: Arc<RoomManager>,
    pub(crate) auth: Arc<A>,
    pub(crate) store: Arc<S>,
    pub(crate) renderer: Arc<R>,
    pub(crate) client: ClientConfig,
    pub(crate) handshake_timeout: Duration,
}

/// Builder for configuring and starting a roomcast server.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use roomcast::prelude::*;
///
/// let server = RoomcastServer::builder()
///     .bind("0.0.0.0:8080")
///     .build(my_auth, Arc::new(InMemoryStore::new()))
///     .await?;
/// server.run().await
/// ```
pub struct RoomcastServerBuilder {
    config: ServerConfig,
}

impl RoomcastServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Starts from a complete configuration.
    pub fn with_config(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets how long a new connection has to complete its handshake.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Sets the per-connection client configuration.
    pub fn client_config(mut self, config: ClientConfig) -> Self {
        self.config.client = config;
        self
    }

    /// Sets the configuration every room is created with.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.config.room = config;
        self
    }

    /// Binds a WebSocket listener and builds the server.
    pub async fn build<A, S>(
        self,
        auth: A,
        store: Arc<S>,
    ) -> Result<RoomcastServer<WebSocketTransport, A, S>, RoomcastError>
    where
        A: Authenticator,
        S: MessageStore,
    {
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;
        Ok(self.build_with_transport(transport, auth, store))
    }

    /// Builds the server on an already-bound transport.
    pub fn build_with_transport<T, A, S>(
        self,
        transport: T,
        auth: A,
        store: Arc<S>,
    ) -> RoomcastServer<T, A, S>
    where
        T: Transport,
        A: Authenticator,
        S: MessageStore,
    {
        RoomcastServer {
            transport,
            rooms: Arc::new(RoomManager::new(self.config.room.clone())),
            auth: Arc::new(auth),
            store,
            renderer: Arc::new(JsonRenderer),
            config: self.config,
        }
    }
}

impl Default for RoomcastServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A roomcast server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct RoomcastServer<T, A, S, R = JsonRenderer> {
    transport: T,
    rooms: Arc<RoomManager>,
    auth: Arc<A>,
    store: Arc<S>,
    renderer: Arc<R>,
    config: ServerConfig,
}

impl RoomcastServer<WebSocketTransport, (), ()> {
    /// Creates a new builder.
    pub fn builder() -> RoomcastServerBuilder {
        RoomcastServerBuilder::new()
    }
}

impl<A, S, R> RoomcastServer<WebSocketTransport, A, S, R> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }
}

impl<T, A, S, R> RoomcastServer<T, A, S, R>
where
    T: Transport<Error = TransportError>,
    T::Connection: Connection<Error = TransportError>,
    A: Authenticator,
    S: MessageStore,
    R: Renderer,
{
    /// Replaces the renderer used for every client's outbound messages.
    pub fn with_renderer<R2: Renderer>(self, renderer: R2) -> RoomcastServer<T, A, S, R2> {
        RoomcastServer {
            transport: self.transport,
            rooms: self.rooms,
            auth: self.auth,
            store: self.store,
            renderer: Arc::new(renderer),
            config: self.config,
        }
    }

    /// The room registry this server routes connections into.
    pub fn rooms(&self) -> &Arc<RoomManager> {
        &self.rooms
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Runs the accept loop until the transport shuts down.
    pub async fn run(self) -> Result<(), RoomcastError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `signal` resolves, then stops the
    /// transport and every room.
    ///
    /// Each accepted connection gets its own task running the handshake
    /// and, after that, the client pumps.
    pub async fn run_until(mut self, signal: impl Future<Output = ()> + Send) -> Result<(), RoomcastError> {
        let state = Arc::new(ServerState {
            rooms: Arc::clone(&self.rooms),
            auth: Arc::clone(&self.auth),
            store: Arc::clone(&self.store),
            renderer: Arc::clone(&self.renderer),
            client: self.config.client.clone(),
            handshake_timeout: self.config.handshake_timeout,
        });

        tracing::info!("roomcast server running");
        tokio::pin!(signal);

        loop {
            let accepted = tokio::select! {
                _ = &mut signal => {
                    tracing::info!("shutdown requested");
                    break;
                }
                accepted = self.transport.accept() => accepted,
            };

            match accepted {
                Ok(conn) => {
                    let state = Arc::clone(&state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(TransportError::Shutdown) => {
                    tracing::info!("transport shut down");
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }

        self.transport.shutdown().await?;
        self.rooms.shutdown();
        tracing::info!("roomcast server stopped");
        Ok(())
    }
}
