//! HTTP/WebSocket API layer.
//!
//! This module contains thin handlers that delegate to services.
//! It provides the router construction and server startup functionality.

use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use crate::authorizer::Authorizer;
use crate::client_registry::ClientRegistry;
use crate::command::CommandDispatcher;
use crate::playback_registry::PlaybackRegistry;
use crate::resolver::StreamResolver;
use crate::state::Config;

pub mod http;
pub mod ws;

/// Errors that can occur when starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to a TCP port.
    #[error("Failed to bind to port: {0}")]
    Bind(#[from] std::io::Error),

    /// No available ports in the specified range.
    #[error("No available ports in range {start}-{end}")]
    NoAvailablePort { start: u16, end: u16 },
}

/// Shared application state for the API layer.
///
/// This is a thin wrapper that holds references to services. All business
/// logic lives in the services themselves.
#[derive(Clone)]
pub struct AppState {
    pub clients: Arc<ClientRegistry>,
    pub playbacks: Arc<PlaybackRegistry>,
    pub authorizer: Arc<Authorizer>,
    pub resolver: Arc<StreamResolver>,
    pub commands: Arc<CommandDispatcher>,
    pub config: Arc<RwLock<Config>>,
}

/// Builder for constructing an `AppState`.
#[derive(Default)]
pub struct AppStateBuilder {
    clients: Option<Arc<ClientRegistry>>,
    playbacks: Option<Arc<PlaybackRegistry>>,
    authorizer: Option<Arc<Authorizer>>,
    resolver: Option<Arc<StreamResolver>>,
    commands: Option<Arc<CommandDispatcher>>,
    config: Option<Arc<RwLock<Config>>>,
}

impl AppStateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Populates every field that overlaps between `BootstrappedServices`
    /// and `AppState`, leaving only `config` to be set individually.
    pub fn from_services(mut self, services: &crate::bootstrap::BootstrappedServices) -> Self {
        self.clients = Some(Arc::clone(&services.clients));
        self.playbacks = Some(Arc::clone(&services.playbacks));
        self.authorizer = Some(Arc::clone(&services.authorizer));
        self.resolver = Some(Arc::clone(&services.resolver));
        self.commands = Some(Arc::clone(&services.commands));
        self
    }

    pub fn config(mut self, config: Arc<RwLock<Config>>) -> Self {
        self.config = Some(config);
        self
    }

    /// Builds the `AppState`, panicking if required fields are missing.
    pub fn build(self) -> AppState {
        AppState {
            clients: self.clients.expect("clients is required"),
            playbacks: self.playbacks.expect("playbacks is required"),
            authorizer: self.authorizer.expect("authorizer is required"),
            resolver: self.resolver.expect("resolver is required"),
            commands: self.commands.expect("commands is required"),
            config: self.config.expect("config is required"),
        }
    }
}

impl AppState {
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::new()
    }
}

async fn find_available_port(
    start: u16,
    end: u16,
) -> Result<(u16, tokio::net::TcpListener), ServerError> {
    for port in start..=end {
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
        match tokio::net::TcpListener::bind(&addr).await {
            Ok(listener) => return Ok((port, listener)),
            Err(_) => continue,
        }
    }
    Err(ServerError::NoAvailablePort { start, end })
}

/// Starts the HTTP server on the configured or auto-discovered port.
pub async fn start_server(state: AppState) -> Result<(), ServerError> {
    let preferred_port = state.config.read().preferred_port;
    let (port, listener) = if preferred_port > 0 {
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], preferred_port));
        (preferred_port, tokio::net::TcpListener::bind(&addr).await?)
    } else {
        find_available_port(49400, 49410).await?
    };

    log::info!("Server listening on http://0.0.0.0:{}", port);
    let app = http::create_router(state);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;
    Ok(())
}
