//! Application bootstrap and dependency wiring.
//!
//! This module contains the composition root - the single place where all
//! services are instantiated and wired together. This pattern provides:
//!
//! - **Clarity**: All dependency relationships are visible in one place
//! - **Testability**: Easy to swap implementations for testing
//! - **Maintainability**: Service creation logic is isolated from usage

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::authorizer::Authorizer;
use crate::client_registry::{ClientRegistry, RoomBroadcaster};
use crate::command::CommandDispatcher;
use crate::playback_registry::PlaybackRegistry;
use crate::resolver::{DefaultMetadataProvider, StreamResolver};
use crate::runtime::{TaskSpawner, TokioSpawner};
use crate::state::Config;

/// Container for all bootstrapped services.
///
/// This struct holds all the wired services created during bootstrap. It's
/// consumed by `AppState` to build the final application state.
#[derive(Clone)]
pub struct BootstrappedServices {
    /// Per-connection client records and username uniqueness.
    pub clients: Arc<ClientRegistry>,
    /// Lazily-created, namespace-keyed playback rooms.
    pub playbacks: Arc<PlaybackRegistry>,
    /// Role bindings and permission checks, shared across every room.
    pub authorizer: Arc<Authorizer>,
    /// Resolves stream URLs into cached, metadata-enriched descriptors.
    pub resolver: Arc<StreamResolver>,
    /// Registered console commands (`/cmd`).
    pub commands: Arc<CommandDispatcher>,
    /// Task spawner for background operations.
    pub spawner: Arc<dyn TaskSpawner>,
    /// Cancellation token for graceful shutdown.
    pub cancel_token: CancellationToken,
    /// Application configuration.
    pub config: Config,
}

impl BootstrappedServices {
    /// Initiates graceful shutdown of all services: stops reaping, and shuts
    /// down every room's background tick producer.
    pub async fn shutdown(&self) {
        log::info!("beginning graceful shutdown");
        self.cancel_token.cancel();
        for namespace in self.playbacks.namespaces() {
            if let Some(playback) = self.playbacks.get(&namespace) {
                playback.shutdown();
            }
        }
        log::info!("shutdown complete");
    }
}

/// Bootstraps all application services with their dependencies.
///
/// This is the composition root where all services are instantiated and
/// wired together. The wiring order matters - services are created in
/// dependency order:
///
/// 1. Task spawner and cancellation token
/// 2. `ClientRegistry` (no dependencies)
/// 3. `StreamResolver` (depends on the task spawner)
/// 4. `PlaybackRegistry` (depends on `ClientRegistry` as its `RoomBroadcaster`
///    and on the task spawner, since every room spawns its own tick producer)
/// 5. `Authorizer` (no dependencies)
/// 6. `CommandDispatcher` (static command table, no dependencies)
/// 7. A background reap task, spawned last once everything it reads exists
///
/// # Arguments
/// * `config` - Application configuration
///
/// # Returns
///
/// A `BootstrappedServices` container with all services ready to use.
pub fn bootstrap_services(config: Config) -> BootstrappedServices {
    let spawner: Arc<dyn TaskSpawner> = Arc::new(TokioSpawner::current());
    let cancel_token = CancellationToken::new();

    let clients = ClientRegistry::new();
    let resolver = StreamResolver::new(Arc::new(DefaultMetadataProvider), Arc::clone(&spawner));
    let broadcaster: Arc<dyn RoomBroadcaster> = Arc::clone(&clients);
    let playbacks = PlaybackRegistry::new(broadcaster, Arc::clone(&spawner));
    let authorizer = Arc::new(Authorizer::new());
    let commands = Arc::new(CommandDispatcher::new());

    spawn_reaper(
        Arc::clone(&spawner),
        Arc::clone(&playbacks),
        Arc::clone(&clients),
        Duration::from_secs(config.reap_interval_secs),
        Duration::from_secs(config.room_reap_grace_period_secs),
        cancel_token.clone(),
    );

    BootstrappedServices {
        clients,
        playbacks,
        authorizer,
        resolver,
        commands,
        spawner,
        cancel_token,
        config,
    }
}

/// Periodically drops empty, stale rooms. Runs until `cancel` fires.
fn spawn_reaper(
    spawner: Arc<dyn TaskSpawner>,
    playbacks: Arc<PlaybackRegistry>,
    clients: Arc<ClientRegistry>,
    interval: Duration,
    grace_period: Duration,
    cancel: CancellationToken,
) {
    spawner.spawn(Box::pin(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    playbacks.reap(&clients, grace_period);
                }
            }
        }
    }));
}
