//! Syncstage Core - the room coordination engine for synchronized media
//! playback.
//!
//! Clients connect over a persistent WebSocket, join named rooms, and each
//! room maintains a single authoritative playback timeline that is
//! continuously reconciled to every member. A chat channel doubles as a
//! command console: `/`-prefixed messages are parsed and dispatched as
//! administrative commands; everything else is broadcast as chat.
//!
//! # Architecture
//!
//! - [`timer`]: monotonic per-room second counter (C2)
//! - [`queue`]: per-room round-robin user stacks (C3)
//! - [`resolver`]: URL → `StreamDescriptor` resolution with async metadata
//!   fetch (C1)
//! - [`authorizer`]: role → subject bindings and permission checks (C4)
//! - [`client_registry`]: per-connection client records and room membership
//!   (C5)
//! - [`playback`]: per-room state machine, owning the tick-driven
//!   auto-advance logic (C6)
//! - [`playback_registry`]: namespace → `Playback` lookup, creation, and
//!   reaping (C7)
//! - [`command`]: `/cmd` parsing and dispatch (C8)
//! - [`api`]: the WebSocket/HTTP transport adapter (C9)
//! - [`bootstrap`]: composition root wiring every service together
//! - [`error`]: the crate-wide error taxonomy
//! - [`runtime`]: task-spawning abstraction for runtime independence
//! - [`state`]: runtime configuration

#![warn(clippy::all)]

pub mod api;
pub mod authorizer;
pub mod bootstrap;
pub mod client_registry;
pub mod command;
pub mod error;
pub mod playback;
pub mod playback_registry;
pub mod protocol;
pub mod queue;
pub mod resolver;
pub mod runtime;
pub mod state;
pub mod timer;

pub use api::{start_server, AppState, AppStateBuilder, ServerError};
pub use authorizer::{Authorizer, Binding, Role};
pub use bootstrap::{bootstrap_services, BootstrappedServices};
pub use client_registry::{Client, ClientRegistry, RoomBroadcaster};
pub use command::{parse_command, Command, CommandContext, CommandDispatcher};
pub use error::{ErrorCode, RoomError, RoomResult};
pub use playback::Playback;
pub use playback_registry::PlaybackRegistry;
pub use protocol::{ConnectionId, InboundEvent, OutboundEvent, StatusRecord};
pub use queue::{Queue, QueueStatus, StackStatus};
pub use resolver::{DefaultMetadataProvider, MetadataProvider, StreamDescriptor, StreamResolver};
pub use runtime::{TaskSpawner, TokioSpawner};
pub use state::Config;
pub use timer::{Timer, TimerState, TimerStatus};
