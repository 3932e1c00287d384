use std::collections::HashMap;

use crate::authorizer::Authorizer;
use crate::error::{RoomError, RoomResult};

use super::commands::{builtin_commands, Command, CommandContext};

/// Looks a command up by name, checks the invoker's permission, and runs it.
///
/// Commands are registered as static `{name, permission, run}` records at
/// construction, not discovered by reflection, matching how this codebase
/// wires its WS message variants and HTTP routes as static tables.
pub struct CommandDispatcher {
    commands: HashMap<&'static str, Command>,
}

impl CommandDispatcher {
    pub fn new() -> Self {
        let commands = builtin_commands()
            .into_iter()
            .map(|c| (c.name, c))
            .collect();
        Self { commands }
    }

    /// Runs `name` with `args` in `ctx`, subject to `authorizer`. The
    /// command itself executes while the caller already holds the room
    /// lock (it reaches `ctx.playback` through its own locked methods).
    pub fn execute(
        &self,
        name: &str,
        args: &[String],
        ctx: &CommandContext,
        authorizer: &Authorizer,
    ) -> RoomResult<String> {
        let command = self
            .commands
            .get(name)
            .ok_or_else(|| RoomError::UnknownCommand(name.to_string()))?;

        if !authorizer.check(ctx.client.id, command.permission) {
            return Err(RoomError::Unauthorized);
        }

        (command.run)(ctx, args)
    }
}

impl Default for CommandDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client_registry::ClientRegistry;
    use crate::playback::Playback;
    use crate::resolver::{DefaultMetadataProvider, StreamResolver};
    use crate::runtime::TaskSpawner;
    use std::sync::Arc;

    fn context(clients: &Arc<ClientRegistry>, playback: &Playback) -> (tokio::sync::mpsc::UnboundedReceiver<crate::protocol::OutboundEvent>, crate::protocol::ConnectionId) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let id = clients.create("lobby".to_string(), tx);
        (rx, id)
    }

    fn spawner() -> Arc<dyn TaskSpawner> {
        Arc::new(crate::runtime::TokioSpawner::current())
    }

    #[tokio::test]
    async fn unknown_command_is_reported() {
        let clients = ClientRegistry::new();
        let broadcaster: Arc<dyn crate::client_registry::RoomBroadcaster> = clients.clone();
        let playback = Playback::new("lobby".to_string(), spawner(), broadcaster);
        let (_rx, id) = context(&clients, &playback);
        let client = clients.get(id).unwrap();
        let resolver = StreamResolver::new(Arc::new(DefaultMetadataProvider), spawner());
        let authorizer = Authorizer::new();
        let dispatcher = CommandDispatcher::new();

        let ctx = CommandContext {
            client,
            clients: &clients,
            playback: &playback,
            resolver: &resolver,
        };
        let err = dispatcher
            .execute("not_a_command", &[], &ctx, &authorizer)
            .unwrap_err();
        assert_eq!(err.code(), "unknown_command");
    }

    #[tokio::test]
    async fn whoami_reports_connection_id_before_any_username_is_set() {
        let clients = ClientRegistry::new();
        let broadcaster: Arc<dyn crate::client_registry::RoomBroadcaster> = clients.clone();
        let playback = Playback::new("lobby".to_string(), spawner(), broadcaster);
        let (_rx, id) = context(&clients, &playback);
        let client = clients.get(id).unwrap();
        let resolver = StreamResolver::new(Arc::new(DefaultMetadataProvider), spawner());
        let authorizer = Authorizer::new();
        let dispatcher = CommandDispatcher::new();

        let ctx = CommandContext {
            client,
            clients: &clients,
            playback: &playback,
            resolver: &resolver,
        };
        let reply = dispatcher.execute("whoami", &[], &ctx, &authorizer).unwrap();
        assert_eq!(reply, id.to_string());
    }

    #[tokio::test]
    async fn unauthorized_when_a_binding_exists_but_excludes_the_client() {
        let clients = ClientRegistry::new();
        let broadcaster: Arc<dyn crate::client_registry::RoomBroadcaster> = clients.clone();
        let playback = Playback::new("lobby".to_string(), spawner(), broadcaster);
        let (_rx, id) = context(&clients, &playback);
        let client = clients.get(id).unwrap();
        let resolver = StreamResolver::new(Arc::new(DefaultMetadataProvider), spawner());
        let authorizer = Authorizer::new();
        authorizer.add_binding(
            crate::authorizer::Role::new("mod", ["stream.control"]),
            crate::protocol::ConnectionId(99999),
        );
        let dispatcher = CommandDispatcher::new();

        let ctx = CommandContext {
            client,
            clients: &clients,
            playback: &playback,
            resolver: &resolver,
        };
        let err = dispatcher
            .execute("stream", &["play".to_string()], &ctx, &authorizer)
            .unwrap_err();
        assert_eq!(err.code(), "unauthorized");
    }

    #[tokio::test]
    async fn queue_add_without_url_is_bad_arguments() {
        let clients = ClientRegistry::new();
        let broadcaster: Arc<dyn crate::client_registry::RoomBroadcaster> = clients.clone();
        let playback = Playback::new("lobby".to_string(), spawner(), broadcaster);
        let (_rx, id) = context(&clients, &playback);
        let client = clients.get(id).unwrap();
        let resolver = StreamResolver::new(Arc::new(DefaultMetadataProvider), spawner());
        let authorizer = Authorizer::new();
        let dispatcher = CommandDispatcher::new();

        let ctx = CommandContext {
            client,
            clients: &clients,
            playback: &playback,
            resolver: &resolver,
        };
        let err = dispatcher
            .execute("queue", &["add".to_string()], &ctx, &authorizer)
            .unwrap_err();
        assert_eq!(err.code(), "bad_arguments");
    }
}
