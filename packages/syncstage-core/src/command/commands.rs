use std::sync::Arc;

use crate::client_registry::{Client, ClientRegistry};
use crate::error::{RoomError, RoomResult};
use crate::playback::Playback;
use crate::resolver::StreamResolver;

/// Everything a command needs to act: the invoking client, the room it sits
/// in, and the shared resolver for turning a URL into a `StreamDescriptor`.
pub struct CommandContext<'a> {
    pub client: Client,
    pub clients: &'a ClientRegistry,
    pub playback: &'a Playback,
    pub resolver: &'a Arc<StreamResolver>,
}

type Run = Box<dyn Fn(&CommandContext, &[String]) -> RoomResult<String> + Send + Sync>;

/// A registered console command: a name, the permission required to invoke
/// it, and the function that runs it.
pub struct Command {
    pub name: &'static str,
    pub permission: &'static str,
    pub run: Run,
}

impl Command {
    fn new(
        name: &'static str,
        permission: &'static str,
        run: impl Fn(&CommandContext, &[String]) -> RoomResult<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            permission,
            run: Box::new(run),
        }
    }
}

/// The minimum required command set (§2.7): `help`, `user`, `stream`,
/// `queue`, `whoami`.
pub fn builtin_commands() -> Vec<Command> {
    vec![
        Command::new("help", "help", |_ctx, _args| {
            Ok("commands: help, user <name>, stream set|play|pause|stop|skip, queue add <url>, whoami".to_string())
        }),
        Command::new("user", "user.rename", |ctx, args| {
            let name = args.first().ok_or_else(|| {
                RoomError::BadArguments("user requires a <name> argument".to_string())
            })?;
            ctx.clients.update_username(ctx.client.id, name)?;
            let updated = ctx.clients.get(ctx.client.id)?;
            ctx.playback.refresh_info_from_client(&updated)?;
            Ok(format!("username set to {}", name))
        }),
        Command::new("stream", "stream.control", stream_command),
        Command::new("queue", "queue.add", |ctx, args| {
            if args.first().map(String::as_str) != Some("add") {
                return Err(RoomError::BadArguments(
                    "queue supports: add <url>".to_string(),
                ));
            }
            let url = args.get(1).ok_or_else(|| {
                RoomError::BadArguments("queue add requires a <url> argument".to_string())
            })?;
            let descriptor = ctx.resolver.get_or_create(url);
            ctx.playback
                .push_to_queue(&ctx.client.display_name(), descriptor);
            Ok(format!("queued {}", url))
        }),
        Command::new("whoami", "whoami", |ctx, _args| Ok(ctx.client.display_name())),
    ]
}

fn stream_command(ctx: &CommandContext, args: &[String]) -> RoomResult<String> {
    match args.first().map(String::as_str) {
        Some("set") => {
            let url = args.get(1).ok_or_else(|| {
                RoomError::BadArguments("stream set requires a <url> argument".to_string())
            })?;
            let descriptor = ctx.resolver.get_or_create(url);
            ctx.playback.update_started_by(ctx.client.display_name());
            ctx.playback.set_stream(descriptor);
            Ok(format!("now playing {}", url))
        }
        Some("play") => {
            ctx.playback.play()?;
            Ok("playback resumed".to_string())
        }
        Some("pause") => {
            ctx.playback.pause()?;
            Ok("playback paused".to_string())
        }
        Some("stop") => {
            ctx.playback.stop();
            Ok("playback stopped".to_string())
        }
        Some("skip") => match ctx.playback.skip() {
            Ok(()) => Ok("skipped to the next queued item".to_string()),
            Err(RoomError::Queue(_)) => Ok("queue is empty, nothing to skip to".to_string()),
            Err(other) => Err(other),
        },
        _ => Err(RoomError::BadArguments(
            "stream supports: set <url>, play, pause, stop, skip".to_string(),
        )),
    }
}
