//! CommandDispatcher (C8): chat-console command parsing and execution.

mod commands;
mod dispatcher;

pub use commands::{Command, CommandContext};
pub use dispatcher::CommandDispatcher;

/// Splits a chat message into a command name and its argument list if the
/// message is a command (its first character is `/`).
///
/// Parsing is permissive (§9, Open Question 2): the name is everything
/// between the leading `/` and the first space, and the rest is split on
/// whitespace regardless of whether it contains further `/` characters. A
/// bare `/` with nothing after it parses to an empty command name, which
/// the dispatcher then reports as `UnknownCommand`.
pub fn parse_command(text: &str) -> Option<(String, Vec<String>)> {
    let rest = text.strip_prefix('/')?;
    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or("").to_string();
    let args = parts.map(str::to_string).collect();
    Some((name, args))
}
