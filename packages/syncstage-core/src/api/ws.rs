//! SocketHandler (C9): per-connection WebSocket upgrade, inbound event
//! dispatch, and outbound event forwarding.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::sink::SinkExt;
use futures::stream::StreamExt;
use regex::Regex;

use crate::api::AppState;
use crate::authorizer::Authorizer;
use crate::client_registry::RoomBroadcaster;
use crate::command::{parse_command, CommandContext};
use crate::error::{RoomError, RoomResult};
use crate::playback::Playback;
use crate::protocol::{ChatExtra, ConnectionId, InboundEvent, OutboundEvent, UserListEntry};

const WS_HEARTBEAT_CHECK_INTERVAL_SECS: u64 = 15;
const WS_HEARTBEAT_TIMEOUT_SECS: u64 = 60;

/// Matches `http(s)://.../name.{jpg,jpeg,png,gif}`, optionally followed by
/// whitespace. Compiled once per process.
fn image_url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)https?://\S+\.(?:jpe?g|png|gif)\s*").expect("valid image url regex")
    })
}

/// Strips embedded image URLs out of `text`, returning the remaining text and
/// the URLs that were found, in order of appearance.
fn extract_images(text: &str) -> (String, Vec<String>) {
    let pattern = image_url_pattern();
    let mut images = Vec::new();
    for m in pattern.find_iter(text) {
        images.push(m.as_str().trim_end().to_string());
    }
    let stripped = pattern.replace_all(text, "").trim().to_string();
    (stripped, images)
}

/// WebSocket upgrade handler for `/v/{room}`. An empty `room` segment is
/// rejected at the connection boundary rather than producing a namespace
/// nobody could join on purpose.
pub async fn ws_handler(
    Path(room): Path<String>,
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> axum::response::Response {
    if room.trim().is_empty() {
        return axum::http::StatusCode::BAD_REQUEST.into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, room, state))
        .into_response()
}

/// Drives one connection's lifetime: registers the client, forwards its
/// outbox to the socket, and dispatches every inbound event until the
/// connection closes, at which point membership and role bindings are
/// cleaned up unconditionally.
async fn handle_socket(socket: WebSocket, room: String, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (outbox, mut outbox_rx) = tokio::sync::mpsc::unbounded_channel();

    let id = state.clients.create(room.clone(), outbox);
    log::info!("[ws] {} joined '{}'", id, room);

    let playback = state.playbacks.get_or_create(&room);
    state.clients.broadcast_from(id, OutboundEvent::InfoClientJoined { id });

    let mut heartbeat = tokio::time::interval(Duration::from_secs(WS_HEARTBEAT_CHECK_INTERVAL_SECS));
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut last_activity = Instant::now();

    loop {
        tokio::select! {
            outgoing = outbox_rx.recv() => {
                let Some(event) = outgoing else { break };
                let Ok(json) = serde_json::to_string(&event) else { continue };
                if sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        last_activity = Instant::now();
                        match serde_json::from_str::<InboundEvent>(&text) {
                            Ok(event) => dispatch(&state, &playback, id, event),
                            Err(e) => {
                                log::warn!("[ws] {} sent an unparsable message: {}", id, e);
                                state.clients.broadcast_error_to(
                                    id,
                                    RoomError::ParseError(e.to_string()).to_string(),
                                );
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
            _ = heartbeat.tick() => {
                if last_activity.elapsed() > Duration::from_secs(WS_HEARTBEAT_TIMEOUT_SECS) {
                    log::warn!("[ws] {} timed out", id);
                    break;
                }
            }
        }
    }

    disconnect(&state, &playback, id, &room);
}

/// Runs when a connection ends, by any path (close frame, error, or
/// heartbeat timeout). Idempotent with respect to a client that is already
/// gone, since every step here tolerates a missing client.
fn disconnect(state: &AppState, playback: &Playback, id: ConnectionId, room: &str) {
    let from = state
        .clients
        .get(id)
        .map(|c| c.display_name())
        .unwrap_or_else(|_| id.to_string());
    state
        .clients
        .broadcast_from(id, OutboundEvent::InfoClientLeft { id, from });
    playback.handle_disconnection(id, &state.authorizer);
    state.clients.destroy(id);
    log::info!("[ws] {} left '{}'", id, room);
}

/// Dispatches one inbound event for `id`. Every branch tolerates `id`
/// referring to a client that has already disconnected.
fn dispatch(state: &AppState, playback: &Playback, id: ConnectionId, event: InboundEvent) {
    match event {
        InboundEvent::RequestUpdateUsername { username } => {
            handle_update_username(state, playback, id, &username)
        }
        InboundEvent::RequestChatMessage { message } => {
            handle_chat_message(state, playback, id, &message)
        }
        InboundEvent::RequestAuthorization => {
            state.clients.broadcast_to(
                id,
                OutboundEvent::HttpRequest {
                    kind: "authorization",
                    endpoint: format!("/v/{}/auth", playback.id),
                },
            );
        }
        InboundEvent::RequestQueueSync => {
            state.clients.broadcast_to(
                id,
                OutboundEvent::QueueSync {
                    id: playback.id.clone(),
                    from: "system",
                    extra: playback.get_queue(),
                },
            );
        }
        InboundEvent::RequestStackSync => handle_stack_sync(state, playback, id),
        InboundEvent::RequestStreamSync => {
            if let Some(status) = playback.get_status() {
                state
                    .clients
                    .broadcast_to(id, OutboundEvent::stream_sync(&playback.id, status));
            }
        }
        InboundEvent::RequestUserList => handle_user_list(state, playback, id),
        InboundEvent::StreamData { info } => handle_stream_data(playback, info),
    }
}

fn handle_update_username(state: &AppState, playback: &Playback, id: ConnectionId, username: &str) {
    match state.clients.update_username(id, username) {
        Ok(_) => {
            if let Ok(updated) = state.clients.get(id) {
                if let Err(e) = playback.refresh_info_from_client(&updated) {
                    log::error!("[ws] {} refresh_info_from_client failed: {}", id, e);
                }
            }
        }
        Err(e) => state.clients.broadcast_error_to(id, e.to_string()),
    }
}

fn handle_chat_message(state: &AppState, playback: &Playback, id: ConnectionId, message: &str) {
    if let Some((name, args)) = parse_command(message) {
        let Ok(client) = state.clients.get(id) else { return };
        let ctx = CommandContext {
            client,
            clients: &state.clients,
            playback,
            resolver: &state.resolver,
        };
        match run_command(&state.commands, &name, &args, &ctx, &state.authorizer) {
            Ok(reply) => state.clients.broadcast_system_message_to(id, reply),
            Err(e) if e.is_user_facing() => state.clients.broadcast_error_to(id, e.to_string()),
            Err(e) => log::error!("[ws] {} command {:?} failed: {}", id, name, e),
        }
        return;
    }

    let Ok(client) = state.clients.get(id) else { return };
    let (text, images) = extract_images(message);
    state.clients.broadcast_all(
        &client.namespace,
        OutboundEvent::ChatMessage {
            id,
            from: client.display_name(),
            message: text,
            extra: ChatExtra { images },
        },
    );
}

fn run_command(
    commands: &crate::command::CommandDispatcher,
    name: &str,
    args: &[String],
    ctx: &CommandContext,
    authorizer: &Authorizer,
) -> RoomResult<String> {
    commands.execute(name, args, ctx, authorizer)
}

fn handle_stack_sync(state: &AppState, playback: &Playback, id: ConnectionId) {
    let Ok(client) = state.clients.get(id) else { return };
    let owner_id = client.display_name();
    let status = playback.stack_status(&owner_id).unwrap_or_else(|_| crate::queue::StackStatus {
        owner_id,
        items: Vec::new(),
    });
    state.clients.broadcast_to(
        id,
        OutboundEvent::StackSync {
            id: playback.id.clone(),
            from: "system",
            extra: status,
        },
    );
}

fn handle_user_list(state: &AppState, playback: &Playback, id: ConnectionId) {
    let clients: Vec<UserListEntry> = state
        .clients
        .by_namespace(&playback.id)
        .into_iter()
        .map(|c| UserListEntry {
            username: c.username.clone(),
            id: c.id,
            room: c.namespace.clone(),
            roles: state.authorizer.roles_for(c.id),
        })
        .collect();
    state
        .clients
        .broadcast_to(id, OutboundEvent::UserList { clients });
}

fn handle_stream_data(playback: &Playback, info: serde_json::Value) {
    playback.update_stream_info(info);
}
