//! Playback (C6): per-room state — current stream, timer, queue,
//! `started_by`, `last_updated` — plus the tick-driven auto-advance state
//! machine bound to it at construction (§4.5).

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::client_registry::{Client, RoomBroadcaster};
use crate::error::{RoomError, RoomResult};
use crate::protocol::OutboundEvent;
use crate::protocol::StatusRecord;
use crate::queue::{Queue, QueueStatus, StackStatus};
use crate::resolver::StreamDescriptor;
use crate::runtime::TaskSpawner;
use crate::timer::Timer;

/// Every tick divisible by this many seconds triggers a periodic
/// `streamsync` broadcast, independent of end-of-stream detection.
pub const SYNC_RATE: u64 = 10;

/// Every tick divisible by this many seconds emits an info-level log line.
const TICK_LOG_INTERVAL: u64 = 50;

struct PlaybackState {
    stream: Option<StreamDescriptor>,
    queue: Queue,
    started_by: Option<String>,
    last_updated: Instant,
}

/// The authoritative per-room playback timeline.
///
/// `state` is the "room lock" referenced throughout the concurrency design:
/// every mutation of the stream, queue, `started_by`, and `last_updated`
/// happens under it, and the tick callback (invoked by `timer` with
/// `timer`'s own lock already released) acquires the very same lock. That
/// single fact is what serializes tick-driven auto-advance against a
/// concurrent `stream skip` command.
pub struct Playback {
    pub id: String,
    state: Mutex<PlaybackState>,
    timer: Arc<Timer>,
    broadcaster: Arc<dyn RoomBroadcaster>,
}

impl Playback {
    /// Creates a room's `Playback` and registers its tick callback. The
    /// timer's background scheduler starts immediately (see `Timer::new`);
    /// the callback is wired after construction via a weak self-reference so
    /// the timer does not keep a room alive past its last strong reference.
    pub fn new(
        namespace: String,
        spawner: Arc<dyn TaskSpawner>,
        broadcaster: Arc<dyn RoomBroadcaster>,
    ) -> Arc<Self> {
        let timer = Timer::new(spawner);
        let playback = Arc::new(Self {
            id: namespace,
            state: Mutex::new(PlaybackState {
                stream: None,
                queue: Queue::new(),
                started_by: None,
                last_updated: Instant::now(),
            }),
            timer,
            broadcaster,
        });

        let weak = Arc::downgrade(&playback);
        playback.timer.on_tick(move |t| {
            if let Some(playback) = weak.upgrade() {
                playback.handle_tick(t);
            }
        });

        playback
    }

    fn status_from_locked(&self, state: &PlaybackState) -> Option<StatusRecord> {
        let stream = state.stream.as_ref()?;
        Some(StatusRecord {
            kind: stream.kind.clone(),
            queue_length: state.queue.len(),
            started_by: state.started_by.clone().unwrap_or_default(),
            stream_url: stream.url.clone(),
            stream_duration: stream.duration,
            playback: self.timer.status(),
        })
    }

    fn apply_stream_locked(state: &mut PlaybackState, timer: &Timer, descriptor: StreamDescriptor) {
        state.stream = Some(descriptor);
        state.last_updated = Instant::now();
        timer.set(0);
    }

    /// The auto-advance state machine, run once per tick under the room
    /// lock. End-of-stream detection (checked on even `t`) always precedes
    /// the periodic sync check within the same tick.
    fn handle_tick(&self, t: u64) {
        let mut events = Vec::new();
        {
            let mut state = self.state.lock();

            if t % 2 == 0 {
                let should_advance = state
                    .stream
                    .as_ref()
                    .is_some_and(|s| s.duration > 0 && t >= s.duration);
                if should_advance {
                    match state.queue.next() {
                        Ok(item) => {
                            Self::apply_stream_locked(&mut state, &self.timer, item);
                            if let Some(status) = self.status_from_locked(&state) {
                                events.push(OutboundEvent::stream_load(&self.id, status.clone()));
                                events.push(OutboundEvent::stream_sync(&self.id, status));
                            }
                        }
                        Err(_) => {
                            self.timer.stop();
                            state.last_updated = Instant::now();
                            if let Some(status) = self.status_from_locked(&state) {
                                events.push(OutboundEvent::stream_sync(&self.id, status));
                            }
                        }
                    }
                }
            }

            if t % SYNC_RATE == 0 {
                if let Some(status) = self.status_from_locked(&state) {
                    events.push(OutboundEvent::stream_sync(&self.id, status));
                }
            }
        }

        if t % TICK_LOG_INTERVAL == 0 {
            log::info!("[Playback {}] tick t={}", self.id, t);
        }

        for event in events {
            self.broadcaster.broadcast_all(&self.id, event);
        }
    }

    pub fn play(&self) -> RoomResult<()> {
        self.timer.play()
    }

    pub fn pause(&self) -> RoomResult<()> {
        self.timer.pause()
    }

    pub fn stop(&self) {
        self.timer.stop();
        self.state.lock().last_updated = Instant::now();
    }

    pub fn reset(&self) {
        self.timer.set(0);
    }

    pub fn set_time(&self, t: u64) {
        self.timer.set(t);
    }

    pub fn get_time(&self) -> u64 {
        self.timer.get_time()
    }

    pub fn get_stream(&self) -> Option<StreamDescriptor> {
        self.state.lock().stream.clone()
    }

    /// Sets the current stream, resets the timer to 0, and broadcasts
    /// `streamload` then `streamsync` to the whole room. This is the shared
    /// implementation behind the `stream set` command, `stream skip`, and
    /// tick-driven auto-advance's success path.
    pub fn set_stream(&self, descriptor: StreamDescriptor) {
        let status = {
            let mut state = self.state.lock();
            Self::apply_stream_locked(&mut state, &self.timer, descriptor);
            self.status_from_locked(&state)
                .expect("stream was just set")
        };
        self.broadcaster
            .broadcast_all(&self.id, OutboundEvent::stream_load(&self.id, status.clone()));
        self.broadcaster
            .broadcast_all(&self.id, OutboundEvent::stream_sync(&self.id, status));
    }

    /// Merges `patch` into the current stream's `info` blob in place,
    /// touching neither the timer nor the stream's `url`/`duration`, and
    /// emits no `streamload`. This is what `streamdata` is for (§4.9): it
    /// enriches the already-playing item's metadata without restarting it.
    /// A no-op when no stream is currently set.
    pub fn update_stream_info(&self, patch: serde_json::Value) {
        let mut state = self.state.lock();
        if let Some(stream) = state.stream.as_mut() {
            match (stream.info.as_object_mut(), patch.as_object()) {
                (Some(target), Some(patch_obj)) => {
                    for (k, v) in patch_obj {
                        target.insert(k.clone(), v.clone());
                    }
                }
                _ => stream.info = patch,
            }
        }
    }

    pub fn push_to_queue(&self, owner_id: &str, stream: StreamDescriptor) {
        self.state.lock().queue.push(owner_id, stream);
    }

    /// Forces `queue.next()`; on success behaves like `set_stream` for the
    /// popped item. Propagates `QueueEmpty` to the caller (the `stream skip`
    /// command turns that into a user-visible message).
    pub fn skip(&self) -> RoomResult<()> {
        let item = {
            let mut state = self.state.lock();
            state.queue.next()?
        };
        self.set_stream(item);
        Ok(())
    }

    pub fn get_queue(&self) -> QueueStatus {
        self.state.lock().queue.status()
    }

    pub fn stack_status(&self, owner_id: &str) -> RoomResult<StackStatus> {
        Ok(self.state.lock().queue.stack_status(owner_id)?)
    }

    /// `None` when no stream is set — callers (commands, the tick callback,
    /// `request_streamsync`) must check for this rather than assume a
    /// stream always exists (§9 Open Question 1, decided in DESIGN.md).
    pub fn get_status(&self) -> Option<StatusRecord> {
        let state = self.state.lock();
        self.status_from_locked(&state)
    }

    pub fn update_started_by(&self, username: impl Into<String>) {
        self.state.lock().started_by = Some(username.into());
    }

    /// If `started_by` equals the client's non-empty `previous_username`,
    /// replaces it with the client's current `username` and returns `true`.
    /// A client with a previous username but no current one is an
    /// `InvariantViolation` — a hard failure, never silently ignored.
    pub fn refresh_info_from_client(&self, client: &Client) -> RoomResult<bool> {
        match (&client.previous_username, &client.username) {
            (Some(_), None) => Err(RoomError::InvariantViolation(format!(
                "client {} has previous_username but no username",
                client.id
            ))),
            (Some(prev), Some(new)) if !prev.is_empty() => {
                let mut state = self.state.lock();
                if state.started_by.as_deref() == Some(prev.as_str()) {
                    state.started_by = Some(new.clone());
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            _ => Ok(false),
        }
    }

    pub fn set_last_updated(&self) {
        self.state.lock().last_updated = Instant::now();
    }

    pub fn last_updated(&self) -> Instant {
        self.state.lock().last_updated
    }

    /// Called when a room member disconnects. Updates `last_updated` and
    /// strips the connection from every authorizer binding; does not
    /// otherwise alter playback state — a disconnected viewer does not pause
    /// the room.
    pub fn handle_disconnection(
        &self,
        conn: crate::protocol::ConnectionId,
        authorizer: &crate::authorizer::Authorizer,
    ) {
        self.set_last_updated();
        authorizer.remove_subject(conn);
    }

    /// Stops the background tick producer. Called when this room is reaped.
    pub fn shutdown(&self) {
        self.timer.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client_registry::ClientRegistry;
    use crate::runtime::TokioSpawner;

    fn playback(ns: &str) -> Arc<Playback> {
        let spawner: Arc<dyn TaskSpawner> = Arc::new(TokioSpawner::current());
        let broadcaster = ClientRegistry::new();
        Playback::new(ns.to_string(), spawner, broadcaster)
    }

    fn stream(url: &str, duration: u64) -> StreamDescriptor {
        StreamDescriptor {
            kind: "local".into(),
            url: url.into(),
            duration,
            info: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn get_status_is_none_without_a_stream() {
        let p = playback("lobby");
        assert!(p.get_status().is_none());
    }

    #[tokio::test]
    async fn set_stream_resets_timer_and_populates_status() {
        let p = playback("lobby");
        p.set_time(50);
        p.set_stream(stream("https://youtu.be/ABC", 0));
        assert_eq!(p.get_time(), 0);
        let status = p.get_status().unwrap();
        assert_eq!(status.stream_url, "https://youtu.be/ABC");
    }

    #[tokio::test]
    async fn skip_on_empty_queue_fails_with_queue_empty() {
        let p = playback("lobby");
        let err = p.skip().unwrap_err();
        assert_eq!(err.code(), "queue_empty");
    }

    #[tokio::test]
    async fn skip_pops_queue_and_loads_as_current_stream() {
        let p = playback("lobby");
        p.push_to_queue("alice", stream("a1", 0));
        p.skip().unwrap();
        assert_eq!(p.get_stream().unwrap().url, "a1");
    }

    #[tokio::test]
    async fn update_stream_info_merges_without_touching_timer_or_url() {
        let p = playback("lobby");
        p.set_stream(stream("https://youtu.be/ABC", 120));
        p.set_time(42);

        p.update_stream_info(serde_json::json!({"title": "Nice Song"}));

        let current = p.get_stream().unwrap();
        assert_eq!(current.url, "https://youtu.be/ABC");
        assert_eq!(current.duration, 120);
        assert_eq!(current.info["title"], "Nice Song");
        assert_eq!(p.get_time(), 42);
    }

    #[tokio::test]
    async fn update_stream_info_is_a_no_op_without_a_current_stream() {
        let p = playback("lobby");
        p.update_stream_info(serde_json::json!({"title": "ignored"}));
        assert!(p.get_stream().is_none());
    }

    #[tokio::test]
    async fn update_stream_info_merges_keys_and_keeps_the_rest() {
        let p = playback("lobby");
        let mut initial = stream("https://youtu.be/ABC", 120);
        initial.info = serde_json::json!({"title": "old", "artist": "keep"});
        p.set_stream(initial);

        p.update_stream_info(serde_json::json!({"title": "new"}));

        let info = p.get_stream().unwrap().info;
        assert_eq!(info["title"], "new");
        assert_eq!(info["artist"], "keep");
    }

    #[tokio::test(start_paused = true)]
    async fn tick_auto_advances_to_next_queued_item_past_duration() {
        let p = playback("lobby");
        p.push_to_queue("alice", stream("next", 3));
        p.set_stream(stream("current", 2));
        p.play().unwrap();
        tokio::time::advance(std::time::Duration::from_millis(2_500)).await;
        tokio::task::yield_now().await;
        assert_eq!(p.get_stream().unwrap().url, "next");
        assert!(p.get_time() <= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn tick_stops_when_stream_ends_with_empty_queue() {
        let p = playback("lobby");
        p.set_stream(stream("current", 1));
        p.play().unwrap();
        tokio::time::advance(std::time::Duration::from_millis(2_500)).await;
        tokio::task::yield_now().await;
        assert_eq!(p.get_time(), 0);
    }

    #[test]
    fn refresh_info_replaces_started_by_on_username_change() {
        let p = playback("lobby");
        p.update_started_by("alice");
        let client = client_with_rename("alice", "alice_new");
        let replaced = p.refresh_info_from_client(&client).unwrap();
        assert!(replaced);
    }

    #[test]
    fn refresh_info_is_invariant_violation_without_current_username() {
        let p = playback("lobby");
        let mut client = client_with_rename("alice", "alicia");
        client.username = None;
        let err = p.refresh_info_from_client(&client).unwrap_err();
        assert_eq!(err.code(), "invariant_violation");
    }

    /// A client that has changed its username once, so `previous_username`
    /// is populated the way `ClientRegistry::update_username` leaves it.
    fn client_with_rename(from: &str, to: &str) -> Client {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let registry = ClientRegistry::new();
        let id = registry.create("lobby".to_string(), tx);
        registry.update_username(id, from).unwrap();
        registry.update_username(id, to).unwrap();
        registry.get(id).unwrap()
    }
}
