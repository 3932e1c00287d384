//! Timer (C2): a monotonic integer-second counter with a background
//! scheduler and a tick callback.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::{RoomResult, TimerError};
use crate::runtime::TaskSpawner;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerState {
    Stopped,
    Playing,
    Paused,
}

/// Wire-serializable timer snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerStatus {
    pub state: TimerState,
    pub time: u64,
}

type TickCallback = Arc<dyn Fn(u64) + Send + Sync>;

struct TimerInner {
    state: TimerState,
    time: u64,
    tick_cb: Option<TickCallback>,
}

/// A monotonic second counter. Advances by 1 every ~second while `Playing`
/// and invokes the registered tick callback after every increment
/// (including the 0→1 edge).
///
/// The callback runs with this timer's own lock already released, so it is
/// free to reenter the owning `Playback` (which takes the room lock, then
/// briefly this timer's lock, in that order) without risking a lock-order
/// cycle between the two.
pub struct Timer {
    inner: Mutex<TimerInner>,
    cancel: CancellationToken,
}

impl Timer {
    /// Constructs a timer and immediately spawns its background scheduler.
    pub fn new(spawner: Arc<dyn TaskSpawner>) -> Arc<Self> {
        let timer = Arc::new(Self {
            inner: Mutex::new(TimerInner {
                state: TimerState::Stopped,
                time: 0,
                tick_cb: None,
            }),
            cancel: CancellationToken::new(),
        });

        let driven = Arc::clone(&timer);
        spawner.spawn(Box::pin(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = driven.cancel.cancelled() => break,
                    _ = interval.tick() => {}
                }
                let advanced = {
                    let mut guard = driven.inner.lock();
                    if guard.state != TimerState::Playing {
                        None
                    } else {
                        guard.time += 1;
                        Some((guard.time, guard.tick_cb.clone()))
                    }
                };
                if let Some((time, Some(cb))) = advanced {
                    cb(time);
                }
            }
        }));

        timer
    }

    /// Registers the tick callback. Overwrites any previously registered one.
    pub fn on_tick<F>(&self, cb: F)
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        self.inner.lock().tick_cb = Some(Arc::new(cb));
    }

    /// No-op success if already playing.
    pub fn play(&self) -> RoomResult<()> {
        self.inner.lock().state = TimerState::Playing;
        Ok(())
    }

    pub fn pause(&self) -> RoomResult<()> {
        let mut guard = self.inner.lock();
        if guard.state != TimerState::Playing {
            return Err(TimerError::InvalidState.into());
        }
        guard.state = TimerState::Paused;
        Ok(())
    }

    /// Idempotent: transitions to `Stopped` and resets `time` to 0.
    pub fn stop(&self) {
        let mut guard = self.inner.lock();
        guard.state = TimerState::Stopped;
        guard.time = 0;
    }

    /// Legal in any state.
    pub fn set(&self, t: u64) {
        self.inner.lock().time = t;
    }

    pub fn get_time(&self) -> u64 {
        self.inner.lock().time
    }

    pub fn status(&self) -> TimerStatus {
        let guard = self.inner.lock();
        TimerStatus {
            state: guard.state,
            time: guard.time,
        }
    }

    /// Terminates the background scheduler. Called when the owning
    /// `Playback` is reaped.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}
