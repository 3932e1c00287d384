//! PlaybackRegistry (C7): lazily-created, namespace-keyed `Playback`
//! instances, with a reaper that drops rooms nobody is connected to.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::client_registry::{ClientRegistry, RoomBroadcaster};
use crate::playback::Playback;
use crate::runtime::TaskSpawner;

/// Namespace-keyed `Playback` instances, created on first access.
pub struct PlaybackRegistry {
    rooms: DashMap<String, Arc<Playback>>,
    broadcaster: Arc<dyn RoomBroadcaster>,
    spawner: Arc<dyn TaskSpawner>,
}

impl PlaybackRegistry {
    pub fn new(broadcaster: Arc<dyn RoomBroadcaster>, spawner: Arc<dyn TaskSpawner>) -> Arc<Self> {
        Arc::new(Self {
            rooms: DashMap::new(),
            broadcaster,
            spawner,
        })
    }

    /// Returns the room's `Playback`, creating it (and starting its tick
    /// producer) on first access.
    pub fn get_or_create(self: &Arc<Self>, namespace: &str) -> Arc<Playback> {
        if let Some(existing) = self.rooms.get(namespace) {
            return existing.clone();
        }
        let playback = Playback::new(
            namespace.to_string(),
            Arc::clone(&self.spawner),
            Arc::clone(&self.broadcaster),
        );
        self.rooms
            .entry(namespace.to_string())
            .or_insert(playback)
            .clone()
    }

    pub fn get(&self, namespace: &str) -> Option<Arc<Playback>> {
        self.rooms.get(namespace).map(|entry| entry.clone())
    }

    pub fn namespaces(&self) -> Vec<String> {
        self.rooms.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Drops every room with zero current members whose `last_updated` is
    /// older than `grace_period`. Shuts down the dropped room's timer before
    /// removing it so its background tick producer does not leak.
    pub fn reap(&self, clients: &ClientRegistry, grace_period: Duration) {
        let now = Instant::now();
        let stale: Vec<String> = self
            .rooms
            .iter()
            .filter(|entry| {
                clients.by_namespace(entry.key()).is_empty()
                    && now.duration_since(entry.value().last_updated()) >= grace_period
            })
            .map(|entry| entry.key().clone())
            .collect();

        for namespace in stale {
            if let Some((_, playback)) = self.rooms.remove(&namespace) {
                playback.shutdown();
                log::info!("reaped empty room '{}'", namespace);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::TokioSpawner;

    fn registry() -> (Arc<PlaybackRegistry>, Arc<ClientRegistry>) {
        let clients = ClientRegistry::new();
        let spawner: Arc<dyn TaskSpawner> = Arc::new(TokioSpawner::current());
        let broadcaster: Arc<dyn RoomBroadcaster> = clients.clone();
        (PlaybackRegistry::new(broadcaster, spawner), clients)
    }

    #[tokio::test]
    async fn get_or_create_returns_the_same_instance_on_repeat_access() {
        let (registry, _clients) = registry();
        let a = registry.get_or_create("lobby");
        let b = registry.get_or_create("lobby");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn get_returns_none_for_an_unknown_namespace() {
        let (registry, _clients) = registry();
        assert!(registry.get("nope").is_none());
    }

    #[tokio::test]
    async fn reap_leaves_rooms_with_members_alone() {
        let (registry, clients) = registry();
        registry.get_or_create("lobby");
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        clients.create("lobby".to_string(), tx);
        registry.reap(&clients, Duration::from_secs(0));
        assert!(registry.get("lobby").is_some());
    }

    #[tokio::test]
    async fn reap_drops_empty_rooms_past_the_grace_period() {
        let (registry, clients) = registry();
        registry.get_or_create("lobby");
        tokio::time::sleep(Duration::from_millis(5)).await;
        registry.reap(&clients, Duration::from_millis(1));
        assert!(registry.get("lobby").is_none());
    }

    #[tokio::test]
    async fn reap_keeps_empty_rooms_within_the_grace_period() {
        let (registry, clients) = registry();
        registry.get_or_create("lobby");
        registry.reap(&clients, Duration::from_secs(3600));
        assert!(registry.get("lobby").is_some());
    }
}
