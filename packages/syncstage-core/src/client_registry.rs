//! ClientRegistry (C5): per-connection client records, username uniqueness,
//! and namespace (room) membership.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::error::{RoomError, RoomResult};
use crate::protocol::{ConnectionId, OutboundEvent};

/// A connected user. Usernames are optional until `update_username`
/// succeeds for the first time; a client without one is addressed by id.
#[derive(Clone)]
pub struct Client {
    pub id: ConnectionId,
    pub namespace: String,
    pub username: Option<String>,
    pub previous_username: Option<String>,
    outbox: mpsc::UnboundedSender<OutboundEvent>,
}

impl Client {
    pub fn display_name(&self) -> String {
        self.username.clone().unwrap_or_else(|| self.id.to_string())
    }

    /// Addresses the connection directly. Silently drops the event if the
    /// connection has already gone away — every handler must tolerate a
    /// disconnected client without crashing.
    pub fn send(&self, event: OutboundEvent) {
        let _ = self.outbox.send(event);
    }
}

/// A narrow broadcast capability, implemented by `ClientRegistry`.
///
/// `Playback` holds this trait object instead of a pointer to the full
/// registry, which is how this crate resolves the Playback↔ClientRegistry
/// cyclic reference the design calls out: Playback can push updates to a
/// room without being able to reach back into registry internals (username
/// uniqueness, connection bookkeeping) it has no business touching.
pub trait RoomBroadcaster: Send + Sync {
    fn broadcast_all(&self, namespace: &str, event: OutboundEvent);
}

/// Per-connection client records, keyed by connection id, with a secondary
/// index enforcing per-namespace username uniqueness — the same dual-index
/// shape used for session lookups elsewhere in this codebase.
pub struct ClientRegistry {
    clients: DashMap<ConnectionId, Client>,
    username_index: DashMap<(String, String), ConnectionId>,
    next_id: AtomicU64,
}

impl ClientRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            clients: DashMap::new(),
            username_index: DashMap::new(),
            next_id: AtomicU64::new(1),
        })
    }

    /// Registers a new client in `namespace`, addressed via `outbox`.
    pub fn create(
        &self,
        namespace: String,
        outbox: mpsc::UnboundedSender<OutboundEvent>,
    ) -> ConnectionId {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.clients.insert(
            id,
            Client {
                id,
                namespace,
                username: None,
                previous_username: None,
                outbox,
            },
        );
        id
    }

    /// Removes the client record, releasing its username slot.
    pub fn destroy(&self, id: ConnectionId) -> Option<Client> {
        let (_, client) = self.clients.remove(&id)?;
        if let Some(username) = &client.username {
            self.username_index
                .remove(&(client.namespace.clone(), username.clone()));
        }
        Some(client)
    }

    pub fn get(&self, id: ConnectionId) -> RoomResult<Client> {
        self.clients
            .get(&id)
            .map(|entry| entry.clone())
            .ok_or_else(|| RoomError::NoSuchClient(id.to_string()))
    }

    pub fn size(&self) -> usize {
        self.clients.len()
    }

    pub fn by_namespace(&self, namespace: &str) -> Vec<Client> {
        self.clients
            .iter()
            .filter(|entry| entry.namespace == namespace)
            .map(|entry| entry.clone())
            .collect()
    }

    /// Validates and applies a username change. On success, the caller is
    /// responsible for triggering `Playback::refresh_info_from_client` —
    /// this method reports the old/new username pair back so the caller can
    /// do so without this registry needing a handle to `PlaybackRegistry`.
    pub fn update_username(
        &self,
        id: ConnectionId,
        name: &str,
    ) -> RoomResult<(Option<String>, String)> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(RoomError::InvalidName(name.to_string()));
        }

        let namespace = self.get(id)?.namespace;
        let key = (namespace.clone(), trimmed.to_string());
        if let Some(holder) = self.username_index.get(&key) {
            if *holder != id {
                return Err(RoomError::NameTaken(trimmed.to_string()));
            }
        }

        let mut entry = self
            .clients
            .get_mut(&id)
            .ok_or_else(|| RoomError::NoSuchClient(id.to_string()))?;
        let old = entry.username.clone();
        if let Some(old_name) = &old {
            self.username_index
                .remove(&(namespace.clone(), old_name.clone()));
        }
        entry.previous_username = old.clone();
        entry.username = Some(trimmed.to_string());
        self.username_index.insert(key, id);
        Ok((old, trimmed.to_string()))
    }

    pub fn broadcast_to(&self, id: ConnectionId, event: OutboundEvent) {
        if let Some(client) = self.clients.get(&id) {
            client.send(event);
        }
    }

    pub fn broadcast_from(&self, id: ConnectionId, event: OutboundEvent) {
        if let Some(namespace) = self.clients.get(&id).map(|c| c.namespace.clone()) {
            for peer in self.clients.iter() {
                if peer.namespace == namespace && peer.id != id {
                    peer.send(event.clone());
                }
            }
        }
    }

    pub fn broadcast_system_message_to(&self, id: ConnectionId, text: impl Into<String>) {
        self.broadcast_to(id, OutboundEvent::system_message(id, text));
    }

    pub fn broadcast_error_to(&self, id: ConnectionId, message: impl Into<String>) {
        self.broadcast_to(id, OutboundEvent::client_error(id, message));
    }
}

impl RoomBroadcaster for ClientRegistry {
    fn broadcast_all(&self, namespace: &str, event: OutboundEvent) {
        for client in self.clients.iter() {
            if client.namespace == namespace {
                client.send(event.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_client(ns: &str) -> (Arc<ClientRegistry>, ConnectionId, mpsc::UnboundedReceiver<OutboundEvent>) {
        let registry = ClientRegistry::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let id = registry.create(ns.to_string(), tx);
        (registry, id, rx)
    }

    #[test]
    fn username_uniqueness_per_namespace() {
        let registry = ClientRegistry::new();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();
        let c1 = registry.create("lobby".into(), tx1);
        let c2 = registry.create("lobby".into(), tx2);
        registry.update_username(c1, "alice").unwrap();
        let err = registry.update_username(c2, "alice").unwrap_err();
        assert_eq!(err.code(), "name_taken");
    }

    #[test]
    fn same_username_allowed_across_different_namespaces() {
        let registry = ClientRegistry::new();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();
        let c1 = registry.create("room-a".into(), tx1);
        let c2 = registry.create("room-b".into(), tx2);
        registry.update_username(c1, "alice").unwrap();
        assert!(registry.update_username(c2, "alice").is_ok());
    }

    #[test]
    fn empty_or_whitespace_username_is_invalid() {
        let (registry, id, _rx) = registry_with_client("lobby");
        assert_eq!(registry.update_username(id, "").unwrap_err().code(), "invalid_name");
        assert_eq!(registry.update_username(id, "   ").unwrap_err().code(), "invalid_name");
    }

    #[test]
    fn update_records_previous_username() {
        let (registry, id, _rx) = registry_with_client("lobby");
        registry.update_username(id, "alice").unwrap();
        registry.update_username(id, "alicia").unwrap();
        let client = registry.get(id).unwrap();
        assert_eq!(client.previous_username.as_deref(), Some("alice"));
        assert_eq!(client.username.as_deref(), Some("alicia"));
    }

    #[test]
    fn destroy_frees_the_username_for_reuse() {
        let registry = ClientRegistry::new();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let c1 = registry.create("lobby".into(), tx1);
        registry.update_username(c1, "alice").unwrap();
        registry.destroy(c1);
        let (tx2, _rx2) = mpsc::unbounded_channel();
        let c2 = registry.create("lobby".into(), tx2);
        assert!(registry.update_username(c2, "alice").is_ok());
    }

    #[test]
    fn broadcast_from_excludes_self() {
        let registry = ClientRegistry::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let c1 = registry.create("lobby".into(), tx1);
        let _c2 = registry.create("lobby".into(), tx2);
        registry.broadcast_from(c1, OutboundEvent::InfoClientJoined { id: c1 });
        assert!(rx1.try_recv().is_err());
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn broadcast_to_missing_client_does_not_panic() {
        let registry = ClientRegistry::new();
        registry.broadcast_to(ConnectionId(999), OutboundEvent::InfoClientJoined { id: ConnectionId(999) });
    }
}
