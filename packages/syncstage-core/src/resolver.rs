//! StreamResolver (C1): resolves a location string into a cached
//! `StreamDescriptor`, fetching metadata asynchronously.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::runtime::TaskSpawner;

/// Handle to a media item. Identity and equality are by `url` alone — two
/// descriptors with the same `url` refer to the same stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub kind: String,
    pub url: String,
    /// Seconds; 0 means unknown (not yet resolved, or resolution failed).
    pub duration: u64,
    /// Opaque metadata blob, populated once the async fetch completes.
    pub info: serde_json::Value,
}

impl PartialEq for StreamDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}
impl Eq for StreamDescriptor {}

/// Result of an out-of-band metadata fetch: the media's duration (0 if
/// still unknown) and an opaque info blob.
pub type MetadataResult = (u64, serde_json::Value);

/// Fetches metadata for a resolved stream URL.
///
/// Concrete provider implementations (a YouTube API client, a local-file
/// prober) are deliberately out of scope here; only this contract and a
/// reasonable default implementation live in this crate, keeping the
/// resolver's own logic testable without real network or filesystem I/O.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn fetch(&self, url: &str) -> MetadataResult;
}

/// Default provider: derives a title from the URL and resolves instantly
/// with `duration = 0`. Good enough for a crate whose concern stops at the
/// resolver contract, not at actually talking to YouTube or the filesystem.
pub struct DefaultMetadataProvider;

#[async_trait]
impl MetadataProvider for DefaultMetadataProvider {
    async fn fetch(&self, url: &str) -> MetadataResult {
        let title = url
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or(url)
            .to_string();
        (0, serde_json::json!({ "title": title }))
    }
}

fn classify_kind(url: &str) -> String {
    if let Ok(parsed) = url::Url::parse(url) {
        if let Some(host) = parsed.host_str() {
            if host == "youtube.com"
                || host.ends_with(".youtube.com")
                || host == "youtu.be"
                || host.ends_with(".youtu.be")
            {
                return "youtube".to_string();
            }
        }
    }
    "local".to_string()
}

/// Resolves location strings to cached `StreamDescriptor`s, deduplicated by
/// URL, with metadata fetched asynchronously off the caller's path.
pub struct StreamResolver {
    descriptors: DashMap<String, Arc<RwLock<StreamDescriptor>>>,
    provider: Arc<dyn MetadataProvider>,
    spawner: Arc<dyn TaskSpawner>,
}

impl StreamResolver {
    pub fn new(provider: Arc<dyn MetadataProvider>, spawner: Arc<dyn TaskSpawner>) -> Arc<Self> {
        Arc::new(Self {
            descriptors: DashMap::new(),
            provider,
            spawner,
        })
    }

    /// Returns the cached descriptor for `url`, or creates one, schedules an
    /// async metadata fetch, and returns it immediately with `duration = 0`.
    /// No eager filesystem validation happens here for `local` URLs — a
    /// playback failure for an unreadable file is the client's problem.
    pub fn get_or_create(self: &Arc<Self>, url: &str) -> StreamDescriptor {
        if let Some(existing) = self.descriptors.get(url) {
            return existing.read().clone();
        }

        let descriptor = StreamDescriptor {
            kind: classify_kind(url),
            url: url.to_string(),
            duration: 0,
            info: serde_json::Value::Null,
        };
        let handle = Arc::new(RwLock::new(descriptor.clone()));
        // Another caller may have raced us here; DashMap::entry keeps the
        // first-inserted handle as the single source of truth either way.
        let handle = self
            .descriptors
            .entry(url.to_string())
            .or_insert(handle)
            .clone();

        let provider = Arc::clone(&self.provider);
        let url_owned = url.to_string();
        let fetch_target = Arc::clone(&handle);
        self.spawner.spawn(Box::pin(async move {
            let (duration, info) = provider.fetch(&url_owned).await;
            // Both fields update under one write-lock acquisition: a reader
            // never observes a torn (half-old, half-new) descriptor.
            let mut guard = fetch_target.write();
            guard.duration = duration;
            guard.info = info;
        }));

        handle.read().clone()
    }
}
