use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::event::{Event, EventKey};

#[async_trait]
pub trait EventStorage: Send + Sync {
    /// Stores the event under its derived key, replacing any event already there.
    async fn create(&self, event: Event);
    /// Returns `true` if an event was stored under the key of `recipient` and `fire_at`.
    async fn delete(&self, recipient: &str, fire_at: &DateTime<Utc>) -> bool;
    /// Copies out every event whose fire time is strictly before `now`.
    async fn due_snapshot(&self, now: DateTime<Utc>) -> Vec<Event>;
    async fn remove(&self, keys: &HashSet<EventKey>);
    async fn list(&self) -> Vec<Event>;
    async fn contains(&self, key: &EventKey) -> bool;
    async fn len(&self) -> usize;
}

#[derive(Default)]
pub struct InMemoryEventStorage {
    store: RwLock<HashMap<EventKey, Event>>,
}

impl InMemoryEventStorage {
    pub fn new() -> Self {
        InMemoryEventStorage {
            store: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl EventStorage for InMemoryEventStorage {
    async fn create(&self, event: Event) {
        let key = event.key();
        log::debug!("Add new event {key}: {event:?}");
        if self.store.write().await.insert(key, event).is_some() {
            log::debug!("Replaced an event with the same recipient and fire time");
        }
    }

    async fn delete(&self, recipient: &str, fire_at: &DateTime<Utc>) -> bool {
        let key = EventKey::new(recipient, fire_at);
        let removed = self.store.write().await.remove(&key).is_some();
        log::debug!("Delete event {key}, existed = {removed}");
        removed
    }

    async fn due_snapshot(&self, now: DateTime<Utc>) -> Vec<Event> {
        let store = self.store.read().await;
        store
            .values()
            .filter(|event| event.is_due(now))
            .cloned()
            .collect()
    }

    async fn remove(&self, keys: &HashSet<EventKey>) {
        if keys.is_empty() {
            return;
        }

        let mut store = self.store.write().await;
        let before = store.len();
        for key in keys {
            store.remove(key);
        }
        log::debug!("Removed {} dispatched events", before - store.len());
    }

    async fn list(&self) -> Vec<Event> {
        let store = self.store.read().await;
        store.values().cloned().collect()
    }

    async fn contains(&self, key: &EventKey) -> bool {
        self.store.read().await.contains_key(key)
    }

    async fn len(&self) -> usize {
        self.store.read().await.len()
    }
}
