use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

use crate::db::database::SeenDatabase;
use crate::models::news::NewsItem;
use crate::models::settings::MAX_WINDOW_MINUTES;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeenEntry {
    pub first_seen: DateTime<Utc>,
    /// After this instant the item can no longer pass the window check
    pub expires_at: DateTime<Utc>,
}

/// Identifiers already delivered, each kept only while it could still re-enter the window.
#[derive(Debug, Default)]
pub struct SeenSet {
    entries: HashMap<String, SeenEntry>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Returns false when the id was already present (first-seen time is kept).
    pub fn insert(&mut self, id: &str, entry: SeenEntry) -> bool {
        if self.entries.contains_key(id) {
            return false;
        }
        self.entries.insert(id.to_string(), entry);
        true
    }

    pub fn get(&self, id: &str) -> Option<&SeenEntry> {
        self.entries.get(id)
    }

    /// Drops expired entries, returns how many were removed.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.expires_at >= now);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Why an item was or was not let through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Eligible,
    MissingTimestamp,
    OutsideWindow,
    AlreadySeen,
}

/// Window policy plus seen-identifier policy. Both must pass.
pub struct Deduplicator {
    window: Duration,
    seen: SeenSet,
    store: Option<SeenDatabase>,
}

impl Deduplicator {
    pub fn new(window_minutes: i64) -> Self {
        Self {
            window: Duration::minutes(window_minutes.clamp(0, MAX_WINDOW_MINUTES)),
            seen: SeenSet::new(),
            store: None,
        }
    }

    /// Same as `new`, but seeded from and written through to a SQLite store.
    pub fn with_store(
        window_minutes: i64,
        store: SeenDatabase,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Self> {
        let mut dedup = Self::new(window_minutes);
        let expired = store.prune(now)?;
        for (id, entry) in store.load_unexpired(now)? {
            dedup.seen.insert(&id, entry);
        }
        log::info!(
            "restored {} of {} stored seen ids ({} expired)",
            dedup.seen.len(),
            store.count()?,
            expired
        );
        dedup.store = Some(store);
        Ok(dedup)
    }

    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.window
    }

    pub fn check(&self, item: &NewsItem, now: DateTime<Utc>) -> Verdict {
        match item.published_at {
            None => Verdict::MissingTimestamp,
            Some(published) if published < self.cutoff(now) => Verdict::OutsideWindow,
            Some(_) if self.seen.contains(&item.id) => Verdict::AlreadySeen,
            Some(_) => Verdict::Eligible,
        }
    }

    /// Records a successful delivery. Store failures are logged; the in-memory set
    /// still guarantees no repeat within this process.
    pub fn mark_delivered(&mut self, item: &NewsItem, now: DateTime<Utc>) {
        if let Some(existing) = self.seen.get(&item.id) {
            log::debug!("{} already marked at {}", item.id, existing.first_seen);
            return;
        }
        let anchor = match item.published_at {
            Some(published) if published > now => published,
            _ => now,
        };
        let entry = SeenEntry {
            first_seen: now,
            expires_at: anchor + self.window,
        };
        self.seen.insert(&item.id, entry);
        if let Some(store) = &self.store {
            if let Err(e) = store.insert(&item.id, &entry) {
                log::warn!("failed to persist seen id {}: {}", item.id, e);
            }
        }
    }

    /// Evicts entries that can no longer pass the window check.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let removed = self.seen.prune(now);
        if let Some(store) = &self.store {
            if let Err(e) = store.prune(now) {
                log::warn!("failed to prune seen store: {}", e);
            }
        }
        removed
    }

    pub fn seen(&self) -> &SeenSet {
        &self.seen
    }
}
