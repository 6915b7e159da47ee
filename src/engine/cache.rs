//! Best-effort memoization of stop-offset tables.
//!
//! Entries are keyed by a content hash of the coordinate snapshot, so any
//! stop edit (coordinates, ordering, membership) produces a new key and the
//! stale entry ages out instead of being served. Two tasks recomputing the
//! same entry concurrently is harmless, the table is deterministic.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::engine::offsets::{GeoStop, OffsetTable};
use crate::models::Direction;

/// Below this the cache would thrash under a normal request burst.
const MIN_TTL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OffsetCacheKey {
    route_id: i64,
    direction: Direction,
    snapshot_hash: u64,
}

impl OffsetCacheKey {
    pub fn new(route_id: i64, direction: Direction, snapshot: &[GeoStop]) -> Self {
        Self {
            route_id,
            direction,
            snapshot_hash: snapshot_signature(snapshot),
        }
    }
}

fn snapshot_signature(snapshot: &[GeoStop]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for stop in snapshot {
        stop.id.hash(&mut hasher);
        stop.order.hash(&mut hasher);
        stop.lat.to_bits().hash(&mut hasher);
        stop.lng.to_bits().hash(&mut hasher);
    }
    hasher.finish()
}

struct CacheEntry {
    stored_at: Instant,
    table: OffsetTable,
}

pub struct OffsetCache {
    ttl: Duration,
    entries: RwLock<HashMap<OffsetCacheKey, CacheEntry>>,
}

impl OffsetCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: ttl.max(MIN_TTL),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// The entry for this key if it is still fresh as of `now`.
    pub fn get(&self, key: &OffsetCacheKey, now: Instant) -> Option<OffsetTable> {
        let entries = match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let entry = entries.get(key)?;
        if now.duration_since(entry.stored_at) < self.ttl {
            Some(entry.table.clone())
        } else {
            None
        }
    }

    /// Store a freshly computed table. Expired entries are dropped on the
    /// way so superseded snapshots do not accumulate.
    pub fn insert(&self, key: OffsetCacheKey, table: OffsetTable, now: Instant) {
        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.retain(|_, entry| now.duration_since(entry.stored_at) < self.ttl);
        entries.insert(
            key,
            CacheEntry {
                stored_at: now,
                table,
            },
        );
    }
}
