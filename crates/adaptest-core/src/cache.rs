//! Read-mostly memoization of per-item computations at discretized θ.
//!
//! Keys are `(item id, θ bucket)`, where the bucket is θ rounded to a fixed
//! grid; cached values are always computed at the bucket center, so any
//! session recomputing a key produces an identical entry and inserts are
//! idempotent. Cardinality is bounded by `items × grid width`, entries
//! carry a TTL, and shards evict their oldest entries past a size bound.
//! Correctness never depends on cache contents, only latency does.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::config::CatConfig;
use crate::irt;
use crate::model::Item;

const SHARD_COUNT: usize = 16;

/// A memoized per-item computation at one θ bucket.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Fisher information at the bucket center.
    pub information: f64,
    /// Category probabilities at the bucket center (likelihood
    /// contributions for every possible response value).
    pub category_probs: Vec<f64>,
    inserted_at: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    item_id: String,
    bucket: i64,
}

/// Sharded, bounded, TTL-evicting computation cache.
///
/// Shared across concurrently running sessions; reads and inserts only
/// need the shard lock.
#[derive(Debug)]
pub struct InfoCache {
    shards: Vec<RwLock<HashMap<CacheKey, CacheEntry>>>,
    max_per_shard: usize,
    ttl: Duration,
    resolution: f64,
}

impl InfoCache {
    pub fn new(max_entries: usize, ttl: Duration, resolution: f64) -> Self {
        let shards = (0..SHARD_COUNT).map(|_| RwLock::new(HashMap::new())).collect();
        Self {
            shards,
            max_per_shard: (max_entries / SHARD_COUNT).max(1),
            ttl,
            resolution,
        }
    }

    pub fn from_config(config: &CatConfig) -> Self {
        Self::new(
            config.cache_max_entries,
            Duration::from_secs(config.cache_ttl_secs),
            config.cache_resolution,
        )
    }

    /// Bucket index for a θ value.
    pub fn bucket(&self, theta: f64) -> i64 {
        (theta / self.resolution).round() as i64
    }

    /// The θ at which values for `bucket` are computed.
    pub fn bucket_center(&self, bucket: i64) -> f64 {
        bucket as f64 * self.resolution
    }

    /// Look up an entry; expired entries read as misses.
    pub fn get(&self, item_id: &str, bucket: i64) -> Option<CacheEntry> {
        let key = CacheKey {
            item_id: item_id.to_string(),
            bucket,
        };
        let shard = self.shard_for(&key).read().expect("cache lock poisoned");
        shard
            .get(&key)
            .filter(|entry| entry.inserted_at.elapsed() <= self.ttl)
            .cloned()
    }

    /// Insert (or overwrite) an entry, evicting the shard's oldest entries
    /// once it exceeds its share of the size bound.
    pub fn insert(&self, item_id: &str, bucket: i64, information: f64, category_probs: Vec<f64>) {
        let key = CacheKey {
            item_id: item_id.to_string(),
            bucket,
        };
        let mut shard = self.shard_for(&key).write().expect("cache lock poisoned");

        if shard.len() >= self.max_per_shard && !shard.contains_key(&key) {
            shard.retain(|_, entry| entry.inserted_at.elapsed() <= self.ttl);
            while shard.len() >= self.max_per_shard {
                let oldest = shard
                    .iter()
                    .min_by_key(|(_, entry)| entry.inserted_at)
                    .map(|(k, _)| k.clone());
                match oldest {
                    Some(k) => shard.remove(&k),
                    None => break,
                };
            }
        }

        shard.insert(
            key,
            CacheEntry {
                information,
                category_probs,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Cached information and category probabilities for `item` at the
    /// bucket covering `theta`, computing and inserting on a miss.
    pub fn lookup_or_compute(&self, item: &Item, theta: f64) -> CacheEntry {
        let bucket = self.bucket(theta);
        if let Some(entry) = self.get(&item.id, bucket) {
            return entry;
        }

        let center = self.bucket_center(bucket);
        let information = irt::information(&item.model, center);
        let category_probs = irt::category_probabilities(&item.model, center);
        self.insert(&item.id, bucket, information, category_probs.clone());
        CacheEntry {
            information,
            category_probs,
            inserted_at: Instant::now(),
        }
    }

    /// Total live entries across shards (includes not-yet-evicted expired
    /// entries).
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.read().expect("cache lock poisoned").len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn shard_for(&self, key: &CacheKey) -> &RwLock<HashMap<CacheKey, CacheEntry>> {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[hasher.finish() as usize % SHARD_COUNT]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Model;

    fn cache() -> InfoCache {
        InfoCache::new(1024, Duration::from_secs(3600), 0.1)
    }

    fn item(id: &str) -> Item {
        Item {
            id: id.into(),
            model: Model::TwoPl { a: 1.2, b: 0.0 },
        }
    }

    #[test]
    fn bucket_rounding() {
        let cache = cache();
        assert_eq!(cache.bucket(0.0), 0);
        assert_eq!(cache.bucket(0.13), 1);
        assert_eq!(cache.bucket(-0.26), -3);
        assert!((cache.bucket_center(cache.bucket(0.13)) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn hit_equals_recomputation() {
        // A cached value must match a direct recomputation at the bucket
        // center within floating tolerance.
        let cache = cache();
        let item = item("i1");
        let entry = cache.lookup_or_compute(&item, 0.13);

        let center = cache.bucket_center(cache.bucket(0.13));
        let direct = irt::information(&item.model, center);
        assert!((entry.information - direct).abs() < 1e-12);

        let again = cache.lookup_or_compute(&item, 0.08);
        assert_eq!(cache.bucket(0.08), cache.bucket(0.13));
        assert!((again.information - direct).abs() < 1e-12);
    }

    #[test]
    fn miss_then_hit() {
        let cache = cache();
        assert!(cache.get("i1", 3).is_none());
        cache.insert("i1", 3, 0.5, vec![0.4, 0.6]);
        let entry = cache.get("i1", 3).unwrap();
        assert!((entry.information - 0.5).abs() < f64::EPSILON);
        assert_eq!(entry.category_probs.len(), 2);
    }

    #[test]
    fn ttl_expiry_reads_as_miss() {
        let cache = InfoCache::new(1024, Duration::ZERO, 0.1);
        cache.insert("i1", 0, 0.5, vec![0.5, 0.5]);
        std::thread::sleep(Duration::from_millis(2));
        assert!(cache.get("i1", 0).is_none());
    }

    #[test]
    fn size_bound_evicts() {
        let cache = InfoCache::new(SHARD_COUNT * 4, Duration::from_secs(3600), 0.1);
        for bucket in 0..1000 {
            cache.insert("i1", bucket, 0.1, vec![0.5, 0.5]);
        }
        assert!(cache.len() <= SHARD_COUNT * 4 + SHARD_COUNT);
    }

    #[test]
    fn insert_is_idempotent() {
        let cache = cache();
        cache.insert("i1", 2, 0.7, vec![0.3, 0.7]);
        cache.insert("i1", 2, 0.7, vec![0.3, 0.7]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn concurrent_access() {
        use std::sync::Arc;

        let cache = Arc::new(cache());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    let item = item(&format!("i{}", t % 2));
                    for step in -40..40 {
                        cache.lookup_or_compute(&item, step as f64 * 0.1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        // Two items over 80 distinct buckets.
        assert!(cache.len() <= 160);
    }
}
