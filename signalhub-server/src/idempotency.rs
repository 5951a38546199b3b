//! `submit` idempotency (spec §8 "round-trip / idempotence": a second call
//! with the same `(client_id, sequence)` returns the original ids without a
//! second persistence). Keyed on the pair rather than content hash since the
//! spec defines idempotency in terms of the client-supplied sequence, not
//! Entry equality.

use dashmap::DashMap;
use uuid::Uuid;

#[derive(Default)]
pub struct IdempotencyCache {
    seen: DashMap<(String, u64), Vec<Uuid>>,
}

impl IdempotencyCache {
    pub fn new() -> IdempotencyCache {
        IdempotencyCache { seen: DashMap::new() }
    }

    pub fn get(&self, client_id: &str, sequence: u64) -> Option<Vec<Uuid>> {
        self.seen.get(&(client_id.to_string(), sequence)).map(|ids| ids.clone())
    }

    pub fn record(&self, client_id: &str, sequence: u64, ids: Vec<Uuid>) {
        self.seen.insert((client_id.to_string(), sequence), ids);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_the_same_ids_for_a_repeated_sequence() {
        let cache = IdempotencyCache::new();
        assert!(cache.get("client-a", 1).is_none());
        let ids = vec![Uuid::new_v4(), Uuid::new_v4()];
        cache.record("client-a", 1, ids.clone());
        assert_eq!(cache.get("client-a", 1), Some(ids));
    }

    #[test]
    fn distinct_clients_do_not_collide_on_the_same_sequence() {
        let cache = IdempotencyCache::new();
        cache.record("client-a", 1, vec![Uuid::new_v4()]);
        assert!(cache.get("client-b", 1).is_none());
    }
}
