//! Fingerprinted response cache with TTL expiry and a bounded entry count.

use std::collections::BTreeMap;

use contracts::AgentPlan;

use crate::context::PlanningContext;
use crate::mix_seed;

/// 64-bit fingerprint of the cache-relevant slice of a planning context:
/// agent identity, room snapshot, the most recent inbound message, and the
/// ordered policy priority list. Tick and sibling state are deliberately
/// excluded so quiet stretches keep hitting.
pub fn fingerprint(ctx: &PlanningContext) -> u64 {
    let room = serde_json::to_string(&ctx.room).unwrap_or_default();
    let last_message = ctx
        .last_message()
        .map(|message| message.content.as_str())
        .unwrap_or_default();
    let canonical = format!(
        "{}|{}|{}|{}",
        ctx.agent_id,
        room,
        last_message,
        ctx.policy.priorities.join(",")
    );
    let mut acc = 0xCBF2_9CE4_8422_2325u64;
    for byte in canonical.bytes() {
        acc = mix_seed(acc, u64::from(byte));
    }
    acc
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub plan: AgentPlan,
    pub created_secs: u64,
    pub last_access_secs: u64,
    pub hits: u64,
}

#[derive(Debug)]
pub struct PlanCache {
    entries: BTreeMap<u64, CacheEntry>,
    ttl_secs: u64,
    max_entries: usize,
    total_hits: u64,
    total_insertions: u64,
}

impl PlanCache {
    pub fn new(ttl_secs: u64, max_entries: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            ttl_secs,
            max_entries: max_entries.max(1),
            total_hits: 0,
            total_insertions: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lifetime hits over lifetime insertions, deliberately not hits over
    /// the current entry count: eviction and expiry would otherwise inflate
    /// the ratio. More than 1.0 is the healthy case, one insertion serving
    /// many ticks.
    pub fn hit_rate(&self) -> f64 {
        if self.total_insertions == 0 {
            return 0.0;
        }
        self.total_hits as f64 / self.total_insertions as f64
    }

    /// Pull-based expiry: an entry older than the TTL is evicted on touch,
    /// a live one bumps its hit count and access time.
    pub fn get(&mut self, key: u64, now_secs: u64) -> Option<AgentPlan> {
        let expired = match self.entries.get(&key) {
            Some(entry) => now_secs.saturating_sub(entry.created_secs) > self.ttl_secs,
            None => return None,
        };
        if expired {
            self.entries.remove(&key);
            return None;
        }
        let entry = self.entries.get_mut(&key)?;
        entry.hits += 1;
        entry.last_access_secs = now_secs;
        self.total_hits += 1;
        Some(entry.plan.clone())
    }

    /// Sweeps expired entries, then evicts least-recently-used entries until
    /// the new insertion fits under `max_entries`.
    pub fn insert(&mut self, key: u64, plan: AgentPlan, now_secs: u64) {
        let ttl = self.ttl_secs;
        self.entries
            .retain(|_, entry| now_secs.saturating_sub(entry.created_secs) <= ttl);

        while self.entries.len() >= self.max_entries && !self.entries.contains_key(&key) {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_access_secs)
                .map(|(k, _)| *k);
            match oldest {
                Some(k) => {
                    self.entries.remove(&k);
                }
                None => break,
            }
        }

        self.entries.insert(
            key,
            CacheEntry {
                plan,
                created_secs: now_secs,
                last_access_secs: now_secs,
                hits: 0,
            },
        );
        self.total_insertions += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::build_context;
    use crate::world::testutil::demo_world;

    fn plan(tag: &str) -> AgentPlan {
        AgentPlan::empty(tag)
    }

    #[test]
    fn fingerprint_is_stable_for_identical_contexts() {
        let world = demo_world();
        let a = build_context("thermostat_1", &world).unwrap();
        let b = build_context("thermostat_1", &world).unwrap();
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn fingerprint_changes_with_room_snapshot() {
        let mut world = demo_world();
        let before = fingerprint(&build_context("thermostat_1", &world).unwrap());
        world.rooms.get_mut("living_room").unwrap().temperature_c = 25.0;
        let after = fingerprint(&build_context("thermostat_1", &world).unwrap());
        assert_ne!(before, after);
    }

    #[test]
    fn fingerprint_ignores_tick_and_siblings() {
        let mut world = demo_world();
        let before = fingerprint(&build_context("thermostat_1", &world).unwrap());
        world.status.current_tick = 99;
        world.agents.get_mut("lamp_1").unwrap().status = contracts::AgentStatus::Acting;
        let after = fingerprint(&build_context("thermostat_1", &world).unwrap());
        assert_eq!(before, after);
    }

    #[test]
    fn entry_survives_ttl_and_expires_just_past_it() {
        let mut cache = PlanCache::new(300, 16);
        cache.insert(7, plan("p"), 0);
        assert!(cache.get(7, 300).is_some());
        assert!(cache.get(7, 301).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn hits_accumulate_and_hit_rate_reflects_reuse() {
        let mut cache = PlanCache::new(300, 16);
        cache.insert(1, plan("p"), 0);
        for _ in 0..3 {
            assert!(cache.get(1, 10).is_some());
        }
        assert!((cache.hit_rate() - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn insert_sweeps_expired_entries() {
        let mut cache = PlanCache::new(100, 16);
        cache.insert(1, plan("old"), 0);
        cache.insert(2, plan("new"), 200);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(1, 200).is_none());
        assert!(cache.get(2, 200).is_some());
    }

    #[test]
    fn overflow_evicts_least_recently_used() {
        let mut cache = PlanCache::new(1_000, 2);
        cache.insert(1, plan("a"), 0);
        cache.insert(2, plan("b"), 1);
        assert!(cache.get(1, 5).is_some());
        cache.insert(3, plan("c"), 10);
        assert_eq!(cache.len(), 2);
        assert!(cache.get(2, 10).is_none(), "lru entry should be gone");
        assert!(cache.get(1, 10).is_some());
        assert!(cache.get(3, 10).is_some());
    }
}
