//! In-process durable store.
//!
//! Mirrors the subset of Redis semantics the queues and cache rely on. State
//! lives only as long as the process, so it suits tests and single-node
//! deployments that accept losing queued work on restart.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::application::repos::{DurableStore, StoreError};
use crate::util::lock::{mutex_lock, rw_read, rw_write};

const SOURCE: &str = "infra::store::memory";
/// Every this many writes, `set` sweeps expired string entries.
const SWEEP_EVERY_WRITES: usize = 128;

#[derive(Debug, Default)]
struct SortedSet {
    scores: HashMap<String, i64>,
    ordered: BTreeSet<(i64, String)>,
}

impl SortedSet {
    fn insert(&mut self, member: &str, score: i64) -> bool {
        match self.scores.insert(member.to_string(), score) {
            Some(previous) => {
                self.ordered.remove(&(previous, member.to_string()));
                self.ordered.insert((score, member.to_string()));
                false
            }
            None => {
                self.ordered.insert((score, member.to_string()));
                true
            }
        }
    }

    fn remove(&mut self, member: &str) -> bool {
        match self.scores.remove(member) {
            Some(score) => self.ordered.remove(&(score, member.to_string())),
            None => false,
        }
    }

    fn range(&self, min: i64, max: i64) -> Vec<String> {
        if min > max {
            return Vec::new();
        }
        self.ordered
            .range((min, String::new())..)
            .take_while(|(score, _)| *score <= max)
            .map(|(_, member)| member.clone())
            .collect()
    }
}

#[derive(Debug, Clone)]
struct StringEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl StringEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|deadline| now < deadline)
    }
}

/// [`DurableStore`] backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sorted_sets: RwLock<HashMap<String, SortedSet>>,
    lists: Mutex<HashMap<String, VecDeque<String>>>,
    strings: RwLock<HashMap<String, StringEntry>>,
    string_writes: AtomicUsize,
}

fn sweep_expired(strings: &mut HashMap<String, StringEntry>, now: Instant) -> usize {
    let before = strings.len();
    strings.retain(|_, entry| entry.is_live(now));
    before - strings.len()
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop string entries whose TTL has elapsed.
    ///
    /// Reads and writes already reclaim expired entries as they go; this
    /// forces a full sweep.
    pub fn purge_expired(&self) -> usize {
        let mut strings = rw_write(&self.strings, SOURCE, "purge_expired");
        sweep_expired(&mut strings, Instant::now())
    }

    /// Number of string entries held, expired ones included.
    pub fn held_strings(&self) -> usize {
        rw_read(&self.strings, SOURCE, "held_strings").len()
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn zadd(&self, key: &str, member: &str, score: i64) -> Result<bool, StoreError> {
        let mut sets = rw_write(&self.sorted_sets, SOURCE, "zadd");
        Ok(sets.entry(key.to_string()).or_default().insert(member, score))
    }

    async fn zrangebyscore(
        &self,
        key: &str,
        min: i64,
        max: i64,
    ) -> Result<Vec<String>, StoreError> {
        let sets = rw_read(&self.sorted_sets, SOURCE, "zrangebyscore");
        Ok(sets
            .get(key)
            .map(|set| set.range(min, max))
            .unwrap_or_default())
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut sets = rw_write(&self.sorted_sets, SOURCE, "zrem");
        let Some(set) = sets.get_mut(key) else {
            return Ok(false);
        };
        let removed = set.remove(member);
        if set.scores.is_empty() {
            sets.remove(key);
        }
        Ok(removed)
    }

    async fn zcard(&self, key: &str) -> Result<usize, StoreError> {
        let sets = rw_read(&self.sorted_sets, SOURCE, "zcard");
        Ok(sets.get(key).map_or(0, |set| set.scores.len()))
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<usize, StoreError> {
        let mut lists = mutex_lock(&self.lists, SOURCE, "lpush");
        let list = lists.entry(key.to_string()).or_default();
        list.push_front(value.to_string());
        Ok(list.len())
    }

    async fn rpop(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut lists = mutex_lock(&self.lists, SOURCE, "rpop");
        let Some(list) = lists.get_mut(key) else {
            return Ok(None);
        };
        let popped = list.pop_back();
        if list.is_empty() {
            lists.remove(key);
        }
        Ok(popped)
    }

    async fn llen(&self, key: &str) -> Result<usize, StoreError> {
        let lists = mutex_lock(&self.lists, SOURCE, "llen");
        Ok(lists.get(key).map_or(0, VecDeque::len))
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        {
            let strings = rw_read(&self.strings, SOURCE, "get");
            match strings.get(key) {
                None => return Ok(None),
                Some(entry) if entry.is_live(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        let mut strings = rw_write(&self.strings, SOURCE, "get");
        if strings.get(key).is_some_and(|entry| !entry.is_live(now)) {
            strings.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let now = Instant::now();
        let entry = StringEntry {
            value: value.to_string(),
            expires_at: ttl.map(|ttl| now + ttl),
        };
        let mut strings = rw_write(&self.strings, SOURCE, "set");
        strings.insert(key.to_string(), entry);

        let writes = self.string_writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes % SWEEP_EVERY_WRITES == 0 {
            sweep_expired(&mut strings, now);
        }
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<bool, StoreError> {
        let now = Instant::now();
        let removed = rw_write(&self.strings, SOURCE, "del").remove(key);
        Ok(removed.is_some_and(|entry| entry.is_live(now)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn zrangebyscore_returns_members_in_score_order() {
        let store = MemoryStore::new();
        store.zadd("z", "c", 300).await.unwrap();
        store.zadd("z", "b", 200).await.unwrap();
        store.zadd("z", "a", 100).await.unwrap();

        let due = store.zrangebyscore("z", i64::MIN, 250).await.unwrap();
        assert_eq!(due, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(store.zcard("z").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn zadd_existing_member_updates_score() {
        let store = MemoryStore::new();
        assert!(store.zadd("z", "a", 500).await.unwrap());
        assert!(!store.zadd("z", "a", 10).await.unwrap());

        assert_eq!(store.zrangebyscore("z", 0, 10).await.unwrap(), vec!["a"]);
        assert_eq!(store.zcard("z").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn zrem_reports_missing_members() {
        let store = MemoryStore::new();
        store.zadd("z", "a", 1).await.unwrap();

        assert!(store.zrem("z", "a").await.unwrap());
        assert!(!store.zrem("z", "a").await.unwrap());
        assert!(!store.zrem("missing", "a").await.unwrap());
    }

    #[tokio::test]
    async fn list_is_fifo_through_lpush_and_rpop() {
        let store = MemoryStore::new();
        store.lpush("l", "first").await.unwrap();
        store.lpush("l", "second").await.unwrap();

        assert_eq!(store.llen("l").await.unwrap(), 2);
        assert_eq!(store.rpop("l").await.unwrap().as_deref(), Some("first"));
        assert_eq!(store.rpop("l").await.unwrap().as_deref(), Some("second"));
        assert_eq!(store.rpop("l").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn strings_expire_after_ttl() {
        let store = MemoryStore::new();
        store
            .set("k", "v", Some(Duration::from_secs(10)))
            .await
            .unwrap();
        store.set("forever", "v", None).await.unwrap();

        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(11)).await;

        assert_eq!(store.get("k").await.unwrap(), None);
        assert_eq!(store.get("forever").await.unwrap().as_deref(), Some("v"));
        assert_eq!(store.held_strings(), 1, "expired entry dropped on read");
        assert_eq!(store.purge_expired(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn writes_reclaim_expired_entries_that_are_never_read() {
        let store = MemoryStore::new();
        for i in 0..1000 {
            store
                .set(&format!("cache:child:{i}"), "{}", Some(Duration::from_secs(1)))
                .await
                .unwrap();
        }
        assert_eq!(store.held_strings(), 1000);

        tokio::time::advance(Duration::from_secs(5)).await;
        for i in 0..SWEEP_EVERY_WRITES {
            store.set(&format!("fresh:{i}"), "v", None).await.unwrap();
        }

        assert_eq!(store.held_strings(), SWEEP_EVERY_WRITES);
        assert_eq!(store.get("fresh:0").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn del_reports_whether_a_live_value_was_removed() {
        let store = MemoryStore::new();
        store.set("k", "v", None).await.unwrap();

        assert!(store.del("k").await.unwrap());
        assert!(!store.del("k").await.unwrap());
    }
}
