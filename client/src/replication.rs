//! Publishing the local snapshot and mirroring everyone else's

use log::{debug, warn};
use shared::{paths, ActorId, ActorSnapshot};
use std::collections::HashMap;

use crate::shared_store::SharedStore;

/// Fires at most once per `interval_ms`.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval_ms: u64,
    last_fire: Option<u64>,
}

impl Throttle {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            last_fire: None,
        }
    }

    /// True and re-armed if the interval has elapsed since the last fire.
    pub fn ready(&mut self, now_ms: u64) -> bool {
        let due = match self.last_fire {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.interval_ms,
        };
        if due {
            self.last_fire = Some(now_ms);
        }
        due
    }

    pub fn mark(&mut self, now_ms: u64) {
        self.last_fire = Some(now_ms);
    }
}

/// Writes the local actor's snapshot to `players/{id}`.
#[derive(Debug)]
pub struct Publisher {
    actor_id: ActorId,
    throttle: Throttle,
    suppressed: bool,
    published: u64,
}

impl Publisher {
    pub fn new(actor_id: ActorId, interval_ms: u64) -> Self {
        Self {
            actor_id,
            throttle: Throttle::new(interval_ms),
            suppressed: false,
            published: 0,
        }
    }

    /// Publishes if the throttle allows and publishing is not suppressed.
    pub fn publish<S: SharedStore>(
        &mut self,
        store: &mut S,
        snapshot: &ActorSnapshot,
        now_ms: u64,
    ) -> bool {
        if self.suppressed || !self.throttle.ready(now_ms) {
            return false;
        }
        self.write(store, snapshot)
    }

    /// Publishes immediately, ignoring throttle and suppression, and restarts
    /// the throttle window.
    pub fn publish_now<S: SharedStore>(
        &mut self,
        store: &mut S,
        snapshot: &ActorSnapshot,
        now_ms: u64,
    ) -> bool {
        self.throttle.mark(now_ms);
        self.write(store, snapshot)
    }

    pub fn suppress(&mut self) {
        self.suppressed = true;
    }

    pub fn resume(&mut self) {
        self.suppressed = false;
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    pub fn published(&self) -> u64 {
        self.published
    }

    fn write<S: SharedStore>(&mut self, store: &mut S, snapshot: &ActorSnapshot) -> bool {
        match snapshot.to_record() {
            Ok(record) => {
                store.set(paths::player(&self.actor_id), record);
                self.published += 1;
                true
            }
            Err(e) => {
                warn!("Failed to encode snapshot for {}: {}", self.actor_id, e);
                false
            }
        }
    }
}

/// Latest known snapshot of every other actor. Advisory only: used for
/// rendering, hit-tests and separation, never written back.
#[derive(Debug, Default, Clone)]
pub struct RemoteActorCache {
    actors: HashMap<ActorId, ActorSnapshot>,
}

impl RemoteActorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the cache with the decoded `players` children, leaving out
    /// our own record and anything that fails to decode.
    pub fn rebuild(&mut self, children: &[(String, String)], self_id: &str) {
        let mut actors = HashMap::with_capacity(children.len());

        for (id, record) in children {
            if id == self_id {
                continue;
            }
            match ActorSnapshot::from_record(record) {
                Ok(snapshot) => {
                    actors.insert(id.clone(), snapshot);
                }
                Err(e) => warn!("Skipping undecodable record for actor {}: {}", id, e),
            }
        }

        let departed = self
            .actors
            .keys()
            .filter(|id| !actors.contains_key(*id))
            .count();
        if departed > 0 {
            debug!("{} actor(s) left the arena", departed);
        }

        self.actors = actors;
    }

    pub fn insert(&mut self, id: ActorId, snapshot: ActorSnapshot) {
        self.actors.insert(id, snapshot);
    }

    pub fn get(&self, id: &str) -> Option<&ActorSnapshot> {
        self.actors.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut ActorSnapshot> {
        self.actors.get_mut(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ActorId, &ActorSnapshot)> {
        self.actors.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&ActorId, &mut ActorSnapshot)> {
        self.actors.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    pub fn clear(&mut self) {
        self.actors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared_store::testing::RecordingStore;
    use shared::StoreOp;

    fn snapshot(health: u8) -> ActorSnapshot {
        ActorSnapshot {
            x: 10.0,
            y: 20.0,
            angle: 0.0,
            health,
            username: "P".to_string(),
            slash: None,
            chat: String::new(),
        }
    }

    #[test]
    fn test_throttle_interval() {
        let mut throttle = Throttle::new(100);
        assert!(throttle.ready(0));
        assert!(!throttle.ready(50));
        assert!(!throttle.ready(99));
        assert!(throttle.ready(100));
        assert!(!throttle.ready(150));
        assert!(throttle.ready(250));
    }

    #[test]
    fn test_publish_rate_is_bounded() {
        let mut store = RecordingStore::new();
        let mut publisher = Publisher::new("me".to_string(), 100);

        // One second of frames at 60 Hz
        for frame in 0..60u64 {
            publisher.publish(&mut store, &snapshot(100), frame * 1000 / 60);
        }

        let writes = store.take_sent().len();
        assert!(writes <= 11, "published {} times in one second", writes);
        assert!(writes >= 9);
    }

    #[test]
    fn test_publish_writes_player_path() {
        let mut store = RecordingStore::new();
        let mut publisher = Publisher::new("me".to_string(), 100);
        assert!(publisher.publish(&mut store, &snapshot(70), 0));

        match store.take_sent().as_slice() {
            [StoreOp::Set { path, value }] => {
                assert_eq!(path, "players/me");
                assert_eq!(ActorSnapshot::from_record(value).unwrap().health, 70);
            }
            other => panic!("unexpected ops: {:?}", other),
        }
    }

    #[test]
    fn test_suppression_and_forced_publish() {
        let mut store = RecordingStore::new();
        let mut publisher = Publisher::new("me".to_string(), 100);

        assert!(publisher.publish_now(&mut store, &snapshot(0), 0));
        publisher.suppress();
        for t in (100..2_000).step_by(16) {
            assert!(!publisher.publish(&mut store, &snapshot(0), t));
        }
        assert_eq!(store.take_sent().len(), 1);

        publisher.resume();
        assert!(publisher.publish_now(&mut store, &snapshot(100), 2_000));
        // Forced publish restarts the throttle window
        assert!(!publisher.publish(&mut store, &snapshot(100), 2_050));
        assert_eq!(publisher.published(), 2);
    }

    #[test]
    fn test_cache_rebuild_skips_self_and_garbage() {
        let mut cache = RemoteActorCache::new();
        let children = vec![
            ("me".to_string(), snapshot(100).to_record().unwrap()),
            ("other".to_string(), snapshot(50).to_record().unwrap()),
            ("broken".to_string(), "not json".to_string()),
        ];

        cache.rebuild(&children, "me");
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("other").unwrap().health, 50);
    }

    #[test]
    fn test_cache_rebuild_drops_departed() {
        let mut cache = RemoteActorCache::new();
        cache.rebuild(
            &[
                ("a".to_string(), snapshot(100).to_record().unwrap()),
                ("b".to_string(), snapshot(100).to_record().unwrap()),
            ],
            "me",
        );
        assert_eq!(cache.len(), 2);

        cache.rebuild(&[("b".to_string(), snapshot(100).to_record().unwrap())], "me");
        assert!(cache.get("a").is_none());
        assert_eq!(cache.len(), 1);

        cache.rebuild(&[], "me");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_rebuild_defaults_missing_fields() {
        let mut cache = RemoteActorCache::new();
        cache.rebuild(&[("x".to_string(), r#"{"x": 5.0}"#.to_string())], "me");

        let snapshot = cache.get("x").unwrap();
        assert_eq!(snapshot.x, 5.0);
        assert_eq!(snapshot.health, 100);
        assert!(snapshot.chat.is_empty());
    }
}
