//! Integration tests across the client simulation and the shared store
//!
//! Most tests run several clients against one in-process store engine so
//! that the full ownership flow (attacker pushes, target applies and
//! consumes) is exercised deterministically. The last module goes over real
//! UDP sockets.

use assert_approx_eq::assert_approx_eq;
use client::game::{ClientConfig, ClientGame, TickReport};
use client::input::InputState;
use client::respawn::Transition;
use client::shared_store::{SharedStore, StoreNotice};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{paths, AttackKind, DamageEvent, StoreOp, Vector2};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use store::engine::{Delivery, StoreEngine};

/// One store engine shared by every loopback client in a test.
#[derive(Default)]
struct Hub {
    engine: StoreEngine,
    inboxes: HashMap<String, VecDeque<StoreNotice>>,
    sets: HashMap<String, usize>,
    clock_ms: u64,
}

impl Hub {
    fn route(&mut self, deliveries: Vec<Delivery>) {
        for Delivery { session_id, event } in deliveries {
            if let Some(inbox) = self.inboxes.get_mut(&session_id) {
                inbox.push_back(StoreNotice::Event(event));
            }
        }
    }
}

type SharedHub = Rc<RefCell<Hub>>;

struct LoopbackStore {
    hub: SharedHub,
    session_id: String,
}

impl LoopbackStore {
    fn connect(hub: &SharedHub, session_id: &str) -> Self {
        let mut state = hub.borrow_mut();
        let deliveries = state.engine.open_session(session_id);
        state.route(deliveries);
        state.inboxes.insert(
            session_id.to_string(),
            VecDeque::from([StoreNotice::Connected {
                session_id: session_id.to_string(),
            }]),
        );
        drop(state);

        Self {
            hub: Rc::clone(hub),
            session_id: session_id.to_string(),
        }
    }

    /// The process vanishes without a goodbye; only disconnect hooks clean up.
    fn crash(self) {
        let mut state = self.hub.borrow_mut();
        state.inboxes.remove(&self.session_id);
        let deliveries = state.engine.close_session(&self.session_id);
        state.route(deliveries);
    }
}

impl SharedStore for LoopbackStore {
    fn send(&mut self, op: StoreOp) {
        let mut state = self.hub.borrow_mut();
        if matches!(op, StoreOp::Set { .. }) {
            *state.sets.entry(self.session_id.clone()).or_default() += 1;
        }
        state.clock_ms += 1;
        let now = state.clock_ms;
        if let Ok(deliveries) = state.engine.apply(&self.session_id, op, now) {
            state.route(deliveries);
        }
    }

    fn poll_event(&mut self) -> Option<StoreNotice> {
        self.hub
            .borrow_mut()
            .inboxes
            .get_mut(&self.session_id)
            .and_then(|inbox| inbox.pop_front())
    }
}

fn player(hub: &SharedHub, id: &str, x: f32, y: f32, seed: u64) -> (ClientGame, LoopbackStore) {
    let config = ClientConfig {
        username: id.to_uppercase(),
        ..ClientConfig::default()
    };
    let mut game = ClientGame::with_rng(id.to_string(), config, StdRng::seed_from_u64(seed));
    game.actor_mut().position = Vector2::new(x, y);
    let mut store = LoopbackStore::connect(hub, id);
    game.drain(&mut store, 0);
    (game, store)
}

fn idle(game: &mut ClientGame, store: &mut LoopbackStore, now_ms: u64) -> TickReport {
    game.tick(store, &InputState::default(), now_ms)
}

fn aim_right(game: &ClientGame) -> Vector2 {
    game.actor().position.add(&Vector2::new(300.0, 0.0))
}

fn queue_len(hub: &SharedHub, target: &str) -> usize {
    hub.borrow()
        .engine
        .database()
        .children(&paths::damage_queue(target))
        .len()
}

/// COMBAT FLOW TESTS
mod combat_tests {
    use super::*;

    /// Attacker detects the hit, target applies it and empties its queue
    #[test]
    fn slash_damages_target_through_its_queue() {
        let hub = SharedHub::default();
        let (mut a, mut a_store) = player(&hub, "a", 100.0, 100.0, 1);
        let (mut b, mut b_store) = player(&hub, "b", 130.0, 100.0, 2);

        let input = InputState {
            pointer: aim_right(&a),
            slash: true,
            ..InputState::default()
        };
        let report = a.tick(&mut a_store, &input, 1_000);
        assert_eq!(report.intents.len(), 1);
        assert_eq!(report.intents[0].target, "b");
        assert_eq!(queue_len(&hub, "b"), 1);

        let report = idle(&mut b, &mut b_store, 1_010);
        assert_eq!(report.damage_applied, 1);
        assert_eq!(b.actor().health, 70);
        assert_eq!(queue_len(&hub, "b"), 0);

        // The attacker's cached view only changes once b publishes
        idle(&mut a, &mut a_store, 1_200);
        assert_eq!(a.remotes().get("b").unwrap().health, 70);
    }

    /// A replayed event is applied once
    #[test]
    fn replayed_damage_event_is_applied_once() {
        let hub = SharedHub::default();
        let (mut a, mut a_store) = player(&hub, "a", 100.0, 100.0, 1);
        let (mut b, mut b_store) = player(&hub, "b", 130.0, 100.0, 2);

        let input = InputState {
            pointer: aim_right(&a),
            slash: true,
            ..InputState::default()
        };
        a.tick(&mut a_store, &input, 1_000);

        // Resubscribing replays the still-queued event
        b_store.subscribe_children(paths::damage_queue("b"));

        let report = idle(&mut b, &mut b_store, 1_010);
        assert_eq!(report.damage_applied, 1);
        assert_eq!(b.actor().health, 70);
        assert_eq!(queue_len(&hub, "b"), 0);
    }

    /// A dead target consumes events without effect
    #[test]
    fn dead_target_ignores_damage() {
        let hub = SharedHub::default();
        let (mut a, mut a_store) = player(&hub, "a", 100.0, 100.0, 1);
        let (mut b, mut b_store) = player(&hub, "b", 130.0, 100.0, 2);
        b.actor_mut().health = 30;

        let input = InputState {
            pointer: aim_right(&a),
            slash: true,
            ..InputState::default()
        };
        a.tick(&mut a_store, &input, 1_000);
        let report = idle(&mut b, &mut b_store, 1_010);
        assert_eq!(report.transition, Some(Transition::Died));
        assert_eq!(b.actor().health, 0);

        // Another client with a stale view still pushes damage
        let late = DamageEvent {
            from: "a".to_string(),
            kind: AttackKind::Charge,
            angle: 0.0,
            timestamp: 1_020,
        };
        a_store.push(paths::damage_queue("b"), late.to_record().unwrap());
        assert_eq!(queue_len(&hub, "b"), 1);

        let report = idle(&mut b, &mut b_store, 1_030);
        assert_eq!(report.damage_applied, 0);
        assert_eq!(b.actor().health, 0);
        assert_eq!(queue_len(&hub, "b"), 0);

        // Once b's death is published, a no longer hits it
        idle(&mut a, &mut a_store, 1_040);
        assert!(!a.remotes().get("b").unwrap().is_alive());
    }

    /// Holding charge only fires once per cooldown
    #[test]
    fn charge_respects_cooldown() {
        let hub = SharedHub::default();
        let (mut a, mut a_store) = player(&hub, "a", 100.0, 100.0, 1);
        let (_b, _b_store) = player(&hub, "b", 150.0, 100.0, 2);

        let mut fired = 0;
        for frame in 0..60u64 {
            let input = InputState {
                pointer: aim_right(&a),
                charge: true,
                ..InputState::default()
            };
            fired += a.tick(&mut a_store, &input, 1_000 + frame * 16).intents.len();
        }
        assert_eq!(fired, 1);
        assert_eq!(queue_len(&hub, "b"), 1);
    }

    /// Nobody can write another actor's record
    #[test]
    fn foreign_record_writes_are_rejected() {
        let hub = SharedHub::default();
        let (_a, mut a_store) = player(&hub, "a", 100.0, 100.0, 1);
        let (_b, _b_store) = player(&hub, "b", 300.0, 100.0, 2);

        let before = hub
            .borrow()
            .engine
            .database()
            .get(&paths::player("b"))
            .map(str::to_string);
        a_store.set(paths::player("b"), "{\"health\":0}".to_string());
        a_store.remove(paths::player("b"));

        let after = hub
            .borrow()
            .engine
            .database()
            .get(&paths::player("b"))
            .map(str::to_string);
        assert!(after.is_some());
        assert_eq!(before, after);
    }
}

/// PRESENCE AND REPLICATION TESTS
mod presence_tests {
    use super::*;

    /// An abnormal exit removes the actor from everyone's view
    #[test]
    fn crashed_client_disappears() {
        let hub = SharedHub::default();
        let (a, a_store) = player(&hub, "a", 100.0, 100.0, 1);
        let (mut b, mut b_store) = player(&hub, "b", 400.0, 300.0, 2);

        idle(&mut b, &mut b_store, 0);
        assert!(b.remotes().get("a").is_some());

        drop(a);
        a_store.crash();

        idle(&mut b, &mut b_store, 16);
        assert!(b.remotes().get("a").is_none());
        assert!(hub.borrow().engine.database().get(&paths::player("a")).is_none());
    }

    /// A clean leave removes the record and the queue
    #[test]
    fn leave_cleans_up() {
        let hub = SharedHub::default();
        let (mut a, mut a_store) = player(&hub, "a", 100.0, 100.0, 1);
        let (mut b, mut b_store) = player(&hub, "b", 130.0, 100.0, 2);

        // b stands to the right of a and swings left
        let input = InputState {
            pointer: Vector2::new(0.0, 100.0),
            slash: true,
            ..InputState::default()
        };
        idle(&mut b, &mut b_store, 0);
        b.tick(&mut b_store, &input, 100);
        assert_eq!(queue_len(&hub, "a"), 1);

        a.leave(&mut a_store);
        assert_eq!(queue_len(&hub, "a"), 0);

        idle(&mut b, &mut b_store, 200);
        assert!(b.remotes().is_empty());
    }

    /// Reconnecting with the same identity never leaves two records
    #[test]
    fn reconnect_replaces_previous_session() {
        let hub = SharedHub::default();
        let (_old, _old_store) = player(&hub, "a", 100.0, 100.0, 1);
        let (mut watcher, mut watcher_store) = player(&hub, "w", 500.0, 300.0, 2);
        let (_new, _new_store) = player(&hub, "a", 200.0, 200.0, 3);

        idle(&mut watcher, &mut watcher_store, 0);
        assert_eq!(watcher.remotes().len(), 1);
        let seen = watcher.remotes().get("a").unwrap();
        assert_approx_eq!(seen.x, 200.0);
        assert_approx_eq!(seen.y, 200.0);
    }

    /// Snapshot writes stay near ten per second at sixty frames per second
    #[test]
    fn publish_rate_is_throttled() {
        let hub = SharedHub::default();
        let (mut a, mut a_store) = player(&hub, "a", 100.0, 100.0, 1);
        hub.borrow_mut().sets.clear();

        let input = InputState {
            movement: client::input::MovementKeys {
                right: true,
                ..Default::default()
            },
            ..InputState::default()
        };
        for frame in 1..=60u64 {
            a.tick(&mut a_store, &input, frame * 1000 / 60);
        }

        let writes = hub.borrow().sets.get("a").copied().unwrap_or_default();
        assert!((9..=11).contains(&writes), "{} writes", writes);
    }
}

/// REAL NETWORK TESTS
mod udp_tests {
    use super::*;
    use client::network::NetworkStore;
    use std::time::Duration;
    use store::network::{Server, StoreConfig};

    async fn start_store() -> String {
        let mut server = Server::new("127.0.0.1:0", StoreConfig::default())
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = server.run().await;
        });
        addr.to_string()
    }

    async fn tick_until<F>(
        games: &mut [(&mut ClientGame, &mut NetworkStore)],
        mut done: F,
    ) -> bool
    where
        F: FnMut(&[(&mut ClientGame, &mut NetworkStore)]) -> bool,
    {
        for _ in 0..200 {
            for (game, store) in games.iter_mut() {
                game.tick(&mut **store, &InputState::default(), shared::timestamp_ms());
            }
            if done(games) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    /// Two clients see each other over UDP, and a leave is observed
    #[tokio::test]
    async fn two_clients_over_udp() {
        let addr = start_store().await;

        let mut alpha = ClientGame::new("alpha".to_string(), ClientConfig::default());
        let mut alpha_store = NetworkStore::connect(&addr, "alpha".to_string()).unwrap();
        let mut beta = ClientGame::new("beta".to_string(), ClientConfig::default());
        let mut beta_store = NetworkStore::connect(&addr, "beta".to_string()).unwrap();

        let both_visible = tick_until(
            &mut [(&mut alpha, &mut alpha_store), (&mut beta, &mut beta_store)],
            |games| {
                games[0].0.remotes().get("beta").is_some()
                    && games[1].0.remotes().get("alpha").is_some()
            },
        )
        .await;
        assert!(both_visible);

        alpha.leave(&mut alpha_store);
        alpha_store.shutdown();

        let gone = tick_until(&mut [(&mut beta, &mut beta_store)], |games| {
            games[0].0.remotes().get("alpha").is_none()
        })
        .await;
        assert!(gone);

        beta_store.shutdown();
    }
}
