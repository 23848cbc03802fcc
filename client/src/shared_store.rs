//! The client's view of the shared store
//!
//! Everything above this trait only queues operations and drains
//! notifications, so the simulation never blocks on the network. The UDP
//! implementation lives in [`crate::network`]; tests use an in-memory one.

use shared::{paths, StoreEvent, StoreOp};

/// Something the store told us since the last poll.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreNotice {
    Connected { session_id: String },
    Event(StoreEvent),
    Disconnected { reason: String },
}

pub trait SharedStore {
    /// Queues an operation. Never blocks; delivery is best-effort.
    fn send(&mut self, op: StoreOp);

    /// Next pending notification, if any.
    fn poll_event(&mut self) -> Option<StoreNotice>;

    fn set(&mut self, path: impl Into<String>, value: String)
    where
        Self: Sized,
    {
        self.send(StoreOp::Set {
            path: path.into(),
            value,
        });
    }

    fn push(&mut self, path: impl Into<String>, value: String)
    where
        Self: Sized,
    {
        self.send(StoreOp::Push {
            path: path.into(),
            value,
        });
    }

    fn remove(&mut self, path: impl Into<String>)
    where
        Self: Sized,
    {
        self.send(StoreOp::Remove { path: path.into() });
    }

    fn subscribe_value(&mut self, path: impl Into<String>)
    where
        Self: Sized,
    {
        self.send(StoreOp::SubscribeValue { path: path.into() });
    }

    fn subscribe_children(&mut self, path: impl Into<String>)
    where
        Self: Sized,
    {
        self.send(StoreOp::SubscribeChildren { path: path.into() });
    }

    fn on_disconnect_remove(&mut self, path: impl Into<String>)
    where
        Self: Sized,
    {
        self.send(StoreOp::OnDisconnectRemove { path: path.into() });
    }
}

/// Registers the cleanup hooks and subscriptions one actor needs, in the
/// order the store must see them: hooks first so a crash right after
/// connecting still cleans up.
pub fn register_actor<S: SharedStore>(store: &mut S, actor_id: &str) {
    store.on_disconnect_remove(paths::player(actor_id));
    store.on_disconnect_remove(paths::damage_queue(actor_id));
    store.subscribe_value(paths::PLAYERS);
    store.subscribe_children(paths::damage_queue(actor_id));
}

/// Removes everything this actor owns. Used on an explicit leave.
pub fn unregister_actor<S: SharedStore>(store: &mut S, actor_id: &str) {
    store.remove(paths::player(actor_id));
    store.remove(paths::damage_queue(actor_id));
}
