//! Store semantics independent of any transport
//!
//! The engine owns the database plus, per session, its subscriptions and
//! disconnect hooks. Every call returns the notifications it produced as
//! [`Delivery`] values; the caller decides how to get them to clients.

use log::{debug, info};
use shared::{paths, StoreEvent, StoreOp};
use std::collections::{BTreeSet, HashMap};

use crate::database::Database;
use crate::StoreError;

/// A notification addressed to one session.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub session_id: String,
    pub event: StoreEvent,
}

#[derive(Debug, Default)]
struct SessionState {
    value_subscriptions: BTreeSet<String>,
    child_subscriptions: BTreeSet<String>,
    disconnect_hooks: Vec<String>,
}

/// Who may touch a path.
#[derive(Debug, PartialEq, Eq)]
enum Scope<'a> {
    /// A top-level game collection such as `players` itself.
    Collection,
    /// Something under `players/{id}` or `damageEvents/{id}`.
    Owned { collection: &'a str, owner: &'a str },
    /// Anything outside the game collections.
    Open,
}

fn scope(path: &str) -> Scope<'_> {
    let mut segments = path.splitn(3, '/');
    let top = segments.next().unwrap_or_default();
    if top != paths::PLAYERS && top != paths::DAMAGE_EVENTS {
        return Scope::Open;
    }

    match segments.next() {
        Some(owner) => Scope::Owned {
            collection: top,
            owner,
        },
        None => Scope::Collection,
    }
}

#[derive(Debug, Default)]
pub struct StoreEngine {
    db: Database,
    sessions: HashMap<String, SessionState>,
}

impl StoreEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking `session_id`. If the id already had a session, that
    /// session is closed first so its disconnect hooks clear any record it
    /// left behind before the new connection writes a fresh one.
    pub fn open_session(&mut self, session_id: &str) -> Vec<Delivery> {
        let deliveries = if self.sessions.contains_key(session_id) {
            info!("Replacing existing session {}", session_id);
            self.close_session(session_id)
        } else {
            Vec::new()
        };

        self.sessions
            .insert(session_id.to_string(), SessionState::default());
        deliveries
    }

    /// Forgets `session_id` and runs its disconnect hooks.
    pub fn close_session(&mut self, session_id: &str) -> Vec<Delivery> {
        let Some(state) = self.sessions.remove(session_id) else {
            return Vec::new();
        };

        let mut deliveries = Vec::new();
        for path in state.disconnect_hooks {
            if self.db.remove(&path) > 0 {
                info!("Disconnect hook for {} removed {}", session_id, path);
                deliveries.extend(self.value_notifications(&path));
            }
        }
        deliveries
    }

    pub fn apply(
        &mut self,
        session_id: &str,
        op: StoreOp,
        now_ms: u64,
    ) -> Result<Vec<Delivery>, StoreError> {
        if !self.sessions.contains_key(session_id) {
            return Err(StoreError::UnknownSession(session_id.to_string()));
        }
        if !paths::is_valid(op.path()) {
            return Err(StoreError::InvalidPath(op.path().to_string()));
        }
        Self::authorize(session_id, &op)?;

        let deliveries = match op {
            StoreOp::Set { path, value } => {
                self.db.set(&path, value.clone());
                let mut deliveries = self.value_notifications(&path);
                if let Some(parent) = paths::parent(&path) {
                    deliveries.extend(self.child_notifications(
                        parent,
                        paths::last_segment(&path),
                        &value,
                    ));
                }
                deliveries
            }
            StoreOp::Push { path, value } => {
                let key = self.db.push(&path, value.clone(), now_ms);
                debug!("{} pushed {}/{}", session_id, path, key);
                let child = format!("{}/{}", path, key);
                let mut deliveries = self.value_notifications(&child);
                deliveries.extend(self.child_notifications(&path, &key, &value));
                deliveries
            }
            StoreOp::Remove { path } => {
                if self.db.remove(&path) > 0 {
                    self.value_notifications(&path)
                } else {
                    Vec::new()
                }
            }
            StoreOp::SubscribeValue { path } => {
                let children = self.db.children(&path);
                self.session_mut(session_id)
                    .value_subscriptions
                    .insert(path.clone());
                vec![Delivery {
                    session_id: session_id.to_string(),
                    event: StoreEvent::Value { path, children },
                }]
            }
            StoreOp::SubscribeChildren { path } => {
                let existing = self.db.children(&path);
                self.session_mut(session_id)
                    .child_subscriptions
                    .insert(path.clone());
                existing
                    .into_iter()
                    .map(|(key, value)| Delivery {
                        session_id: session_id.to_string(),
                        event: StoreEvent::ChildAdded {
                            path: path.clone(),
                            key,
                            value,
                        },
                    })
                    .collect()
            }
            StoreOp::OnDisconnectRemove { path } => {
                let hooks = &mut self.session_mut(session_id).disconnect_hooks;
                if !hooks.contains(&path) {
                    hooks.push(path);
                }
                Vec::new()
            }
        };

        Ok(deliveries)
    }

    fn authorize(session_id: &str, op: &StoreOp) -> Result<(), StoreError> {
        let path = op.path();
        let allowed = match (scope(path), op) {
            (Scope::Open, _) => true,
            (_, StoreOp::SubscribeValue { .. }) => true,
            (Scope::Collection, StoreOp::SubscribeChildren { .. }) => true,
            (Scope::Collection, _) => false,
            (Scope::Owned { collection, .. }, StoreOp::Push { .. })
                if collection == paths::DAMAGE_EVENTS =>
            {
                true
            }
            (Scope::Owned { collection, owner }, StoreOp::SubscribeChildren { .. }) => {
                collection != paths::DAMAGE_EVENTS || owner == session_id
            }
            (Scope::Owned { owner, .. }, _) => owner == session_id,
        };

        if allowed {
            Ok(())
        } else {
            Err(StoreError::PermissionDenied {
                session_id: session_id.to_string(),
                path: path.to_string(),
            })
        }
    }

    fn session_mut(&mut self, session_id: &str) -> &mut SessionState {
        self.sessions.entry(session_id.to_string()).or_default()
    }

    /// Fresh `Value` events for every subscription whose children may have
    /// changed because something at or below `changed` was written or removed.
    fn value_notifications(&self, changed: &str) -> Vec<Delivery> {
        let mut deliveries = Vec::new();
        for (session_id, state) in &self.sessions {
            for path in &state.value_subscriptions {
                if paths::is_under(changed, path) || paths::is_under(path, changed) {
                    deliveries.push(Delivery {
                        session_id: session_id.clone(),
                        event: StoreEvent::Value {
                            path: path.clone(),
                            children: self.db.children(path),
                        },
                    });
                }
            }
        }
        deliveries
    }

    fn child_notifications(&self, parent: &str, key: &str, value: &str) -> Vec<Delivery> {
        self.sessions
            .iter()
            .filter(|(_, state)| state.child_subscriptions.contains(parent))
            .map(|(session_id, _)| Delivery {
                session_id: session_id.clone(),
                event: StoreEvent::ChildAdded {
                    path: parent.to_string(),
                    key: key.to_string(),
                    value: value.to_string(),
                },
            })
            .collect()
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn has_session(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }
}
