//! Session tracking for the store's UDP front end
//!
//! A session is one live client connection, identified by the actor id the
//! client presents on connect. This module only knows about addresses and
//! liveness; subscriptions and disconnect hooks belong to the engine.

use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::StoreError;

/// One connected client.
#[derive(Debug)]
pub struct Session {
    /// Actor id the client connected as
    pub id: String,
    /// Where to send notifications
    pub addr: SocketAddr,
    /// Last time any packet arrived from this client
    pub last_seen: Instant,
}

impl Session {
    pub fn new(id: String, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
        }
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Outcome of registering a session.
#[derive(Debug, PartialEq, Eq)]
pub enum Admission {
    /// Brand new session.
    Opened,
    /// The id was already connected (possibly from another address) and the
    /// old connection was superseded.
    Replaced { previous_addr: SocketAddr },
}

pub struct SessionManager {
    sessions: HashMap<String, Session>,
    max_sessions: usize,
    timeout: Duration,
}

impl SessionManager {
    pub fn new(max_sessions: usize, timeout: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            max_sessions,
            timeout,
        }
    }

    /// Registers `id` at `addr`, enforcing the capacity limit for new ids.
    pub fn add_session(&mut self, id: &str, addr: SocketAddr) -> Result<Admission, StoreError> {
        if let Some(existing) = self.sessions.get_mut(id) {
            let previous_addr = existing.addr;
            existing.addr = addr;
            existing.last_seen = Instant::now();
            info!("Session {} reconnected from {} (was {})", id, addr, previous_addr);
            return Ok(Admission::Replaced { previous_addr });
        }

        if self.sessions.len() >= self.max_sessions {
            return Err(StoreError::Full);
        }

        info!("Session {} connected from {}", id, addr);
        self.sessions
            .insert(id.to_string(), Session::new(id.to_string(), addr));
        Ok(Admission::Opened)
    }

    pub fn remove_session(&mut self, id: &str) -> bool {
        if let Some(session) = self.sessions.remove(id) {
            info!("Session {} disconnected", session.id);
            true
        } else {
            false
        }
    }

    pub fn find_session_by_addr(&self, addr: SocketAddr) -> Option<String> {
        self.sessions
            .values()
            .find(|session| session.addr == addr)
            .map(|session| session.id.clone())
    }

    pub fn session_addr(&self, id: &str) -> Option<SocketAddr> {
        self.sessions.get(id).map(|session| session.addr)
    }

    /// Refreshes liveness for whichever session owns `addr`.
    pub fn touch(&mut self, addr: SocketAddr) -> Option<String> {
        let session = self
            .sessions
            .values_mut()
            .find(|session| session.addr == addr)?;
        session.last_seen = Instant::now();
        Some(session.id.clone())
    }

    /// Removes every session that has been silent longer than the timeout
    /// and returns their ids so the engine can run their disconnect hooks.
    pub fn check_timeouts(&mut self) -> Vec<String> {
        let timed_out: Vec<String> = self
            .sessions
            .values()
            .filter(|session| session.is_timed_out(self.timeout))
            .map(|session| session.id.clone())
            .collect();

        for id in &timed_out {
            info!("Session {} timed out", id);
            self.sessions.remove(id);
        }

        timed_out
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    #[test]
    fn test_add_session() {
        let mut manager = SessionManager::new(2, Duration::from_secs(5));
        assert_eq!(manager.add_session("a", test_addr()).unwrap(), Admission::Opened);
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.find_session_by_addr(test_addr()), Some("a".to_string()));
    }

    #[test]
    fn test_capacity_limit() {
        let mut manager = SessionManager::new(1, Duration::from_secs(5));
        manager.add_session("a", test_addr()).unwrap();

        match manager.add_session("b", test_addr2()) {
            Err(StoreError::Full) => {}
            other => panic!("expected full store, got {:?}", other),
        }
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_reconnect_replaces_address() {
        let mut manager = SessionManager::new(1, Duration::from_secs(5));
        manager.add_session("a", test_addr()).unwrap();

        // Same identity never counts against capacity twice
        let admission = manager.add_session("a", test_addr2()).unwrap();
        assert_eq!(
            admission,
            Admission::Replaced {
                previous_addr: test_addr()
            }
        );
        assert_eq!(manager.session_addr("a"), Some(test_addr2()));
        assert_eq!(manager.find_session_by_addr(test_addr()), None);
    }

    #[test]
    fn test_remove_session() {
        let mut manager = SessionManager::new(2, Duration::from_secs(5));
        manager.add_session("a", test_addr()).unwrap();
        assert!(manager.remove_session("a"));
        assert!(!manager.remove_session("a"));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_timeouts() {
        let mut manager = SessionManager::new(4, Duration::from_secs(1));
        manager.add_session("stale", test_addr()).unwrap();
        manager.add_session("fresh", test_addr2()).unwrap();

        manager.sessions.get_mut("stale").unwrap().last_seen =
            Instant::now() - Duration::from_secs(2);

        let timed_out = manager.check_timeouts();
        assert_eq!(timed_out, vec!["stale".to_string()]);
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.touch(test_addr2()), Some("fresh".to_string()));
        assert_eq!(manager.touch(test_addr()), None);
    }
}
