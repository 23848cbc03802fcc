//! Shared store path layout
//!
//! ```text
//! players/{actorId}                      actor snapshot, written by its owner
//! damageEvents/{targetId}/{eventId}      pending hit, pushed by attackers
//! ```

pub const PLAYERS: &str = "players";
pub const DAMAGE_EVENTS: &str = "damageEvents";

pub fn player(actor_id: &str) -> String {
    format!("{}/{}", PLAYERS, actor_id)
}

pub fn damage_queue(target_id: &str) -> String {
    format!("{}/{}", DAMAGE_EVENTS, target_id)
}

pub fn damage_event(target_id: &str, event_id: &str) -> String {
    format!("{}/{}/{}", DAMAGE_EVENTS, target_id, event_id)
}

/// A path is a non-empty sequence of non-empty `/`-separated segments.
pub fn is_valid(path: &str) -> bool {
    !path.is_empty() && path.split('/').all(|segment| !segment.is_empty())
}

pub fn parent(path: &str) -> Option<&str> {
    path.rfind('/').map(|index| &path[..index])
}

pub fn last_segment(path: &str) -> &str {
    match path.rfind('/') {
        Some(index) => &path[index + 1..],
        None => path,
    }
}

/// True when `path` equals `ancestor` or lies somewhere below it.
pub fn is_under(path: &str, ancestor: &str) -> bool {
    path == ancestor
        || (path.len() > ancestor.len()
            && path.starts_with(ancestor)
            && path.as_bytes()[ancestor.len()] == b'/')
}
