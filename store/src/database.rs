//! Path-keyed record storage backing the shared store

use rand::Rng;
use shared::paths;
use std::collections::BTreeMap;

/// Flat map from full path to JSON record.
///
/// Records live only at leaf paths; a "collection" is simply every key that
/// shares a prefix. Keys are kept ordered so children always come back in
/// the same order they were pushed.
#[derive(Debug, Default)]
pub struct Database {
    entries: BTreeMap<String, String>,
    last_push_ms: u64,
    push_counter: u32,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the value at `path`. Returns true when the key is new.
    pub fn set(&mut self, path: &str, value: String) -> bool {
        self.entries.insert(path.to_string(), value).is_none()
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    /// Stores `value` under a fresh child key of `parent` and returns the key.
    ///
    /// Keys sort in push order even if the wall clock steps backwards.
    pub fn push(&mut self, parent: &str, value: String, now_ms: u64) -> String {
        let key = self.next_push_key(now_ms);
        self.entries.insert(format!("{}/{}", parent, key), value);
        key
    }

    fn next_push_key(&mut self, now_ms: u64) -> String {
        if now_ms > self.last_push_ms {
            self.last_push_ms = now_ms;
            self.push_counter = 0;
        } else {
            self.push_counter += 1;
        }

        let suffix: u16 = rand::thread_rng().gen();
        format!(
            "{:013}-{:010}-{:04x}",
            self.last_push_ms, self.push_counter, suffix
        )
    }

    /// Deletes `path` and everything below it. Returns the number of records
    /// removed; zero means the path was already gone.
    pub fn remove(&mut self, path: &str) -> usize {
        let doomed: Vec<String> = self
            .entries
            .range(path.to_string()..)
            .take_while(|(key, _)| key.starts_with(path))
            .filter(|(key, _)| paths::is_under(key, path))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &doomed {
            self.entries.remove(key);
        }

        doomed.len()
    }

    /// Direct children of `path` as `(child key, record)` pairs, in key order.
    pub fn children(&self, path: &str) -> Vec<(String, String)> {
        let prefix = format!("{}/", path);
        self.entries
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter_map(|(key, value)| {
                let rest = &key[prefix.len()..];
                if rest.contains('/') {
                    None
                } else {
                    Some((rest.to_string(), value.clone()))
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
