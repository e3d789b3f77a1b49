//! Insertion-ordered map from line number to the `Command` emitted for it (§3).
//!
//! Grounded on `examples/r3bl-org-r3bl-open-core/core/src/common/ordered_map.rs`'s
//! `OrderedMap<K, V>`: a `Vec<K>` tracking insertion order alongside a `HashMap<K, V>`.
//! Python's `collections.OrderedDict` (`examples/original_source/telecortex/session.py`,
//! `self.ack_queue = OrderedDict()`) is the original's equivalent; this is the teacher's
//! own idiom for the same shape.

use std::collections::HashMap;

use crate::command::Command;

#[derive(Debug, Default)]
pub struct AckQueue {
    order: Vec<u64>,
    entries: HashMap<u64, Command>,
}

impl AckQueue {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, line: u64, command: Command) {
        if !self.entries.contains_key(&line) {
            self.order.push(line);
        }
        self.entries.insert(line, command);
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Remove every entry with key `<= line`, in emission order. Used on `N<L>: OK`
    /// (§4.3 "Ack handling").
    pub fn remove_through(&mut self, line: u64) {
        self.order.retain(|&key| {
            let keep = key > line;
            if !keep {
                self.entries.remove(&key);
            }
            keep
        });
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.entries.clear();
    }

    /// Snapshot entries with key `>= from`, in emission order, for resend (§4.3).
    pub fn snapshot_from(&self, from: u64) -> Vec<(u64, Command)> {
        self.order
            .iter()
            .filter(|&&key| key >= from)
            .filter_map(|key| self.entries.get(key).map(|cmd| (*key, cmd.clone())))
            .collect()
    }

    pub fn contains(&self, line: u64) -> bool { self.entries.contains_key(&line) }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &Command)> {
        self.order.iter().filter_map(move |key| self.entries.get(key).map(|cmd| (*key, cmd)))
    }
}
