//! Append-only history of one key

use crate::types::HistoryEntry;

/// Ordered, append-only sequence of [`HistoryEntry`] for one key.
///
/// Entries can only be appended; timestamps never go backwards. An entry
/// stamped earlier than its predecessor (clock skew between writers) is
/// recorded with the predecessor's timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryLog {
    entries: Vec<HistoryEntry>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, returning it as recorded
    pub fn append(&mut self, mut entry: HistoryEntry) -> &HistoryEntry {
        if let Some(last) = self.entries.last() {
            if entry.timestamp < last.timestamp {
                entry.timestamp = last.timestamp;
            }
        }
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `tx_id` was already recorded
    pub fn contains_tx(&self, tx_id: &str) -> bool {
        self.entries.iter().any(|e| e.tx_id == tx_id)
    }
}
