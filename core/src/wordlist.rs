//! Named, immutable lists of candidate passwords.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use crate::error::{WordbreakError, WordbreakResult};

/// A loaded wordlist. Entries are immutable once stored: reloading under the
/// same name replaces the whole entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordlistEntry {
    /// The name the list was stored under.
    pub name: String,
    /// The candidate words, in file order. Blank lines are already dropped.
    pub candidates: Vec<String>,
}

impl WordlistEntry {
    /// Builds an entry from raw text: one candidate per line, trimmed,
    /// blank lines discarded. The order of the remaining lines is the
    /// search order.
    pub fn from_text(name: &str, text: &str) -> Self {
        let candidates = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect();

        Self {
            name: name.to_owned(),
            candidates,
        }
    }

    /// Returns the number of candidates in the list.
    pub fn count(&self) -> usize {
        self.candidates.len()
    }
}

/// Holds every loaded wordlist, keyed by name.
#[derive(Debug, Default)]
pub struct WordlistStore {
    entries: RwLock<HashMap<String, Arc<WordlistEntry>>>,
}

impl WordlistStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `text` under `name`, replacing any previous entry with that
    /// name. Returns the stored entry.
    pub fn load(&self, name: &str, text: &str) -> Arc<WordlistEntry> {
        let entry = Arc::new(WordlistEntry::from_text(name, text));

        let mut entries = self.entries.write().expect("wordlist store poisoned");
        entries.insert(name.to_owned(), entry.clone());

        entry
    }

    /// Looks up a previously loaded wordlist.
    pub fn get(&self, name: &str) -> WordbreakResult<Arc<WordlistEntry>> {
        let entries = self.entries.read().expect("wordlist store poisoned");

        entries
            .get(name)
            .cloned()
            .ok_or_else(|| WordbreakError::WordlistNotFound(name.to_owned()))
    }

    /// Returns the names of every loaded wordlist.
    pub fn names(&self) -> Vec<String> {
        let entries = self.entries.read().expect("wordlist store poisoned");
        entries.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_lines_dropped_order_kept() {
        let entry = WordlistEntry::from_text("top", "admin\n\n  \nroot\n\tguest  \n");

        assert_eq!(3, entry.count());
        assert_eq!(vec!["admin", "root", "guest"], entry.candidates);
    }

    #[test]
    fn test_reload_replaces() {
        let store = WordlistStore::new();
        store.load("top", "one\ntwo");
        store.load("top", "three");

        let entry = store.get("top").unwrap();
        assert_eq!(vec!["three"], entry.candidates);
    }

    #[test]
    fn test_missing_wordlist() {
        let store = WordlistStore::new();

        assert!(matches!(
            store.get("nope"),
            Err(WordbreakError::WordlistNotFound(_))
        ));
    }
}
