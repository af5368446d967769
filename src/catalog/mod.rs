//! The entity catalog served by the entity source.
//!
//! The set of entities is fixed at startup, so the map itself needs no lock:
//! only the per-entity counters change, and they are atomics.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

const EMBEDDED_SYMBOLS: &str = include_str!("symbols.txt");

#[derive(Debug, Default)]
pub struct Catalog {
    counters: BTreeMap<String, AtomicU64>,
}

impl Catalog {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let counters = ids
            .into_iter()
            .map(|id| (id.into(), AtomicU64::new(0)))
            .collect();

        Self { counters }
    }

    /// Parses `SYMBOL|description` lines; the entity id is the text before
    /// the first `|`. Blank lines are skipped.
    pub fn from_symbols(text: &str) -> Self {
        Self::new(
            text.lines()
                .map(|line| line.split_once('|').map_or(line, |(symbol, _)| symbol))
                .map(str::trim)
                .filter(|symbol| !symbol.is_empty()),
        )
    }

    pub fn embedded() -> Self {
        Self::from_symbols(EMBEDDED_SYMBOLS)
    }

    pub fn ids(&self) -> Vec<String> {
        self.counters.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Bumps the counter of `id` and returns its new value.
    ///
    /// Reading a counter always increments it: the value counts how many
    /// times the entity has been pulled.
    pub fn increment(&self, id: &str) -> Option<u64> {
        self.counters
            .get(id)
            .map(|counter| counter.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Increments and returns the counters of `ids`, or of every entity when
    /// `ids` is empty. Unknown ids are left out.
    pub fn read<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> BTreeMap<String, u64> {
        let mut requested = ids.into_iter().peekable();

        if requested.peek().is_none() {
            return self
                .counters
                .iter()
                .map(|(id, counter)| (id.clone(), counter.fetch_add(1, Ordering::Relaxed) + 1))
                .collect();
        }

        requested
            .filter_map(|id| self.increment(id).map(|value| (id.to_string(), value)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_symbols() {
        let catalog = Catalog::from_symbols("AAPL|Apple Inc.\n\nMSFT|Microsoft\nNOPIPE\n");

        assert_eq!(catalog.ids(), vec!["AAPL", "MSFT", "NOPIPE"]);
    }

    #[test]
    fn test_embedded_catalog() {
        let catalog = Catalog::embedded();

        assert!(!catalog.is_empty());
        assert!(catalog.ids().iter().all(|id| !id.contains('|')));
        assert!(catalog.ids().contains(&"AAPL".to_string()));
    }

    #[test]
    fn test_read_subset_increments_only_requested() {
        let catalog = Catalog::new(["e1", "e2"]);

        let data = catalog.read(["e1"]);
        assert_eq!(data, BTreeMap::from([("e1".to_string(), 1)]));

        let data = catalog.read(["e1", "missing"]);
        assert_eq!(data, BTreeMap::from([("e1".to_string(), 2)]));

        // e2 was never read, so its first read returns 1
        assert_eq!(catalog.increment("e2"), Some(1));
        assert_eq!(catalog.increment("missing"), None);
    }

    #[test]
    fn test_read_all_when_nothing_requested() {
        let catalog = Catalog::new(["e1", "e2"]);
        catalog.read(["e2"]);

        let data = catalog.read(Vec::<&str>::new());
        assert_eq!(
            data,
            BTreeMap::from([("e1".to_string(), 1), ("e2".to_string(), 2)])
        );
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let catalog = Catalog::new(["e1"]);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..1_000 {
                        catalog.increment("e1");
                    }
                });
            }
        });

        assert_eq!(catalog.increment("e1"), Some(8_001));
    }
}
