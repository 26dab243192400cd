//! Thread-safe collection of matched symbols.

use std::sync::{Mutex, PoisonError};

use crate::types::{ResultOrder, SearchResults, SearchStats, Symbol};

/// Merges per-package symbol batches into one result set.
///
/// Batches are appended whole, so symbols of one package stay together.
#[derive(Debug)]
pub struct ResultAggregator {
    symbols: Mutex<Vec<Symbol>>,
    order: ResultOrder,
}

impl ResultAggregator {
    /// Create an empty aggregator with the given ordering guarantee.
    #[must_use]
    pub fn new(order: ResultOrder) -> Self {
        Self {
            symbols: Mutex::new(Vec::new()),
            order,
        }
    }

    /// Append one package's symbols.
    pub fn extend(&self, batch: Vec<Symbol>) {
        if batch.is_empty() {
            return;
        }
        self.symbols
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(batch);
    }

    /// Number of symbols collected so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if nothing has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Finish aggregation.
    #[must_use]
    pub fn into_results(self, stats: SearchStats) -> SearchResults {
        let symbols = self
            .symbols
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        SearchResults {
            symbols,
            order: self.order,
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SymbolKind;
    use std::path::PathBuf;

    fn symbol(name: &str) -> Symbol {
        Symbol {
            name: name.to_string(),
            kind: SymbolKind::Func,
            package: "p".to_string(),
            path: PathBuf::from("/src/p/a.go"),
            line: 0,
            character: 0,
        }
    }

    #[test]
    fn keeps_insertion_order() {
        let aggregator = ResultAggregator::new(ResultOrder::Discovery);
        aggregator.extend(vec![symbol("b"), symbol("a")]);
        aggregator.extend(Vec::new());
        aggregator.extend(vec![symbol("c")]);

        let results = aggregator.into_results(SearchStats::default());

        let names: Vec<&str> = results.symbols.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
        assert_eq!(results.order, ResultOrder::Discovery);
    }

    #[test]
    fn collects_from_many_threads() {
        let aggregator = ResultAggregator::new(ResultOrder::Unspecified);

        std::thread::scope(|scope| {
            for i in 0..8 {
                let aggregator = &aggregator;
                scope.spawn(move || aggregator.extend(vec![symbol(&format!("s{i}"))]));
            }
        });

        assert_eq!(aggregator.len(), 8);
    }

    #[test]
    fn keeps_collecting_after_a_writer_panics() {
        let aggregator = ResultAggregator::new(ResultOrder::Unspecified);
        aggregator.extend(vec![symbol("before")]);

        let poisoned = std::thread::scope(|scope| {
            scope
                .spawn(|| {
                    let batch = aggregator.symbols.lock().unwrap();
                    assert!(batch.is_empty(), "writer failed mid-batch");
                })
                .join()
        });
        assert!(poisoned.is_err());
        assert!(aggregator.symbols.is_poisoned());

        aggregator.extend(vec![symbol("after")]);

        let results = aggregator.into_results(SearchStats::default());
        let names: Vec<&str> = results.symbols.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["before", "after"]);
    }
}
