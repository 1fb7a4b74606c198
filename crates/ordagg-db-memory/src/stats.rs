use std::collections::HashMap;

use ordagg_core::ResourceKind;
use parking_lot::Mutex;

/// Kind of repository call recorded by [`MutationStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mutation {
    List,
    Create,
    Update,
    Delete,
}

/// Per-table call counters.
///
/// Calls are counted when issued, whether or not the surrounding transaction
/// is later committed.
#[derive(Debug, Default)]
pub struct MutationStats {
    counters: Mutex<HashMap<(&'static str, Mutation), usize>>,
}

impl MutationStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&self, table: &'static str, op: Mutation) {
        *self.counters.lock().entry((table, op)).or_insert(0) += 1;
    }

    /// Calls of `op` against the table backing `kind`.
    pub fn count(&self, kind: ResourceKind, op: Mutation) -> usize {
        self.count_table(kind.as_str(), op)
    }

    pub fn count_table(&self, table: &str, op: Mutation) -> usize {
        self.counters
            .lock()
            .iter()
            .filter(|((t, o), _)| *t == table && *o == op)
            .map(|(_, n)| *n)
            .sum()
    }

    /// Create, update and delete calls across all tables.
    pub fn total_mutations(&self) -> usize {
        self.counters
            .lock()
            .iter()
            .filter(|((_, op), _)| *op != Mutation::List)
            .map(|(_, n)| *n)
            .sum()
    }

    pub fn reset(&self) {
        self.counters.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_table_and_operation() {
        let stats = MutationStats::new();
        stats.record("apiResource", Mutation::Create);
        stats.record("apiResource", Mutation::Create);
        stats.record("apiResource", Mutation::List);
        stats.record("vendor", Mutation::Delete);

        assert_eq!(stats.count(ResourceKind::Api, Mutation::Create), 2);
        assert_eq!(stats.count(ResourceKind::Api, Mutation::List), 1);
        assert_eq!(stats.count(ResourceKind::Vendor, Mutation::Delete), 1);
        assert_eq!(stats.total_mutations(), 3);

        stats.reset();
        assert_eq!(stats.total_mutations(), 0);
    }
}
