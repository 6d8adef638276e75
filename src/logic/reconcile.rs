use log::debug;
use std::collections::{HashMap, HashSet};

use crate::logic::canonicalize::canonicalize;
use crate::model::{ClientIndex, VariantRow};

/// Hands out client indices that are never reused within a session, even
/// after the row holding the highest index has been dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientIndexAllocator {
    next: ClientIndex,
}

impl ClientIndexAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocator whose next index is above every index in `rows`
    pub fn after(rows: &[VariantRow]) -> Self {
        let mut allocator = Self::new();
        for row in rows {
            allocator.observe(row.client_index);
        }
        allocator
    }

    /// Record an index already in use
    pub fn observe(&mut self, index: ClientIndex) {
        if index >= self.next {
            self.next = index.saturating_add(1);
        }
    }

    pub fn allocate(&mut self) -> ClientIndex {
        let index = self.next;
        self.next = self.next.saturating_add(1);
        index
    }

    pub fn peek(&self) -> ClientIndex {
        self.next
    }
}

/// Outcome of merging a regenerated row set with the previous one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub rows: Vec<VariantRow>,
    /// Previous rows with no counterpart among the drafts
    pub dropped: Vec<VariantRow>,
    pub added: usize,
}

/// Merges freshly generated combinations with the rows held before a
/// selection change
pub struct RowReconciler;

impl RowReconciler {
    /// Merge `drafts` into `previous`, keyed by canonical key.
    ///
    /// Matched rows take parts and key from the draft and every operator or
    /// server field (price, SKU, quantity, image, server id, client index)
    /// from history. New combinations keep the draft defaults and get a fresh
    /// client index from `allocator`. Reconciling a row set against itself is
    /// a no-op.
    pub fn reconcile(
        previous: &[VariantRow],
        drafts: Vec<VariantRow>,
        allocator: &mut ClientIndexAllocator,
    ) -> Reconciliation {
        let mut by_key: HashMap<String, &VariantRow> = HashMap::with_capacity(previous.len());
        for row in previous {
            allocator.observe(row.client_index);
            let (_, key) = canonicalize(row.parts.clone());
            by_key.entry(key).or_insert(row);
        }

        let mut matched: HashSet<ClientIndex> = HashSet::with_capacity(drafts.len());
        let mut added = 0;
        let rows: Vec<VariantRow> = drafts
            .into_iter()
            .map(|draft| match by_key.get(&draft.key) {
                Some(prev) => {
                    matched.insert(prev.client_index);
                    VariantRow {
                        key: draft.key,
                        parts: draft.parts,
                        price_extra: prev.price_extra.clone(),
                        sku: prev.sku.clone(),
                        quantity: prev.quantity.clone(),
                        image: prev.image.clone(),
                        server_id: prev.server_id.clone(),
                        client_index: prev.client_index,
                    }
                }
                None => {
                    added += 1;
                    VariantRow {
                        client_index: allocator.allocate(),
                        ..draft
                    }
                }
            })
            .collect();

        let dropped: Vec<VariantRow> = previous
            .iter()
            .filter(|row| !matched.contains(&row.client_index))
            .cloned()
            .collect();

        debug!(
            "Reconciled {} rows: {} kept, {} added, {} dropped",
            rows.len(),
            rows.len() - added,
            added,
            dropped.len()
        );

        Reconciliation {
            rows,
            dropped,
            added,
        }
    }

    /// `reconcile` with an allocator seeded from `previous` alone
    pub fn reconcile_rows(previous: &[VariantRow], drafts: Vec<VariantRow>) -> Vec<VariantRow> {
        let mut allocator = ClientIndexAllocator::after(previous);
        Self::reconcile(previous, drafts, &mut allocator).rows
    }
}
