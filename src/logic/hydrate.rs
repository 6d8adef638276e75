use log::{info, warn};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::error::MatrixError;
use crate::logic::canonicalize::canonicalize;
use crate::logic::reconcile::ClientIndexAllocator;
use crate::model::{
    AttributeGroup, ClientIndex, ImageRef, PartRef, RemotePart, RemoteVariant, SelectionState,
    VariantRow, DEFAULT_PRICE_EXTRA,
};

/// A remote variant left out of a hydrated set, by position in the payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedVariant {
    pub index: usize,
    pub reason: String,
}

impl SkippedVariant {
    fn new(index: usize, reason: String) -> Self {
        let skipped = Self { index, reason };
        warn!("{}", MatrixError::from(skipped.clone()));
        skipped
    }
}

impl From<SkippedVariant> for MatrixError {
    fn from(skipped: SkippedVariant) -> Self {
        MatrixError::ReconciliationMismatch {
            index: skipped.index,
            reason: skipped.reason,
        }
    }
}

/// Rows and selection rebuilt from a backend row set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HydratedSet {
    pub rows: Vec<VariantRow>,
    /// Union of every loaded row's parts, per group
    pub selection: SelectionState,
    pub skipped: Vec<SkippedVariant>,
}

/// Turns backend variants into canonical rows
pub struct Hydrator;

impl Hydrator {
    /// Canonicalize each remote variant exactly as freshly generated rows are.
    ///
    /// Malformed variants are skipped with a diagnostic. A variant keeps its
    /// own `clientIndex` when it is unique and either never issued by
    /// `allocator` or held by the `known` row with the same key; otherwise it
    /// inherits the index of that `known` row, or gets a fresh one.
    pub fn load(
        groups: &[AttributeGroup],
        variants: &[RemoteVariant],
        known: &[VariantRow],
        allocator: &mut ClientIndexAllocator,
    ) -> HydratedSet {
        let known_indices: HashMap<&str, ClientIndex> = known
            .iter()
            .map(|row| (row.key.as_str(), row.client_index))
            .collect();

        let issued_below = allocator.peek();
        let mut skipped = Vec::new();
        let mut seen_keys: HashSet<String> = HashSet::new();
        let mut used_indices: HashSet<ClientIndex> = HashSet::new();
        let mut staged: Vec<(VariantRow, bool)> = Vec::with_capacity(variants.len());

        for (index, variant) in variants.iter().enumerate() {
            let parts = match Self::resolve_parts(groups, &variant.parts) {
                Ok(parts) => parts,
                Err(reason) => {
                    skipped.push(SkippedVariant::new(index, reason));
                    continue;
                }
            };
            let (parts, key) = canonicalize(parts);
            if !seen_keys.insert(key.clone()) {
                skipped.push(SkippedVariant::new(index, format!("duplicate combination {}", key)));
                continue;
            }

            let inherited = known_indices.get(key.as_str()).copied();
            // an explicit index the session already issued may only stay on
            // the combination that holds it
            let explicit = variant
                .client_index
                .filter(|index| *index >= issued_below || inherited == Some(*index));
            let candidate = explicit
                .or(inherited)
                .filter(|candidate| used_indices.insert(*candidate));

            let mut row = VariantRow::draft(key, parts, candidate.unwrap_or_default());
            row.price_extra = variant
                .extra_price
                .as_ref()
                .and_then(|p| p.as_text())
                .unwrap_or_else(|| DEFAULT_PRICE_EXTRA.to_string());
            row.sku = variant.sku.clone().unwrap_or_default();
            row.quantity = variant
                .quantity
                .as_ref()
                .and_then(|q| q.as_text())
                .unwrap_or_default();
            row.image = variant
                .image
                .as_ref()
                .and_then(|image| image.resolve())
                .map(|(url, remote_path)| ImageRef::Stored { url, remote_path });
            row.server_id = variant.id.as_ref().and_then(|id| id.as_text());

            staged.push((row, candidate.is_some()));
        }

        // Observe every kept index first so fresh ones never collide with a
        // later explicit one
        for index in &used_indices {
            allocator.observe(*index);
        }

        let mut selection = SelectionState::new();
        let rows: Vec<VariantRow> = staged
            .into_iter()
            .map(|(mut row, has_index)| {
                if !has_index {
                    row.client_index = allocator.allocate();
                }
                for part in &row.parts {
                    selection.select(&part.group_id, &part.value);
                }
                row
            })
            .collect();

        info!(
            "Hydrated {} variant rows ({} skipped)",
            rows.len(),
            skipped.len()
        );

        HydratedSet {
            rows,
            selection,
            skipped,
        }
    }

    fn resolve_parts(groups: &[AttributeGroup], parts: &[RemotePart]) -> Result<Vec<PartRef>, String> {
        if parts.is_empty() {
            return Err("variant has no parts".to_string());
        }

        let mut seen_groups = HashSet::new();
        let mut resolved = Vec::with_capacity(parts.len());
        for (position, part) in parts.iter().enumerate() {
            let group_id = part.group_id.trim();
            let value = part.value.trim();
            if group_id.is_empty() {
                return Err(format!("part #{} has an empty group id", position));
            }
            if value.is_empty() {
                return Err(format!("part #{} has an empty value", position));
            }
            if !seen_groups.insert(group_id) {
                return Err(format!("group {} appears more than once", group_id));
            }

            let group = groups.iter().find(|g| g.id == group_id);
            let group_name = non_blank(part.group_name.as_deref())
                .or_else(|| group.map(|g| g.name.clone()))
                .unwrap_or_else(|| group_id.to_string());
            let value_label = non_blank(part.value_label.as_deref())
                .or_else(|| group.map(|g| g.label_for(value)))
                .unwrap_or_else(|| value.to_string());

            resolved.push(PartRef::new(group_id, group_name, value, value_label));
        }
        Ok(resolved)
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
