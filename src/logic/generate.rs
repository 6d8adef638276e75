use itertools::Itertools;
use log::{debug, warn};
use std::collections::BTreeSet;

use crate::error::{MatrixError, MatrixResult};
use crate::logic::canonicalize::canonicalize;
use crate::model::{AttributeGroup, ClientIndex, PartRef, SelectionState, VariantRow};

/// Builds the Cartesian product of selected option values across groups
pub struct CombinationGenerator;

impl CombinationGenerator {
    /// Generate one draft row per combination of selected values.
    ///
    /// Groups without a selected value do not participate. Returns
    /// `CapExceeded` without expanding anything when the product of the
    /// per-group counts is above `cap`.
    pub fn generate(
        groups: &[AttributeGroup],
        selection: &SelectionState,
        cap: usize,
    ) -> MatrixResult<Vec<VariantRow>> {
        let axes = Self::participating_parts(groups, selection);
        if axes.is_empty() {
            return Ok(Vec::new());
        }

        let total = Self::count(&axes);
        if total > cap {
            warn!(
                "Refusing to generate {} combinations across {} groups (cap {})",
                total,
                axes.len(),
                cap
            );
            return Err(MatrixError::CapExceeded { total, cap });
        }

        let rows: Vec<VariantRow> = axes
            .into_iter()
            .multi_cartesian_product()
            .enumerate()
            .map(|(position, tuple)| {
                let (parts, key) = canonicalize(tuple);
                VariantRow::draft(key, parts, position as ClientIndex)
            })
            .collect();

        debug!("Generated {} draft variant rows", rows.len());
        Ok(rows)
    }

    /// Number of combinations the selection would produce, without building
    /// them
    pub fn total_combinations(groups: &[AttributeGroup], selection: &SelectionState) -> usize {
        let axes = Self::participating_parts(groups, selection);
        if axes.is_empty() {
            0
        } else {
            Self::count(&axes)
        }
    }

    fn count(axes: &[Vec<PartRef>]) -> usize {
        axes.iter()
            .fold(1usize, |acc, axis| acc.saturating_mul(axis.len()))
    }

    /// Per-group part lists in catalog order, values in option order. Groups
    /// the catalog does not know come last, named after their id.
    fn participating_parts(
        groups: &[AttributeGroup],
        selection: &SelectionState,
    ) -> Vec<Vec<PartRef>> {
        let mut axes = Vec::new();

        for group in groups {
            let Some(values) = selection.values(&group.id) else {
                continue;
            };
            if values.is_empty() {
                continue;
            }
            // stable: unknown values keep their sorted set order
            let ordered = values
                .iter()
                .sorted_by_key(|v| group.option_position(v).unwrap_or(usize::MAX));
            axes.push(
                ordered
                    .map(|v| PartRef::new(&group.id, &group.name, v, group.label_for(v)))
                    .collect(),
            );
        }

        let known: BTreeSet<&str> = groups.iter().map(|g| g.id.as_str()).collect();
        for (group_id, values) in selection.active_groups() {
            if known.contains(group_id.as_str()) {
                continue;
            }
            axes.push(
                values
                    .iter()
                    .map(|v| PartRef::new(group_id, group_id, v, v))
                    .collect(),
            );
        }

        axes
    }
}
