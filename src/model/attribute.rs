use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::model::Id;

/// One selectable value of an attribute group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeOption {
    pub value: String,
    pub label: String,
}

impl AttributeOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// A named axis of variation (e.g. Color) with a fixed, ordered option set.
/// Groups come from the attribute catalog and do not change during a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeGroup {
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub options: Vec<AttributeOption>,
}

impl AttributeGroup {
    pub fn new(id: impl Into<Id>, name: impl Into<String>, options: Vec<AttributeOption>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            options,
        }
    }

    /// Label for an option value, falling back to the raw value
    pub fn label_for(&self, value: &str) -> String {
        self.options
            .iter()
            .find(|o| o.value == value)
            .map(|o| o.label.clone())
            .unwrap_or_else(|| value.to_string())
    }

    /// Position of a value in the option list, `None` for values the catalog
    /// does not know about
    pub fn option_position(&self, value: &str) -> Option<usize> {
        self.options.iter().position(|o| o.value == value)
    }
}

/// Group id → selected option values. Order within a group is irrelevant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectionState {
    groups: BTreeMap<Id, BTreeSet<String>>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn values(&self, group_id: &str) -> Option<&BTreeSet<String>> {
        self.groups.get(group_id)
    }

    pub fn is_selected(&self, group_id: &str, value: &str) -> bool {
        self.groups
            .get(group_id)
            .map(|values| values.contains(value))
            .unwrap_or(false)
    }

    pub fn select(&mut self, group_id: &str, value: &str) {
        self.groups
            .entry(group_id.to_string())
            .or_default()
            .insert(value.to_string());
    }

    pub fn deselect(&mut self, group_id: &str, value: &str) {
        if let Some(values) = self.groups.get_mut(group_id) {
            values.remove(value);
            if values.is_empty() {
                self.groups.remove(group_id);
            }
        }
    }

    /// Flip a value; returns whether it is selected afterwards
    pub fn toggle(&mut self, group_id: &str, value: &str) -> bool {
        if self.is_selected(group_id, value) {
            self.deselect(group_id, value);
            false
        } else {
            self.select(group_id, value);
            true
        }
    }

    pub fn set_group<I, V>(&mut self, group_id: &str, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let values: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            self.groups.remove(group_id);
        } else {
            self.groups.insert(group_id.to_string(), values);
        }
    }

    pub fn clear_group(&mut self, group_id: &str) {
        self.groups.remove(group_id);
    }

    /// Groups with at least one selected value
    pub fn active_groups(&self) -> impl Iterator<Item = (&Id, &BTreeSet<String>)> {
        self.groups.iter().filter(|(_, values)| !values.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.active_groups().next().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_falls_back_to_raw_value() {
        let group = AttributeGroup::new(
            "color",
            "Color",
            vec![AttributeOption::new("red", "Crimson Red")],
        );
        assert_eq!(group.label_for("red"), "Crimson Red");
        assert_eq!(group.label_for("teal"), "teal");
    }

    #[test]
    fn test_selection_toggle_drops_empty_groups() {
        let mut selection = SelectionState::new();
        assert!(selection.toggle("size", "M"));
        assert!(selection.is_selected("size", "M"));
        assert!(!selection.toggle("size", "M"));
        assert!(selection.values("size").is_none());
        assert!(selection.is_empty());
    }

    #[test]
    fn test_set_group_with_no_values_clears_it() {
        let mut selection = SelectionState::new();
        selection.set_group("size", ["S", "M"]);
        assert_eq!(selection.values("size").map(|v| v.len()), Some(2));
        selection.set_group("size", Vec::<String>::new());
        assert!(selection.is_empty());
    }
}
