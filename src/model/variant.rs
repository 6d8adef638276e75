use serde::{Deserialize, Serialize};

use crate::model::{ClientIndex, Id};

/// One coordinate of a variant combination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartRef {
    pub group_id: Id,
    pub group_name: String,
    pub value: String,
    pub value_label: String,
}

impl PartRef {
    pub fn new(
        group_id: impl Into<Id>,
        group_name: impl Into<String>,
        value: impl Into<String>,
        value_label: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            group_name: group_name.into(),
            value: value.into(),
            value_label: value_label.into(),
        }
    }
}

/// A file picked by the operator but not yet uploaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalFile {
    pub file_name: String,
    pub content_type: String,
    #[serde(skip_serializing)]
    pub bytes: Vec<u8>,
}

impl LocalFile {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Photo attached to a variant row. A row's image is either a local pending
/// upload or a pointer to something the backend already stores, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ImageRef {
    #[serde(rename_all = "camelCase")]
    Pending { file: LocalFile, preview_url: String },
    #[serde(rename_all = "camelCase")]
    Stored { url: String, remote_path: String },
}

impl ImageRef {
    pub fn is_pending(&self) -> bool {
        matches!(self, ImageRef::Pending { .. })
    }

    pub fn preview_url(&self) -> Option<&str> {
        match self {
            ImageRef::Pending { preview_url, .. } => Some(preview_url),
            ImageRef::Stored { .. } => None,
        }
    }

    pub fn remote_path(&self) -> Option<&str> {
        match self {
            ImageRef::Stored { remote_path, .. } => Some(remote_path),
            ImageRef::Pending { .. } => None,
        }
    }
}

pub const DEFAULT_PRICE_EXTRA: &str = "0";

/// One purchasable combination and the operator's edits on it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantRow {
    /// Canonical `groupId:value` key, a pure function of `parts`
    pub key: String,
    /// Sorted by `(group_id, value)`
    pub parts: Vec<PartRef>,
    pub price_extra: String,
    pub sku: String,
    pub quantity: String,
    pub image: Option<ImageRef>,
    pub server_id: Option<String>,
    pub client_index: ClientIndex,
}

impl VariantRow {
    /// Fresh row with default field values for already canonical parts
    pub fn draft(key: String, parts: Vec<PartRef>, client_index: ClientIndex) -> Self {
        Self {
            key,
            parts,
            price_extra: DEFAULT_PRICE_EXTRA.to_string(),
            sku: String::new(),
            quantity: String::new(),
            image: None,
            server_id: None,
            client_index,
        }
    }

    /// Apply an operator edit; fields left `None` are untouched
    pub fn apply_edit(&mut self, edit: &RowEdit) {
        if let Some(price_extra) = &edit.price_extra {
            self.price_extra = price_extra.clone();
        }
        if let Some(sku) = &edit.sku {
            self.sku = sku.clone();
        }
        if let Some(quantity) = &edit.quantity {
            self.quantity = quantity.clone();
        }
    }
}

/// Row-local field edit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowEdit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_extra: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<String>,
}
