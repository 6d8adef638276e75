use serde::{Deserialize, Serialize};

use crate::model::{ClientIndex, LocalFile, PartRef};

/// Form field carrying the JSON array of row descriptors
pub const VARIANTS_FIELD: &str = "variants";
/// Form field carrying the JSON array of stored image paths to delete
pub const REMOVED_IMAGES_FIELD: &str = "removedImagePaths";

/// JSON description of one row as the backend receives it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowDescriptor {
    pub client_index: ClientIndex,
    pub parts: Vec<PartRef>,
    pub price_extra: String,
    pub sku: String,
    pub quantity: serde_json::Number,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    /// Stored image path/URL; absent for pending images, whose bytes travel
    /// as a separate file part
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pointer: Option<String>,
}

/// Image bytes for one row, addressed by a field name derived from the row's
/// client index
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAttachment {
    pub field_name: String,
    pub client_index: ClientIndex,
    pub file: LocalFile,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    pub rows: Vec<RowDescriptor>,
    pub attachments: Vec<FileAttachment>,
    pub removed_image_paths: Vec<String>,
}

/// One part of a multipart form body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        content_type: String,
        bytes: Vec<u8>,
    },
}

impl FormPart {
    pub fn name(&self) -> &str {
        match self {
            FormPart::Text { name, .. } | FormPart::File { name, .. } => name,
        }
    }
}

impl SubmissionPayload {
    /// Render as ordered multipart form parts: row JSON, removal JSON, then one
    /// file part per pending image
    pub fn form_parts(&self) -> serde_json::Result<Vec<FormPart>> {
        let mut parts = vec![
            FormPart::Text {
                name: VARIANTS_FIELD.to_string(),
                value: serde_json::to_string(&self.rows)?,
            },
            FormPart::Text {
                name: REMOVED_IMAGES_FIELD.to_string(),
                value: serde_json::to_string(&self.removed_image_paths)?,
            },
        ];
        parts.extend(self.attachments.iter().map(|a| FormPart::File {
            name: a.field_name.clone(),
            file_name: a.file.file_name.clone(),
            content_type: a.file.content_type.clone(),
            bytes: a.file.bytes.clone(),
        }));
        Ok(parts)
    }

    pub fn attachment_for(&self, client_index: ClientIndex) -> Option<&FileAttachment> {
        self.attachments
            .iter()
            .find(|a| a.client_index == client_index)
    }
}
