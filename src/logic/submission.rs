use async_trait::async_trait;
use log::debug;

use crate::model::{
    ClientIndex, FileAttachment, ImageRef, RemoteVariant, RowDescriptor, SubmissionPayload,
    VariantRow,
};

/// Hands a built payload to the backend and returns its authoritative row set
#[async_trait]
pub trait SubmissionTransport: Send + Sync {
    async fn submit(&self, payload: &SubmissionPayload) -> anyhow::Result<Vec<RemoteVariant>>;
}

/// Serializes rows and staged images into one multipart submission
pub struct SubmissionBuilder {
    image_field_prefix: String,
}

impl SubmissionBuilder {
    pub fn new(image_field_prefix: impl Into<String>) -> Self {
        Self {
            image_field_prefix: image_field_prefix.into(),
        }
    }

    /// Form field name that carries the image bytes of the row with
    /// `client_index`
    pub fn image_field_name(&self, client_index: ClientIndex) -> String {
        format!("{}{}", self.image_field_prefix, client_index)
    }

    pub fn build(&self, rows: &[VariantRow], removed_image_paths: &[String]) -> SubmissionPayload {
        let mut attachments = Vec::new();
        let descriptors: Vec<RowDescriptor> = rows
            .iter()
            .map(|row| {
                let image_pointer = match &row.image {
                    Some(ImageRef::Stored { url, remote_path }) => Some(if remote_path.is_empty() {
                        url.clone()
                    } else {
                        remote_path.clone()
                    }),
                    Some(ImageRef::Pending { file, .. }) => {
                        attachments.push(FileAttachment {
                            field_name: self.image_field_name(row.client_index),
                            client_index: row.client_index,
                            file: file.clone(),
                        });
                        None
                    }
                    None => None,
                };

                RowDescriptor {
                    client_index: row.client_index,
                    parts: row.parts.clone(),
                    price_extra: row.price_extra.clone(),
                    sku: row.sku.clone(),
                    quantity: coerce_quantity(&row.quantity),
                    server_id: row.server_id.clone(),
                    image_pointer,
                }
            })
            .collect();

        debug!(
            "Built submission: {} rows, {} image parts, {} removals",
            descriptors.len(),
            attachments.len(),
            removed_image_paths.len()
        );

        SubmissionPayload {
            rows: descriptors,
            attachments,
            removed_image_paths: removed_image_paths.to_vec(),
        }
    }
}

/// Parse an operator-entered quantity. Empty, unparsable and non-finite
/// input becomes 0; integral values are emitted as JSON integers.
pub fn coerce_quantity(raw: &str) -> serde_json::Number {
    let value = raw.trim().parse::<f64>().ok().filter(|v| v.is_finite()).unwrap_or(0.0);
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        serde_json::Number::from(value as i64)
    } else {
        serde_json::Number::from_f64(value).unwrap_or_else(|| serde_json::Number::from(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FormPart, LocalFile, PartRef, REMOVED_IMAGES_FIELD, VARIANTS_FIELD};

    fn row(value: &str, client_index: ClientIndex) -> VariantRow {
        VariantRow::draft(
            format!("Color:{}", value),
            vec![PartRef::new("Color", "Color", value, value)],
            client_index,
        )
    }

    #[test]
    fn test_quantity_coercion() {
        assert_eq!(coerce_quantity("12"), serde_json::Number::from(12));
        assert_eq!(coerce_quantity(" 3 "), serde_json::Number::from(3));
        assert_eq!(coerce_quantity(""), serde_json::Number::from(0));
        assert_eq!(coerce_quantity("lots"), serde_json::Number::from(0));
        assert_eq!(coerce_quantity("inf"), serde_json::Number::from(0));
        assert_eq!(coerce_quantity("NaN"), serde_json::Number::from(0));
        assert_eq!(coerce_quantity("2.5").as_f64(), Some(2.5));
    }

    #[test]
    fn test_build_descriptors_and_attachments() {
        let mut pending = row("Red", 3);
        pending.sku = "RED".to_string();
        pending.quantity = "5".to_string();
        pending.image = Some(ImageRef::Pending {
            file: LocalFile::new("red.png", "image/png", vec![1, 2, 3]),
            preview_url: "blob:variant-preview/x".to_string(),
        });

        let mut stored = row("Blue", 7);
        stored.server_id = Some("55".to_string());
        stored.image = Some(ImageRef::Stored {
            url: "https://cdn.example/blue.png".to_string(),
            remote_path: "variants/blue.png".to_string(),
        });

        let builder = SubmissionBuilder::new("variant_image_");
        let payload = builder.build(&[pending, stored, row("Green", 9)], &["variants/old.png".to_string()]);

        assert_eq!(payload.rows.len(), 3);
        assert_eq!(payload.rows[0].image_pointer, None);
        assert_eq!(payload.rows[0].quantity, serde_json::Number::from(5));
        assert_eq!(payload.rows[1].image_pointer.as_deref(), Some("variants/blue.png"));
        assert_eq!(payload.rows[1].server_id.as_deref(), Some("55"));
        assert_eq!(payload.rows[2].image_pointer, None);

        assert_eq!(payload.attachments.len(), 1);
        let attachment = payload.attachment_for(3).unwrap();
        assert_eq!(attachment.field_name, "variant_image_3");
        assert_eq!(attachment.file.bytes, vec![1, 2, 3]);
        assert_eq!(payload.removed_image_paths, vec!["variants/old.png".to_string()]);
    }

    #[test]
    fn test_descriptor_json_shape() {
        let mut stored = row("Blue", 1);
        stored.image = Some(ImageRef::Stored {
            url: "https://cdn.example/blue.png".to_string(),
            remote_path: "variants/blue.png".to_string(),
        });
        let payload = SubmissionBuilder::new("variant_image_").build(&[stored], &[]);
        let json = serde_json::to_value(&payload.rows).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{
                "clientIndex": 1,
                "parts": [{"groupId": "Color", "groupName": "Color", "value": "Blue", "valueLabel": "Blue"}],
                "priceExtra": "0",
                "sku": "",
                "quantity": 0,
                "imagePointer": "variants/blue.png"
            }])
        );
    }

    #[test]
    fn test_form_parts_order() {
        let mut pending = row("Red", 4);
        pending.image = Some(ImageRef::Pending {
            file: LocalFile::new("red.png", "image/png", vec![9]),
            preview_url: "blob:variant-preview/y".to_string(),
        });
        let payload = SubmissionBuilder::new("variant_image_").build(&[pending], &[]);
        let parts = payload.form_parts().unwrap();

        let names: Vec<&str> = parts.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec![VARIANTS_FIELD, REMOVED_IMAGES_FIELD, "variant_image_4"]);
        match &parts[2] {
            FormPart::File { file_name, content_type, bytes, .. } => {
                assert_eq!(file_name, "red.png");
                assert_eq!(content_type, "image/png");
                assert_eq!(bytes, &vec![9]);
            }
            other => panic!("expected file part, got {:?}", other),
        }
    }
}
