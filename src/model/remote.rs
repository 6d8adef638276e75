use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::model::{ClientIndex, RemoteScalar};

/// Variant as the backend returns it, both when loading an existing product
/// and in the response to a submission
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteVariant {
    #[serde(default, deserialize_with = "loose_scalar", skip_serializing_if = "Option::is_none")]
    pub id: Option<RemoteScalar>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub parts: Vec<RemotePart>,
    #[serde(default, deserialize_with = "loose_scalar", skip_serializing_if = "Option::is_none")]
    pub extra_price: Option<RemoteScalar>,
    #[serde(default, deserialize_with = "loose_text", skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(default, deserialize_with = "loose_scalar", skip_serializing_if = "Option::is_none")]
    pub quantity: Option<RemoteScalar>,
    #[serde(default, deserialize_with = "loose_image", skip_serializing_if = "Option::is_none")]
    pub image: Option<RemoteImage>,
    #[serde(default, deserialize_with = "loose_index", skip_serializing_if = "Option::is_none")]
    pub client_index: Option<ClientIndex>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemotePart {
    #[serde(default, deserialize_with = "text_or_empty")]
    pub group_id: String,
    #[serde(default, deserialize_with = "loose_text", skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub value: String,
    #[serde(default, deserialize_with = "loose_text", skip_serializing_if = "Option::is_none")]
    pub value_label: Option<String>,
}

impl RemotePart {
    pub fn new(group_id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            value: value.into(),
            ..Default::default()
        }
    }
}

// Backend payloads are loosely typed. A mistyped field degrades to empty so
// hydration can skip the one bad row instead of rejecting the whole set.

fn loose_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(text)) => Some(text),
        Some(Value::Number(number)) => Some(number.to_string()),
        Some(Value::Bool(flag)) => Some(flag.to_string()),
        _ => None,
    })
}

fn loose_scalar<'de, D>(deserializer: D) -> Result<Option<RemoteScalar>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(text)) => Some(RemoteScalar::Text(text)),
        Some(Value::Number(number)) => Some(RemoteScalar::Number(number)),
        _ => None,
    })
}

fn text_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(loose_text(deserializer)?.unwrap_or_default())
}

fn loose_index<'de, D>(deserializer: D) -> Result<Option<ClientIndex>, D::Error>
where
    D: Deserializer<'de>,
{
    let index = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(number)) => number.as_u64(),
        Some(Value::String(text)) => text.trim().parse::<u64>().ok(),
        _ => None,
    };
    Ok(index.and_then(|i| ClientIndex::try_from(i).ok()))
}

fn loose_image<'de, D>(deserializer: D) -> Result<Option<RemoteImage>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(|value| serde_json::from_value(value).ok()))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Stored image pointer; older payloads carry a bare string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RemoteImage {
    Path(String),
    Object {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
}

impl RemoteImage {
    /// `(url, remote_path)`, each falling back to the other; `None` when both
    /// are missing or blank
    pub fn resolve(&self) -> Option<(String, String)> {
        let non_blank = |s: &Option<String>| s.as_ref().map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        match self {
            RemoteImage::Path(path) => {
                let path = path.trim();
                if path.is_empty() {
                    None
                } else {
                    Some((path.to_string(), path.to_string()))
                }
            }
            RemoteImage::Object { url, path } => match (non_blank(url), non_blank(path)) {
                (Some(url), Some(path)) => Some((url, path)),
                (Some(url), None) => Some((url.clone(), url)),
                (None, Some(path)) => Some((path.clone(), path)),
                (None, None) => None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_variant_deserializes_loose_payload() {
        let json = r#"{
            "id": 42,
            "parts": [{"groupId": "size", "value": "M"}, {"groupId": "color", "groupName": "Color", "value": "red", "valueLabel": "Red"}],
            "extraPrice": 2.5,
            "sku": "TS-RED-M",
            "quantity": "10",
            "image": {"url": "https://cdn.example/v/1.jpg", "path": "variants/1.jpg"}
        }"#;
        let variant: RemoteVariant = serde_json::from_str(json).unwrap();
        assert_eq!(variant.id.as_ref().and_then(|id| id.as_text()), Some("42".to_string()));
        assert_eq!(variant.parts.len(), 2);
        assert_eq!(variant.parts[0].group_name, None);
        assert_eq!(variant.extra_price.as_ref().and_then(|p| p.as_text()), Some("2.5".to_string()));
        assert_eq!(
            variant.image.as_ref().and_then(|i| i.resolve()),
            Some(("https://cdn.example/v/1.jpg".to_string(), "variants/1.jpg".to_string()))
        );
    }

    #[test]
    fn test_null_and_mistyped_fields_do_not_fail_the_row_set() {
        let json = r#"[
            {"parts": [{"groupId": "color", "value": "red"}], "clientIndex": "3"},
            {"parts": [{"groupId": "color", "value": null}], "id": {"bad": true}},
            {"parts": [{"groupId": null, "value": "blue", "valueLabel": 7}], "sku": 1001},
            {"parts": null, "clientIndex": -1, "image": 12}
        ]"#;
        let variants: Vec<RemoteVariant> = serde_json::from_str(json).unwrap();
        assert_eq!(variants.len(), 4);
        assert_eq!(variants[0].client_index, Some(3));
        assert_eq!(variants[1].parts[0].value, "");
        assert_eq!(variants[1].id, None);
        assert_eq!(variants[2].parts[0].group_id, "");
        assert_eq!(variants[2].parts[0].value_label.as_deref(), Some("7"));
        assert_eq!(variants[2].sku.as_deref(), Some("1001"));
        assert!(variants[3].parts.is_empty());
        assert_eq!(variants[3].client_index, None);
        assert_eq!(variants[3].image, None);
    }

    #[test]
    fn test_remote_image_fallbacks() {
        let bare: RemoteImage = serde_json::from_str(r#""variants/a.png""#).unwrap();
        assert_eq!(bare.resolve(), Some(("variants/a.png".to_string(), "variants/a.png".to_string())));

        let only_path: RemoteImage = serde_json::from_str(r#"{"path": "variants/b.png"}"#).unwrap();
        assert_eq!(only_path.resolve(), Some(("variants/b.png".to_string(), "variants/b.png".to_string())));

        let empty: RemoteImage = serde_json::from_str(r#"{"url": "  "}"#).unwrap();
        assert_eq!(empty.resolve(), None);
    }
}
