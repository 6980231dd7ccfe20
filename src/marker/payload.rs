//! Payload types carried inside marker regions.
//!
//! A [`RawPayload`] is the exact inner text of a completed marker region;
//! the typed payloads are what that text decodes to, one shape per
//! [`MarkerKind`](super::MarkerKind).

use super::MarkerKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw inner text extracted from one completed marker region.
///
/// Produced once per `InsideMarker -> Passthrough` transition and consumed
/// exactly once by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawPayload {
    /// Kind of the marker that carried this payload.
    pub kind: MarkerKind,

    /// Inner text exactly as it appeared between the delimiters.
    pub raw: String,
}

impl RawPayload {
    /// Creates a raw payload.
    #[must_use]
    pub fn new(kind: MarkerKind, raw: &str) -> Self {
        Self {
            kind,
            raw: raw.to_string(),
        }
    }
}

/// Decoded payload of a `trip_update` marker.
///
/// Applies one named field on the subject record. A budget update may carry
/// a currency alongside the amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldUpdate {
    /// Name of the field to set.
    pub field: String,

    /// New value for the field.
    pub value: Value,

    /// Currency code accompanying a budget value, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

/// Decoded payload of a `photo` marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoRequest {
    /// Place or attraction to look up.
    pub query: String,

    /// Caption to show with the photo.
    #[serde(default)]
    pub caption: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_payload_new() {
        let payload = RawPayload::new(MarkerKind::Photo, r#"{"query":"Eiffel Tower"}"#);
        assert_eq!(payload.kind, MarkerKind::Photo);
        assert!(payload.raw.contains("Eiffel"));
    }

    #[test]
    fn test_field_update_decode() {
        let update: FieldUpdate =
            serde_json::from_str(r#"{"field":"optimal_season","value":"spring"}"#).unwrap();
        assert_eq!(update.field, "optimal_season");
        assert_eq!(update.value, Value::String("spring".to_string()));
        assert!(update.currency.is_none());
    }

    #[test]
    fn test_field_update_decode_with_currency() {
        let update: FieldUpdate =
            serde_json::from_str(r#"{"field":"estimated_budget","value":1500,"currency":"EUR"}"#)
                .unwrap();
        assert_eq!(update.field, "estimated_budget");
        assert_eq!(update.currency.as_deref(), Some("EUR"));
    }

    #[test]
    fn test_field_update_rejects_missing_field() {
        let result: Result<FieldUpdate, _> = serde_json::from_str(r#"{"value":1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_photo_request_decode() {
        let request: PhotoRequest =
            serde_json::from_str(r#"{"query":"Sagrada Familia","caption":"Gaudi's basilica"}"#)
                .unwrap();
        assert_eq!(request.query, "Sagrada Familia");
        assert_eq!(request.caption, "Gaudi's basilica");
    }

    #[test]
    fn test_photo_request_caption_defaults_empty() {
        let request: PhotoRequest = serde_json::from_str(r#"{"query":"Louvre"}"#).unwrap();
        assert_eq!(request.caption, "");
    }
}
