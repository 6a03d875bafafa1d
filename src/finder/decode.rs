//! Decoding of list items into remote state snapshots.

use serde_json::Value;
use std::str::FromStr;

use crate::error::{EngineError, Result};
use crate::model::{AttributeMap, RemoteState, ResourceStatus};

/// Turns one list item into a [`RemoteState`].
pub trait RecordDecoder<S>: Send + Sync {
    /// Decodes a record.
    ///
    /// # Errors
    ///
    /// Returns `InvalidResponse` if the record lacks an identifier or carries
    /// a status outside the resource's enumeration.
    fn decode(&self, record: &Value) -> Result<RemoteState<S>>;
}

impl<S, F> RecordDecoder<S> for F
where
    F: Fn(&Value) -> Result<RemoteState<S>> + Send + Sync,
{
    fn decode(&self, record: &Value) -> Result<RemoteState<S>> {
        self(record)
    }
}

/// Decoder that reads named fields of a JSON record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecoder {
    /// Field holding the record's own identifier.
    pub id_field: String,
    /// Field holding the status string.
    pub status_field: String,
    /// Field holding the status reason, if the API reports one.
    pub reason_field: Option<String>,
    /// Field holding the attribute object; `None` means the whole record
    /// minus the identifier and status fields.
    pub attributes_field: Option<String>,
}

impl Default for FieldDecoder {
    fn default() -> Self {
        Self {
            id_field: String::from("id"),
            status_field: String::from("status"),
            reason_field: Some(String::from("statusReason")),
            attributes_field: Some(String::from("attributes")),
        }
    }
}

impl<S> RecordDecoder<S> for FieldDecoder
where
    S: ResourceStatus + FromStr,
    S::Err: std::fmt::Display,
{
    fn decode(&self, record: &Value) -> Result<RemoteState<S>> {
        let id = record
            .get(&self.id_field)
            .and_then(Value::as_str)
            .ok_or_else(|| EngineError::invalid_response(format!("record has no string field {}", self.id_field)))?;

        let raw_status = record
            .get(&self.status_field)
            .and_then(Value::as_str)
            .ok_or_else(|| EngineError::invalid_response(format!("record {id} has no status field {}", self.status_field)))?;
        let status = raw_status
            .parse::<S>()
            .map_err(|e| EngineError::invalid_response(format!("record {id}: {e}")))?;

        let attributes = match &self.attributes_field {
            Some(field) => match record.get(field) {
                Some(value) => AttributeMap::from_json(value).ok_or_else(|| {
                    EngineError::invalid_response(format!("record {id}: {field} is not an object"))
                })?,
                None => AttributeMap::new(),
            },
            None => {
                let mut all = AttributeMap::from_json(record)
                    .ok_or_else(|| EngineError::invalid_response(format!("record {id} is not an object")))?;
                all.remove(&self.id_field);
                all.remove(&self.status_field);
                all
            }
        };

        let state = RemoteState::new(id, status, attributes);
        let reason = self
            .reason_field
            .as_ref()
            .and_then(|field| record.get(field))
            .and_then(Value::as_str);
        Ok(match reason {
            Some(reason) => state.with_status_reason(reason),
            None => state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::model::{AttrValue, LifecycleStatus};
    use serde_json::json;

    #[test]
    fn test_field_decoder() {
        let record = json!({
            "id": "w-1",
            "status": "ACTIVE",
            "statusReason": "ready",
            "attributes": {"size": 2}
        });
        let state: RemoteState<LifecycleStatus> = FieldDecoder::default().decode(&record).unwrap();
        assert_eq!(state.id(), "w-1");
        assert_eq!(*state.status(), LifecycleStatus::Available);
        assert_eq!(state.status_reason(), Some("ready"));
        assert_eq!(state.attributes().get("size"), Some(&AttrValue::Int(2)));
    }

    #[test]
    fn test_flat_records() {
        let decoder = FieldDecoder {
            id_field: String::from("DomainName"),
            status_field: String::from("State"),
            reason_field: None,
            attributes_field: None,
        };
        let record = json!({"DomainName": "search", "State": "PROCESSING", "EngineVersion": "7.10"});
        let err = RecordDecoder::<LifecycleStatus>::decode(&decoder, &record).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidResponse);

        let record = json!({"DomainName": "search", "State": "READY", "EngineVersion": "7.10"});
        let state: RemoteState<LifecycleStatus> = decoder.decode(&record).unwrap();
        assert_eq!(state.attributes().keys().collect::<Vec<_>>(), ["EngineVersion"]);
    }

    #[test]
    fn test_missing_id() {
        let err = RecordDecoder::<LifecycleStatus>::decode(&FieldDecoder::default(), &json!({"status": "READY"}))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidResponse);
    }
}
