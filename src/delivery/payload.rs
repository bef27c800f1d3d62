//! Upload payload codec.
//!
//! Stored records are opaque bytes. At upload time each one must decode as a
//! JSON value; the batch body is the JSON array of those values, optionally
//! preceded by a fixed prefix.

use serde_json::Value;

use crate::error_handling::UploadError;
use crate::storage::{Batch, RecordId};

/// A fetched batch split into uploadable values and poison records.
#[derive(Debug, Default, PartialEq)]
pub struct DecodedBatch {
    /// Decoded values, oldest first.
    pub values: Vec<Value>,
    /// Identifiers of `values`, same order.
    pub ids: Vec<RecordId>,
    /// Records that are not valid JSON and can never be delivered.
    pub poison: Vec<RecordId>,
}

/// Decodes every record of `batch` as JSON.
pub fn decode_batch(batch: Batch) -> DecodedBatch {
    let mut decoded = DecodedBatch::default();
    for record in batch.records {
        match serde_json::from_slice::<Value>(&record.data) {
            Ok(value) => {
                decoded.values.push(value);
                decoded.ids.push(record.id);
            }
            Err(e) => {
                log::debug!("Record {} is not valid JSON: {e}", record.id);
                decoded.poison.push(record.id);
            }
        }
    }
    decoded
}

/// Content type of an upload body.
pub fn content_type(prefix: Option<&str>) -> &'static str {
    // The prefixed form is not valid JSON any more
    if prefix.is_some() {
        "text/plain"
    } else {
        "application/json"
    }
}

/// Serializes `values` into one upload body.
pub fn encode_body(values: &[Value], prefix: Option<&str>) -> Result<Vec<u8>, UploadError> {
    let json = serde_json::to_vec(values).map_err(|e| UploadError::Serialization(e.to_string()))?;
    match prefix {
        Some(p) => {
            let mut body = Vec::with_capacity(p.len() + json.len());
            body.extend_from_slice(p.as_bytes());
            body.extend_from_slice(&json);
            Ok(body)
        }
        None => Ok(json),
    }
}
