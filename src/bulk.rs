use crate::error::Result;
use indexmap::IndexMap;
use serde_json::{json, Value};

/// Serialize a batch of identity → document pairs into the newline-delimited
/// bulk wire format: an index action descriptor followed immediately by the
/// document body, one JSON object per line, trailing newline included.
///
/// Output order matches the insertion order of `documents` so that per-item
/// error positions in the response map back to the submitted batch.
pub fn encode_bulk(
    collection: &str,
    entity_type: &str,
    documents: &IndexMap<String, Value>,
) -> Result<String> {
    let mut body = String::new();
    for (id, document) in documents {
        let action = json!({
            "index": { "_index": collection, "_type": entity_type, "_id": id }
        });
        body.push_str(&serde_json::to_string(&action)?);
        body.push('\n');
        body.push_str(&serde_json::to_string(document)?);
        body.push('\n');
    }
    Ok(body)
}
