//! Response hit unpacking.

use serde_json::{json, Value};

/// Turns a document hit from the cluster into a flat JSON object: the
/// `_source` with id, index, score, flattened highlights and sort values
/// merged in.
pub fn unpack_result(hit: &Value) -> Option<Value> {
    if hit.get("found").and_then(Value::as_bool) == Some(false) {
        return None;
    }
    let mut data = hit.get("_source").cloned().unwrap_or_else(|| json!({}));
    let obj = data.as_object_mut()?;
    if let Some(id) = hit.get("_id") {
        obj.insert("id".to_string(), id.clone());
    }
    if let Some(index) = hit.get("_index") {
        obj.insert("_index".to_string(), index.clone());
    }

    if let Some(score) = hit.get("_score").and_then(Value::as_f64) {
        if score != 0.0 && !obj.contains_key("score") {
            obj.insert("score".to_string(), json!(score));
        }
    }

    if let Some(highlight) = hit.get("highlight").and_then(Value::as_object) {
        let mut fragments: Vec<Value> = Vec::new();
        for field_fragments in highlight.values() {
            if let Some(values) = field_fragments.as_array() {
                fragments.extend(values.iter().cloned());
            }
        }
        obj.insert("highlight".to_string(), Value::Array(fragments));
    }

    let sort = hit
        .get("sort")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    obj.insert("_sort".to_string(), Value::Array(sort));

    Some(data)
}
