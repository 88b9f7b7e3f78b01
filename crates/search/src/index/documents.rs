//! Entity to index-action transformation.

use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::entity::Entity;
use crate::error::{SearchError, SearchResult};
use crate::names::{
    index_name_keys, index_name_parts, name_symbols, phonetic_names, SymbolTable,
};
use crate::schema::{SchemaCatalog, TypeGroup};
use crate::settings::Settings;

use super::routing::{entities_write_index, routing_key, schema_bucket};

/// The crate version recorded on every indexed document.
const INDEX_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A document ready for `_bulk` submission.
#[derive(Debug, Clone)]
pub struct IndexAction {
    /// Target index.
    pub index: String,
    /// Stored document id, possibly dataset-namespaced.
    pub id: String,
    /// Shard routing key.
    pub routing: String,
    /// The document body.
    pub source: Value,
}

impl IndexAction {
    /// The `_bulk` action metadata line.
    pub fn meta(&self) -> Value {
        let mut action = json!({
            "index": {
                "_index": self.index,
                "_id": self.id,
            }
        });
        if !self.routing.is_empty() {
            action["index"]["routing"] = json!(self.routing);
        }
        action
    }

    /// Approximate serialized size, used for chunking by bytes.
    pub fn approx_bytes(&self) -> usize {
        serde_json::to_string(&self.source).map(|s| s.len()).unwrap_or(0) + 128
    }
}

/// Namespaces an entity id by its dataset: a short dataset hash prefix
/// keeps ids of the same entity distinct across datasets.
pub fn namespaced_id(dataset: &str, entity_id: &str) -> String {
    let digest = Sha256::digest(dataset.as_bytes());
    let prefix: String = digest
        .iter()
        .take(6)
        .map(|b| format!("{:02x}", b))
        .collect();
    format!("{}.{}", prefix, entity_id)
}

/// Parses a numeric value. Dates become seconds since epoch so they sort
/// alongside plain numbers.
fn to_numeric(group: TypeGroup, value: &str) -> Option<f64> {
    match group {
        TypeGroup::Number => value.parse::<f64>().ok(),
        TypeGroup::Date => date_to_epoch(value),
        _ => None,
    }
}

fn date_to_epoch(value: &str) -> Option<f64> {
    // Pad partial dates (yyyy, yyyy-MM, yyyy-MM-dd'T'HH, ...) out to a
    // full timestamp or date.
    let padded = match value.len() {
        4 => format!("{}-01-01", value),
        7 => format!("{}-01", value),
        13 => format!("{}:00:00", value),
        16 => format!("{}:00", value),
        _ => value.to_string(),
    };
    if let Ok(dt) = NaiveDateTime::parse_from_str(&padded, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.and_utc().timestamp() as f64);
    }
    NaiveDate::parse_from_str(&padded, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp() as f64)
}

/// Applies the final denormalisations and produces a bulk action for the
/// entity. Abstract schemata yield `None` with a warning; they appear
/// when fragments for a missing entity are present.
pub fn format_entity(
    settings: &Settings,
    catalog: &SchemaCatalog,
    symbols: &SymbolTable,
    dataset: &str,
    entity: &Entity,
) -> SearchResult<Option<IndexAction>> {
    let schema = catalog.require(&entity.schema)?;
    if schema.is_abstract() {
        tracing::warn!(
            schema = %entity.schema,
            entity_id = %entity.id,
            "refusing to index abstract-typed entity"
        );
        return Ok(None);
    }
    if entity.id.is_empty() {
        return Err(SearchError::parameter("id", "entity has no id"));
    }
    let dataset = routing_key(dataset)?;

    let mut data = Map::new();
    data.insert("dataset".into(), json!(dataset));
    if let Some(collection_id) = &entity.collection_id {
        data.insert("collection_id".into(), json!(collection_id));
    }
    data.insert("schema".into(), json!(schema.name()));
    let schemata: Vec<&str> = schema.schemata().collect();
    data.insert("schemata".into(), json!(schemata));
    data.insert("caption".into(), json!(entity.caption(schema)));

    // All names, including mentioned ones, for lookups.
    let names = entity.names(schema);
    let symbols = name_symbols(symbols, schema, names.iter().copied());
    if !symbols.is_empty() {
        data.insert("name_symbols".into(), json!(symbols));
    }
    let name_keys = index_name_keys(schema, names.iter().copied());
    if !name_keys.is_empty() {
        data.insert("name_keys".into(), json!(name_keys));
    }
    let name_parts = index_name_parts(schema, names.iter().copied());
    if !name_parts.is_empty() {
        data.insert("name_parts".into(), json!(name_parts));
    }
    let name_phonetic = phonetic_names(schema, names.iter().copied());
    if !name_phonetic.is_empty() {
        data.insert("name_phonetic".into(), json!(name_phonetic));
    }

    // The indexText magic property is lifted out of the properties and
    // into the index content directly.
    let mut properties = entity.properties.clone();
    let index_text = properties.remove("indexText").unwrap_or_default();
    if !index_text.is_empty() {
        data.insert("content".into(), json!(index_text));
    }

    // Length normalization input for the scoring function.
    let num_values: usize = properties.values().map(|v| v.len()).sum();
    data.insert("num_values".into(), json!(num_values));

    // Numeric casting for sorting and aggregation.
    let mut numeric = Map::new();
    for (name, values) in &properties {
        let Some(prop) = schema.property(name) else {
            continue;
        };
        if !prop.is_numeric() {
            continue;
        }
        let cast: Vec<f64> = values
            .iter()
            .filter_map(|v| to_numeric(prop.group, v))
            .collect();
        if !cast.is_empty() {
            numeric.insert(name.clone(), json!(cast));
        }
    }
    let dates: Vec<f64> = entity
        .type_values(schema, TypeGroup::Date)
        .iter()
        .filter_map(|v| date_to_epoch(v))
        .collect();
    if !dates.is_empty() {
        numeric.insert("dates".into(), json!(dates));
    }
    if !numeric.is_empty() {
        data.insert("numeric".into(), Value::Object(numeric));
    }

    // Geo data for address-like schemata.
    if schema.property("latitude").is_some() {
        let points: Vec<Value> = entity
            .get("longitude")
            .iter()
            .flat_map(|lon| {
                entity
                    .get("latitude")
                    .iter()
                    .map(move |lat| json!({"lon": lon, "lat": lat}))
            })
            .collect();
        if !points.is_empty() {
            data.insert("geo_point".into(), json!(points));
        }
    }

    if let Some(context) = &entity.context {
        if let Some(created_at) = context.created_at.iter().min() {
            data.insert("created_at".into(), json!(created_at));
        }
        let updated_at = context
            .updated_at
            .iter()
            .max()
            .or_else(|| context.created_at.iter().max());
        if let Some(updated_at) = updated_at {
            data.insert("updated_at".into(), json!(updated_at));
        }
        if let Some(first_seen) = &context.first_seen {
            data.insert("first_seen".into(), json!(first_seen));
        }
        if let Some(last_seen) = &context.last_seen {
            data.insert("last_seen".into(), json!(last_seen));
        }
        if !context.referents.is_empty() {
            data.insert("referents".into(), json!(context.referents));
        }
        if !context.origin.is_empty() {
            data.insert("origin".into(), json!(context.origin));
        }
    }

    data.insert("properties".into(), json!(properties));
    data.insert(
        "index_bucket".into(),
        json!(schema_bucket(schema).as_str()),
    );
    data.insert("index_version".into(), json!(INDEX_VERSION));
    data.insert("indexed_at".into(), json!(Utc::now().to_rfc3339()));

    let id = if settings.index_namespace_ids {
        namespaced_id(dataset, &entity.id)
    } else {
        entity.id.clone()
    };

    Ok(Some(IndexAction {
        index: entities_write_index(settings, catalog, schema.name())?,
        id,
        routing: dataset.to_string(),
        source: Value::Object(data),
    }))
}
