//! Per-bucket index mappings.
//!
//! The mapping is where the indexed-document invariants are enforced:
//! every property field carries `copy_to` into `content` or `text` plus
//! its group field, so `_source` can exclude all derived fields while
//! keeping them searchable.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

use crate::schema::{SchemaCatalog, TypeGroup};
use crate::settings::Settings;

use super::analysis::{DEFAULT_ANALYZER, NAME_KW_NORMALIZER, WEAK_LENGTH_NORM};
use super::routing::{schema_bucket, Bucket};

/// Date formats accepted on date fields, from most to least precise.
pub const DATE_FORMAT: &str = "yyyy-MM-dd'T'HH:mm:ss||yyyy-MM-dd'T'HH:mm||yyyy-MM-dd'T'HH||yyyy-MM-dd||yyyy-MM||yyyy||strict_date_optional_time";

/// Derived fields reconstructed from `properties.*` at index time and
/// excluded from `_source`.
const DERIVED_FIELDS: &[&str] = &[
    "content",
    "text",
    "name",
    "name_keys",
    "name_parts",
    "name_symbols",
    "name_phonetic",
];

fn keyword() -> Value {
    json!({"type": "keyword"})
}

fn partial_date() -> Value {
    json!({"type": "date", "format": DATE_FORMAT})
}

/// Builds the mapping body for one bucket index.
pub fn make_mapping(settings: &Settings, catalog: &SchemaCatalog, bucket: Bucket) -> Value {
    let mut excludes: Vec<&str> = TypeGroup::group_fields().to_vec();
    excludes.extend(DERIVED_FIELDS);

    let mut properties = Map::new();

    // Identity
    properties.insert("dataset".into(), keyword());
    properties.insert("collection_id".into(), keyword());
    properties.insert("schema".into(), keyword());
    properties.insert("schemata".into(), keyword());
    properties.insert("caption".into(), keyword());

    // Name representations
    properties.insert(
        "name".into(),
        json!({
            "type": "text",
            "analyzer": DEFAULT_ANALYZER,
            "similarity": WEAK_LENGTH_NORM,
            "store": true,
        }),
    );
    properties.insert(
        "names".into(),
        json!({
            "type": "keyword",
            "normalizer": NAME_KW_NORMALIZER,
            "copy_to": ["text"],
        }),
    );
    properties.insert("name_keys".into(), keyword());
    properties.insert(
        "name_parts".into(),
        json!({"type": "keyword", "copy_to": ["text"]}),
    );
    properties.insert("name_symbols".into(), keyword());
    properties.insert("name_phonetic".into(), keyword());

    // Full text
    let mut content = json!({
        "type": "text",
        "analyzer": DEFAULT_ANALYZER,
        "index_phrases": true,
    });
    if settings.content_term_vectors {
        content["term_vector"] = json!("with_positions_offsets");
    }
    if bucket == Bucket::Pages {
        content["store"] = json!(true);
    }
    properties.insert("content".into(), content);
    properties.insert(
        "text".into(),
        json!({"type": "text", "analyzer": DEFAULT_ANALYZER}),
    );

    // Group fields
    for field in TypeGroup::group_fields() {
        let config = if *field == "dates" {
            partial_date()
        } else {
            keyword()
        };
        properties.insert((*field).into(), config);
    }

    // Typed entity properties and their numeric duplicates
    properties.insert(
        "properties".into(),
        json!({"type": "object", "properties": bucket_property_mapping(catalog, bucket)}),
    );
    properties.insert(
        "numeric".into(),
        json!({"type": "object", "properties": numeric_mapping(catalog)}),
    );
    properties.insert("geo_point".into(), json!({"type": "geo_point"}));

    // Metadata
    for field in ["created_at", "updated_at", "first_seen", "last_seen", "last_change", "indexed_at"] {
        properties.insert(field.into(), json!({"type": "date"}));
    }
    properties.insert("num_values".into(), json!({"type": "long"}));
    properties.insert("referents".into(), keyword());
    properties.insert("origin".into(), keyword());
    properties.insert("index_bucket".into(), keyword());
    properties.insert("index_version".into(), keyword());

    json!({
        "date_detection": false,
        "dynamic": false,
        "_source": {"excludes": excludes},
        "properties": properties,
    })
}

/// The merged `properties.*` mapping for all schemata in a bucket. When
/// two schemata define the same property with different types, keyword
/// wins and the `copy_to` targets are merged.
fn bucket_property_mapping(catalog: &SchemaCatalog, bucket: Bucket) -> Value {
    let mut merged: BTreeMap<String, (Value, Vec<String>)> = BTreeMap::new();

    for schema in catalog.concrete() {
        if schema_bucket(schema) != bucket {
            continue;
        }
        for prop in schema.properties() {
            let config = property_config(prop.group);
            let copy_to = property_copy_to(prop.group);
            match merged.get_mut(&prop.name) {
                None => {
                    merged.insert(prop.name.clone(), (config, copy_to));
                }
                Some((existing, targets)) => {
                    // Keyword precedence on type conflicts.
                    if existing["type"] != config["type"] && config["type"] == "keyword" {
                        *existing = config;
                    }
                    for target in copy_to {
                        if !targets.contains(&target) {
                            targets.push(target);
                        }
                    }
                }
            }
        }
    }

    let mut mapping = Map::new();
    for (name, (mut config, mut copy_to)) in merged {
        copy_to.sort();
        config["copy_to"] = json!(copy_to);
        mapping.insert(name, config);
    }
    Value::Object(mapping)
}

/// The Elasticsearch field config for a property type group, before
/// `copy_to` wiring.
fn property_config(group: TypeGroup) -> Value {
    if group.is_text() {
        json!({"type": "text", "analyzer": DEFAULT_ANALYZER})
    } else if group == TypeGroup::Date {
        partial_date()
    } else {
        keyword()
    }
}

/// The `copy_to` targets for a property type group: long text goes to
/// `content`, everything else to `text`; grouped types additionally feed
/// their group field, names also feed the scored `name` text field.
fn property_copy_to(group: TypeGroup) -> Vec<String> {
    let mut targets = Vec::new();
    if group.is_text() {
        targets.push("content".to_string());
    } else {
        targets.push("text".to_string());
    }
    if let Some(field) = group.group_field() {
        targets.push(field.to_string());
    }
    if group == TypeGroup::Name {
        targets.push("name".to_string());
    }
    targets
}

/// `numeric.<field>: double` for every numeric or date property in the
/// model, used for sorting and aggregation.
fn numeric_mapping(catalog: &SchemaCatalog) -> Value {
    let mut mapping = Map::new();
    for schema in catalog.concrete() {
        for prop in schema.properties() {
            if prop.is_numeric() {
                mapping.insert(prop.name.clone(), json!({"type": "double"}));
            }
        }
    }
    Value::Object(mapping)
}
