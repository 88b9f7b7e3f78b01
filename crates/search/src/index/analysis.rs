//! Index settings: analyzers, normalizers, character filters, similarity.

use serde_json::{json, Value};

use crate::settings::Settings;

use super::routing::Bucket;

/// Analyzer applied to text fields: ICU tokenizing and folding with HTML
/// stripped up front.
pub const DEFAULT_ANALYZER: &str = "icu-default";

/// Analyzer for fields that carry markup but want plain-text terms.
pub const STRIP_HTML_ANALYZER: &str = "strip-html";

/// Normalizer for folded keyword fields.
pub const DEFAULT_NORMALIZER: &str = "icu-default";

/// Normalizer for the `names` keyword field: punctuation removed, spaces
/// collapsed, lowercased, ASCII folded.
pub const NAME_KW_NORMALIZER: &str = "name-kw-normalizer";

/// Normalizer for generic keyword fields.
pub const KW_NORMALIZER: &str = "kw-normalizer";

/// Similarity with a weak length norm, attached to the `name` field so
/// long entity names are not penalized.
pub const WEAK_LENGTH_NORM: &str = "weak_length_norm";

/// Builds the full settings body for one bucket index.
pub fn index_settings(settings: &Settings, bucket: Bucket) -> Value {
    json!({
        "index": {
            "number_of_shards": bucket.shards(settings).to_string(),
            "number_of_replicas": settings.index_replicas.to_string(),
            "refresh_interval": settings.index_refresh_interval,
        },
        "analysis": analysis(),
        "similarity": {
            WEAK_LENGTH_NORM: {
                "type": "BM25",
                "b": 0.25,
            }
        },
    })
}

fn analysis() -> Value {
    json!({
        "char_filter": {
            "remove_punctuation": {
                "type": "pattern_replace",
                "pattern": "[^\\p{L}\\p{N}]",
                "replacement": " ",
            },
            "squash_spaces": {
                "type": "pattern_replace",
                "pattern": "\\s+",
                "replacement": " ",
            },
            "remove_html_tags": {
                "type": "pattern_replace",
                "pattern": "<[^>]*>",
                "replacement": " ",
            },
        },
        "analyzer": {
            DEFAULT_ANALYZER: {
                "type": "custom",
                "char_filter": ["remove_html_tags"],
                "tokenizer": "icu_tokenizer",
                "filter": ["icu_folding", "icu_normalizer"],
            },
            STRIP_HTML_ANALYZER: {
                "type": "custom",
                "char_filter": ["html_strip"],
                "tokenizer": "standard",
                "filter": ["lowercase", "asciifolding", "trim"],
            },
        },
        "normalizer": {
            DEFAULT_NORMALIZER: {
                "type": "custom",
                "filter": ["icu_folding"],
            },
            NAME_KW_NORMALIZER: {
                "type": "custom",
                "char_filter": ["remove_punctuation", "squash_spaces"],
                "filter": ["lowercase", "asciifolding", "trim"],
            },
            KW_NORMALIZER: {
                "type": "custom",
                "char_filter": ["remove_html_tags", "squash_spaces"],
                "filter": ["trim"],
            },
        },
    })
}
