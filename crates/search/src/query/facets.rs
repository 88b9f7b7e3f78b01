//! Aggregation building: facets, cardinality totals, date histograms,
//! significant terms and significant text.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

use crate::parse::{FacetConfig, RangeOp, SearchQueryParser};
use crate::schema::{SchemaCatalog, TypeGroup};
use crate::settings::Settings;

/// Facets every caller may request at full size; everything else is
/// capped for unauthenticated requests.
const SMALL_FACETS: &[&str] = &["schema", "schemata", "dataset", "countries", "languages"];

/// Size cap for non-small facets on unauthenticated requests.
const UNAUTHENTICATED_FACET_CAP: u32 = 50;

/// Builds the request's `aggs` object. Empty when nothing is faceted.
pub fn build_aggregations(
    settings: &Settings,
    catalog: &SchemaCatalog,
    parser: &SearchQueryParser,
    post_filters: &BTreeMap<String, Value>,
    foreground_count: Option<u64>,
) -> Value {
    let mut aggs = Map::new();
    let unauthenticated = settings.search_auth && parser.auth.is_none();

    for facet in &parser.facets {
        let mut size = facet.size;
        let mut total = facet.total;
        if unauthenticated && !SMALL_FACETS.contains(&facet.field.as_str()) {
            size = size.min(UNAUTHENTICATED_FACET_CAP);
            total = false;
        }

        let mut inner = Map::new();
        inner.insert(facet.field.clone(), facet_agg(catalog, parser, facet, size));
        if total {
            inner.insert(
                format!("{}.cardinality", facet.field),
                json!({"cardinality": {"field": facet.field}}),
            );
        }

        // Post-filter isolation: every active filter except the ones on
        // this facet's own field, so buckets reveal the alternatives.
        let isolation: Vec<&Value> = post_filters
            .iter()
            .filter(|(field, _)| *field != &facet.field)
            .map(|(_, clause)| clause)
            .collect();
        aggs.insert(
            format!("{}.filtered", facet.field),
            json!({
                "filter": {"bool": {"filter": isolation}},
                "aggs": inner,
            }),
        );
    }

    for sig in &parser.significant {
        let mut body = json!({
            "field": sig.field,
            "size": sig.size,
            "min_doc_count": settings.significant_terms_min_doc_count,
            "shard_min_doc_count": settings.significant_terms_shard_min_doc_count,
            "shard_size": 100u32.max(sig.size * 5),
            "execution_hint": "map",
        });
        if let Some(background) = background_filter(settings, parser) {
            body["background_filter"] = background;
        }
        let mut inner = Map::new();
        inner.insert(sig.field.clone(), json!({"significant_terms": body}));
        if sig.total {
            inner.insert(
                format!("{}.cardinality", sig.field),
                json!({"cardinality": {"field": sig.field}}),
            );
        }
        let mut sampled = sampler(settings, parser, foreground_count);
        sampled["aggs"] = Value::Object(inner);
        aggs.insert(format!("{}.sampled", sig.field), sampled);
    }

    if let Some(text) = &parser.significant_text {
        let mut body = json!({
            "field": text.field,
            "filter_duplicate_text": true,
            "size": text.size,
            "min_doc_count": text
                .min_doc_count
                .unwrap_or(settings.significant_terms_min_doc_count),
            "shard_size": text.shard_size.unwrap_or(100u32.max(text.size * 5)),
        });
        if let Some(background) = background_filter(settings, parser) {
            body["background_filter"] = background;
        }
        let mut inner = Map::new();
        inner.insert(text.field.clone(), json!({"significant_text": body}));
        let mut sampled = sampler(settings, parser, foreground_count);
        sampled["aggs"] = Value::Object(inner);
        aggs.insert(format!("{}.sampled", text.field), sampled);
    }

    Value::Object(aggs)
}

/// The inner facet aggregation: a date histogram when an interval is
/// requested on a date field, a terms aggregation otherwise.
fn facet_agg(
    catalog: &SchemaCatalog,
    parser: &SearchQueryParser,
    facet: &FacetConfig,
    size: u32,
) -> Value {
    if let Some(interval) = &facet.interval {
        if is_date_field(catalog, &facet.field) {
            return date_histogram(parser, &facet.field, interval);
        }
        // Interval on a non-date field falls through to a terms facet:
        // the query still returns, the buckets are just plain values.
    }
    json!({
        "terms": {
            "field": facet.field,
            "size": size,
            "execution_hint": "map",
        }
    })
}

fn date_histogram(parser: &SearchQueryParser, field: &str, interval: &str) -> Value {
    let calendar = matches!(
        interval,
        "year" | "quarter" | "month" | "week" | "day" | "hour" | "minute"
    );
    let format = match interval {
        "year" => "yyyy",
        "quarter" | "month" => "yyyy-MM",
        _ => "yyyy-MM-dd",
    };
    let mut histogram = json!({
        "field": field,
        "min_doc_count": 0,
        "format": format,
    });
    if calendar {
        histogram["calendar_interval"] = json!(interval);
    } else {
        histogram["fixed_interval"] = json!(interval);
    }

    // A range filter on the same field bounds the histogram, so empty
    // buckets appear across the whole filtered window.
    let mut min: Option<&str> = None;
    let mut max: Option<&str> = None;
    for range in &parser.ranges {
        if range.field != field {
            continue;
        }
        match range.op {
            RangeOp::Gte | RangeOp::Gt => min = Some(&range.value),
            RangeOp::Lte | RangeOp::Lt => max = Some(&range.value),
        }
    }
    if let (Some(min), Some(max)) = (min, max) {
        histogram["extended_bounds"] = json!({"min": min, "max": max});
    }

    json!({"date_histogram": histogram})
}

/// Whether a facet field holds dates: the dates group field, the date
/// metadata fields, or a `properties.*` field whose property has the
/// date type group.
fn is_date_field(catalog: &SchemaCatalog, field: &str) -> bool {
    if field == "dates" {
        return true;
    }
    if matches!(
        field,
        "created_at" | "updated_at" | "first_seen" | "last_seen" | "last_change" | "indexed_at"
    ) {
        return true;
    }
    if let Some(prop_name) = field.strip_prefix("properties.") {
        return catalog.concrete().any(|schema| {
            schema
                .property(prop_name)
                .map(|prop| prop.group == TypeGroup::Date)
                .unwrap_or(false)
        });
    }
    false
}

/// The sampler wrapping significant aggregations. Without a dataset
/// scope, sampling is diversified over the auth field so one giant
/// dataset cannot dominate; the random sampler kicks in when enabled and
/// a foreground count is known.
fn sampler(
    settings: &Settings,
    parser: &SearchQueryParser,
    foreground_count: Option<u64>,
) -> Value {
    if settings.significant_terms_random_sampler {
        if let Some(count) = foreground_count {
            let target = settings.significant_terms_random_sampler_target as f64;
            let mut probability = (target / count.max(1) as f64).min(1.0);
            // The cluster only accepts probabilities up to 0.5, or 1.
            if probability >= 0.5 {
                probability = 1.0;
            }
            return json!({"random_sampler": {"probability": probability}});
        }
    }
    let shard_size = settings.significant_terms_sampler_size;
    let scoped = parser
        .active_datasets(&settings.search_auth_field)
        .map(|set| !set.is_empty())
        .unwrap_or(false);
    if scoped {
        json!({"sampler": {"shard_size": shard_size}})
    } else {
        json!({
            "diversified_sampler": {
                "shard_size": shard_size,
                "field": settings.search_auth_field,
            }
        })
    }
}

/// The background set for significance scoring: the active datasets when
/// a scope exists, otherwise the whole index statistics.
fn background_filter(settings: &Settings, parser: &SearchQueryParser) -> Option<Value> {
    let datasets = parser.active_datasets(&settings.search_auth_field)?;
    if datasets.is_empty() {
        return None;
    }
    let field = settings.search_auth_field.as_str();
    Some(json!({"terms": {field: datasets}}))
}
