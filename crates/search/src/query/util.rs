//! Low-level clause assemblers.

use serde_json::{json, Map, Value};

use crate::index::Bucket;
use crate::parse::{RangeFilter, RangeOp};
use crate::schema::SchemaCatalog;
use crate::settings::Settings;

/// An empty bool query with all four clause lists present.
pub fn bool_query() -> Value {
    json!({
        "bool": {
            "should": [],
            "filter": [],
            "must": [],
            "must_not": [],
        }
    })
}

/// A query matching nothing.
pub fn none_query() -> Value {
    let mut query = bool_query();
    query["bool"]["must"]
        .as_array_mut()
        .expect("bool query has must")
        .push(json!({"match_none": {}}));
    query
}

/// A filter clause for field values: id fields dispatch to an `ids`
/// query, single values to `term`, multiple to `terms`.
pub fn field_filter_query(field: &str, values: &[String]) -> Value {
    if values.is_empty() {
        return json!({"match_all": {}});
    }
    if field == "id" || field == "_id" {
        return json!({"ids": {"values": values}});
    }
    if values.len() == 1 {
        return json!({"term": {field: values[0]}});
    }
    json!({"terms": {field: values}})
}

/// A range clause combining all conditions on one field.
pub fn range_filter_query(field: &str, conditions: &[(RangeOp, &str)]) -> Value {
    let mut ops = Map::new();
    for (op, value) in conditions {
        ops.insert(op.as_str().to_string(), json!(value));
    }
    json!({"range": {field: ops}})
}

/// Collapses a list of range filters into one clause per field, in first
/// occurrence order.
pub fn range_filters(ranges: &[RangeFilter]) -> Vec<Value> {
    let mut fields: Vec<&str> = Vec::new();
    for range in ranges {
        if !fields.contains(&range.field.as_str()) {
            fields.push(&range.field);
        }
    }
    fields
        .into_iter()
        .map(|field| {
            let conditions: Vec<(RangeOp, &str)> = ranges
                .iter()
                .filter(|r| r.field == field)
                .map(|r| (r.op, r.value.as_str()))
                .collect();
            range_filter_query(field, &conditions)
        })
        .collect()
}

/// A schema filter limited to known, concrete schemata. An empty
/// selection matches nothing.
pub fn schema_query<S: AsRef<str>>(catalog: &SchemaCatalog, schemata: &[S]) -> Value {
    let mut names: Vec<&str> = schemata
        .iter()
        .filter_map(|name| catalog.get(name.as_ref()))
        .filter(|schema| !schema.is_abstract())
        .map(|schema| schema.name())
        .collect();
    names.sort();
    names.dedup();
    if names.is_empty() {
        return json!({"match_none": {}});
    }
    json!({"terms": {"schema": names}})
}

/// Wraps a query in a function_score that up-scores entities with many
/// property values, plus configured per-bucket weights. Very large
/// entities have a num_values around 200, which works out to roughly a
/// +7 boost under sqrt(0.5 * value).
pub fn wrap_function_score(settings: &Settings, query: Value) -> Value {
    if !settings.query_function_score {
        return query;
    }
    let mut functions = vec![json!({
        "field_value_factor": {
            "field": "num_values",
            "factor": 0.5,
            "modifier": "sqrt",
        }
    })];
    for bucket in Bucket::all() {
        let boost = bucket.boost(settings);
        if boost != 1.0 {
            functions.push(json!({
                "filter": {"term": {"index_bucket": bucket.as_str()}},
                "weight": boost,
            }));
        }
    }
    json!({
        "function_score": {
            "query": query,
            "functions": functions,
            "boost_mode": "sum",
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_query_shape() {
        let query = bool_query();
        for clause in ["should", "filter", "must", "must_not"] {
            assert!(query["bool"][clause].as_array().unwrap().is_empty());
        }
    }

    #[test]
    fn test_field_filter_dispatch() {
        assert_eq!(
            field_filter_query("id", &["5".into(), "8".into()]),
            json!({"ids": {"values": ["5", "8"]}})
        );
        assert_eq!(
            field_filter_query("schema", &["Person".into()]),
            json!({"term": {"schema": "Person"}})
        );
        assert_eq!(
            field_filter_query("countries", &["de".into(), "fr".into()]),
            json!({"terms": {"countries": ["de", "fr"]}})
        );
        assert_eq!(field_filter_query("x", &[]), json!({"match_all": {}}));
    }

    #[test]
    fn test_range_filters_grouped() {
        let ranges = vec![
            RangeFilter {
                field: "dates".into(),
                op: RangeOp::Gte,
                value: "2020".into(),
            },
            RangeFilter {
                field: "dates".into(),
                op: RangeOp::Lt,
                value: "2021".into(),
            },
        ];
        assert_eq!(
            range_filters(&ranges),
            vec![json!({"range": {"dates": {"gte": "2020", "lt": "2021"}}})]
        );
    }

    #[test]
    fn test_schema_query() {
        let catalog = SchemaCatalog::default_model();
        assert_eq!(
            schema_query(&catalog, &["Person"]),
            json!({"terms": {"schema": ["Person"]}})
        );
        assert_eq!(
            schema_query(&catalog, &["Person", "Company"]),
            json!({"terms": {"schema": ["Company", "Person"]}})
        );
        // Abstract and unknown schemata are dropped.
        assert_eq!(
            schema_query(&catalog, &["Person", "Analyzable"]),
            json!({"terms": {"schema": ["Person"]}})
        );
        assert_eq!(
            schema_query(&catalog, &["Analyzable"]),
            json!({"match_none": {}})
        );
        assert_eq!(
            schema_query::<&str>(&catalog, &[]),
            json!({"match_none": {}})
        );
    }

    #[test]
    fn test_function_score_wrapper() {
        let settings = Settings::from_env();
        let wrapped = wrap_function_score(&settings, json!({"match_all": {}}));
        let fs = &wrapped["function_score"];
        assert_eq!(fs["boost_mode"], "sum");
        assert_eq!(
            fs["functions"][0]["field_value_factor"]["field"],
            "num_values"
        );
        assert_eq!(fs["functions"][0]["field_value_factor"]["modifier"], "sqrt");
        // All bucket boosts default to 1.0, so no weight functions.
        assert_eq!(fs["functions"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_function_score_bucket_boost() {
        let mut settings = Settings::from_env();
        settings.index_boost_pages = 0.5;
        let wrapped = wrap_function_score(&settings, json!({"match_all": {}}));
        let functions = wrapped["function_score"]["functions"].as_array().unwrap();
        assert_eq!(functions.len(), 2);
        assert_eq!(functions[1]["filter"]["term"]["index_bucket"], "pages");
        assert_eq!(functions[1]["weight"], 0.5);
    }

    #[test]
    fn test_function_score_disabled() {
        let mut settings = Settings::from_env();
        settings.query_function_score = false;
        let query = json!({"match_all": {}});
        assert_eq!(wrap_function_score(&settings, query.clone()), query);
    }
}
