//! Request-body tests for the entity search query.

use serde_json::{json, Value};

use openaleph_search::parse::{QueryParams, SearchQueryParser};
use openaleph_search::query::{EntitiesQuery, QueryBuilder};
use openaleph_search::schema::SchemaCatalog;
use openaleph_search::settings::Settings;

fn fixtures() -> (Settings, SchemaCatalog) {
    (Settings::from_env(), SchemaCatalog::default_model())
}

fn body(pairs: &[(&str, &str)]) -> Value {
    let (settings, catalog) = fixtures();
    let params = QueryParams::new(pairs.iter().copied());
    let parser = SearchQueryParser::parse(&params, None).unwrap();
    EntitiesQuery::new(&settings, &catalog, &parser)
        .body()
        .unwrap()
}

fn bool_part(body: &Value) -> &Value {
    &body["query"]["function_score"]["query"]["bool"]
}

#[test]
fn test_no_text_matches_all() {
    let body = body(&[]);
    assert_eq!(bool_part(&body)["must"], json!([{"match_all": {}}]));
    assert_eq!(body["from"], 0);
    assert_eq!(body["size"], 20);
}

#[test]
fn test_query_string_text() {
    let body = body(&[("q", "search text")]);
    let qs = &bool_part(&body)["must"][0]["query_string"];
    assert_eq!(qs["query"], "search text");
    assert_eq!(qs["default_operator"], "AND");
}

#[test]
fn test_prefix_clause() {
    let body = body(&[("prefix", "tex")]);
    assert_eq!(
        bool_part(&body)["should"][0],
        json!({"prefix": {"name": "tex"}})
    );
}

#[test]
fn test_id_filter() {
    let body = body(&[
        ("filter:id", "5"),
        ("filter:id", "8"),
        ("filter:id", "2"),
    ]);
    assert_eq!(
        bool_part(&body)["filter"][0],
        json!({"ids": {"values": ["5", "8", "2"]}})
    );
}

#[test]
fn test_filters_and_ranges() {
    let body = body(&[
        ("filter:key1", "foo"),
        ("filter:key1", "bar"),
        ("filter:key2", "blah"),
        ("filter:gte:dates", "2018"),
    ]);
    let filters = bool_part(&body)["filter"].as_array().unwrap();
    assert!(filters.contains(&json!({"terms": {"key1": ["foo", "bar"]}})));
    assert!(filters.contains(&json!({"term": {"key2": "blah"}})));
    assert!(filters.contains(&json!({"range": {"dates": {"gte": "2018"}}})));
}

#[test]
fn test_offset_and_limit() {
    let body = body(&[("offset", "10"), ("limit", "100")]);
    assert_eq!(body["from"], 10);
    assert_eq!(body["size"], 100);
}

#[test]
fn test_post_filters() {
    let body = body(&[
        ("filter:key1", "foo"),
        ("filter:key2", "foo"),
        ("filter:key2", "bar"),
        ("facet", "key2"),
        ("filter:key3", "blah"),
        ("facet", "key3"),
    ]);
    // Only the un-faceted filter stays in the query context.
    assert_eq!(
        bool_part(&body)["filter"],
        json!([{"term": {"key1": "foo"}}])
    );
    // Faceted filters apply after aggregation.
    let post = body["post_filter"]["bool"]["filter"].as_array().unwrap();
    assert!(post.contains(&json!({"terms": {"key2": ["foo", "bar"]}})));
    assert!(post.contains(&json!({"term": {"key3": "blah"}})));
}

#[test]
fn test_schema_filter() {
    let body = body(&[("filter:schema", "Person")]);
    assert_eq!(
        bool_part(&body)["filter"][0],
        json!({"term": {"schema": "Person"}})
    );
}

#[test]
fn test_exclusions_and_empties() {
    let body = body(&[
        ("exclude:schema", "Page"),
        ("empty:birthDate", "true"),
    ]);
    let filters = bool_part(&body)["filter"].as_array().unwrap();
    assert!(filters.contains(
        &json!({"bool": {"must_not": [{"term": {"schema": "Page"}}]}})
    ));
    assert!(filters.contains(
        &json!({"bool": {"must_not": [{"exists": {"field": "birthDate"}}]}})
    ));
}

#[test]
fn test_highlight_block() {
    let body = body(&[("q", "foo"), ("highlight", "true")]);
    let highlight = &body["highlight"];
    assert_eq!(highlight["encoder"], "html");
    assert_eq!(highlight["require_field_match"], false);
    for field in ["content", "name", "names", "text"] {
        assert!(highlight["fields"][field].is_object(), "missing {}", field);
    }
    // The user query drives the highlight.
    assert_eq!(
        highlight["fields"]["content"]["highlight_query"]["query_string"]["query"],
        "foo"
    );
}

#[test]
fn test_sort_clauses() {
    let body = body(&[("sort", "created_at:desc"), ("sort", "caption")]);
    assert_eq!(
        body["sort"],
        json!([
            {"created_at": {"order": "desc"}},
            {"caption": {"order": "asc"}},
        ])
    );
}

#[test]
fn test_idempotent_build() {
    let (settings, catalog) = fixtures();
    let params = QueryParams::new([
        ("q", "putin"),
        ("facet", "countries"),
        ("filter:schema", "Person"),
        ("highlight", "true"),
    ]);
    let parser = SearchQueryParser::parse(&params, None).unwrap();
    let first = EntitiesQuery::new(&settings, &catalog, &parser)
        .body()
        .unwrap();
    let second = EntitiesQuery::new(&settings, &catalog, &parser)
        .body()
        .unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_round_trip_parse_unparse() {
    let params = QueryParams::new([
        ("q", "putin"),
        ("filter:schema", "Person"),
        ("filter:gte:dates", "2020-01-01"),
        ("facet", "countries"),
        ("facet_size:countries", "50"),
        ("sort", "created_at:desc"),
        ("highlight", "true"),
    ]);
    let view = SearchQueryParser::parse(&params, None).unwrap();
    let restored =
        SearchQueryParser::parse(&QueryParams::new(view.unparse()), None).unwrap();
    assert_eq!(restored, view);
}
