//! The shared request-body assembly behind all query flavors.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::error::{SearchError, SearchResult};
use crate::parse::SearchQueryParser;
use crate::schema::SchemaCatalog;
use crate::settings::Settings;

use super::facets::build_aggregations;
use super::highlight::build_highlight;
use super::util::{field_filter_query, range_filters, wrap_function_score};

/// Filters split into query context and post-filter context. Filters on
/// faceted fields apply after aggregation so facet buckets can reveal
/// the alternatives.
#[derive(Debug, Default)]
pub struct FilterSet {
    /// Clauses for the query's filter context.
    pub pre: Vec<Value>,
    /// Post-filter clauses, keyed by the filtered field.
    pub post: BTreeMap<String, Value>,
}

/// A query flavor: something that knows its target indices and its inner
/// query, and inherits body assembly, facets, highlighting and sorting.
pub trait QueryBuilder {
    /// The runtime configuration bound at construction.
    fn settings(&self) -> &Settings;

    /// The schema catalog bound at construction.
    fn catalog(&self) -> &SchemaCatalog;

    /// The parsed request.
    fn parser(&self) -> &SearchQueryParser;

    /// The comma-separated index expression this query targets.
    fn index(&self) -> SearchResult<String>;

    /// The query without its function_score wrapper.
    fn inner_query(&self) -> SearchResult<Value>;

    /// The text clause reused by the highlighter, if any.
    fn text_query(&self) -> Option<Value> {
        None
    }

    /// Splits the parser's filters into query and post-filter context
    /// and appends authorization scoping.
    fn filters(&self) -> SearchResult<FilterSet> {
        build_filters(self.settings(), self.parser())
    }

    /// The complete request body.
    fn body(&self) -> SearchResult<Value> {
        self.body_with_foreground(None)
    }

    /// The complete request body, with a foreground document count for
    /// random-sampler probability when the executor pre-counted.
    fn body_with_foreground(&self, foreground_count: Option<u64>) -> SearchResult<Value> {
        let settings = self.settings();
        let parser = self.parser();
        if settings.search_auth && parser.auth.is_none() {
            return Err(SearchError::Authorization(
                "authorization is enabled but no auth object was provided".to_string(),
            ));
        }

        let filter_set = self.filters()?;
        let mut query = self.inner_query()?;
        {
            let filter = query["bool"]["filter"]
                .as_array_mut()
                .ok_or_else(|| SearchError::parameter("q", "inner query is not a bool query"))?;
            filter.extend(filter_set.pre.iter().cloned());
        }

        let mut body = json!({
            "query": wrap_function_score(settings, query),
            "from": parser.offset,
            "size": parser.limit,
            "track_total_hits": true,
        });

        if !filter_set.post.is_empty() {
            let clauses: Vec<&Value> = filter_set.post.values().collect();
            body["post_filter"] = json!({"bool": {"filter": clauses}});
        }

        let aggs = build_aggregations(
            settings,
            self.catalog(),
            parser,
            &filter_set.post,
            foreground_count,
        );
        if !aggs.as_object().map(|m| m.is_empty()).unwrap_or(true) {
            body["aggs"] = aggs;
        }

        let text_query = self.text_query();
        if let Some(highlight) = build_highlight(settings, parser, text_query.as_ref()) {
            body["highlight"] = highlight;
        }

        let sort = build_sort(self.catalog(), parser);
        if !sort.as_array().map(|s| s.is_empty()).unwrap_or(true) {
            body["sort"] = sort;
        }

        Ok(body)
    }
}

/// Splits filters between query and post-filter context, renders ranges,
/// exclusions and empties, and appends the auth-field scope.
pub fn build_filters(
    settings: &Settings,
    parser: &SearchQueryParser,
) -> SearchResult<FilterSet> {
    let auth_field = settings.search_auth_field.as_str();
    let mut set = FilterSet::default();

    for (field, values) in &parser.filters {
        if field == auth_field {
            // Merged with the auth scope below.
            continue;
        }
        let clause = field_filter_query(field, values);
        if parser.is_facet(field) {
            set.post.insert(field.clone(), clause);
        } else {
            set.pre.push(clause);
        }
    }

    // The effective auth-field scope: user filters intersected with the
    // authorization. An empty set means no access at all.
    if let Some(datasets) = parser.active_datasets(auth_field) {
        if datasets.is_empty() {
            set.pre.push(json!({"match_none": {}}));
        } else {
            let values: Vec<String> = datasets.into_iter().collect();
            let clause = field_filter_query(auth_field, &values);
            if parser.is_facet(auth_field) {
                set.post.insert(auth_field.to_string(), clause);
            } else {
                set.pre.push(clause);
            }
        }
    }

    set.pre.extend(range_filters(&parser.ranges));

    for (field, values) in &parser.excludes {
        set.pre.push(json!({
            "bool": {"must_not": [field_filter_query(field, values)]}
        }));
    }

    for field in &parser.empties {
        set.pre.push(json!({
            "bool": {"must_not": [{"exists": {"field": field}}]}
        }));
    }

    Ok(set)
}

/// Sort clauses from the parser. Numeric and date properties sort on
/// their `numeric.*` duplicates; the dates group field does likewise.
pub fn build_sort(catalog: &SchemaCatalog, parser: &SearchQueryParser) -> Value {
    let mut clauses: Vec<Value> = Vec::new();
    for (field, direction) in &parser.sorts {
        let field = sort_field(catalog, field);
        clauses.push(json!({field: {"order": direction.to_string()}}));
    }
    Value::Array(clauses)
}

fn sort_field(catalog: &SchemaCatalog, field: &str) -> String {
    if field == "dates" {
        return "numeric.dates".to_string();
    }
    if let Some(prop_name) = field.strip_prefix("properties.") {
        let numeric = catalog.concrete().any(|schema| {
            schema
                .property(prop_name)
                .map(|prop| prop.group.is_numeric())
                .unwrap_or(false)
        });
        if numeric {
            return format!("numeric.{}", prop_name);
        }
    }
    field.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::QueryParams;

    fn parser(pairs: &[(&str, &str)]) -> SearchQueryParser {
        SearchQueryParser::parse(&QueryParams::new(pairs.iter().copied()), None).unwrap()
    }

    #[test]
    fn test_filters_split_on_facets() {
        let settings = Settings::from_env();
        let view = parser(&[
            ("filter:key1", "foo"),
            ("filter:key2", "blah"),
            ("filter:key2", "blahblah"),
            ("facet", "key2"),
        ]);
        let set = build_filters(&settings, &view).unwrap();
        assert_eq!(set.pre, vec![json!({"term": {"key1": "foo"}})]);
        assert_eq!(
            set.post["key2"],
            json!({"terms": {"key2": ["blah", "blahblah"]}})
        );
    }

    #[test]
    fn test_ranges_excludes_empties() {
        let settings = Settings::from_env();
        let view = parser(&[
            ("filter:gte:dates", "2020"),
            ("exclude:schema", "Page"),
            ("empty:birthDate", "true"),
        ]);
        let set = build_filters(&settings, &view).unwrap();
        assert!(set
            .pre
            .contains(&json!({"range": {"dates": {"gte": "2020"}}})));
        assert!(set.pre.contains(
            &json!({"bool": {"must_not": [{"term": {"schema": "Page"}}]}})
        ));
        assert!(set.pre.contains(
            &json!({"bool": {"must_not": [{"exists": {"field": "birthDate"}}]}})
        ));
    }

    #[test]
    fn test_auth_scope_intersection() {
        let settings = Settings::from_env();
        let params = QueryParams::new([
            ("filter:dataset", "a"),
            ("filter:dataset", "b"),
        ]);
        let auth = crate::parse::SearchAuth::for_datasets(["a"]);
        let view = SearchQueryParser::parse(&params, Some(auth)).unwrap();
        let set = build_filters(&settings, &view).unwrap();
        // Values outside the auth scope are dropped silently.
        assert_eq!(set.pre, vec![json!({"term": {"dataset": "a"}})]);
    }

    #[test]
    fn test_denied_auth_matches_nothing() {
        let settings = Settings::from_env();
        let view = SearchQueryParser::parse(
            &QueryParams::default(),
            Some(crate::parse::SearchAuth::default()),
        )
        .unwrap();
        let set = build_filters(&settings, &view).unwrap();
        assert_eq!(set.pre, vec![json!({"match_none": {}})]);
    }

    #[test]
    fn test_sort_numeric_preference() {
        let catalog = SchemaCatalog::default_model();
        let view = parser(&[
            ("sort", "properties.birthDate:desc"),
            ("sort", "dates"),
            ("sort", "caption:asc"),
        ]);
        let sort = build_sort(&catalog, &view);
        assert_eq!(
            sort,
            json!([
                {"numeric.birthDate": {"order": "desc"}},
                {"numeric.dates": {"order": "asc"}},
                {"caption": {"order": "asc"}},
            ])
        );
    }
}
