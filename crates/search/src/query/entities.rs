//! Full-text entity search.

use serde_json::{json, Value};

use crate::error::SearchResult;
use crate::index::entities_read_index;
use crate::parse::SearchQueryParser;
use crate::schema::SchemaCatalog;
use crate::settings::Settings;

use super::base::QueryBuilder;
use super::util::bool_query;

/// Fields targeted by the user's query string, names weighted up.
const TEXT_FIELDS: &[&str] = &["names^3", "name_parts^2", "content", "text"];

/// Faceted full-text search over entities.
pub struct EntitiesQuery<'a> {
    settings: &'a Settings,
    catalog: &'a SchemaCatalog,
    parser: &'a SearchQueryParser,
}

impl<'a> EntitiesQuery<'a> {
    /// Binds a query to its configuration and request.
    pub fn new(
        settings: &'a Settings,
        catalog: &'a SchemaCatalog,
        parser: &'a SearchQueryParser,
    ) -> Self {
        Self {
            settings,
            catalog,
            parser,
        }
    }
}

impl QueryBuilder for EntitiesQuery<'_> {
    fn settings(&self) -> &Settings {
        self.settings
    }

    fn catalog(&self) -> &SchemaCatalog {
        self.catalog
    }

    fn parser(&self) -> &SearchQueryParser {
        self.parser
    }

    /// A schema filter narrows the indices without descendant expansion;
    /// a schemata filter expands; otherwise everything under Thing.
    fn index(&self) -> SearchResult<String> {
        let schema = self.parser.filter_values("schema");
        if !schema.is_empty() {
            return Ok(entities_read_index(
                self.settings,
                self.catalog,
                schema,
                false,
            ));
        }
        let schemata = self.parser.filter_values("schemata");
        let scope: Vec<&str> = if schemata.is_empty() {
            vec!["Thing"]
        } else {
            schemata.iter().map(|s| s.as_str()).collect()
        };
        Ok(entities_read_index(self.settings, self.catalog, &scope, true))
    }

    fn text_query(&self) -> Option<Value> {
        self.parser.text.as_ref().map(|text| {
            json!({
                "query_string": {
                    "query": text,
                    "lenient": true,
                    "fields": TEXT_FIELDS,
                    "default_operator": "AND",
                }
            })
        })
    }

    fn inner_query(&self) -> SearchResult<Value> {
        let mut query = bool_query();
        match self.text_query() {
            Some(text) => query["bool"]["must"]
                .as_array_mut()
                .expect("bool query has must")
                .push(text),
            None => query["bool"]["must"]
                .as_array_mut()
                .expect("bool query has must")
                .push(json!({"match_all": {}})),
        }
        if let Some(prefix) = &self.parser.prefix {
            query["bool"]["should"]
                .as_array_mut()
                .expect("bool query has should")
                .push(json!({"prefix": {"name": prefix}}));
        }
        Ok(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::QueryParams;

    fn fixtures() -> (Settings, SchemaCatalog) {
        (Settings::from_env(), SchemaCatalog::default_model())
    }

    fn parse(pairs: &[(&str, &str)]) -> SearchQueryParser {
        SearchQueryParser::parse(&QueryParams::new(pairs.iter().copied()), None).unwrap()
    }

    #[test]
    fn test_match_all_without_text() {
        let (settings, catalog) = fixtures();
        let view = parse(&[]);
        let query = EntitiesQuery::new(&settings, &catalog, &view);
        let inner = query.inner_query().unwrap();
        assert_eq!(inner["bool"]["must"], json!([{"match_all": {}}]));
    }

    #[test]
    fn test_query_string() {
        let (settings, catalog) = fixtures();
        let view = parse(&[("q", "search text")]);
        let query = EntitiesQuery::new(&settings, &catalog, &view);
        let inner = query.inner_query().unwrap();
        let qs = &inner["bool"]["must"][0]["query_string"];
        assert_eq!(qs["query"], "search text");
        assert_eq!(qs["default_operator"], "AND");
        assert_eq!(qs["lenient"], true);
    }

    #[test]
    fn test_prefix_clause() {
        let (settings, catalog) = fixtures();
        let view = parse(&[("prefix", "tex")]);
        let query = EntitiesQuery::new(&settings, &catalog, &view);
        let inner = query.inner_query().unwrap();
        assert_eq!(inner["bool"]["should"][0], json!({"prefix": {"name": "tex"}}));
    }

    #[test]
    fn test_index_selection() {
        let (settings, catalog) = fixtures();

        // schema filter: no expansion.
        let view = parse(&[("filter:schema", "Person")]);
        let query = EntitiesQuery::new(&settings, &catalog, &view);
        assert_eq!(query.index().unwrap(), "openaleph-entity-things-v1");

        // default: everything under Thing.
        let view = parse(&[]);
        let query = EntitiesQuery::new(&settings, &catalog, &view);
        let index = query.index().unwrap();
        assert!(index.contains("openaleph-entity-things-v1"));
        assert!(index.contains("openaleph-entity-documents-v1"));
        assert!(index.contains("openaleph-entity-pages-v1"));
    }

    #[test]
    fn test_body_assembly() {
        let (settings, catalog) = fixtures();
        let view = parse(&[
            ("q", "putin"),
            ("filter:countries", "ru"),
            ("offset", "10"),
            ("limit", "100"),
        ]);
        let query = EntitiesQuery::new(&settings, &catalog, &view);
        let body = query.body().unwrap();
        assert_eq!(body["from"], 10);
        assert_eq!(body["size"], 100);
        assert_eq!(body["track_total_hits"], true);
        // function_score wrapping is on by default.
        let bool_part = &body["query"]["function_score"]["query"]["bool"];
        assert_eq!(bool_part["filter"][0], json!({"term": {"countries": "ru"}}));
    }

    #[test]
    fn test_facet_isolation_in_body() {
        let (settings, catalog) = fixtures();
        let view = parse(&[
            ("filter:dataset", "a"),
            ("filter:dataset", "b"),
            ("facet", "dataset"),
        ]);
        let query = EntitiesQuery::new(&settings, &catalog, &view);
        let body = query.body().unwrap();
        // The dataset filter moved to the post_filter.
        assert_eq!(
            body["post_filter"]["bool"]["filter"][0],
            json!({"terms": {"dataset": ["a", "b"]}})
        );
        // Its facet is isolated from its own filter.
        let isolation = body["aggs"]["dataset.filtered"]["filter"]["bool"]["filter"]
            .as_array()
            .unwrap();
        assert!(isolation.is_empty());
    }

    #[test]
    fn test_function_score_disabled() {
        let (mut settings, catalog) = fixtures();
        settings.query_function_score = false;
        let view = parse(&[("q", "x")]);
        let query = EntitiesQuery::new(&settings, &catalog, &view);
        let body = query.body().unwrap();
        assert!(body["query"].get("function_score").is_none());
        assert!(body["query"]["bool"].is_object());
    }
}
