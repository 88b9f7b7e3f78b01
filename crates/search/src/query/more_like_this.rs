//! Content similarity for documents and pages.

use serde_json::{json, Value};

use crate::entity::Entity;
use crate::error::{SearchError, SearchResult};
use crate::index::entities_read_index;
use crate::parse::SearchQueryParser;
use crate::schema::SchemaCatalog;
use crate::settings::Settings;

use super::base::QueryBuilder;
use super::util::{bool_query, schema_query};

/// Fields the similarity terms are drawn from.
const MLT_FIELDS: &[&str] = &["content", "text", "name", "names"];

/// Words shorter than this are stopword noise for similarity.
const MIN_WORD_LENGTH: u32 = 5;

/// Terms in more documents than this are too common to be a signal.
const MAX_DOC_FREQ: u32 = 500;

/// Finds documents and pages textually similar to a given document,
/// using the stored document by id as the like-text source.
pub struct MoreLikeThisQuery<'a> {
    settings: &'a Settings,
    catalog: &'a SchemaCatalog,
    parser: &'a SearchQueryParser,
    entity: &'a Entity,
}

impl<'a> MoreLikeThisQuery<'a> {
    /// Binds the query; fails before any cluster contact when the entity
    /// is not a document or has no id.
    pub fn new(
        settings: &'a Settings,
        catalog: &'a SchemaCatalog,
        parser: &'a SearchQueryParser,
        entity: &'a Entity,
    ) -> SearchResult<Self> {
        let schema = catalog.require(&entity.schema)?;
        if !schema.is_a("Document") {
            return Err(SearchError::schema(
                schema.name(),
                "more-like-this only works on documents",
            ));
        }
        if entity.id.is_empty() {
            return Err(SearchError::parameter("entity", "entity has no id"));
        }
        Ok(Self {
            settings,
            catalog,
            parser,
            entity,
        })
    }

    /// All concrete document and page schemata.
    fn document_schemata(&self) -> Vec<&str> {
        self.catalog
            .get("Document")
            .map(|schema| schema.descendants().collect())
            .unwrap_or_default()
    }
}

impl QueryBuilder for MoreLikeThisQuery<'_> {
    fn settings(&self) -> &Settings {
        self.settings
    }

    fn catalog(&self) -> &SchemaCatalog {
        self.catalog
    }

    fn parser(&self) -> &SearchQueryParser {
        self.parser
    }

    fn index(&self) -> SearchResult<String> {
        Ok(entities_read_index(
            self.settings,
            self.catalog,
            &["Document"],
            true,
        ))
    }

    fn inner_query(&self) -> SearchResult<Value> {
        let parser = self.parser;
        let mut query = bool_query();
        query["bool"]["must"]
            .as_array_mut()
            .expect("bool query has must")
            .push(json!({
                "more_like_this": {
                    "fields": MLT_FIELDS,
                    "like": [{"_id": self.entity.id}],
                    "min_term_freq": parser.mlt_min_term_freq,
                    "max_query_terms": parser.mlt_max_query_terms,
                    "min_doc_freq": parser.mlt_min_doc_freq,
                    "minimum_should_match": parser.mlt_minimum_should_match,
                    "min_word_length": MIN_WORD_LENGTH,
                    "max_doc_freq": MAX_DOC_FREQ,
                    "boost_terms": 1,
                }
            }));
        query["bool"]["must_not"]
            .as_array_mut()
            .expect("bool query has must_not")
            .push(json!({"ids": {"values": [self.entity.id]}}));
        query["bool"]["filter"]
            .as_array_mut()
            .expect("bool query has filter")
            .push(schema_query(self.catalog, &self.document_schemata()));
        Ok(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{QueryParams, SearchQueryParser};

    fn fixtures() -> (Settings, SchemaCatalog) {
        (Settings::from_env(), SchemaCatalog::default_model())
    }

    fn parse(pairs: &[(&str, &str)]) -> SearchQueryParser {
        SearchQueryParser::parse(&QueryParams::new(pairs.iter().copied()), None).unwrap()
    }

    #[test]
    fn test_targets_documents_and_pages() {
        let (settings, catalog) = fixtures();
        let view = parse(&[]);
        let entity = Entity::new("d1", "Document");
        let query = MoreLikeThisQuery::new(&settings, &catalog, &view, &entity).unwrap();
        let index = query.index().unwrap();
        assert!(index.contains("openaleph-entity-documents-v1"));
        assert!(index.contains("openaleph-entity-pages-v1"));
        assert!(!index.contains("things"));

        let inner = query.inner_query().unwrap();
        let schemata = inner["bool"]["filter"][0]["terms"]["schema"]
            .as_array()
            .unwrap();
        assert!(schemata.contains(&json!("Document")));
        assert!(schemata.contains(&json!("Page")));
        assert!(!schemata.contains(&json!("Person")));
    }

    #[test]
    fn test_mlt_clause() {
        let (settings, catalog) = fixtures();
        let view = parse(&[
            ("mlt_minimum_should_match", "20%"),
            ("mlt_max_query_terms", "50"),
        ]);
        let entity = Entity::new("d1", "Pages");
        let query = MoreLikeThisQuery::new(&settings, &catalog, &view, &entity).unwrap();
        let inner = query.inner_query().unwrap();
        let mlt = &inner["bool"]["must"][0]["more_like_this"];
        assert_eq!(mlt["like"], json!([{"_id": "d1"}]));
        assert_eq!(mlt["fields"], json!(["content", "text", "name", "names"]));
        assert_eq!(mlt["minimum_should_match"], "20%");
        assert_eq!(mlt["max_query_terms"], 50);
        assert_eq!(mlt["min_term_freq"], 1);
        assert_eq!(mlt["min_doc_freq"], 1);
        assert_eq!(mlt["min_word_length"], 5);

        assert_eq!(
            inner["bool"]["must_not"][0],
            json!({"ids": {"values": ["d1"]}})
        );
    }

    #[test]
    fn test_rejects_non_documents() {
        let (settings, catalog) = fixtures();
        let view = parse(&[]);
        let person = Entity::new("p1", "Person");
        assert!(matches!(
            MoreLikeThisQuery::new(&settings, &catalog, &view, &person),
            Err(SearchError::Schema { .. })
        ));
        let anonymous = Entity::new("", "Document");
        assert!(MoreLikeThisQuery::new(&settings, &catalog, &view, &anonymous).is_err());
    }
}
