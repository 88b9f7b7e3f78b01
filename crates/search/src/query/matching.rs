//! Entity-to-entity matching.

use serde_json::{json, Value};

use crate::entity::Entity;
use crate::error::{SearchError, SearchResult};
use crate::index::entities_read_index;
use crate::names::{
    index_name_keys, index_name_parts, name_symbols, phonetic_names, pick_names, SymbolTable,
};
use crate::parse::SearchQueryParser;
use crate::schema::{SchemaCatalog, TypeGroup};
use crate::settings::Settings;

use super::base::QueryBuilder;
use super::util::bool_query;

/// Hard ceiling on the number of scoring clauses in one match query.
pub const MAX_CLAUSES: usize = 500;

/// Names fed into the match block per entity.
const PICK_LIMIT: usize = 5;

/// Type groups scored in the should block, most specific first. Names
/// and identifiers have their own blocks; ungrouped types carry no
/// signal for matching.
const SCORING_GROUPS: &[TypeGroup] = &[
    TypeGroup::Checksum,
    TypeGroup::Phone,
    TypeGroup::Email,
    TypeGroup::Ip,
    TypeGroup::Url,
    TypeGroup::Address,
    TypeGroup::Date,
    TypeGroup::Entity,
    TypeGroup::Country,
    TypeGroup::Mimetype,
    TypeGroup::Gender,
    TypeGroup::Topic,
    TypeGroup::Language,
];

/// Groups whose values are specific enough to deserve a boost.
const BOOSTED_GROUPS: &[TypeGroup] = &[
    TypeGroup::Ip,
    TypeGroup::Url,
    TypeGroup::Email,
    TypeGroup::Phone,
];

/// Builds the match query for an entity: a name block over all name
/// representations, an identifier block, and specificity-ordered
/// property scoring, capped at [`MAX_CLAUSES`].
pub fn match_query(
    catalog: &SchemaCatalog,
    symbols: &SymbolTable,
    entity: &Entity,
) -> SearchResult<Value> {
    let schema = catalog.require(&entity.schema)?;
    if schema.matchable_schemata().next().is_none() {
        return Err(SearchError::schema(
            schema.name(),
            "schema is not matchable",
        ));
    }
    if entity.id.is_empty() {
        return Err(SearchError::parameter("entity", "entity has no id"));
    }

    let mut query = bool_query();
    let mut clause_count = 0usize;

    // Name block: every representation votes, one vote suffices.
    let names: Vec<String> = entity.names(schema).iter().map(|s| s.to_string()).collect();
    let mut name_clauses: Vec<Value> = Vec::new();
    for name in pick_names(&names, PICK_LIMIT) {
        name_clauses.push(json!({
            "match": {
                "names": {
                    "query": name,
                    "operator": "AND",
                    "fuzziness": "AUTO",
                    "boost": 3.0,
                }
            }
        }));
    }
    let name_refs: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
    for key in index_name_keys(schema, name_refs.iter().copied()) {
        name_clauses.push(json!({
            "term": {"name_keys": {"value": key, "boost": 4.0}}
        }));
    }
    for part in index_name_parts(schema, name_refs.iter().copied()) {
        name_clauses.push(json!({
            "term": {"name_parts": {"value": part, "boost": 1.0}}
        }));
    }
    for code in phonetic_names(schema, name_refs.iter().copied()) {
        name_clauses.push(json!({
            "term": {"name_phonetic": {"value": code, "boost": 0.8}}
        }));
    }
    for symbol in name_symbols(symbols, schema, name_refs.iter().copied()) {
        name_clauses.push(json!({"term": {"name_symbols": {"value": symbol}}}));
    }
    if !name_clauses.is_empty() {
        clause_count += name_clauses.len();
        query["bool"]["must"]
            .as_array_mut()
            .expect("bool query has must")
            .push(json!({
                "bool": {"should": name_clauses, "minimum_should_match": 1}
            }));
    }

    // Identifier block: strong evidence, but never required.
    let mut id_clauses: Vec<Value> = Vec::new();
    for (prop_name, values) in &entity.properties {
        let Some(prop) = schema.property(prop_name) else {
            continue;
        };
        if prop.group != TypeGroup::Identifier {
            continue;
        }
        for value in values {
            let field = format!("properties.{}", prop_name);
            id_clauses.push(json!({
                "term": {field: {"value": value, "boost": 3.0}}
            }));
        }
    }
    if !id_clauses.is_empty() {
        clause_count += id_clauses.len();
        query["bool"]["must"]
            .as_array_mut()
            .expect("bool query has must")
            .push(json!({
                "bool": {"should": id_clauses, "minimum_should_match": 0}
            }));
    }

    // Property scoring, most specific groups first, until the clause
    // budget runs out.
    {
        let should = query["bool"]["should"]
            .as_array_mut()
            .expect("bool query has should");
        'groups: for group in SCORING_GROUPS {
            let Some(field) = group.group_field() else {
                continue;
            };
            for value in entity.type_values(schema, *group) {
                if clause_count >= MAX_CLAUSES {
                    break 'groups;
                }
                let clause = if BOOSTED_GROUPS.contains(group) {
                    json!({"term": {field: {"value": value, "boost": 2.0}}})
                } else {
                    json!({"term": {field: value}})
                };
                should.push(clause);
                clause_count += 1;
            }
        }
    }

    // Never return the entity itself.
    query["bool"]["must_not"]
        .as_array_mut()
        .expect("bool query has must_not")
        .push(json!({"ids": {"values": [entity.id]}}));

    Ok(query)
}

/// Finds the entities most similar to a given entity.
pub struct MatchQuery<'a> {
    settings: &'a Settings,
    catalog: &'a SchemaCatalog,
    parser: &'a SearchQueryParser,
    symbols: &'a SymbolTable,
    entity: &'a Entity,
    exclude: Vec<String>,
}

impl<'a> MatchQuery<'a> {
    /// Binds a match query; fails before any cluster contact when the
    /// entity's schema is unknown or unmatchable.
    pub fn new(
        settings: &'a Settings,
        catalog: &'a SchemaCatalog,
        parser: &'a SearchQueryParser,
        symbols: &'a SymbolTable,
        entity: &'a Entity,
    ) -> SearchResult<Self> {
        let schema = catalog.require(&entity.schema)?;
        if schema.matchable_schemata().next().is_none() {
            return Err(SearchError::schema(
                schema.name(),
                "schema is not matchable",
            ));
        }
        Ok(Self {
            settings,
            catalog,
            parser,
            symbols,
            entity,
            exclude: Vec::new(),
        })
    }

    /// Additional entity ids excluded from the result, e.g. profile
    /// members already reviewed.
    pub fn with_excluded<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(ids.into_iter().map(Into::into));
        self
    }
}

impl QueryBuilder for MatchQuery<'_> {
    fn settings(&self) -> &Settings {
        self.settings
    }

    fn catalog(&self) -> &SchemaCatalog {
        self.catalog
    }

    fn parser(&self) -> &SearchQueryParser {
        self.parser
    }

    /// Matches are only sought within the matchable peers of the
    /// entity's schema. Real estate stays unmatchable: two plots with
    /// nearly the same name are still not the same plot.
    fn index(&self) -> SearchResult<String> {
        let schema = self.catalog.require(&self.entity.schema)?;
        let matchable: Vec<&str> = schema.matchable_schemata().collect();
        Ok(entities_read_index(
            self.settings,
            self.catalog,
            &matchable,
            true,
        ))
    }

    fn inner_query(&self) -> SearchResult<Value> {
        let mut query = match_query(self.catalog, self.symbols, self.entity)?;
        if !self.exclude.is_empty() {
            query["bool"]["must_not"]
                .as_array_mut()
                .expect("bool query has must_not")
                .push(json!({"ids": {"values": self.exclude}}));
        }
        Ok(query)
    }
}
