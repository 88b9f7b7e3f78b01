//! The typed view over request parameters.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{SearchError, SearchResult};
use crate::settings::MAX_PAGE;

use super::auth::SearchAuth;
use super::params::QueryParams;

/// Default page size.
pub const DEFAULT_LIMIT: usize = 20;

/// Default facet bucket count.
pub const DEFAULT_FACET_SIZE: u32 = 20;

/// Default bucket count for significant terms and text.
pub const DEFAULT_SIGNIFICANT_SIZE: u32 = 10;

/// Maximum number of values still passed as a shard routing hint.
pub const MAX_ROUTING_KEYS: usize = 5;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Asc => write!(f, "asc"),
            Direction::Desc => write!(f, "desc"),
        }
    }
}

/// Range filter operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeOp {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl RangeOp {
    /// The operator's name in the query grammar and the range clause.
    pub fn as_str(&self) -> &'static str {
        match self {
            RangeOp::Gt => "gt",
            RangeOp::Gte => "gte",
            RangeOp::Lt => "lt",
            RangeOp::Lte => "lte",
        }
    }
}

impl FromStr for RangeOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gt" => Ok(RangeOp::Gt),
            "gte" => Ok(RangeOp::Gte),
            "lt" => Ok(RangeOp::Lt),
            "lte" => Ok(RangeOp::Lte),
            _ => Err(format!("unknown range operator: {}", s)),
        }
    }
}

/// A single range condition on a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeFilter {
    pub field: String,
    pub op: RangeOp,
    pub value: String,
}

/// Configuration of one regular facet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetConfig {
    pub field: String,
    /// Bucket count.
    pub size: u32,
    /// Also compute the distinct-value cardinality.
    pub total: bool,
    /// Return bucket values (reserved for result shaping).
    pub values: bool,
    /// Facet type hint from the caller.
    pub type_: Option<String>,
    /// Date histogram interval; only honored on date fields.
    pub interval: Option<String>,
}

/// Configuration of one significant-terms facet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignificantConfig {
    pub field: String,
    pub size: u32,
    pub total: bool,
    pub values: bool,
    pub type_: Option<String>,
}

/// Configuration of the significant-text aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignificantTextConfig {
    pub field: String,
    pub size: u32,
    pub min_doc_count: Option<u32>,
    pub shard_size: Option<u32>,
}

/// The parsed, typed request. All query builders consume this view; the
/// raw parameter list is gone after parsing and unknown keys with it.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQueryParser {
    pub text: Option<String>,
    pub prefix: Option<String>,
    pub offset: usize,
    pub limit: usize,
    pub next_limit: usize,
    pub sorts: Vec<(String, Direction)>,
    pub filters: BTreeMap<String, Vec<String>>,
    pub excludes: BTreeMap<String, Vec<String>>,
    pub empties: BTreeSet<String>,
    pub ranges: Vec<RangeFilter>,
    pub facets: Vec<FacetConfig>,
    pub significant: Vec<SignificantConfig>,
    pub significant_text: Option<SignificantTextConfig>,
    pub highlight: bool,
    pub highlight_count: Option<u32>,
    pub max_highlight_analyzed_offset: Option<u32>,
    pub mlt_min_doc_freq: u32,
    pub mlt_min_term_freq: u32,
    pub mlt_max_query_terms: u32,
    pub mlt_minimum_should_match: String,
    pub dehydrate: bool,
    pub auth: Option<SearchAuth>,
}

impl SearchQueryParser {
    /// Parses ordered pairs into the typed view. Unknown keys are
    /// ignored; malformed values and out-of-range paging are parameter
    /// errors.
    pub fn parse(params: &QueryParams, auth: Option<SearchAuth>) -> SearchResult<Self> {
        let text = params.get("q").filter(|v| !v.is_empty()).map(String::from);
        let prefix = params
            .get("prefix")
            .filter(|v| !v.is_empty())
            .map(String::from);

        let offset = match params.get_int("offset")? {
            Some(v) if v < 0 => {
                return Err(SearchError::parameter("offset", "must not be negative"))
            }
            Some(v) => v as usize,
            None => 0,
        };
        let limit = match params.get_int("limit")? {
            Some(v) if v < 0 => {
                return Err(SearchError::parameter("limit", "must not be negative"))
            }
            Some(v) => v as usize,
            None => DEFAULT_LIMIT,
        };
        if offset + limit > MAX_PAGE {
            return Err(SearchError::parameter(
                "limit",
                format!("offset + limit must not exceed {}", MAX_PAGE),
            ));
        }
        let next_limit = match params.get_int("next_limit")? {
            Some(v) if v < 0 => {
                return Err(SearchError::parameter("next_limit", "must not be negative"))
            }
            Some(v) => v as usize,
            None => limit,
        };

        let mut sorts = Vec::new();
        for raw in params.getlist("sort") {
            sorts.push(parse_sort(raw));
        }

        let mut filters: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut ranges = Vec::new();
        for (suffix, value) in params.get_prefixed("filter:") {
            match suffix.split_once(':') {
                Some((op, field)) => {
                    let op: RangeOp = op
                        .parse()
                        .map_err(|e: String| SearchError::parameter(format!("filter:{}", suffix), e))?;
                    ranges.push(RangeFilter {
                        field: field.to_string(),
                        op,
                        value: value.to_string(),
                    });
                }
                None => {
                    filters
                        .entry(suffix.to_string())
                        .or_default()
                        .push(value.to_string());
                }
            }
        }

        let mut excludes: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (field, value) in params.get_prefixed("exclude:") {
            excludes
                .entry(field.to_string())
                .or_default()
                .push(value.to_string());
        }

        let mut empties = BTreeSet::new();
        for (field, _) in params.get_prefixed("empty:") {
            if params.get_bool(&format!("empty:{}", field), false)? {
                empties.insert(field.to_string());
            }
        }

        let mut facets = Vec::new();
        for field in dedup(params.getlist("facet")) {
            facets.push(FacetConfig {
                size: get_u32(params, &format!("facet_size:{}", field))?
                    .unwrap_or(DEFAULT_FACET_SIZE),
                total: params.get_bool(&format!("facet_total:{}", field), false)?,
                values: params.get_bool(&format!("facet_values:{}", field), false)?,
                type_: params.get(&format!("facet_type:{}", field)).map(String::from),
                interval: params
                    .get(&format!("facet_interval:{}", field))
                    .map(String::from),
                field,
            });
        }

        let mut significant = Vec::new();
        for field in dedup(params.getlist("facet_significant")) {
            significant.push(SignificantConfig {
                size: get_u32(params, &format!("facet_significant_size:{}", field))?
                    .unwrap_or(DEFAULT_SIGNIFICANT_SIZE),
                total: params.get_bool(&format!("facet_significant_total:{}", field), false)?,
                values: params.get_bool(&format!("facet_significant_values:{}", field), false)?,
                type_: params
                    .get(&format!("facet_significant_type:{}", field))
                    .map(String::from),
                field,
            });
        }

        let significant_text = match params.get("facet_significant_text") {
            None => None,
            Some(raw) => Some(SignificantTextConfig {
                field: if raw.is_empty() {
                    "content".to_string()
                } else {
                    raw.to_string()
                },
                size: get_u32(params, "facet_significant_text_size")?
                    .unwrap_or(DEFAULT_SIGNIFICANT_SIZE),
                min_doc_count: get_u32(params, "facet_significant_text_min_doc_count")?,
                shard_size: get_u32(params, "facet_significant_text_shard_size")?,
            }),
        };

        Ok(Self {
            text,
            prefix,
            offset,
            limit,
            next_limit,
            sorts,
            filters,
            excludes,
            empties,
            ranges,
            facets,
            significant,
            significant_text,
            highlight: params.get_bool("highlight", false)?,
            highlight_count: get_u32(params, "highlight_count")?,
            max_highlight_analyzed_offset: get_u32(params, "max_highlight_analyzed_offset")?,
            mlt_min_doc_freq: get_u32(params, "mlt_min_doc_freq")?.unwrap_or(1),
            mlt_min_term_freq: get_u32(params, "mlt_min_term_freq")?.unwrap_or(1),
            mlt_max_query_terms: get_u32(params, "mlt_max_query_terms")?.unwrap_or(200),
            mlt_minimum_should_match: params
                .get("mlt_minimum_should_match")
                .unwrap_or("10%")
                .to_string(),
            dehydrate: params.get_bool("dehydrate", false)?,
            auth,
        })
    }

    /// An empty view with defaults, for programmatic construction.
    pub fn empty(auth: Option<SearchAuth>) -> Self {
        Self::parse(&QueryParams::default(), auth).expect("empty parameters must parse")
    }

    /// The page number implied by offset and limit.
    pub fn page(&self) -> usize {
        if self.limit == 0 {
            0
        } else {
            self.offset / self.limit
        }
    }

    /// Values of a plain filter field.
    pub fn filter_values(&self, field: &str) -> &[String] {
        self.filters.get(field).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Whether the given field is being faceted.
    pub fn is_facet(&self, field: &str) -> bool {
        self.facets.iter().any(|f| f.field == field)
    }

    /// The effective value set on the auth field: user filter values
    /// intersected with the auth scope. Values outside the scope are
    /// silently dropped. `None` means unrestricted; an empty set means no
    /// access at all.
    pub fn active_datasets(&self, auth_field: &str) -> Option<BTreeSet<String>> {
        let user: BTreeSet<String> = self
            .filter_values(auth_field)
            .iter()
            .cloned()
            .collect();
        match &self.auth {
            None => (!user.is_empty()).then_some(user),
            Some(auth) if auth.is_admin => (!user.is_empty()).then_some(user),
            Some(auth) => match auth.allowed(auth_field) {
                None => Some(BTreeSet::new()),
                Some(allowed) if user.is_empty() => Some(allowed.clone()),
                Some(allowed) => Some(user.intersection(allowed).cloned().collect()),
            },
        }
    }

    /// The shard routing hint: the active value set on the auth field,
    /// when it is small enough to be worth routing.
    pub fn routing_key(&self, auth_field: &str) -> Option<String> {
        let datasets = self.active_datasets(auth_field)?;
        if datasets.is_empty() || datasets.len() > MAX_ROUTING_KEYS {
            return None;
        }
        Some(datasets.into_iter().collect::<Vec<_>>().join(","))
    }

    /// Restores a canonical parameter list. `parse(unparse(v))` yields a
    /// view equal to `v`.
    pub fn unparse(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = Vec::new();
        let mut push = |k: &str, v: String| pairs.push((k.to_string(), v));

        if let Some(text) = &self.text {
            push("q", text.clone());
        }
        if let Some(prefix) = &self.prefix {
            push("prefix", prefix.clone());
        }
        if self.offset != 0 {
            push("offset", self.offset.to_string());
        }
        if self.limit != DEFAULT_LIMIT {
            push("limit", self.limit.to_string());
        }
        if self.next_limit != self.limit {
            push("next_limit", self.next_limit.to_string());
        }
        for (field, direction) in &self.sorts {
            push("sort", format!("{}:{}", field, direction));
        }
        for (field, values) in &self.filters {
            for value in values {
                push(&format!("filter:{}", field), value.clone());
            }
        }
        for range in &self.ranges {
            push(
                &format!("filter:{}:{}", range.op.as_str(), range.field),
                range.value.clone(),
            );
        }
        for (field, values) in &self.excludes {
            for value in values {
                push(&format!("exclude:{}", field), value.clone());
            }
        }
        for field in &self.empties {
            push(&format!("empty:{}", field), "true".to_string());
        }
        for facet in &self.facets {
            push("facet", facet.field.clone());
            if facet.size != DEFAULT_FACET_SIZE {
                push(&format!("facet_size:{}", facet.field), facet.size.to_string());
            }
            if facet.total {
                push(&format!("facet_total:{}", facet.field), "true".to_string());
            }
            if facet.values {
                push(&format!("facet_values:{}", facet.field), "true".to_string());
            }
            if let Some(type_) = &facet.type_ {
                push(&format!("facet_type:{}", facet.field), type_.clone());
            }
            if let Some(interval) = &facet.interval {
                push(&format!("facet_interval:{}", facet.field), interval.clone());
            }
        }
        for sig in &self.significant {
            push("facet_significant", sig.field.clone());
            if sig.size != DEFAULT_SIGNIFICANT_SIZE {
                push(
                    &format!("facet_significant_size:{}", sig.field),
                    sig.size.to_string(),
                );
            }
            if sig.total {
                push(
                    &format!("facet_significant_total:{}", sig.field),
                    "true".to_string(),
                );
            }
            if sig.values {
                push(
                    &format!("facet_significant_values:{}", sig.field),
                    "true".to_string(),
                );
            }
            if let Some(type_) = &sig.type_ {
                push(&format!("facet_significant_type:{}", sig.field), type_.clone());
            }
        }
        if let Some(text) = &self.significant_text {
            push("facet_significant_text", text.field.clone());
            if text.size != DEFAULT_SIGNIFICANT_SIZE {
                push("facet_significant_text_size", text.size.to_string());
            }
            if let Some(v) = text.min_doc_count {
                push("facet_significant_text_min_doc_count", v.to_string());
            }
            if let Some(v) = text.shard_size {
                push("facet_significant_text_shard_size", v.to_string());
            }
        }
        if self.highlight {
            push("highlight", "true".to_string());
        }
        if let Some(v) = self.highlight_count {
            push("highlight_count", v.to_string());
        }
        if let Some(v) = self.max_highlight_analyzed_offset {
            push("max_highlight_analyzed_offset", v.to_string());
        }
        if self.mlt_min_doc_freq != 1 {
            push("mlt_min_doc_freq", self.mlt_min_doc_freq.to_string());
        }
        if self.mlt_min_term_freq != 1 {
            push("mlt_min_term_freq", self.mlt_min_term_freq.to_string());
        }
        if self.mlt_max_query_terms != 200 {
            push("mlt_max_query_terms", self.mlt_max_query_terms.to_string());
        }
        if self.mlt_minimum_should_match != "10%" {
            push(
                "mlt_minimum_should_match",
                self.mlt_minimum_should_match.clone(),
            );
        }
        if self.dehydrate {
            push("dehydrate", "true".to_string());
        }
        pairs
    }
}

fn parse_sort(raw: &str) -> (String, Direction) {
    match raw.rsplit_once(':') {
        Some((field, "desc")) => (field.to_string(), Direction::Desc),
        Some((field, "asc")) => (field.to_string(), Direction::Asc),
        _ => (raw.to_string(), Direction::Asc),
    }
}

fn dedup(values: Vec<&str>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    values
        .into_iter()
        .filter(|v| !v.is_empty() && seen.insert(v.to_string()))
        .map(String::from)
        .collect()
}

fn get_u32(params: &QueryParams, key: &str) -> SearchResult<Option<u32>> {
    match params.get_int(key)? {
        None => Ok(None),
        Some(v) if v < 0 => Err(SearchError::parameter(key, "must not be negative")),
        Some(v) => Ok(Some(v as u32)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(pairs: &[(&str, &str)]) -> SearchQueryParser {
        let params = QueryParams::new(pairs.iter().copied());
        SearchQueryParser::parse(&params, None).unwrap()
    }

    #[test]
    fn test_defaults() {
        let view = parse(&[]);
        assert_eq!(view.offset, 0);
        assert_eq!(view.limit, DEFAULT_LIMIT);
        assert_eq!(view.next_limit, DEFAULT_LIMIT);
        assert!(view.text.is_none());
        assert!(!view.highlight);
        assert_eq!(view.mlt_minimum_should_match, "10%");
    }

    #[test]
    fn test_filters_and_ranges() {
        let view = parse(&[
            ("filter:key1", "foo"),
            ("filter:key1", "bar"),
            ("filter:key2", "blah"),
            ("filter:gte:date", "2018"),
        ]);
        assert_eq!(view.filter_values("key1"), ["foo", "bar"]);
        assert_eq!(view.filter_values("key2"), ["blah"]);
        assert_eq!(
            view.ranges,
            vec![RangeFilter {
                field: "date".to_string(),
                op: RangeOp::Gte,
                value: "2018".to_string(),
            }]
        );
    }

    #[test]
    fn test_unknown_operator() {
        let params = QueryParams::new([("filter:almost:date", "2018")]);
        assert!(matches!(
            SearchQueryParser::parse(&params, None),
            Err(SearchError::Parameter { .. })
        ));
    }

    #[test]
    fn test_paging_bounds() {
        let params = QueryParams::new([("offset", "9990"), ("limit", "100")]);
        assert!(SearchQueryParser::parse(&params, None).is_err());

        let view = parse(&[("offset", "40"), ("limit", "20")]);
        assert_eq!(view.page(), 2);
    }

    #[test]
    fn test_facets() {
        let view = parse(&[
            ("facet", "countries"),
            ("facet_size:countries", "50"),
            ("facet_total:countries", "true"),
            ("facet", "dataset"),
            ("facet", "countries"),
        ]);
        assert_eq!(view.facets.len(), 2);
        let countries = &view.facets[0];
        assert_eq!(countries.field, "countries");
        assert_eq!(countries.size, 50);
        assert!(countries.total);
        assert_eq!(view.facets[1].size, DEFAULT_FACET_SIZE);
        assert!(view.is_facet("dataset"));
        assert!(!view.is_facet("languages"));
    }

    #[test]
    fn test_significant_text_default_field() {
        let view = parse(&[("facet_significant_text", "")]);
        assert_eq!(view.significant_text.as_ref().unwrap().field, "content");
        let view = parse(&[("facet_significant_text", "text")]);
        assert_eq!(view.significant_text.as_ref().unwrap().field, "text");
    }

    #[test]
    fn test_sort_parsing() {
        let view = parse(&[("sort", "created_at:desc"), ("sort", "caption")]);
        assert_eq!(
            view.sorts,
            vec![
                ("created_at".to_string(), Direction::Desc),
                ("caption".to_string(), Direction::Asc),
            ]
        );
    }

    #[test]
    fn test_empties() {
        let view = parse(&[("empty:birthDate", "true"), ("empty:gender", "false")]);
        assert!(view.empties.contains("birthDate"));
        assert!(!view.empties.contains("gender"));
    }

    #[test]
    fn test_active_datasets_without_auth() {
        let view = parse(&[("filter:dataset", "a"), ("filter:dataset", "b")]);
        let datasets = view.active_datasets("dataset").unwrap();
        assert_eq!(datasets.len(), 2);

        let unrestricted = parse(&[]);
        assert!(unrestricted.active_datasets("dataset").is_none());
    }

    #[test]
    fn test_active_datasets_intersects_auth() {
        let params = QueryParams::new([("filter:dataset", "a"), ("filter:dataset", "b")]);
        let auth = SearchAuth::for_datasets(["a"]);
        let view = SearchQueryParser::parse(&params, Some(auth)).unwrap();
        let datasets = view.active_datasets("dataset").unwrap();
        // Values outside the auth scope are dropped, not rejected.
        assert_eq!(datasets.into_iter().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn test_routing_key() {
        let view = parse(&[("filter:dataset", "a")]);
        assert_eq!(view.routing_key("dataset").as_deref(), Some("a"));

        let many: Vec<(String, String)> = (0..10)
            .map(|i| ("filter:dataset".to_string(), format!("ds{}", i)))
            .collect();
        let params = QueryParams::new(many);
        let view = SearchQueryParser::parse(&params, None).unwrap();
        assert!(view.routing_key("dataset").is_none());
    }

    #[test]
    fn test_unparse_round_trip() {
        let view = parse(&[
            ("q", "putin"),
            ("prefix", "vla"),
            ("offset", "40"),
            ("limit", "10"),
            ("sort", "created_at:desc"),
            ("filter:schema", "Person"),
            ("filter:countries", "ru"),
            ("filter:gte:dates", "2020-01-01"),
            ("exclude:schema", "Page"),
            ("empty:birthDate", "true"),
            ("facet", "countries"),
            ("facet_size:countries", "50"),
            ("facet_total:countries", "true"),
            ("facet", "dataset"),
            ("facet_interval:dates", "month"),
            ("facet", "dates"),
            ("facet_significant", "names"),
            ("facet_significant_text", "content"),
            ("highlight", "true"),
            ("highlight_count", "5"),
            ("mlt_minimum_should_match", "20%"),
            ("dehydrate", "true"),
        ]);
        let pairs = view.unparse();
        let reparsed =
            SearchQueryParser::parse(&QueryParams::new(pairs), None).unwrap();
        assert_eq!(reparsed, view);
    }
}
