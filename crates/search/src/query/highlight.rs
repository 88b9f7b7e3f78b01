//! Result highlighting.
//!
//! Highlighter selection is field-specific: the content field uses the
//! fast vector highlighter when term vectors are indexed, names get the
//! unified highlighter, everything else the cheap plain highlighter.

use serde_json::{json, Map, Value};

use crate::parse::SearchQueryParser;
use crate::schema::TypeGroup;
use crate::settings::Settings;

/// Fields highlighted on entity results.
const HIGHLIGHT_FIELDS: &[&str] = &["content", "name", "names", "text"];

/// Builds the highlighter configuration for one field.
pub fn get_highlighter(
    settings: &Settings,
    field: &str,
    query: Option<&Value>,
    count: Option<u32>,
    max_offset: Option<u32>,
) -> Value {
    let number_of_fragments = count.unwrap_or(settings.highlighter_number_of_fragments);
    let max_analyzed_offset =
        max_offset.unwrap_or(settings.highlighter_max_analyzed_offset);

    let mut highlighter = if field == "content" {
        if settings.highlighter_fvh_enabled && settings.content_term_vectors {
            json!({
                "type": "fvh",
                "fragment_size": settings.highlighter_fragment_size,
                "number_of_fragments": number_of_fragments,
                "phrase_limit": settings.highlighter_phrase_limit,
                "order": "score",
                "boundary_scanner": "sentence",
                "boundary_max_scan": settings.highlighter_boundary_max_scan,
                "no_match_size": settings.highlighter_no_match_size,
                "max_analyzed_offset": max_analyzed_offset,
                "pre_tags": ["<em>"],
                "post_tags": ["</em>"],
            })
        } else {
            json!({
                "type": "unified",
                "fragment_size": settings.highlighter_fragment_size,
                "number_of_fragments": number_of_fragments,
                "order": "score",
                "boundary_scanner": "sentence",
                "boundary_max_scan": settings.highlighter_boundary_max_scan,
                "no_match_size": settings.highlighter_no_match_size,
                "max_analyzed_offset": max_analyzed_offset,
                "pre_tags": ["<em>"],
                "post_tags": ["</em>"],
            })
        }
    } else if field == "name" {
        json!({
            "type": "unified",
            "fragment_size": settings.highlighter_fragment_size,
            "number_of_fragments": number_of_fragments,
            "order": "score",
            "pre_tags": ["<em>"],
            "post_tags": ["</em>"],
        })
    } else {
        json!({
            "type": "plain",
            "fragment_size": settings.highlighter_fragment_size,
            "number_of_fragments": number_of_fragments,
            "order": "score",
            "max_analyzed_offset": max_analyzed_offset,
            "pre_tags": ["<em>"],
            "post_tags": ["</em>"],
        })
    };

    if let Some(query) = query {
        highlighter["highlight_query"] = query.clone();
    }
    highlighter
}

/// The highlight query: the user's query string, widened with the values
/// of group-field and name filters so filter-only requests still get
/// fragments.
fn highlight_query(parser: &SearchQueryParser, text_query: Option<&Value>) -> Option<Value> {
    let mut extra: Vec<Value> = Vec::new();
    for (field, values) in &parser.filters {
        let is_group = TypeGroup::group_fields().contains(&field.as_str());
        if !is_group && field != "name" {
            continue;
        }
        for value in values {
            extra.push(json!({
                "multi_match": {
                    "query": value,
                    "fields": ["content", "text", "name"],
                }
            }));
        }
    }
    match (text_query, extra.is_empty()) {
        (Some(query), true) => Some(query.clone()),
        (None, true) => None,
        (query, false) => {
            let mut should = extra;
            if let Some(query) = query {
                should.insert(0, query.clone());
            }
            Some(json!({"bool": {"should": should, "minimum_should_match": 1}}))
        }
    }
}

/// Builds the request's highlight block, or `None` when highlighting is
/// off.
pub fn build_highlight(
    settings: &Settings,
    parser: &SearchQueryParser,
    text_query: Option<&Value>,
) -> Option<Value> {
    if !parser.highlight {
        return None;
    }
    let query = highlight_query(parser, text_query);
    let mut fields = Map::new();
    for field in HIGHLIGHT_FIELDS {
        fields.insert(
            (*field).to_string(),
            get_highlighter(
                settings,
                field,
                query.as_ref(),
                parser.highlight_count,
                parser.max_highlight_analyzed_offset,
            ),
        );
    }
    Some(json!({
        "encoder": "html",
        "require_field_match": false,
        "order": "score",
        "fields": fields,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{QueryParams, SearchQueryParser};

    fn parser(pairs: &[(&str, &str)]) -> SearchQueryParser {
        SearchQueryParser::parse(&QueryParams::new(pairs.iter().copied()), None).unwrap()
    }

    #[test]
    fn test_field_highlighter_selection() {
        let settings = Settings::from_env();
        assert_eq!(
            get_highlighter(&settings, "content", None, None, None)["type"],
            "fvh"
        );
        assert_eq!(
            get_highlighter(&settings, "name", None, None, None)["type"],
            "unified"
        );
        assert_eq!(
            get_highlighter(&settings, "names", None, None, None)["type"],
            "plain"
        );
        assert_eq!(
            get_highlighter(&settings, "text", None, None, None)["type"],
            "plain"
        );
    }

    #[test]
    fn test_content_falls_back_to_unified() {
        let mut settings = Settings::from_env();
        settings.highlighter_fvh_enabled = false;
        assert_eq!(
            get_highlighter(&settings, "content", None, None, None)["type"],
            "unified"
        );

        settings.highlighter_fvh_enabled = true;
        settings.content_term_vectors = false;
        assert_eq!(
            get_highlighter(&settings, "content", None, None, None)["type"],
            "unified"
        );
    }

    #[test]
    fn test_highlight_disabled() {
        let settings = Settings::from_env();
        let view = parser(&[("q", "foo")]);
        assert!(build_highlight(&settings, &view, None).is_none());
    }

    #[test]
    fn test_highlight_block() {
        let settings = Settings::from_env();
        let view = parser(&[("q", "foo"), ("highlight", "true"), ("highlight_count", "5")]);
        let text_query = json!({"query_string": {"query": "foo"}});
        let block = build_highlight(&settings, &view, Some(&text_query)).unwrap();
        assert_eq!(block["encoder"], "html");
        assert_eq!(block["require_field_match"], false);
        let content = &block["fields"]["content"];
        assert_eq!(content["number_of_fragments"], 5);
        assert_eq!(content["highlight_query"], text_query);
    }

    #[test]
    fn test_filter_values_widen_highlight_query() {
        let settings = Settings::from_env();
        let view = parser(&[
            ("q", "foo"),
            ("highlight", "true"),
            ("filter:countries", "de"),
            ("filter:schema", "Person"),
        ]);
        let text_query = json!({"query_string": {"query": "foo"}});
        let block = build_highlight(&settings, &view, Some(&text_query)).unwrap();
        let query = &block["fields"]["content"]["highlight_query"];
        let should = query["bool"]["should"].as_array().unwrap();
        // The query string plus one multi_match for the group-field
        // filter; the schema filter is not a group field.
        assert_eq!(should.len(), 2);
        assert_eq!(should[1]["multi_match"]["query"], "de");
    }

    #[test]
    fn test_max_offset_override() {
        let settings = Settings::from_env();
        let view = parser(&[
            ("highlight", "true"),
            ("max_highlight_analyzed_offset", "1000"),
        ]);
        let block = build_highlight(&settings, &view, None).unwrap();
        assert_eq!(block["fields"]["content"]["max_analyzed_offset"], 1000);
    }
}
