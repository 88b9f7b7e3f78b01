//! Schema-aware name tokenizing.

use unicode_segmentation::UnicodeSegmentation;

use crate::schema::Schema;

use super::preprocess;

/// Organization-type words replaced by their canonical long form, so
/// "Siemens Corp" and "Siemens Corporation" produce the same tokens.
const ORG_TYPES: &[(&str, &str)] = &[
    ("corp", "corporation"),
    ("inc", "incorporated"),
    ("incorp", "incorporated"),
    ("ltd", "limited"),
    ("co", "company"),
    ("intl", "international"),
    ("assn", "association"),
    ("org", "organization"),
    ("govt", "government"),
];

/// Honorifics and personal prefixes stripped from person names.
const PERSON_PREFIXES: &[&str] = &[
    "mr", "mrs", "ms", "miss", "dr", "prof", "sir", "dame", "lady", "lord", "herr", "frau",
    "mme", "mlle", "don", "dona", "sheikh", "rev",
];

/// Splits a name into tokens along Unicode word boundaries, applying
/// schema-specific rewrites first: organizations get their type words
/// canonicalized, persons get honorifics stripped.
pub fn tokenize_name(schema: Schema<'_>, name: &str) -> Vec<String> {
    let normalized = preprocess(name);
    let is_org = schema.is_a("Organization") || schema.is_a("PublicBody");
    let is_person = schema.is_a("Person");

    let mut tokens = Vec::new();
    for word in normalized.unicode_words() {
        if is_person && PERSON_PREFIXES.contains(&word) {
            continue;
        }
        if is_org {
            if let Some((_, canonical)) = ORG_TYPES.iter().find(|(short, _)| *short == word) {
                tokens.push((*canonical).to_string());
                continue;
            }
        }
        tokens.push(word.to_string());
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaCatalog;

    #[test]
    fn test_organization_types() {
        let catalog = SchemaCatalog::default_model();
        let company = catalog.get("Company").unwrap();
        assert_eq!(
            tokenize_name(company, "Siemens Corp."),
            vec!["siemens", "corporation"]
        );
        assert_eq!(
            tokenize_name(company, "ACME Ltd"),
            vec!["acme", "limited"]
        );
    }

    #[test]
    fn test_person_prefixes() {
        let catalog = SchemaCatalog::default_model();
        let person = catalog.get("Person").unwrap();
        assert_eq!(tokenize_name(person, "Dr. Jane Doe"), vec!["jane", "doe"]);
        assert_eq!(tokenize_name(person, "Mr John Smith"), vec!["john", "smith"]);
    }

    #[test]
    fn test_no_rewrites_for_other_schemata() {
        let catalog = SchemaCatalog::default_model();
        let thing = catalog.get("Document").unwrap();
        // "co" stays untouched outside organization schemata.
        assert_eq!(
            tokenize_name(thing, "Dr Report Co"),
            vec!["dr", "report", "co"]
        );
    }

    #[test]
    fn test_unicode_words() {
        let catalog = SchemaCatalog::default_model();
        let person = catalog.get("Person").unwrap();
        assert_eq!(
            tokenize_name(person, "Владимир Путин"),
            vec!["владимир", "путин"]
        );
    }
}
