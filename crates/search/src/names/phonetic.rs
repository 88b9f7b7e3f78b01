//! Phonetic name codes.

use std::collections::BTreeSet;

use rphonetic::{DoubleMetaphone, Encoder};

use crate::schema::Schema;

use super::{ascii_fold, tokenize_name};

/// Tokens shorter than this carry too little signal to encode.
const MIN_TOKEN_LENGTH: usize = 3;

/// Codes this short collide far too often to be useful.
const MIN_CODE_LENGTH: usize = 3;

/// Builds Double Metaphone codes for name tokens. Only tokens of at least
/// three alphabetic characters that fold to the modern Latin alphabet are
/// encoded; degenerate short codes are discarded.
pub fn phonetic_names<'a, I>(schema: Schema<'_>, names: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let encoder = DoubleMetaphone::default();
    let mut codes = BTreeSet::new();
    for name in names {
        for token in tokenize_name(schema, name) {
            if token.chars().count() < MIN_TOKEN_LENGTH {
                continue;
            }
            if !token.chars().all(char::is_alphabetic) {
                continue;
            }
            let Some(folded) = ascii_fold(&token) else {
                continue;
            };
            if !folded.chars().all(|c| c.is_ascii_alphabetic()) {
                continue;
            }
            let code = encoder.encode(&folded);
            if code.len() >= MIN_CODE_LENGTH {
                codes.insert(code);
            }
        }
    }
    codes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaCatalog;

    #[test]
    fn test_smith_smythe_share_code() {
        let catalog = SchemaCatalog::default_model();
        let person = catalog.get("Person").unwrap();
        let a = phonetic_names(person, ["Smith"]);
        let b = phonetic_names(person, ["Smythe"]);
        assert!(a.contains("SM0"));
        assert!(!a.is_disjoint(&b));
    }

    #[test]
    fn test_short_tokens_skipped() {
        let catalog = SchemaCatalog::default_model();
        let person = catalog.get("Person").unwrap();
        let codes = phonetic_names(person, ["Al B"]);
        assert!(codes.is_empty());
    }

    #[test]
    fn test_numeric_tokens_skipped() {
        let catalog = SchemaCatalog::default_model();
        let company = catalog.get("Company").unwrap();
        let codes = phonetic_names(company, ["4711 Holdings"]);
        assert!(!codes.is_empty());
        // Only "holdings" contributed.
        let digits = phonetic_names(company, ["4711"]);
        assert!(digits.is_empty());
    }

    #[test]
    fn test_transliterated_names_encode() {
        let catalog = SchemaCatalog::default_model();
        let person = catalog.get("Person").unwrap();
        // Cyrillic folds to Latin before encoding.
        let cyrillic = phonetic_names(person, ["Владимир"]);
        let latin = phonetic_names(person, ["Vladimir"]);
        assert_eq!(cyrillic, latin);
    }
}
