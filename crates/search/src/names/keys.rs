//! Sorted name keys and name parts.

use std::collections::BTreeSet;

use crate::schema::Schema;

use super::{ascii_fold, tokenize_name};

/// Minimum length for a sorted name key to be indexed.
const MIN_KEY_LENGTH: usize = 5;

/// Minimum length for a single name part.
const MIN_PART_LENGTH: usize = 2;

/// Builds order-insensitive name keys: per name, ASCII-fold all tokens,
/// sort them and concatenate without separators. Case changes and
/// foldable diacritics never change the key.
pub fn index_name_keys<'a, I>(schema: Schema<'_>, names: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut keys = BTreeSet::new();
    for name in names {
        let mut tokens: Vec<String> = tokenize_name(schema, name)
            .iter()
            .filter_map(|t| ascii_fold(t))
            .collect();
        if tokens.is_empty() {
            continue;
        }
        tokens.sort();
        let key = tokens.concat();
        if key.len() >= MIN_KEY_LENGTH {
            keys.insert(key);
        }
    }
    keys
}

/// Builds the set of individual name tokens, including ASCII-folded
/// variants, dropping short fragments.
pub fn index_name_parts<'a, I>(schema: Schema<'_>, names: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut parts = BTreeSet::new();
    for name in names {
        for token in tokenize_name(schema, name) {
            if token.chars().count() >= MIN_PART_LENGTH {
                if let Some(folded) = ascii_fold(&token) {
                    if folded.chars().count() >= MIN_PART_LENGTH {
                        parts.insert(folded);
                    }
                }
                parts.insert(token);
            }
        }
    }
    parts
}
