//! Name processing.
//!
//! Produces the multiple name representations used for matching and for
//! index-time `copy_to`: normalized keywords, sorted keys, parts, phonetic
//! codes and cross-alphabet symbols. Everything here is pure.

mod keys;
mod phonetic;
mod pick;
mod symbols;
mod tokenize;

pub use keys::{index_name_keys, index_name_parts};
pub use phonetic::phonetic_names;
pub use pick::pick_names;
pub use symbols::{name_symbols, SymbolTable};
pub use tokenize::tokenize_name;

use unicode_normalization::UnicodeNormalization;

/// Normalizes a raw name: NFC, lowercase, collapsed whitespace.
pub fn preprocess(name: &str) -> String {
    let composed: String = name.nfc().collect();
    let lowered = composed.to_lowercase();
    lowered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Folds a string to ASCII. Returns None when nothing survives folding.
pub(crate) fn ascii_fold(value: &str) -> Option<String> {
    let folded = any_ascii::any_ascii(value).to_lowercase();
    let folded: String = folded
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_ascii_whitespace())
        .collect();
    let folded = folded.split_whitespace().collect::<Vec<_>>().join(" ");
    if folded.is_empty() {
        None
    } else {
        Some(folded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preprocess() {
        assert_eq!(preprocess("  Vladimir   PUTIN "), "vladimir putin");
        assert_eq!(preprocess("Jane\tDoe"), "jane doe");
        // NFC composes combining characters before lowercasing.
        assert_eq!(preprocess("Cafe\u{0301}"), "café");
    }

    #[test]
    fn test_ascii_fold() {
        assert_eq!(ascii_fold("Müller"), Some("muller".to_string()));
        assert_eq!(ascii_fold("Владимир"), Some("vladimir".to_string()));
        assert_eq!(ascii_fold("—"), None);
    }
}
