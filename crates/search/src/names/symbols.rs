//! Cross-alphabet name symbols.
//!
//! A symbol table maps name fragments to opaque numeric ids; synonyms and
//! transliterations of the same name share an id. The id inventory itself
//! is externally defined (Rigour Names); this module only consumes a
//! loaded table and renders matches as `[NAME:<id>]` tags.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::schema::Schema;

use super::{ascii_fold, preprocess, tokenize_name};

/// A loaded name-symbol dictionary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymbolTable {
    entries: HashMap<String, Vec<u64>>,
}

impl SymbolTable {
    /// An empty table; lookups never match.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from `(term, id)` pairs. Terms are normalized the
    /// same way lookups are.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: AsRef<str>,
    {
        let mut table = Self::new();
        for (term, id) in entries {
            table.insert(term.as_ref(), id);
        }
        table
    }

    /// Parses a table from JSON: a map of term to id list.
    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        let raw: HashMap<String, Vec<u64>> = serde_json::from_str(data)?;
        let mut table = Self::new();
        for (term, ids) in raw {
            for id in ids {
                table.insert(&term, id);
            }
        }
        Ok(table)
    }

    /// Registers a term under an id.
    pub fn insert(&mut self, term: &str, id: u64) {
        let key = preprocess(term);
        let ids = self.entries.entry(key).or_default();
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    /// Looks up the ids for a normalized term.
    pub fn lookup(&self, term: &str) -> &[u64] {
        self.entries
            .get(term)
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
    }

    /// Number of distinct terms in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no terms are loaded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Renders a symbol id as its indexed tag.
fn symbol_tag(id: u64) -> String {
    format!("[NAME:{}]", id)
}

/// Extracts symbolic tags for the given names: the full normalized name,
/// each token, and each token's ASCII folding are looked up, so
/// cross-alphabet synonyms collapse onto the same tag.
pub fn name_symbols<'a, I>(table: &SymbolTable, schema: Schema<'_>, names: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut symbols = BTreeSet::new();
    if table.is_empty() {
        return symbols;
    }
    for name in names {
        for id in table.lookup(&preprocess(name)) {
            symbols.insert(symbol_tag(*id));
        }
        for token in tokenize_name(schema, name) {
            for id in table.lookup(&token) {
                symbols.insert(symbol_tag(*id));
            }
            if let Some(folded) = ascii_fold(&token) {
                for id in table.lookup(&folded) {
                    symbols.insert(symbol_tag(*id));
                }
            }
        }
    }
    symbols
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaCatalog;

    fn table() -> SymbolTable {
        SymbolTable::from_entries([
            ("vladimir", 4112u64),
            ("владимир", 4112u64),
            ("putin", 90211u64),
            ("путин", 90211u64),
        ])
    }

    #[test]
    fn test_cross_alphabet_collapse() {
        let catalog = SchemaCatalog::default_model();
        let person = catalog.get("Person").unwrap();
        let table = table();
        let latin = name_symbols(&table, person, ["Vladimir Putin"]);
        let cyrillic = name_symbols(&table, person, ["Владимир Путин"]);
        assert_eq!(latin, cyrillic);
        assert!(latin.contains("[NAME:4112]"));
        assert!(latin.contains("[NAME:90211]"));
    }

    #[test]
    fn test_empty_table() {
        let catalog = SchemaCatalog::default_model();
        let person = catalog.get("Person").unwrap();
        let table = SymbolTable::new();
        assert!(name_symbols(&table, person, ["Vladimir Putin"]).is_empty());
    }

    #[test]
    fn test_json_round_trip() {
        let table = SymbolTable::from_json(r#"{"acme": [7, 8]}"#).unwrap();
        assert_eq!(table.lookup("acme"), &[7, 8]);
        assert_eq!(table.lookup("unknown"), &[] as &[u64]);
    }
}
