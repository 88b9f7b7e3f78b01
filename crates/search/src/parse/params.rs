//! Raw parameter access.

use crate::error::{SearchError, SearchResult};

/// An ordered multi-map of request parameters. Repeated keys are
/// preserved in order; unknown keys are simply never read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Builds from ordered pairs.
    pub fn new<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            pairs: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Parses a URL query string, keeping blank values.
    pub fn from_query_string(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        Self {
            pairs: form_urlencoded::parse(query.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        }
    }

    /// All pairs, in input order.
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// The first value for a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All values for a key, in order.
    pub fn getlist(&self, key: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// An integer value; a malformed value is a parameter error.
    pub fn get_int(&self, key: &str) -> SearchResult<Option<i64>> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw.trim().parse::<i64>().map(Some).map_err(|_| {
                SearchError::parameter(key, format!("`{}` is not an integer", raw))
            }),
        }
    }

    /// A boolean value accepting `true/false/1/0`.
    pub fn get_bool(&self, key: &str, default: bool) -> SearchResult<bool> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => match raw.trim().to_lowercase().as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                other => Err(SearchError::parameter(
                    key,
                    format!("`{}` is not a boolean", other),
                )),
            },
        }
    }

    /// All `(suffix, value)` pairs whose key starts with the prefix, in
    /// input order. Used for `filter:*`, `facet_size:*` and friends.
    pub fn get_prefixed<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.pairs.iter().filter_map(move |(k, v)| {
            k.strip_prefix(prefix).map(|suffix| (suffix, v.as_str()))
        })
    }
}
