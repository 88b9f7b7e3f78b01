//! The per-request authorization object.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Authorization scope for a request. Absent auth disables authorization
/// entirely (the default); an auth object with `None` scopes denies
/// everything except for admins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchAuth {
    /// Admins bypass scoping entirely.
    #[serde(default)]
    pub is_admin: bool,
    /// Datasets this request may read.
    #[serde(default)]
    pub datasets: Option<BTreeSet<String>>,
    /// Collection ids this request may read (OpenAleph mode).
    #[serde(default)]
    pub collection_ids: Option<BTreeSet<String>>,
}

impl SearchAuth {
    /// An admin auth that sees everything.
    pub fn admin() -> Self {
        Self {
            is_admin: true,
            ..Default::default()
        }
    }

    /// An auth scoped to the given datasets.
    pub fn for_datasets<I, S>(datasets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            datasets: Some(datasets.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    /// The allowed value set for the given auth field, if constrained.
    pub fn allowed(&self, field: &str) -> Option<&BTreeSet<String>> {
        match field {
            "collection_id" => self.collection_ids.as_ref(),
            _ => self.datasets.as_ref(),
        }
    }

    /// A filter clause scoping a query to this auth on the given field.
    /// Admins are hot-wired past authorization entirely.
    pub fn datasets_query(&self, field: &str) -> Value {
        if self.is_admin {
            return json!({"match_all": {}});
        }
        match self.allowed(field) {
            Some(values) if !values.is_empty() => json!({"terms": {field: values}}),
            _ => json!({"match_none": {}}),
        }
    }
}
