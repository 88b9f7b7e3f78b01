//! Entity input for indexing and matching.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::schema::{Schema, TypeGroup};

/// Context metadata carried alongside an entity by the hosting system.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityContext {
    /// Creation timestamps; the earliest one is indexed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub created_at: Vec<String>,
    /// Update timestamps; the latest one is indexed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub updated_at: Vec<String>,
    /// First time the entity was observed in its source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<String>,
    /// Last time the entity was observed in its source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<String>,
    /// Alternate ids that resolve to this entity.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub referents: Vec<String>,
    /// Ingest origins (crawler, upload, ...).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub origin: Vec<String>,
}

/// An FtM entity as supplied by the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Entity {
    /// Stable entity id within its dataset.
    pub id: String,
    /// Schema name.
    pub schema: String,
    /// Property values by property name.
    #[serde(default)]
    pub properties: BTreeMap<String, Vec<String>>,
    /// Source dataset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<String>,
    /// Legacy collection id, used as the auth scope under OpenAleph mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<String>,
    /// Context metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<EntityContext>,
}

impl Entity {
    /// Creates a bare entity.
    pub fn new(id: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            schema: schema.into(),
            ..Default::default()
        }
    }

    /// Parses an entity from a JSON line.
    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }

    /// Adds property values, builder style.
    pub fn with_property(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.properties
            .entry(name.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Values of a single property.
    pub fn get(&self, name: &str) -> &[String] {
        self.properties
            .get(name)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// All values of properties with the given type group, resolved
    /// against the entity's schema.
    pub fn type_values<'a>(&'a self, schema: Schema<'_>, group: TypeGroup) -> Vec<&'a str> {
        let mut values = Vec::new();
        let mut seen = BTreeSet::new();
        for (name, prop_values) in &self.properties {
            let Some(prop) = schema.property(name) else {
                continue;
            };
            if prop.group != group {
                continue;
            }
            for value in prop_values {
                if seen.insert(value.as_str()) {
                    values.push(value.as_str());
                }
            }
        }
        values
    }

    /// All name values (the `name` type group).
    pub fn names<'a>(&'a self, schema: Schema<'_>) -> Vec<&'a str> {
        self.type_values(schema, TypeGroup::Name)
    }

    /// The display caption: the first `name` value, then any other
    /// name-group value, falling back to the id.
    pub fn caption<'a>(&'a self, schema: Schema<'_>) -> &'a str {
        if let Some(name) = self.get("name").first() {
            return name;
        }
        self.names(schema).first().copied().unwrap_or(&self.id)
    }

    /// Total number of property values.
    pub fn num_values(&self) -> usize {
        self.properties.values().map(|v| v.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaCatalog;

    #[test]
    fn test_type_values() {
        let catalog = SchemaCatalog::default_model();
        let schema = catalog.get("Person").unwrap();
        let entity = Entity::new("p1", "Person")
            .with_property("name", ["Jane Doe"])
            .with_property("alias", ["J. Doe"])
            .with_property("nationality", ["us", "mt"])
            .with_property("unknownProp", ["ignored"]);

        // Properties iterate in name order, so alias values come first.
        assert_eq!(entity.names(schema), vec!["J. Doe", "Jane Doe"]);
        assert_eq!(
            entity.type_values(schema, TypeGroup::Country),
            vec!["us", "mt"]
        );
        assert_eq!(entity.caption(schema), "Jane Doe");
        assert_eq!(entity.num_values(), 5);
    }

    #[test]
    fn test_caption_fallback() {
        let catalog = SchemaCatalog::default_model();
        let schema = catalog.get("Person").unwrap();
        let entity = Entity::new("p2", "Person");
        assert_eq!(entity.caption(schema), "p2");
    }

    #[test]
    fn test_from_json() {
        let entity = Entity::from_json(
            r#"{"id": "x", "schema": "Company", "properties": {"name": ["ACME"]}, "dataset": "de_companies"}"#,
        )
        .unwrap();
        assert_eq!(entity.schema, "Company");
        assert_eq!(entity.dataset.as_deref(), Some("de_companies"));
        assert_eq!(entity.get("name"), ["ACME"]);
    }
}
