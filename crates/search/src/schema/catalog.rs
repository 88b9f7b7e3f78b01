//! The schema catalog: precomputed, immutable lookup tables.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::error::{SearchError, SearchResult};

use super::model::ModelSpec;
use super::types::{PropertySpec, TypeGroup};

#[derive(Debug)]
struct SchemaDef {
    name: String,
    abstract_: bool,
    matchable: bool,
    /// All ancestor names, including the schema itself.
    schemata: BTreeSet<String>,
    /// All non-abstract descendant names, including the schema itself when
    /// concrete.
    descendants: BTreeSet<String>,
    /// Matchable peers: matchable schemata among ancestors and descendants.
    matchable_schemata: BTreeSet<String>,
    /// Properties, including inherited ones.
    properties: BTreeMap<String, PropertySpec>,
}

/// The loaded schema catalog. Cheap to clone; all data is shared.
#[derive(Debug, Clone)]
pub struct SchemaCatalog {
    schemata: Arc<BTreeMap<String, SchemaDef>>,
}

impl SchemaCatalog {
    /// Builds a catalog from a model description, resolving inheritance
    /// and precomputing ancestor/descendant/matchable tables.
    pub fn from_spec(spec: &ModelSpec) -> SearchResult<Self> {
        let mut defs: BTreeMap<String, SchemaDef> = BTreeMap::new();

        for (name, schema) in &spec.schemata {
            let mut schemata = BTreeSet::new();
            let mut properties = BTreeMap::new();
            collect_ancestors(spec, name, &mut schemata, &mut properties, 0)?;

            defs.insert(
                name.clone(),
                SchemaDef {
                    name: name.clone(),
                    abstract_: schema.abstract_,
                    matchable: schema.matchable,
                    schemata,
                    descendants: BTreeSet::new(),
                    matchable_schemata: BTreeSet::new(),
                    properties,
                },
            );
        }

        // Invert the ancestor sets into descendant sets.
        let ancestor_sets: Vec<(String, BTreeSet<String>, bool)> = defs
            .values()
            .map(|d| (d.name.clone(), d.schemata.clone(), d.abstract_))
            .collect();
        for (name, ancestors, abstract_) in &ancestor_sets {
            if *abstract_ {
                continue;
            }
            for ancestor in ancestors {
                if let Some(def) = defs.get_mut(ancestor) {
                    def.descendants.insert(name.clone());
                }
            }
        }

        // Matchable peers: matchable schemata among ancestors + descendants.
        let matchable: BTreeSet<String> = defs
            .values()
            .filter(|d| d.matchable)
            .map(|d| d.name.clone())
            .collect();
        let related: Vec<(String, BTreeSet<String>)> = defs
            .values()
            .map(|d| {
                let mut peers = BTreeSet::new();
                if d.matchable {
                    for other in d.schemata.iter().chain(d.descendants.iter()) {
                        if matchable.contains(other) {
                            peers.insert(other.clone());
                        }
                    }
                }
                (d.name.clone(), peers)
            })
            .collect();
        for (name, peers) in related {
            if let Some(def) = defs.get_mut(&name) {
                def.matchable_schemata = peers;
            }
        }

        Ok(SchemaCatalog {
            schemata: Arc::new(defs),
        })
    }

    /// The built-in default model.
    pub fn default_model() -> Self {
        Self::from_spec(&ModelSpec::default_model())
            .expect("built-in model must resolve")
    }

    /// Looks up a schema by name.
    pub fn get(&self, name: &str) -> Option<Schema<'_>> {
        self.schemata.get(name).map(|def| Schema { def })
    }

    /// Looks up a schema, failing with a descriptive error.
    pub fn require(&self, name: &str) -> SearchResult<Schema<'_>> {
        self.get(name)
            .ok_or_else(|| SearchError::schema(name, "unknown schema"))
    }

    /// All schema names in the catalog.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemata.keys().map(|s| s.as_str())
    }

    /// All concrete (non-abstract) schemata.
    pub fn concrete(&self) -> impl Iterator<Item = Schema<'_>> {
        self.schemata
            .values()
            .filter(|d| !d.abstract_)
            .map(|def| Schema { def })
    }
}

fn collect_ancestors(
    spec: &ModelSpec,
    name: &str,
    schemata: &mut BTreeSet<String>,
    properties: &mut BTreeMap<String, PropertySpec>,
    depth: usize,
) -> SearchResult<()> {
    if depth > 32 {
        return Err(SearchError::schema(name, "inheritance cycle"));
    }
    let schema = spec
        .schemata
        .get(name)
        .ok_or_else(|| SearchError::schema(name, "unknown parent schema"))?;
    if !schemata.insert(name.to_string()) {
        return Ok(());
    }
    for parent in &schema.extends {
        collect_ancestors(spec, parent, schemata, properties, depth + 1)?;
    }
    // Own properties override inherited ones of the same name.
    for (prop_name, prop) in &schema.properties {
        let group: TypeGroup = prop
            .type_
            .parse()
            .map_err(|e: String| SearchError::schema(name, e))?;
        properties.insert(
            prop_name.clone(),
            PropertySpec {
                name: prop_name.clone(),
                group,
                matchable: prop.matchable.unwrap_or(group.group_field().is_some()),
            },
        );
    }
    Ok(())
}

/// A borrowed view of one schema in the catalog.
#[derive(Debug, Clone, Copy)]
pub struct Schema<'a> {
    def: &'a SchemaDef,
}

impl<'a> Schema<'a> {
    /// The schema name.
    pub fn name(&self) -> &'a str {
        &self.def.name
    }

    /// Abstract schemata cannot be indexed.
    pub fn is_abstract(&self) -> bool {
        self.def.abstract_
    }

    /// Whether entities of this schema participate in matching.
    pub fn matchable(&self) -> bool {
        self.def.matchable
    }

    /// The schema and all its ancestors, by name.
    pub fn schemata(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.def.schemata.iter().map(|s| s.as_str())
    }

    /// True if this schema is, or descends from, `other`.
    pub fn is_a(&self, other: &str) -> bool {
        self.def.schemata.contains(other)
    }

    /// All concrete descendants, including the schema itself when concrete.
    pub fn descendants(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.def.descendants.iter().map(|s| s.as_str())
    }

    /// Matchable peers of this schema. Empty for unmatchable schemata.
    pub fn matchable_schemata(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.def.matchable_schemata.iter().map(|s| s.as_str())
    }

    /// All properties, including inherited ones.
    pub fn properties(&self) -> impl Iterator<Item = &'a PropertySpec> + '_ {
        self.def.properties.values()
    }

    /// Looks up a property by name.
    pub fn property(&self, name: &str) -> Option<&'a PropertySpec> {
        self.def.properties.get(name)
    }
}
