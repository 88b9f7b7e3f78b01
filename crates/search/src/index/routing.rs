//! Schema to bucket routing and index naming.

use std::collections::BTreeSet;

use crate::error::SearchResult;
use crate::schema::{Schema, SchemaCatalog};
use crate::settings::Settings;

/// The logical index partitions. Every concrete schema maps to exactly
/// one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Bucket {
    Things,
    Intervals,
    Documents,
    Pages,
}

impl Bucket {
    /// All buckets, in configuration order.
    pub fn all() -> [Bucket; 4] {
        [
            Bucket::Things,
            Bucket::Intervals,
            Bucket::Documents,
            Bucket::Pages,
        ]
    }

    /// The bucket's name as used in index names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Things => "things",
            Bucket::Intervals => "intervals",
            Bucket::Documents => "documents",
            Bucket::Pages => "pages",
        }
    }

    /// Primary shard count for this bucket: document-heavy buckets get
    /// the full configured count, things half, intervals a third.
    pub fn shards(&self, settings: &Settings) -> u32 {
        let configured = settings.index_shards;
        let scaled = match self {
            Bucket::Documents | Bucket::Pages => configured,
            Bucket::Things => configured / 2,
            Bucket::Intervals => configured / 3,
        };
        scaled.max(1)
    }

    /// Score weight applied to hits from this bucket.
    pub fn boost(&self, settings: &Settings) -> f64 {
        match self {
            Bucket::Things => settings.index_boost_things,
            Bucket::Intervals => settings.index_boost_intervals,
            Bucket::Documents => settings.index_boost_documents,
            Bucket::Pages => settings.index_boost_pages,
        }
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a schema to its bucket: Pages variants to `pages`, documents to
/// `documents`, things to `things` (this catches Event), intervals to
/// `intervals`; anything else lands in `things`.
pub fn schema_bucket(schema: Schema<'_>) -> Bucket {
    if matches!(schema.name(), "Page" | "Pages") {
        return Bucket::Pages;
    }
    if schema.is_a("Document") {
        return Bucket::Documents;
    }
    if schema.is_a("Thing") {
        return Bucket::Things;
    }
    if schema.is_a("Interval") {
        return Bucket::Intervals;
    }
    Bucket::Things
}

/// Builds the index name `{prefix}-entity-{bucket}-{version}`.
pub fn index_name(settings: &Settings, bucket: Bucket, version: &str) -> String {
    format!(
        "{}-entity-{}-{}",
        settings.index_prefix, bucket, version
    )
}

/// Expands schema names to the set of concrete schemata in scope. With
/// `expand`, descendants are included. Unknown names are skipped; an
/// empty selection defaults to everything under Thing.
fn schema_scope<'a, S>(
    catalog: &'a SchemaCatalog,
    schemata: &[S],
    expand: bool,
) -> Vec<Schema<'a>>
where
    S: AsRef<str>,
{
    let mut names: BTreeSet<String> = BTreeSet::new();
    let requested: Vec<&str> = if schemata.is_empty() {
        vec!["Thing"]
    } else {
        schemata.iter().map(|s| s.as_ref()).collect()
    };
    for name in requested {
        let Some(schema) = catalog.get(name) else {
            continue;
        };
        if !schema.is_abstract() {
            names.insert(schema.name().to_string());
        }
        if expand {
            names.extend(schema.descendants().map(String::from));
        }
    }
    names
        .iter()
        .filter_map(|name| catalog.get(name))
        .collect()
}

/// Buckets implied by the given schema names.
pub fn schema_buckets<S: AsRef<str>>(
    catalog: &SchemaCatalog,
    schemata: &[S],
    expand: bool,
) -> BTreeSet<Bucket> {
    schema_scope(catalog, schemata, expand)
        .into_iter()
        .map(schema_bucket)
        .collect()
}

/// The combined read index expression for the given schemata: every
/// configured read version crossed with every implied bucket, as a
/// comma-separated list.
pub fn entities_read_index<S: AsRef<str>>(
    settings: &Settings,
    catalog: &SchemaCatalog,
    schemata: &[S],
    expand: bool,
) -> String {
    let mut buckets = schema_buckets(catalog, schemata, expand);
    if buckets.is_empty() {
        // Nothing known in scope: search everywhere and let the schema
        // filter match nothing rather than issuing an index-less request.
        buckets.extend(Bucket::all());
    }
    let mut indexes = BTreeSet::new();
    for bucket in buckets {
        for version in &settings.index_read {
            indexes.insert(index_name(settings, bucket, version));
        }
    }
    indexes.into_iter().collect::<Vec<_>>().join(",")
}

/// The index currently written for the given schema. Abstract schemata
/// are rejected.
pub fn entities_write_index(
    settings: &Settings,
    catalog: &SchemaCatalog,
    schema: &str,
) -> SearchResult<String> {
    let schema = catalog.require(schema)?;
    if schema.is_abstract() {
        return Err(crate::error::SearchError::schema(
            schema.name(),
            "cannot index abstract schema",
        ));
    }
    Ok(index_name(
        settings,
        schema_bucket(schema),
        &settings.index_write,
    ))
}

/// Shard routing key for a dataset. Rejects empty and placeholder names.
pub fn routing_key(dataset: &str) -> SearchResult<&str> {
    if dataset.is_empty() || dataset == "default" {
        return Err(crate::error::SearchError::parameter(
            "dataset",
            format!("invalid routing dataset: `{}`", dataset),
        ));
    }
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixtures() -> (Settings, SchemaCatalog) {
        (Settings::from_env(), SchemaCatalog::default_model())
    }

    #[test]
    fn test_schema_bucket() {
        let (_, catalog) = fixtures();
        let bucket = |name: &str| schema_bucket(catalog.get(name).unwrap());
        assert_eq!(bucket("Person"), Bucket::Things);
        assert_eq!(bucket("Company"), Bucket::Things);
        assert_eq!(bucket("Event"), Bucket::Things);
        assert_eq!(bucket("Document"), Bucket::Documents);
        assert_eq!(bucket("Email"), Bucket::Documents);
        assert_eq!(bucket("Pages"), Bucket::Pages);
        assert_eq!(bucket("Page"), Bucket::Pages);
        assert_eq!(bucket("Ownership"), Bucket::Intervals);
    }

    #[test]
    fn test_index_name() {
        let (settings, _) = fixtures();
        assert_eq!(
            index_name(&settings, Bucket::Things, "v1"),
            "openaleph-entity-things-v1"
        );
    }

    #[test]
    fn test_read_index_expansion() {
        let (settings, catalog) = fixtures();
        // LegalEntity expands to its descendants, all in the things bucket.
        let index = entities_read_index(&settings, &catalog, &["LegalEntity"], true);
        assert_eq!(index, "openaleph-entity-things-v1");

        // Thing covers documents and pages too.
        let index = entities_read_index(&settings, &catalog, &["Thing"], true);
        assert!(index.contains("openaleph-entity-things-v1"));
        assert!(index.contains("openaleph-entity-documents-v1"));
        assert!(index.contains("openaleph-entity-pages-v1"));
    }

    #[test]
    fn test_read_index_multiple_versions() {
        let (mut settings, catalog) = fixtures();
        settings.index_read = vec!["v1".to_string(), "v2".to_string()];
        let index = entities_read_index(&settings, &catalog, &["Person"], false);
        assert_eq!(
            index,
            "openaleph-entity-things-v1,openaleph-entity-things-v2"
        );
    }

    #[test]
    fn test_unknown_schema_skipped() {
        let (settings, catalog) = fixtures();
        let index = entities_read_index(&settings, &catalog, &["Bogus", "Person"], false);
        assert_eq!(index, "openaleph-entity-things-v1");
    }

    #[test]
    fn test_write_index_rejects_abstract() {
        let (settings, catalog) = fixtures();
        assert!(entities_write_index(&settings, &catalog, "Asset").is_err());
        assert_eq!(
            entities_write_index(&settings, &catalog, "Page").unwrap(),
            "openaleph-entity-pages-v1"
        );
    }

    #[test]
    fn test_shard_scaling() {
        let (settings, _) = fixtures();
        assert_eq!(Bucket::Documents.shards(&settings), 10);
        assert_eq!(Bucket::Pages.shards(&settings), 10);
        assert_eq!(Bucket::Things.shards(&settings), 5);
        assert_eq!(Bucket::Intervals.shards(&settings), 3);
    }

    #[test]
    fn test_routing_key() {
        assert_eq!(routing_key("de_companies").unwrap(), "de_companies");
        assert!(routing_key("").is_err());
        assert!(routing_key("default").is_err());
    }
}
