//! Index naming, mappings and the bulk indexing pipeline.

mod analysis;
mod documents;
mod indexer;
mod mapping;
mod routing;

pub use analysis::index_settings;
pub use documents::{format_entity, namespaced_id, IndexAction};
pub use indexer::{BulkStats, Indexer};
pub use mapping::make_mapping;
pub use routing::{
    entities_read_index, entities_write_index, index_name, routing_key, schema_bucket,
    schema_buckets, Bucket,
};
