//! Runtime configuration.
//!
//! All knobs are plain fields with environment overrides under the
//! `OPENALEPH_SEARCH_` prefix. The struct is an explicit value passed to
//! builders and the executor; nothing in the crate reads the environment
//! after startup.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OPENALEPH_SEARCH_URI` | http://localhost:9200 | Cluster URL(s), comma-separated |
//! | `OPENALEPH_SEARCH_TIMEOUT` | 60 | Request timeout (seconds) |
//! | `OPENALEPH_SEARCH_MAX_RETRIES` | 3 | Retry budget for transport errors |
//! | `OPENALEPH_SEARCH_INDEX_PREFIX` | openaleph | Index name prefix |
//! | `OPENALEPH_SEARCH_INDEX_WRITE` | v1 | Version written by the indexer |
//! | `OPENALEPH_SEARCH_INDEX_READ` | v1 | Versions queried, comma-separated |
//! | `OPENALEPH_SEARCH_SEARCH_AUTH` | false | Require an auth object on queries |

use clap::Parser;

/// Hard ceiling for `offset + limit`, mirroring the cluster's default
/// `max_result_window`.
pub const MAX_PAGE: usize = 9999;

/// Configuration for query construction, mapping generation and indexing.
#[derive(Debug, Clone, Parser)]
#[command(name = "openaleph-search")]
pub struct Settings {
    /// Elasticsearch node URL(s), comma-separated.
    #[arg(
        long,
        env = "OPENALEPH_SEARCH_URI",
        default_value = "http://localhost:9200"
    )]
    pub uri: String,

    /// Request timeout in seconds.
    #[arg(long, env = "OPENALEPH_SEARCH_TIMEOUT", default_value = "60")]
    pub timeout: u64,

    /// Maximum retries for retryable transport failures.
    #[arg(long, env = "OPENALEPH_SEARCH_MAX_RETRIES", default_value = "3")]
    pub max_retries: u32,

    /// Worker count for the indexing pipeline, both transform and submit
    /// stages.
    #[arg(long, env = "OPENALEPH_SEARCH_INDEXER_CONCURRENCY", default_value = "8")]
    pub indexer_concurrency: usize,

    /// Maximum documents per bulk request.
    #[arg(long, env = "OPENALEPH_SEARCH_INDEXER_CHUNK_SIZE", default_value = "1000")]
    pub indexer_chunk_size: usize,

    /// Maximum bytes per bulk request (whichever limit is hit first wins).
    #[arg(
        long,
        env = "OPENALEPH_SEARCH_INDEXER_MAX_CHUNK_BYTES",
        default_value = "5242880"
    )]
    pub indexer_max_chunk_bytes: usize,

    /// Index name prefix.
    #[arg(long, env = "OPENALEPH_SEARCH_INDEX_PREFIX", default_value = "openaleph")]
    pub index_prefix: String,

    /// Index version written by the indexer.
    #[arg(long, env = "OPENALEPH_SEARCH_INDEX_WRITE", default_value = "v1")]
    pub index_write: String,

    /// Index versions queried, comma-separated.
    #[arg(long, env = "OPENALEPH_SEARCH_INDEX_READ", default_value = "v1", value_delimiter = ',')]
    pub index_read: Vec<String>,

    /// Primary shard count; buckets scale this down (things 50%,
    /// intervals 33%).
    #[arg(long, env = "OPENALEPH_SEARCH_INDEX_SHARDS", default_value = "10")]
    pub index_shards: u32,

    /// Replica count per index.
    #[arg(long, env = "OPENALEPH_SEARCH_INDEX_REPLICAS", default_value = "0")]
    pub index_replicas: u32,

    /// Namespace stored `_id`s by dataset hash.
    #[arg(
        long,
        env = "OPENALEPH_SEARCH_INDEX_NAMESPACE_IDS",
        default_value = "true",
        action = clap::ArgAction::Set
    )]
    pub index_namespace_ids: bool,

    /// Index refresh interval; set to `-1` during bulk loads.
    #[arg(
        long,
        env = "OPENALEPH_SEARCH_INDEX_REFRESH_INTERVAL",
        default_value = "1s"
    )]
    pub index_refresh_interval: String,

    /// Score weight for hits from the things bucket.
    #[arg(long, env = "OPENALEPH_SEARCH_INDEX_BOOST_THINGS", default_value = "1.0")]
    pub index_boost_things: f64,

    /// Score weight for hits from the intervals bucket.
    #[arg(
        long,
        env = "OPENALEPH_SEARCH_INDEX_BOOST_INTERVALS",
        default_value = "1.0"
    )]
    pub index_boost_intervals: f64,

    /// Score weight for hits from the documents bucket.
    #[arg(
        long,
        env = "OPENALEPH_SEARCH_INDEX_BOOST_DOCUMENTS",
        default_value = "1.0"
    )]
    pub index_boost_documents: f64,

    /// Score weight for hits from the pages bucket.
    #[arg(long, env = "OPENALEPH_SEARCH_INDEX_BOOST_PAGES", default_value = "1.0")]
    pub index_boost_pages: f64,

    /// Store term vectors with offsets on the content field. Required for
    /// the fast vector highlighter.
    #[arg(
        long,
        env = "OPENALEPH_SEARCH_CONTENT_TERM_VECTORS",
        default_value = "true",
        action = clap::ArgAction::Set
    )]
    pub content_term_vectors: bool,

    /// Wrap entity queries in a function_score that up-scores large
    /// entities.
    #[arg(
        long,
        env = "OPENALEPH_SEARCH_QUERY_FUNCTION_SCORE",
        default_value = "true",
        action = clap::ArgAction::Set
    )]
    pub query_function_score: bool,

    /// Use the fast vector highlighter on content (needs term vectors).
    #[arg(
        long,
        env = "OPENALEPH_SEARCH_HIGHLIGHTER_FVH_ENABLED",
        default_value = "true",
        action = clap::ArgAction::Set
    )]
    pub highlighter_fvh_enabled: bool,

    /// Fragment size for content highlights.
    #[arg(
        long,
        env = "OPENALEPH_SEARCH_HIGHLIGHTER_FRAGMENT_SIZE",
        default_value = "200"
    )]
    pub highlighter_fragment_size: u32,

    /// Fragment count for content highlights; 0 returns the full text.
    #[arg(
        long,
        env = "OPENALEPH_SEARCH_HIGHLIGHTER_NUMBER_OF_FRAGMENTS",
        default_value = "3"
    )]
    pub highlighter_number_of_fragments: u32,

    /// Phrase limit for the fast vector highlighter.
    #[arg(
        long,
        env = "OPENALEPH_SEARCH_HIGHLIGHTER_PHRASE_LIMIT",
        default_value = "64"
    )]
    pub highlighter_phrase_limit: u32,

    /// Boundary scan distance for sentence detection.
    #[arg(
        long,
        env = "OPENALEPH_SEARCH_HIGHLIGHTER_BOUNDARY_MAX_SCAN",
        default_value = "100"
    )]
    pub highlighter_boundary_max_scan: u32,

    /// Characters returned when no fragment matches.
    #[arg(
        long,
        env = "OPENALEPH_SEARCH_HIGHLIGHTER_NO_MATCH_SIZE",
        default_value = "300"
    )]
    pub highlighter_no_match_size: u32,

    /// Maximum analyzed offset per field, overridable per request.
    #[arg(
        long,
        env = "OPENALEPH_SEARCH_HIGHLIGHTER_MAX_ANALYZED_OFFSET",
        default_value = "999999"
    )]
    pub highlighter_max_analyzed_offset: u32,

    /// Require an auth object on every query.
    #[arg(
        long,
        env = "OPENALEPH_SEARCH_SEARCH_AUTH",
        default_value = "false",
        action = clap::ArgAction::Set
    )]
    pub search_auth: bool,

    /// Field that authorization scopes on (`dataset`, or `collection_id`
    /// under OpenAleph mode).
    #[arg(
        long,
        env = "OPENALEPH_SEARCH_SEARCH_AUTH_FIELD",
        default_value = "dataset"
    )]
    pub search_auth_field: String,

    /// Shard size for the sampler wrapping significant terms/text.
    #[arg(
        long,
        env = "OPENALEPH_SEARCH_SIGNIFICANT_TERMS_SAMPLER_SIZE",
        default_value = "10000"
    )]
    pub significant_terms_sampler_size: u32,

    /// Minimum foreground doc count for significant buckets.
    #[arg(
        long,
        env = "OPENALEPH_SEARCH_SIGNIFICANT_TERMS_MIN_DOC_COUNT",
        default_value = "3"
    )]
    pub significant_terms_min_doc_count: u32,

    /// Minimum per-shard doc count for significant buckets.
    #[arg(
        long,
        env = "OPENALEPH_SEARCH_SIGNIFICANT_TERMS_SHARD_MIN_DOC_COUNT",
        default_value = "2"
    )]
    pub significant_terms_shard_min_doc_count: u32,

    /// Substitute a probability-based random_sampler for the shard-size
    /// sampler. Needs a foreground count from a pre-query.
    #[arg(
        long,
        env = "OPENALEPH_SEARCH_SIGNIFICANT_TERMS_RANDOM_SAMPLER",
        default_value = "false",
        action = clap::ArgAction::Set
    )]
    pub significant_terms_random_sampler: bool,

    /// Target document count for the random sampler probability.
    #[arg(
        long,
        env = "OPENALEPH_SEARCH_SIGNIFICANT_TERMS_RANDOM_SAMPLER_TARGET",
        default_value = "50000"
    )]
    pub significant_terms_random_sampler_target: u64,
}

impl Settings {
    /// Loads settings from the environment only, ignoring argv. Used by
    /// library embedders and tests.
    pub fn from_env() -> Self {
        Self::parse_from(["openaleph-search"])
    }

    /// Node URLs as a list.
    pub fn nodes(&self) -> Vec<String> {
        self.uri
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_env()
    }
}
