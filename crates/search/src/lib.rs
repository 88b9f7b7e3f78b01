//! Search intermediary for FollowTheMoney entity data on
//! Elasticsearch-compatible clusters.
//!
//! The crate translates a compact URL-style query grammar into
//! Elasticsearch request bodies (faceted search, entity matching,
//! more-like-this), produces the index mappings and routing the data
//! model needs, and streams entities into the cluster in bulk with
//! backpressure.
//!
//! # Example
//!
//! ```ignore
//! use openaleph_search::entity::Entity;
//! use openaleph_search::parse::{QueryParams, SearchQueryParser};
//! use openaleph_search::query::{EntitiesQuery, QueryBuilder};
//! use openaleph_search::schema::SchemaCatalog;
//! use openaleph_search::settings::Settings;
//!
//! let settings = Settings::from_env();
//! let catalog = SchemaCatalog::default_model();
//! let params = QueryParams::from_query_string("q=putin&facet=countries");
//! let parser = SearchQueryParser::parse(&params, None)?;
//! let query = EntitiesQuery::new(&settings, &catalog, &parser);
//! let body = query.body()?;
//! # Ok::<(), openaleph_search::error::SearchError>(())
//! ```

pub mod entity;
pub mod error;
pub mod index;
pub mod names;
pub mod parse;
pub mod query;
pub mod schema;
pub mod search;
pub mod settings;

pub use entity::Entity;
pub use error::{SearchError, SearchResult};
pub use parse::{QueryParams, SearchAuth, SearchQueryParser};
pub use query::{EntitiesQuery, MatchQuery, MoreLikeThisQuery, QueryBuilder};
pub use schema::SchemaCatalog;
pub use search::{Executor, SearchTransport};
pub use settings::Settings;
