//! Query builders: full-text entity search, entity matching and
//! more-like-this, plus the aggregation and highlight blocks they share.

mod base;
mod entities;
mod facets;
mod highlight;
mod matching;
mod more_like_this;
mod util;

pub use base::{FilterSet, QueryBuilder};
pub use entities::EntitiesQuery;
pub use facets::build_aggregations;
pub use highlight::{build_highlight, get_highlighter};
pub use matching::{match_query, MatchQuery, MAX_CLAUSES};
pub use more_like_this::MoreLikeThisQuery;
pub use util::{
    bool_query, field_filter_query, none_query, range_filter_query, schema_query,
    wrap_function_score,
};
