//! Query execution against the cluster.

mod executor;
mod response;
mod transport;

pub use executor::Executor;
pub use response::unpack_result;
pub use transport::{EsTransport, SearchTransport};
