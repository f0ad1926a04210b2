//! Network Module
//!
//! TCP transport and connection supervision.
//!
//! ## Architecture
//! - Each connection is driven by its own reader and writer threads
//! - Producers submit through bounded channels (backpressure when full)
//! - A per-endpoint supervisor pools connections and replaces failures

mod connection;
mod endpoint;
mod supervisor;

pub use connection::{Connection, ConnectionState, ReplyFuture};
pub use endpoint::{Endpoint, DEFAULT_PORT};
pub use supervisor::Supervisor;
