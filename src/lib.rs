//! A fan-out client for memcache compatible servers.
//!
//! One local server serves every read, while writes and deletes are mirrored
//! to a set of replicas which can be grown and shrunk while the client is in use.

pub mod config;
mod error;
pub mod link;
pub mod protocol;
pub mod replication;

pub use config::LinkConfig;
pub use error::{CacheError, Result};
pub use link::ServerLink;
pub use replication::{Replication, ReplicatedClient, Target};
