//! Replication is achieved by mirroring every write onto a set of remote caches.
//!
//! The [`ReplicatedClient`] reads from a single local server and fans `set` and
//! `delete` out to the local server followed by every registered replica. The
//! outcome for each target is collected in a [`Replication`] report.

mod client;
mod report;

pub use client::ReplicatedClient;
pub use report::{Replication, Target};
