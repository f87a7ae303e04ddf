use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tracing::{debug, info, warn};

use crate::config::LinkConfig;
use crate::link::ServerLink;
use crate::replication::{Replication, Target};
use crate::{CacheError, Result};

type SharedLink = Arc<Mutex<ServerLink>>;

/// Client with an awareness of multiple cache servers.
///
/// Reads are only ever served by the local server, which is fixed for the life
/// of the client. Writes and deletes go to the local server and then to every
/// replica, in the order the replicas were added.
#[derive(Debug)]
pub struct ReplicatedClient {
    config: LinkConfig,
    local_addr: String,
    local: SharedLink,

    /// Registered replicas keyed by address, in registration order.
    ///
    /// Membership changes take the write lock. Fan-out takes the read lock only
    /// long enough to snapshot the current links, so no I/O happens under it.
    replicas: RwLock<Vec<(String, SharedLink)>>,
}

// A poisoned lock only means another caller panicked mid-exchange. The membership
// list and the links stay structurally valid, so the guard is recovered.
fn lock(link: &Mutex<ServerLink>) -> MutexGuard<'_, ServerLink> {
    link.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Close a link, treating one that is already closed as done so an
/// interrupted `close_all` can be retried.
fn close(link: &Mutex<ServerLink>) -> Result<()> {
    match lock(link).close() {
        Err(CacheError::Closed { addr }) => {
            debug!(addr, "Connection already closed");
            Ok(())
        }
        result => result,
    }
}

impl ReplicatedClient {
    /// Connect to the local server with the default [`LinkConfig`].
    pub fn connect(local_addr: &str) -> Result<Self> {
        Self::connect_with(local_addr, LinkConfig::default())
    }

    pub fn connect_with(local_addr: &str, config: LinkConfig) -> Result<Self> {
        let local = ServerLink::open_with(local_addr, &config)?;
        info!(addr = local_addr, "Connected to local server");
        Ok(Self {
            config,
            local_addr: local_addr.to_string(),
            local: Arc::new(Mutex::new(local)),
            replicas: RwLock::new(Vec::new()),
        })
    }

    pub fn local_addr(&self) -> &str {
        &self.local_addr
    }

    /// Retrieve a value from the local server. Replicas are never consulted.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        lock(&self.local).get(key)
    }

    /// Store `value` on the local server and every replica.
    pub fn set(&self, key: &str, value: &[u8]) -> Replication {
        self.fan_out(|link| link.set(key, value))
    }

    /// Delete `key` from the local server and every replica. A target which
    /// did not hold the key counts as a success.
    pub fn delete(&self, key: &str) -> Replication {
        self.fan_out(|link| link.delete(key).map(|_| ()))
    }

    /// Every target is attempted, a failure on one does not stop the others.
    fn fan_out<F>(&self, op: F) -> Replication
    where
        F: Fn(&mut ServerLink) -> Result<()>,
    {
        let mut report = Replication::default();
        for (target, link) in self.targets() {
            let outcome = op(&mut lock(&link));
            if let Err(e) = &outcome {
                warn!(server = %target, error = %e, "Replication to target failed");
            }
            report.record(target, outcome);
        }
        report
    }

    /// Snapshot of the local link followed by the current replicas.
    fn targets(&self) -> Vec<(Target, SharedLink)> {
        let replicas = self.replicas.read().unwrap_or_else(PoisonError::into_inner);
        let mut targets = Vec::with_capacity(replicas.len() + 1);
        targets.push((Target::Local(self.local_addr.clone()), self.local.clone()));
        targets.extend(
            replicas
                .iter()
                .map(|(addr, link)| (Target::Replica(addr.clone()), link.clone())),
        );
        targets
    }

    /// Open a connection to each address in order and register it as a replica.
    ///
    /// The first address which fails to open aborts the call. Replicas opened
    /// before it remain registered. Re-adding a registered address replaces its
    /// link, and the local address is never registered.
    pub fn add_replicas<I, S>(&self, addrs: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut replicas = self.replicas.write().unwrap_or_else(PoisonError::into_inner);
        for addr in addrs {
            let addr = addr.as_ref();
            if addr == self.local_addr {
                warn!(addr, "Skipping local server given as replica");
                continue;
            }

            let link = Arc::new(Mutex::new(ServerLink::open_with(addr, &self.config)?));
            match replicas.iter_mut().find(|(a, _)| a == addr) {
                Some(entry) => {
                    info!(addr, "Replacing replica");
                    let old = std::mem::replace(&mut entry.1, link);
                    if let Err(e) = close(&old) {
                        warn!(addr, error = %e, "Unable to close replaced replica");
                    }
                }
                None => {
                    info!(addr, "Added replica");
                    replicas.push((addr.to_string(), link));
                }
            }
        }
        Ok(())
    }

    /// Close the connection to a single replica and unregister it.
    ///
    /// If closing fails the replica stays registered. A replica whose link is
    /// already closed is simply unregistered.
    pub fn close_replica(&self, addr: &str) -> Result<()> {
        let mut replicas = self.replicas.write().unwrap_or_else(PoisonError::into_inner);
        let idx = replicas
            .iter()
            .position(|(a, _)| a == addr)
            .ok_or_else(|| CacheError::NotFound {
                addr: addr.to_string(),
            })?;

        close(&replicas[idx].1)?;
        replicas.remove(idx);
        info!(addr, "Closed replica");
        Ok(())
    }

    /// Close the local server followed by every replica.
    ///
    /// Stops at the first failure. Links closed earlier are skipped, so the call
    /// can be retried. Once every link is closed the membership is cleared and
    /// the client can no longer serve any request.
    pub fn close_all(&self) -> Result<()> {
        let mut replicas = self.replicas.write().unwrap_or_else(PoisonError::into_inner);
        close(&self.local)?;
        for (addr, link) in replicas.iter() {
            debug!(addr, "Closing replica");
            close(link)?;
        }
        replicas.clear();
        info!(local = %self.local_addr, "Closed all connections");
        Ok(())
    }

    pub fn replica_count(&self) -> usize {
        self.replicas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn replica_addrs(&self) -> Vec<String> {
        self.replicas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(addr, _)| addr.clone())
            .collect()
    }
}
