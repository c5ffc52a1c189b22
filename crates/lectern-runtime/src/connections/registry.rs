//! Owner-keyed connection registry with best-effort fan-out.
//!
//! One registry instance serves instructors (keyed by [`InstructorId`]) and
//! another serves students (keyed by [`StudentKey`]). An owner may hold any
//! number of connections; [`ConnectionRegistry::send`] reaches all of them.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use lectern_core::messages::OutboundMessage;
use lectern_core::{InstructorId, SessionId, StudentId};
use metrics::{counter, gauge};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::connection::{ClientConnection, SendFailure};
use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_SEND_DROPS_TOTAL};

/// Default lifetime drops before a slow connection is evicted.
pub const DEFAULT_MAX_TOTAL_DROPS: u64 = 100;

/// Student-side owner identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StudentKey {
    /// Session the client joined.
    pub session_id: SessionId,
    /// Student identity.
    pub student_id: StudentId,
}

impl StudentKey {
    /// Build a key.
    pub fn new(session_id: SessionId, student_id: StudentId) -> Self {
        Self {
            session_id,
            student_id,
        }
    }
}

impl fmt::Display for StudentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.session_id, self.student_id)
    }
}

/// Dashboard-side registry.
pub type InstructorRegistry = ConnectionRegistry<InstructorId>;
/// Student-side registry.
pub type StudentRegistry = ConnectionRegistry<StudentKey>;

struct Inner<K> {
    by_owner: HashMap<K, HashMap<String, Arc<ClientConnection>>>,
    owner_of: HashMap<String, K>,
}

impl<K: Eq + Hash + Clone> Inner<K> {
    /// Remove-if-present. Returns the connection and its former owner.
    fn remove(&mut self, connection_id: &str) -> Option<(K, Arc<ClientConnection>)> {
        let owner = self.owner_of.remove(connection_id)?;
        let conns = self.by_owner.get_mut(&owner)?;
        let conn = conns.remove(connection_id);
        if conns.is_empty() {
            let _ = self.by_owner.remove(&owner);
        }
        conn.map(|c| (owner, c))
    }
}

/// Concurrency-safe registry of live connections keyed by owner identity.
pub struct ConnectionRegistry<K> {
    label: &'static str,
    max_total_drops: u64,
    inner: Mutex<Inner<K>>,
}

impl<K> ConnectionRegistry<K>
where
    K: Eq + Hash + Clone + fmt::Display + Send + Sync,
{
    /// Create an empty registry. `label` tags logs and metrics.
    pub fn new(label: &'static str) -> Self {
        Self::with_max_drops(label, DEFAULT_MAX_TOTAL_DROPS)
    }

    /// Create a registry with a custom slow-client threshold.
    pub fn with_max_drops(label: &'static str, max_total_drops: u64) -> Self {
        Self {
            label,
            max_total_drops,
            inner: Mutex::new(Inner {
                by_owner: HashMap::new(),
                owner_of: HashMap::new(),
            }),
        }
    }

    /// Register `connection` under `owner`. Existing connections of the same
    /// owner are kept; re-registering a connection id moves it.
    pub fn connect(&self, owner: K, connection: Arc<ClientConnection>) {
        let mut inner = self.inner.lock();
        let id = connection.id.clone();
        let _ = inner.remove(&id);
        let _ = inner
            .by_owner
            .entry(owner.clone())
            .or_default()
            .insert(id.clone(), connection);
        let _ = inner.owner_of.insert(id.clone(), owner.clone());
        let total = inner.owner_of.len();
        drop(inner);

        gauge!(WS_CONNECTIONS_ACTIVE, "registry" => self.label).set(total as f64);
        info!(registry = self.label, %owner, conn_id = %id, "connected");
    }

    /// Remove a connection from whichever owner holds it and close it.
    ///
    /// Safe to call any number of times, from any task, for connections that
    /// were never registered. Only the first call for a registered
    /// connection returns its owner.
    pub fn disconnect(&self, connection_id: &str) -> Option<K> {
        let mut inner = self.inner.lock();
        let removed = inner.remove(connection_id);
        let total = inner.owner_of.len();
        drop(inner);

        let (owner, conn) = removed?;
        conn.close();
        gauge!(WS_CONNECTIONS_ACTIVE, "registry" => self.label).set(total as f64);
        info!(registry = self.label, %owner, conn_id = %connection_id, "disconnected");
        Some(owner)
    }

    /// Best-effort fan-out of `message` to every connection of `owner`.
    ///
    /// Returns how many connections accepted the frame. A failing connection
    /// never stops delivery to its siblings, and nothing is queued for an
    /// owner with no connections.
    pub fn send(&self, owner: &K, message: &OutboundMessage) -> usize {
        let targets = self.connections(owner);
        if targets.is_empty() {
            debug!(registry = self.label, %owner, kind = message.kind(), "no live connection");
            return 0;
        }
        let frame = match serde_json::to_string(message) {
            Ok(json) => Arc::new(json),
            Err(e) => {
                warn!(registry = self.label, kind = message.kind(), error = %e, "failed to serialize message");
                return 0;
            }
        };

        let mut delivered = 0;
        let mut to_remove = Vec::new();
        for conn in &targets {
            match conn.send(Arc::clone(&frame)) {
                Ok(()) => delivered += 1,
                Err(SendFailure::Full) => {
                    counter!(WS_SEND_DROPS_TOTAL, "registry" => self.label).increment(1);
                    let drops = conn.drop_count();
                    if drops >= self.max_total_drops {
                        warn!(registry = self.label, %owner, conn_id = %conn.id, drops, "disconnecting slow client");
                        to_remove.push(conn.id.clone());
                    } else {
                        warn!(registry = self.label, %owner, conn_id = %conn.id, total_drops = drops, "dropped frame (channel full)");
                    }
                }
                Err(SendFailure::Closed) => {
                    debug!(registry = self.label, %owner, conn_id = %conn.id, "send on closed connection");
                    to_remove.push(conn.id.clone());
                }
            }
        }
        for id in &to_remove {
            let _ = self.disconnect(id);
        }
        delivered
    }

    /// Snapshot of the owner's live connections.
    pub fn connections(&self, owner: &K) -> Vec<Arc<ClientConnection>> {
        self.inner
            .lock()
            .by_owner
            .get(owner)
            .map(|conns| conns.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether `owner` has at least one live connection.
    pub fn is_connected(&self, owner: &K) -> bool {
        self.inner.lock().by_owner.contains_key(owner)
    }

    /// Owner of a connection, if registered.
    pub fn owner_of(&self, connection_id: &str) -> Option<K> {
        self.inner.lock().owner_of.get(connection_id).cloned()
    }

    /// Total live connections.
    pub fn connection_count(&self) -> usize {
        self.inner.lock().owner_of.len()
    }

    /// Owners with at least one live connection.
    pub fn owner_count(&self) -> usize {
        self.inner.lock().by_owner.len()
    }

    /// Disconnect every connection whose owner matches `predicate`.
    pub fn disconnect_where(&self, predicate: impl Fn(&K) -> bool) -> usize {
        let ids: Vec<String> = {
            let inner = self.inner.lock();
            inner
                .owner_of
                .iter()
                .filter(|(_, owner)| predicate(owner))
                .map(|(id, _)| id.clone())
                .collect()
        };
        ids.iter().filter(|id| self.disconnect(id).is_some()).count()
    }
}

impl ConnectionRegistry<StudentKey> {
    /// Students of `session_id` with at least one live connection.
    pub fn connected_students(&self, session_id: SessionId) -> BTreeSet<StudentId> {
        self.inner
            .lock()
            .by_owner
            .keys()
            .filter(|key| key.session_id == session_id)
            .map(|key| key.student_id)
            .collect()
    }

    /// Close every student connection of a session.
    pub fn disconnect_session(&self, session_id: SessionId) -> usize {
        self.disconnect_where(|key| key.session_id == session_id)
    }
}
