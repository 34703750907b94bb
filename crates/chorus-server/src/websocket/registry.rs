//! Live connection set.
//!
//! Membership is keyed by [`ConnectionId`]. Iteration works on a snapshot
//! taken under the read lock, so callbacks never run while the lock is held
//! and a connection added mid-iteration is not visited.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use chorus_core::ids::ConnectionId;
use parking_lot::RwLock;

use super::connection::ClientConnection;

/// Result of one [`ConnectionRegistry::for_each_live`] pass.
#[derive(Debug)]
pub struct Visit<E> {
    /// Connections the callback ran for.
    pub visited: usize,
    /// Callback failures, by connection.
    pub failures: Vec<(ConnectionId, E)>,
}

/// The set of live client connections.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Arc<ClientConnection>>>,
}

impl ConnectionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a connection. Returns `false` if its ID is already present,
    /// in which case the existing entry is kept.
    pub fn add(&self, connection: Arc<ClientConnection>) -> bool {
        match self.connections.write().entry(connection.id().clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                let _ = slot.insert(connection);
                true
            }
        }
    }

    /// Remove a connection. Returns it only on the call that actually
    /// removed it; later calls are no-ops returning `None`.
    pub fn remove(&self, id: &ConnectionId) -> Option<Arc<ClientConnection>> {
        self.connections.write().remove(id)
    }

    /// Whether `id` is a member.
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.read().contains_key(id)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    /// Whether there are no members.
    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }

    /// Current members.
    pub fn snapshot(&self) -> Vec<Arc<ClientConnection>> {
        self.connections.read().values().cloned().collect()
    }

    /// Run `f` once per member of the current snapshot, in no particular
    /// order. A failing callback does not stop the pass.
    pub fn for_each_live<E>(
        &self,
        mut f: impl FnMut(&ClientConnection) -> Result<(), E>,
    ) -> Visit<E> {
        let members = self.snapshot();
        let mut failures = Vec::new();
        for conn in &members {
            if let Err(e) = f(conn) {
                failures.push((conn.id().clone(), e));
            }
        }
        Visit {
            visited: members.len(),
            failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use proptest::prelude::*;
    use tokio::sync::mpsc;

    fn make_connection(id: &str) -> Arc<ClientConnection> {
        let (tx, _rx) = mpsc::channel(1);
        Arc::new(ClientConnection::new(ConnectionId::from(id), tx))
    }

    #[test]
    fn add_and_remove() {
        let reg = ConnectionRegistry::new();
        assert!(reg.add(make_connection("c1")));
        assert_eq!(reg.len(), 1);
        assert!(reg.contains(&ConnectionId::from("c1")));

        assert!(reg.remove(&ConnectionId::from("c1")).is_some());
        assert!(reg.is_empty());
    }

    #[test]
    fn duplicate_add_is_idempotent() {
        let reg = ConnectionRegistry::new();
        let conn = make_connection("c1");
        assert!(reg.add(conn.clone()));
        assert!(!reg.add(conn));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn duplicate_add_keeps_first_entry() {
        let reg = ConnectionRegistry::new();
        let first = make_connection("c1");
        let _ = reg.add(first.clone());
        let _ = reg.add(make_connection("c1"));
        let kept = reg.snapshot().pop().unwrap();
        assert!(Arc::ptr_eq(&kept, &first));
    }

    #[test]
    fn remove_is_exactly_once() {
        let reg = ConnectionRegistry::new();
        let _ = reg.add(make_connection("c1"));
        assert!(reg.remove(&ConnectionId::from("c1")).is_some());
        assert!(reg.remove(&ConnectionId::from("c1")).is_none());
    }

    #[test]
    fn remove_nonexistent_is_noop() {
        let reg = ConnectionRegistry::new();
        let _ = reg.add(make_connection("c1"));
        assert!(reg.remove(&ConnectionId::from("nope")).is_none());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn for_each_live_visits_every_member() {
        let reg = ConnectionRegistry::new();
        for id in ["a", "b", "c"] {
            let _ = reg.add(make_connection(id));
        }
        let mut seen = HashSet::new();
        let visit = reg.for_each_live(|c| {
            let _ = seen.insert(c.id().to_string());
            Ok::<(), ()>(())
        });
        assert_eq!(visit.visited, 3);
        assert!(visit.failures.is_empty());
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn failure_does_not_stop_iteration() {
        let reg = ConnectionRegistry::new();
        for id in ["a", "b", "c", "d"] {
            let _ = reg.add(make_connection(id));
        }
        let mut calls = 0;
        let visit = reg.for_each_live(|c| {
            calls += 1;
            if c.id().as_str() == "b" {
                Err("boom")
            } else {
                Ok(())
            }
        });
        assert_eq!(calls, 4);
        assert_eq!(visit.visited, 4);
        assert_eq!(visit.failures.len(), 1);
        assert_eq!(visit.failures[0].0.as_str(), "b");
    }

    #[test]
    fn add_during_iteration_is_not_visited() {
        let reg = ConnectionRegistry::new();
        let _ = reg.add(make_connection("a"));
        let mut visited = Vec::new();
        let _ = reg.for_each_live(|c| {
            visited.push(c.id().to_string());
            let _ = reg.add(make_connection("late"));
            Ok::<(), ()>(())
        });
        assert_eq!(visited, vec!["a".to_string()]);
        assert_eq!(reg.len(), 2);
    }

    #[derive(Clone, Debug)]
    enum Op {
        Add(u8),
        Remove(u8),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![(0u8..8).prop_map(Op::Add), (0u8..8).prop_map(Op::Remove)]
    }

    proptest! {
        #[test]
        fn membership_matches_model(ops in proptest::collection::vec(op(), 0..64)) {
            let reg = ConnectionRegistry::new();
            let mut model = HashSet::new();
            for op in ops {
                match op {
                    Op::Add(n) => {
                        let id = format!("c{n}");
                        let inserted = reg.add(make_connection(&id));
                        prop_assert_eq!(inserted, model.insert(id));
                    }
                    Op::Remove(n) => {
                        let id = format!("c{n}");
                        let removed = reg.remove(&ConnectionId::from(id.as_str())).is_some();
                        prop_assert_eq!(removed, model.remove(&id));
                    }
                }
            }
            let live: HashSet<String> =
                reg.snapshot().iter().map(|c| c.id().to_string()).collect();
            prop_assert_eq!(live, model);
        }
    }
}
