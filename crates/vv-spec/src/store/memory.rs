use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{TimeDelta, Utc};
use tracing::debug;

use super::{FlowStore, StoreError, is_expired};
use crate::flow::{FlowId, FlowState};

/// Flows held in process memory, keyed by flow id.
///
/// With a TTL, every `put` first sweeps expired flows, so abandoned flows
/// never outlive the next write.
#[derive(Debug, Default)]
pub struct MemoryStore {
    flows: Mutex<HashMap<FlowId, FlowState>>,
    ttl: Option<TimeDelta>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flows idle for longer than `ttl` read back as absent.
    pub fn with_ttl(ttl: TimeDelta) -> Self {
        Self {
            flows: Mutex::default(),
            ttl: Some(ttl),
        }
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.lock()?.is_empty())
    }

    /// Drops every expired flow and returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize, StoreError> {
        let mut flows = self.lock()?;
        Ok(self.sweep(&mut flows))
    }

    fn sweep(&self, flows: &mut HashMap<FlowId, FlowState>) -> usize {
        if self.ttl.is_none() {
            return 0;
        }
        let now = Utc::now();
        let before = flows.len();
        flows.retain(|_, state| !is_expired(state, self.ttl, now));
        let purged = before - flows.len();
        if purged > 0 {
            debug!(purged, "purged expired flows");
        }
        purged
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<FlowId, FlowState>>, StoreError> {
        self.flows.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl FlowStore for MemoryStore {
    fn get(&self, flow_id: &FlowId) -> Result<Option<FlowState>, StoreError> {
        let mut flows = self.lock()?;
        let now = Utc::now();
        if flows
            .get(flow_id)
            .is_some_and(|state| is_expired(state, self.ttl, now))
        {
            flows.remove(flow_id);
            debug!(%flow_id, "flow expired");
            return Ok(None);
        }
        Ok(flows.get(flow_id).cloned())
    }

    fn put(&self, flow_id: &FlowId, state: &FlowState) -> Result<(), StoreError> {
        let mut flows = self.lock()?;
        self.sweep(&mut flows);
        flows.insert(flow_id.clone(), state.clone());
        Ok(())
    }

    fn delete(&self, flow_id: &FlowId) -> Result<(), StoreError> {
        self.lock()?.remove(flow_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_flows_read_back_as_absent() {
        let store = MemoryStore::with_ttl(TimeDelta::minutes(30));
        let flow_id = FlowId::generate();
        let stale = FlowState::new(flow_id.clone(), Utc::now() - TimeDelta::hours(2));
        store.put(&flow_id, &stale).expect("put");

        assert_eq!(store.get(&flow_id).expect("get"), None);
        assert!(store.is_empty().expect("len"));
    }

    #[test]
    fn purge_keeps_fresh_flows() {
        let store = MemoryStore::with_ttl(TimeDelta::minutes(30));
        let fresh = FlowId::generate();
        let stale = FlowId::generate();
        store
            .put(&fresh, &FlowState::new(fresh.clone(), Utc::now()))
            .expect("put");
        store
            .put(
                &stale,
                &FlowState::new(stale.clone(), Utc::now() - TimeDelta::days(1)),
            )
            .expect("put");

        assert_eq!(store.purge_expired().expect("purge"), 1);
        assert!(store.get(&fresh).expect("get").is_some());
    }

    #[test]
    fn writes_sweep_abandoned_flows() {
        let store = MemoryStore::with_ttl(TimeDelta::minutes(30));
        let abandoned = FlowId::generate();
        store
            .put(
                &abandoned,
                &FlowState::new(abandoned.clone(), Utc::now() - TimeDelta::hours(3)),
            )
            .expect("put");
        assert_eq!(store.len().expect("len"), 1);

        let next = FlowId::generate();
        store
            .put(&next, &FlowState::new(next.clone(), Utc::now()))
            .expect("put");
        assert_eq!(store.len().expect("len"), 1);
        assert!(store.get(&next).expect("get").is_some());
    }
}
