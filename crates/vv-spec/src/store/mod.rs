//! Persistence of in-progress flows between requests.
//!
//! The controller only relies on the [`FlowStore`] contract; backends decide
//! where state lives and when abandoned flows expire.

mod file;
mod memory;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;

use crate::flow::{FlowId, FlowState};

pub use file::FileStore;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state store lock was poisoned")]
    Poisoned,
    #[error("failed to access flow file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode flow '{flow_id}': {source}")]
    Encode {
        flow_id: FlowId,
        #[source]
        source: serde_cbor::Error,
    },
    #[error("failed to decode flow file '{path}': {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_cbor::Error,
    },
}

/// Get/put/delete of flow state keyed by flow id.
///
/// `put` either stores the whole state or fails without changing what `get`
/// returns.
pub trait FlowStore {
    fn get(&self, flow_id: &FlowId) -> Result<Option<FlowState>, StoreError>;
    fn put(&self, flow_id: &FlowId, state: &FlowState) -> Result<(), StoreError>;
    fn delete(&self, flow_id: &FlowId) -> Result<(), StoreError>;
}

impl<T: FlowStore + ?Sized> FlowStore for Arc<T> {
    fn get(&self, flow_id: &FlowId) -> Result<Option<FlowState>, StoreError> {
        (**self).get(flow_id)
    }

    fn put(&self, flow_id: &FlowId, state: &FlowState) -> Result<(), StoreError> {
        (**self).put(flow_id, state)
    }

    fn delete(&self, flow_id: &FlowId) -> Result<(), StoreError> {
        (**self).delete(flow_id)
    }
}

impl<T: FlowStore + ?Sized> FlowStore for Box<T> {
    fn get(&self, flow_id: &FlowId) -> Result<Option<FlowState>, StoreError> {
        (**self).get(flow_id)
    }

    fn put(&self, flow_id: &FlowId, state: &FlowState) -> Result<(), StoreError> {
        (**self).put(flow_id, state)
    }

    fn delete(&self, flow_id: &FlowId) -> Result<(), StoreError> {
        (**self).delete(flow_id)
    }
}

fn is_expired(state: &FlowState, ttl: Option<TimeDelta>, now: DateTime<Utc>) -> bool {
    ttl.is_some_and(|ttl| now - state.updated_at > ttl)
}
