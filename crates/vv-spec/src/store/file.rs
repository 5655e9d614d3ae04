use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{TimeDelta, Utc};
use tracing::{debug, warn};

use super::{FlowStore, StoreError, is_expired};
use crate::flow::{FlowId, FlowState};

const EXTENSION: &str = "cbor";

/// One CBOR file per flow under a state directory.
///
/// Writes go to a hidden temporary file that is renamed into place, so a
/// failed write leaves the previous state readable.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    ttl: Option<TimeDelta>,
}

impl FileStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir, ttl: None })
    }

    pub fn with_ttl(mut self, ttl: TimeDelta) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, flow_id: &FlowId) -> PathBuf {
        self.dir.join(format!("{flow_id}.{EXTENSION}"))
    }

    fn temp_path_for(&self, flow_id: &FlowId) -> PathBuf {
        self.dir.join(format!(".{flow_id}.{EXTENSION}.tmp"))
    }
}

impl FlowStore for FileStore {
    fn get(&self, flow_id: &FlowId) -> Result<Option<FlowState>, StoreError> {
        let path = self.path_for(flow_id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        let state: FlowState = serde_cbor::from_slice(&bytes).map_err(|source| {
            StoreError::Decode {
                path: path.clone(),
                source,
            }
        })?;

        if is_expired(&state, self.ttl, Utc::now()) {
            debug!(%flow_id, "flow file expired");
            self.delete(flow_id)?;
            return Ok(None);
        }
        Ok(Some(state))
    }

    fn put(&self, flow_id: &FlowId, state: &FlowState) -> Result<(), StoreError> {
        let bytes = serde_cbor::to_vec(state).map_err(|source| StoreError::Encode {
            flow_id: flow_id.clone(),
            source,
        })?;
        let temp = self.temp_path_for(flow_id);
        let path = self.path_for(flow_id);

        let written = fs::write(&temp, &bytes)
            .and_then(|()| fs::rename(&temp, &path))
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            });
        if written.is_err()
            && let Err(err) = fs::remove_file(&temp)
            && err.kind() != ErrorKind::NotFound
        {
            warn!(path = %temp.display(), %err, "failed to remove temporary flow file");
        }
        written
    }

    fn delete(&self, flow_id: &FlowId) -> Result<(), StoreError> {
        let path = self.path_for(flow_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }
}
