#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use travel_kernel_contracts::history::{HistoryDelta, HistoryRecord};
use travel_kernel_contracts::identity::{ExternalIdentityKey, RecordId};
use travel_kernel_contracts::profile::{ProfileInput, ProfileRecord};
use travel_kernel_contracts::ContractViolation;

use crate::repo::{HistoryRepo, ProfileRepo};

const JOURNAL_SCHEMA_VERSION: u32 = 1;
const RECORD_ID_BYTES: usize = 12;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StorageError {
    #[error("{collection} record {id} not found")]
    NotFound { collection: &'static str, id: String },
    #[error("{collection} record {key} already exists")]
    DuplicateKey { collection: &'static str, key: String },
    #[error("history {id} changed concurrently (expected version {expected}, found {found})")]
    VersionConflict {
        id: String,
        expected: u64,
        found: u64,
    },
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("invalid store connection string: {0}")]
    InvalidConnectionString(String),
    #[error(transparent)]
    ContractViolation(#[from] ContractViolation),
}

/// Where the document store keeps its data, parsed from a connection string.
///
/// `memory:` (or empty) keeps everything in process. `file:<path>` / `file://<path>` adds an
/// append-only JSON-lines journal that is replayed on open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    Memory,
    Journal(PathBuf),
}

impl StoreLocation {
    pub fn parse(raw: &str) -> Result<Self, StorageError> {
        let raw = raw.trim();
        if raw.is_empty() || raw == "memory:" || raw == "memory://" {
            return Ok(Self::Memory);
        }
        let path = raw
            .strip_prefix("file://")
            .or_else(|| raw.strip_prefix("file:"))
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| StorageError::InvalidConnectionString(raw.to_string()))?;
        Ok(Self::Journal(PathBuf::from(path)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct JournalEntry {
    schema_version: u32,
    op: JournalOp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum JournalOp {
    ProfileCreated { record: ProfileRecord },
    HistoryWritten { record: HistoryRecord },
}

#[derive(Debug)]
struct Journal {
    path: PathBuf,
}

impl Journal {
    fn open(path: &Path) -> Result<(Self, Vec<JournalOp>), StorageError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| {
                StorageError::Unavailable(format!(
                    "failed to create store directory '{}': {}",
                    parent.display(),
                    err
                ))
            })?;
        }
        if !path.exists() {
            File::create(path).map_err(|err| {
                StorageError::Unavailable(format!(
                    "failed to create store journal '{}': {}",
                    path.display(),
                    err
                ))
            })?;
        }
        let contents = fs::read(path).map_err(|err| {
            StorageError::Unavailable(format!(
                "failed to open store journal '{}': {}",
                path.display(),
                err
            ))
        })?;
        let mut ops = Vec::new();
        let mut offset = 0u64;
        for (idx, segment) in contents.split_inclusive(|b| *b == b'\n').enumerate() {
            let line_no = idx + 1;
            let line_start = offset;
            offset += segment.len() as u64;
            if segment.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            // Only the final segment can lack its newline.
            let terminated = segment.ends_with(b"\n");
            let entry: JournalEntry = match serde_json::from_slice(segment) {
                Ok(entry) => entry,
                Err(err) if !terminated => {
                    tracing::warn!(
                        path = %path.display(),
                        line = line_no,
                        error = %err,
                        "dropping torn store journal tail"
                    );
                    Self::truncate(path, line_start)?;
                    break;
                }
                Err(err) => {
                    return Err(StorageError::Unavailable(format!(
                        "failed parsing store journal '{}' at line {}: {}",
                        path.display(),
                        line_no,
                        err
                    )))
                }
            };
            if entry.schema_version != JOURNAL_SCHEMA_VERSION {
                return Err(StorageError::Unavailable(format!(
                    "unsupported store journal schema_version={} at line {}",
                    entry.schema_version, line_no
                )));
            }
            if !terminated {
                Self::terminate(path)?;
            }
            ops.push(entry.op);
        }
        Ok((
            Self {
                path: path.to_path_buf(),
            },
            ops,
        ))
    }

    fn append(&self, op: &JournalOp) -> Result<(), StorageError> {
        let entry = JournalEntry {
            schema_version: JOURNAL_SCHEMA_VERSION,
            op: op.clone(),
        };
        let json = serde_json::to_string(&entry).map_err(|err| {
            StorageError::Unavailable(format!("failed to encode store journal entry: {err}"))
        })?;
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|err| {
                StorageError::Unavailable(format!(
                    "failed opening store journal '{}' for append: {}",
                    self.path.display(),
                    err
                ))
            })?;
        let prev_len = file.metadata().map(|m| m.len()).map_err(|err| {
            StorageError::Unavailable(format!(
                "failed reading store journal '{}' metadata: {}",
                self.path.display(),
                err
            ))
        })?;
        file.write_all(json.as_bytes())
            .and_then(|_| file.write_all(b"\n"))
            .and_then(|_| file.sync_data())
            .map_err(|err| {
                // Cut back any partial entry so later appends start on a clean line.
                if let Err(trunc_err) = file.set_len(prev_len) {
                    tracing::error!(
                        path = %self.path.display(),
                        error = %trunc_err,
                        "failed to roll back partial store journal entry"
                    );
                }
                StorageError::Unavailable(format!(
                    "failed writing store journal '{}': {}",
                    self.path.display(),
                    err
                ))
            })
    }

    fn truncate(path: &Path, len: u64) -> Result<(), StorageError> {
        OpenOptions::new()
            .write(true)
            .open(path)
            .and_then(|file| file.set_len(len).and_then(|_| file.sync_data()))
            .map_err(|err| {
                StorageError::Unavailable(format!(
                    "failed truncating store journal '{}': {}",
                    path.display(),
                    err
                ))
            })
    }

    fn terminate(path: &Path) -> Result<(), StorageError> {
        OpenOptions::new()
            .append(true)
            .open(path)
            .and_then(|mut file| file.write_all(b"\n").and_then(|_| file.sync_data()))
            .map_err(|err| {
                StorageError::Unavailable(format!(
                    "failed terminating store journal '{}': {}",
                    path.display(),
                    err
                ))
            })
    }
}

#[derive(Debug, Default)]
struct StoreState {
    profiles: BTreeMap<RecordId, ProfileRecord>,
    // Identity key -> ids in creation order.
    profiles_by_key: BTreeMap<ExternalIdentityKey, Vec<RecordId>>,
    histories: BTreeMap<RecordId, HistoryRecord>,
    histories_by_key: BTreeMap<ExternalIdentityKey, Vec<RecordId>>,
}

impl StoreState {
    fn apply(&mut self, op: JournalOp) {
        match op {
            JournalOp::ProfileCreated { record } => {
                self.profiles_by_key
                    .entry(record.profile.external_id.clone())
                    .or_default()
                    .push(record.id.clone());
                self.profiles.insert(record.id.clone(), record);
            }
            JournalOp::HistoryWritten { record } => {
                if !self.histories.contains_key(&record.id) {
                    self.histories_by_key
                        .entry(record.history.external_id.clone())
                        .or_default()
                        .push(record.id.clone());
                }
                self.histories.insert(record.id.clone(), record);
            }
        }
    }

    fn fresh_id(&self) -> Result<RecordId, StorageError> {
        loop {
            let bytes: [u8; RECORD_ID_BYTES] = rand::random();
            let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
            let id = RecordId::new(hex)?;
            if !self.profiles.contains_key(&id) && !self.histories.contains_key(&id) {
                return Ok(id);
            }
        }
    }
}

/// Document store shared by every request handler.
///
/// Reads take a shared lock; each write is validated, journaled, then applied under the
/// exclusive lock, so readers only ever see whole records.
#[derive(Debug)]
pub struct DocumentStore {
    state: RwLock<StoreState>,
    journal: Option<Journal>,
}

impl DocumentStore {
    pub fn new_in_memory() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            journal: None,
        }
    }

    pub fn open(location: &StoreLocation) -> Result<Self, StorageError> {
        match location {
            StoreLocation::Memory => Ok(Self::new_in_memory()),
            StoreLocation::Journal(path) => {
                let (journal, ops) = Journal::open(path)?;
                let mut state = StoreState::default();
                let replayed = ops.len();
                for op in ops {
                    state.apply(op);
                }
                tracing::info!(
                    path = %path.display(),
                    replayed,
                    profiles = state.profiles.len(),
                    histories = state.histories.len(),
                    "document store journal replayed"
                );
                Ok(Self {
                    state: RwLock::new(state),
                    journal: Some(journal),
                })
            }
        }
    }

    pub fn profile_count(&self) -> Result<usize, StorageError> {
        Ok(self.read()?.profiles.len())
    }

    pub fn history_count(&self) -> Result<usize, StorageError> {
        Ok(self.read()?.histories.len())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreState>, StorageError> {
        self.state
            .read()
            .map_err(|_| StorageError::Unavailable("document store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreState>, StorageError> {
        self.state
            .write()
            .map_err(|_| StorageError::Unavailable("document store lock poisoned".to_string()))
    }

    fn commit(&self, state: &mut StoreState, op: JournalOp) -> Result<(), StorageError> {
        if let Some(journal) = self.journal.as_ref() {
            journal.append(&op)?;
        }
        state.apply(op);
        Ok(())
    }
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new_in_memory()
    }
}

impl ProfileRepo for DocumentStore {
    fn find_profile_by_id(&self, id: &RecordId) -> Result<Option<ProfileRecord>, StorageError> {
        Ok(self.read()?.profiles.get(id).cloned())
    }

    fn find_profile_by_identity_key(
        &self,
        key: &ExternalIdentityKey,
    ) -> Result<Option<ProfileRecord>, StorageError> {
        let state = self.read()?;
        Ok(state
            .profiles_by_key
            .get(key)
            .and_then(|ids| ids.first())
            .and_then(|id| state.profiles.get(id))
            .cloned())
    }

    fn create_profile(&self, profile: ProfileInput) -> Result<ProfileRecord, StorageError> {
        let mut state = self.write()?;
        let record = ProfileRecord::v1(state.fresh_id()?, profile)?;
        self.commit(
            &mut state,
            JournalOp::ProfileCreated {
                record: record.clone(),
            },
        )?;
        tracing::debug!(id = %record.id, "profile created");
        Ok(record)
    }
}

impl HistoryRepo for DocumentStore {
    fn find_history_by_id(&self, id: &RecordId) -> Result<Option<HistoryRecord>, StorageError> {
        Ok(self.read()?.histories.get(id).cloned())
    }

    fn find_history_by_identity_key(
        &self,
        key: &ExternalIdentityKey,
    ) -> Result<Option<HistoryRecord>, StorageError> {
        let state = self.read()?;
        Ok(state
            .histories_by_key
            .get(key)
            .and_then(|ids| ids.first())
            .and_then(|id| state.histories.get(id))
            .cloned())
    }

    fn create_history(
        &self,
        id: Option<RecordId>,
        history: HistoryDelta,
    ) -> Result<HistoryRecord, StorageError> {
        let mut state = self.write()?;
        let id = match id {
            Some(id) => {
                if state.histories.contains_key(&id) {
                    return Err(StorageError::DuplicateKey {
                        collection: "history",
                        key: id.to_string(),
                    });
                }
                id
            }
            None => state.fresh_id()?,
        };
        let record = HistoryRecord::v1(id, 1, history)?;
        self.commit(
            &mut state,
            JournalOp::HistoryWritten {
                record: record.clone(),
            },
        )?;
        Ok(record)
    }

    fn update_history_by_id(
        &self,
        id: &RecordId,
        expected_version: u64,
        history: HistoryDelta,
    ) -> Result<HistoryRecord, StorageError> {
        let mut state = self.write()?;
        let found = state
            .histories
            .get(id)
            .map(|current| current.version)
            .ok_or_else(|| StorageError::NotFound {
                collection: "history",
                id: id.to_string(),
            })?;
        if found != expected_version {
            return Err(StorageError::VersionConflict {
                id: id.to_string(),
                expected: expected_version,
                found,
            });
        }
        let record = HistoryRecord::v1(id.clone(), found + 1, history)?;
        self.commit(
            &mut state,
            JournalOp::HistoryWritten {
                record: record.clone(),
            },
        )?;
        Ok(record)
    }
}
