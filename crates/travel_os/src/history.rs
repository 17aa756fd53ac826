#![forbid(unsafe_code)]

//! History aggregation.
//!
//! A visit is merged by reading the current record, appending one value to each of the five
//! sequences and writing the whole record back. Two guards keep concurrent appends for the
//! same id from losing a visit:
//!
//! - a per-id critical section, so appends routed through one aggregator run one at a time;
//! - the store's version compare-and-swap, so a write computed from a stale read is refused
//!   and recomputed from a fresh one (covers writers outside this aggregator).

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use travel_kernel_contracts::history::{HistoryDelta, HistoryRecord, Visit};
use travel_kernel_contracts::identity::{ExternalIdentityKey, RecordId, VerifiedClaim};
use travel_kernel_contracts::schema::{HistoryDeltaSchema, Schema};
use travel_kernel_contracts::{ContractViolation, Validate};
use travel_storage::{HistoryRepo, StorageError};

use crate::gate::{AuthorizationGate, GateDecision};
use crate::TravelError;

const MAX_APPEND_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Created,
    Merged { visits: usize },
}

pub struct HistoryAggregator {
    repo: Arc<dyn HistoryRepo>,
    schema: HistoryDeltaSchema,
    locks: AppendLocks,
}

impl HistoryAggregator {
    pub fn new(repo: Arc<dyn HistoryRepo>, schema: HistoryDeltaSchema) -> Self {
        Self {
            repo,
            schema,
            locks: AppendLocks::default(),
        }
    }

    /// Appends one visit to the history at `id`, creating it when absent. Creation
    /// needs `identity_key`; a merge falls back to the stored key when it is omitted.
    pub fn append_visit(
        &self,
        id: &RecordId,
        identity_key: Option<&ExternalIdentityKey>,
        visit: &Visit,
    ) -> Result<AppendOutcome, TravelError> {
        let slot = self.locks.acquire(id)?;
        let _serial = slot.lock();

        for attempt in 1..=MAX_APPEND_ATTEMPTS {
            match self.try_append(id, identity_key, visit) {
                Err(err @ (StorageError::VersionConflict { .. } | StorageError::DuplicateKey { .. })) => {
                    tracing::warn!(%id, attempt, error = %err, "history append raced, retrying");
                }
                Ok(outcome) => {
                    match outcome {
                        AppendOutcome::Created => tracing::info!(%id, "history created"),
                        AppendOutcome::Merged { visits } => {
                            tracing::info!(%id, visits, "history merged")
                        }
                    }
                    return Ok(outcome);
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(TravelError::StoreUnavailable(format!(
            "history {id} kept changing during append"
        )))
    }

    pub fn get_history(&self, id: &str) -> Result<HistoryRecord, TravelError> {
        let not_found = || TravelError::NotFound(format!("history {id} not found"));
        let id = RecordId::new(id).map_err(|_| not_found())?;
        self.repo.find_history_by_id(&id)?.ok_or_else(not_found)
    }

    /// Maps the caller's own identity key to the internal id of their history.
    pub fn resolve_history_id(
        &self,
        claim: &VerifiedClaim,
        external_id: &str,
    ) -> Result<RecordId, TravelError> {
        if AuthorizationGate::authorize(claim, external_id) == GateDecision::Deny {
            return Err(TravelError::Auth(
                "credential does not match requested identity".to_string(),
            ));
        }
        let key = ExternalIdentityKey::new(external_id)?;
        self.repo
            .find_history_by_identity_key(&key)?
            .map(|record| record.id)
            .ok_or_else(|| TravelError::NotFound(format!("no history for {external_id}")))
    }

    fn try_append(
        &self,
        id: &RecordId,
        identity_key: Option<&ExternalIdentityKey>,
        visit: &Visit,
    ) -> Result<AppendOutcome, StorageError> {
        match self.repo.find_history_by_id(id)? {
            Some(current) => {
                if identity_key.is_some_and(|key| key != &current.history.external_id) {
                    return Err(ContractViolation::InvalidValue {
                        field: "externalId",
                        reason: "does not match the history record",
                    }
                    .into());
                }
                let merged = self.validate_full(&current.history.with_visit(visit))?;
                let visits = merged.len();
                self.repo
                    .update_history_by_id(id, current.version, merged)?;
                Ok(AppendOutcome::Merged { visits })
            }
            None => {
                let identity_key = identity_key
                    .cloned()
                    .ok_or(ContractViolation::MissingField { field: "externalId" })?;
                let fresh = self.validate_full(&HistoryDelta::empty(identity_key).with_visit(visit))?;
                self.repo.create_history(Some(id.clone()), fresh)?;
                Ok(AppendOutcome::Created)
            }
        }
    }

    // Runs the complete record through the history schema, then checks alignment.
    fn validate_full(&self, history: &HistoryDelta) -> Result<HistoryDelta, ContractViolation> {
        let value = serde_json::to_value(history).map_err(|_| ContractViolation::InvalidType {
            field: "record",
            expected: "object",
        })?;
        let sanitized = self.schema.validate(&value)?;
        sanitized.validate()?;
        Ok(sanitized)
    }
}

/// Per-id mutexes, created on demand and dropped once no append holds them.
#[derive(Default)]
struct AppendLocks {
    table: Mutex<BTreeMap<RecordId, Arc<Mutex<()>>>>,
}

impl AppendLocks {
    fn acquire(&self, id: &RecordId) -> Result<AppendSlot<'_>, TravelError> {
        let mut table = self
            .table
            .lock()
            .map_err(|_| TravelError::StoreUnavailable("append lock table poisoned".to_string()))?;
        let slot = table.entry(id.clone()).or_default().clone();
        Ok(AppendSlot {
            locks: self,
            id: id.clone(),
            slot,
        })
    }
}

struct AppendSlot<'a> {
    locks: &'a AppendLocks,
    id: RecordId,
    slot: Arc<Mutex<()>>,
}

impl AppendSlot<'_> {
    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        // The mutex guards no data, so a poisoned one is still a valid critical section.
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for AppendSlot<'_> {
    fn drop(&mut self) {
        if let Ok(mut table) = self.locks.table.lock() {
            // One reference in the table plus ours: nobody else is waiting.
            if Arc::strong_count(&self.slot) == 2 {
                table.remove(&self.id);
            }
        }
    }
}
