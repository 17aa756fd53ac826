#![forbid(unsafe_code)]

use travel_kernel_contracts::history::{HistoryDelta, HistoryRecord};
use travel_kernel_contracts::identity::{ExternalIdentityKey, RecordId};
use travel_kernel_contracts::profile::{ProfileInput, ProfileRecord};

use crate::store::StorageError;

/// Typed repository interface for profile documents.
pub trait ProfileRepo: Send + Sync {
    fn find_profile_by_id(&self, id: &RecordId) -> Result<Option<ProfileRecord>, StorageError>;

    /// Earliest-created profile carrying `key`. Keys are not unique.
    fn find_profile_by_identity_key(
        &self,
        key: &ExternalIdentityKey,
    ) -> Result<Option<ProfileRecord>, StorageError>;

    /// Persists a new profile under a freshly assigned id.
    fn create_profile(&self, profile: ProfileInput) -> Result<ProfileRecord, StorageError>;
}

/// Typed repository interface for history documents.
pub trait HistoryRepo: Send + Sync {
    fn find_history_by_id(&self, id: &RecordId) -> Result<Option<HistoryRecord>, StorageError>;

    /// Earliest-created history carrying `key`. Keys are not unique.
    fn find_history_by_identity_key(
        &self,
        key: &ExternalIdentityKey,
    ) -> Result<Option<HistoryRecord>, StorageError>;

    /// Persists a new history at version 1. `id = None` assigns a fresh id;
    /// an explicit id that already exists fails with `DuplicateKey`.
    fn create_history(
        &self,
        id: Option<RecordId>,
        history: HistoryDelta,
    ) -> Result<HistoryRecord, StorageError>;

    /// Replaces all five sequences in one write if the stored version still equals
    /// `expected_version`; otherwise fails with `VersionConflict` and changes nothing.
    fn update_history_by_id(
        &self,
        id: &RecordId,
        expected_version: u64,
        history: HistoryDelta,
    ) -> Result<HistoryRecord, StorageError>;
}
