#![forbid(unsafe_code)]

use std::sync::Arc;

use serde_json::Value;
use travel_kernel_contracts::identity::{ExternalIdentityKey, RecordId, VerifiedClaim};
use travel_kernel_contracts::profile::ProfileRecord;
use travel_kernel_contracts::schema::{ProfileSchema, Schema};
use travel_storage::ProfileRepo;

use crate::gate::{AuthorizationGate, GateDecision};
use crate::TravelError;

/// Creation, lookup and identity resolution for profile records.
pub struct ProfileService {
    repo: Arc<dyn ProfileRepo>,
    schema: ProfileSchema,
}

impl ProfileService {
    pub fn new(repo: Arc<dyn ProfileRepo>, schema: ProfileSchema) -> Self {
        Self { repo, schema }
    }

    /// Validates and sanitizes `body`, then persists it under a freshly assigned id.
    /// Nothing is written when validation fails.
    pub fn create_profile(&self, body: &Value) -> Result<ProfileRecord, TravelError> {
        let profile = self.schema.validate(body)?;
        let record = self.repo.create_profile(profile)?;
        tracing::info!(id = %record.id, "profile created");
        Ok(record)
    }

    pub fn get_profile(&self, id: &str) -> Result<ProfileRecord, TravelError> {
        let not_found = || TravelError::NotFound(format!("profile {id} not found"));
        let id = RecordId::new(id).map_err(|_| not_found())?;
        self.repo.find_profile_by_id(&id)?.ok_or_else(not_found)
    }

    pub fn resolve_profile_id(
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
            .find_profile_by_identity_key(&key)?
            .map(|record| record.id)
            .ok_or_else(|| TravelError::NotFound(format!("no profile for {external_id}")))
    }
}
