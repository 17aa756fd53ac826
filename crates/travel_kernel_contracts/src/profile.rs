#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::identity::{ExternalIdentityKey, RecordId};
use crate::{ContractViolation, Validate};

pub const PHONE_MIN: u64 = 1_000_000_000;
pub const PHONE_MAX: u64 = 9_999_999_999;

/// Sanitized profile fields as accepted by the profile schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileInput {
    pub external_id: ExternalIdentityKey,
    pub name: String,
    pub email: String,
    pub age: u32,
    pub country: String,
    pub region: String,
    pub phone: u64,
}

impl Validate for ProfileInput {
    fn validate(&self) -> Result<(), ContractViolation> {
        for (field, value) in [
            ("name", &self.name),
            ("email", &self.email),
            ("country", &self.country),
            ("region", &self.region),
        ] {
            if value.is_empty() {
                return Err(ContractViolation::InvalidValue {
                    field,
                    reason: "must not be empty",
                });
            }
        }
        if !(PHONE_MIN..=PHONE_MAX).contains(&self.phone) {
            return Err(ContractViolation::InvalidRange {
                field: "phone",
                min: PHONE_MIN as f64,
                max: PHONE_MAX as f64,
                got: self.phone as f64,
            });
        }
        Ok(())
    }
}

/// Stored profile. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: RecordId,
    #[serde(flatten)]
    pub profile: ProfileInput,
}

impl ProfileRecord {
    pub fn v1(id: RecordId, profile: ProfileInput) -> Result<Self, ContractViolation> {
        profile.validate()?;
        Ok(Self { id, profile })
    }
}
