#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::ContractViolation;

/// Opaque store-assigned identifier for a profile or history record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let id = id.into();
        if id.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "id",
                reason: "must not be empty",
            });
        }
        if id.len() > 64 {
            return Err(ContractViolation::InvalidValue {
                field: "id",
                reason: "must be <= 64 chars",
            });
        }
        if !id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(ContractViolation::InvalidValue {
                field: "id",
                reason: "must be ascii alphanumeric, '-' or '_'",
            });
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RecordId {
    type Error = ContractViolation;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RecordId> for String {
    fn from(value: RecordId) -> Self {
        value.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable string naming a real-world user, issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExternalIdentityKey(String);

impl ExternalIdentityKey {
    pub fn new(key: impl Into<String>) -> Result<Self, ContractViolation> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "externalId",
                reason: "must not be empty",
            });
        }
        if key.len() > 128 {
            return Err(ContractViolation::InvalidValue {
                field: "externalId",
                reason: "must be <= 128 chars",
            });
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ExternalIdentityKey {
    type Error = ContractViolation;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ExternalIdentityKey> for String {
    fn from(value: ExternalIdentityKey) -> Self {
        value.0
    }
}

impl std::fmt::Display for ExternalIdentityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of credential verification. Anonymous when the request carried no credential.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VerifiedClaim {
    identity_key: Option<ExternalIdentityKey>,
}

impl VerifiedClaim {
    pub fn anonymous() -> Self {
        Self { identity_key: None }
    }

    pub fn verified(identity_key: ExternalIdentityKey) -> Self {
        Self {
            identity_key: Some(identity_key),
        }
    }

    pub fn identity_key(&self) -> Option<&ExternalIdentityKey> {
        self.identity_key.as_ref()
    }

    pub fn is_anonymous(&self) -> bool {
        self.identity_key.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_id_rejects_path_like_values() {
        assert!(RecordId::new("65f0c2a1b3e4d5f6a7b8c9d0").is_ok());
        assert!(RecordId::new("").is_err());
        assert!(RecordId::new("../etc").is_err());
        assert!(RecordId::new("a".repeat(65)).is_err());
    }

    #[test]
    fn identity_key_rejects_blank() {
        assert!(ExternalIdentityKey::new("u1").is_ok());
        assert!(matches!(
            ExternalIdentityKey::new("   "),
            Err(ContractViolation::InvalidValue {
                field: "externalId",
                ..
            })
        ));
    }

    #[test]
    fn anonymous_claim_has_no_key() {
        assert!(VerifiedClaim::anonymous().is_anonymous());
        let claim = VerifiedClaim::verified(ExternalIdentityKey::new("u1").unwrap());
        assert_eq!(claim.identity_key().map(|k| k.as_str()), Some("u1"));
    }
}
