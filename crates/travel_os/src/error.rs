#![forbid(unsafe_code)]

use travel_kernel_contracts::ContractViolation;
use travel_storage::StorageError;

/// Failure taxonomy shared by every operation behind the HTTP surface.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TravelError {
    #[error("validation failed: {0}")]
    Validation(#[from] ContractViolation),
    #[error("{0}")]
    NotFound(String),
    #[error("not authorized: {0}")]
    Auth(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("upstream failure: {0}")]
    Upstream(String),
}

impl From<StorageError> for TravelError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ContractViolation(v) => TravelError::Validation(v),
            StorageError::NotFound { collection, id } => {
                TravelError::NotFound(format!("{collection} record {id} not found"))
            }
            StorageError::Unavailable(reason) => TravelError::StoreUnavailable(reason),
            other => TravelError::StoreUnavailable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_map_onto_the_taxonomy() {
        let v = ContractViolation::MissingField { field: "name" };
        assert_eq!(
            TravelError::from(StorageError::ContractViolation(v.clone())),
            TravelError::Validation(v)
        );
        assert!(matches!(
            TravelError::from(StorageError::NotFound {
                collection: "profile",
                id: "x".to_string()
            }),
            TravelError::NotFound(_)
        ));
        assert!(matches!(
            TravelError::from(StorageError::VersionConflict {
                id: "h1".to_string(),
                expected: 1,
                found: 2
            }),
            TravelError::StoreUnavailable(_)
        ));
        assert_eq!(
            TravelError::from(StorageError::Unavailable("disk full".to_string())).to_string(),
            "store unavailable: disk full"
        );
    }
}
