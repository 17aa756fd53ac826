#![forbid(unsafe_code)]

/// Field-level validation cause. Every rejection names the wire field it came from.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ContractViolation {
    #[error("{field} is required")]
    MissingField { field: &'static str },
    #[error("{field} is not allowed")]
    UnknownField { field: String },
    #[error("{field} must be a {expected}")]
    InvalidType {
        field: &'static str,
        expected: &'static str,
    },
    #[error("{field} {reason}")]
    InvalidValue {
        field: &'static str,
        reason: &'static str,
    },
    #[error("{field} must be between {min} and {max}, got {got}")]
    InvalidRange {
        field: &'static str,
        min: f64,
        max: f64,
        got: f64,
    },
    #[error("{field} must be finite")]
    NotFinite { field: &'static str },
    #[error("{field} must not include markup")]
    ContainsMarkup { field: &'static str },
    #[error("{field}[{index}] {reason}")]
    InvalidItem {
        field: &'static str,
        index: usize,
        reason: &'static str,
    },
    #[error("{field} has {got} entries, expected {expected}")]
    MisalignedSequences {
        field: &'static str,
        expected: usize,
        got: usize,
    },
}

impl ContractViolation {
    pub fn field(&self) -> &str {
        match self {
            Self::MissingField { field }
            | Self::InvalidType { field, .. }
            | Self::InvalidValue { field, .. }
            | Self::InvalidRange { field, .. }
            | Self::NotFinite { field }
            | Self::ContainsMarkup { field }
            | Self::InvalidItem { field, .. }
            | Self::MisalignedSequences { field, .. } => field,
            Self::UnknownField { field } => field,
        }
    }
}

pub trait Validate {
    fn validate(&self) -> Result<(), ContractViolation>;
}
