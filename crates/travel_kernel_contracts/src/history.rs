#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::identity::{ExternalIdentityKey, RecordId};
use crate::{ContractViolation, Validate};

/// One logical stay: the values written at a single index across the five sequences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    pub destination: String,
    pub lodging: String,
    pub rating: f64,
    pub price: f64,
    pub days_stayed: f64,
}

/// Wire body of a single visit append. The identity key may be omitted when the
/// history already exists.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VisitRequest {
    #[serde(default, alias = "firebase_id")]
    pub external_id: Option<ExternalIdentityKey>,
    #[serde(alias = "destinationName")]
    pub destination: String,
    #[serde(alias = "hotelName")]
    pub lodging: String,
    pub rating: f64,
    pub price: f64,
    pub days_stayed: f64,
}

impl VisitRequest {
    pub fn into_parts(self) -> (Option<ExternalIdentityKey>, Visit) {
        (
            self.external_id,
            Visit {
                destination: self.destination,
                lodging: self.lodging,
                rating: self.rating,
                price: self.price,
                days_stayed: self.days_stayed,
            },
        )
    }
}

/// Identity key plus five parallel visit sequences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryDelta {
    pub external_id: ExternalIdentityKey,
    #[serde(default)]
    pub destination: Vec<String>,
    #[serde(default)]
    pub lodging: Vec<String>,
    #[serde(default)]
    pub rating: Vec<f64>,
    #[serde(default)]
    pub price: Vec<f64>,
    #[serde(default)]
    pub days_stayed: Vec<f64>,
}

impl HistoryDelta {
    pub fn empty(external_id: ExternalIdentityKey) -> Self {
        Self {
            external_id,
            destination: Vec::new(),
            lodging: Vec::new(),
            rating: Vec::new(),
            price: Vec::new(),
            days_stayed: Vec::new(),
        }
    }

    /// Copy of `self` with `visit` appended at index `len()` of every sequence.
    pub fn with_visit(&self, visit: &Visit) -> Self {
        let mut next = self.clone();
        next.destination.push(visit.destination.clone());
        next.lodging.push(visit.lodging.clone());
        next.rating.push(visit.rating);
        next.price.push(visit.price);
        next.days_stayed.push(visit.days_stayed);
        next
    }

    pub fn len(&self) -> usize {
        self.destination.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn visit(&self, index: usize) -> Option<Visit> {
        Some(Visit {
            destination: self.destination.get(index)?.clone(),
            lodging: self.lodging.get(index)?.clone(),
            rating: *self.rating.get(index)?,
            price: *self.price.get(index)?,
            days_stayed: *self.days_stayed.get(index)?,
        })
    }
}

impl Validate for HistoryDelta {
    fn validate(&self) -> Result<(), ContractViolation> {
        let expected = self.destination.len();
        for (field, got) in [
            ("lodging", self.lodging.len()),
            ("rating", self.rating.len()),
            ("price", self.price.len()),
            ("daysStayed", self.days_stayed.len()),
        ] {
            if got != expected {
                return Err(ContractViolation::MisalignedSequences {
                    field,
                    expected,
                    got,
                });
            }
        }
        for (field, values) in [
            ("rating", &self.rating),
            ("price", &self.price),
            ("daysStayed", &self.days_stayed),
        ] {
            if values.iter().any(|v| !v.is_finite()) {
                return Err(ContractViolation::NotFinite { field });
            }
        }
        Ok(())
    }
}

/// Stored history. `version` increases by one on every committed write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: RecordId,
    pub version: u64,
    #[serde(flatten)]
    pub history: HistoryDelta,
}

impl HistoryRecord {
    pub fn v1(id: RecordId, version: u64, history: HistoryDelta) -> Result<Self, ContractViolation> {
        history.validate()?;
        Ok(Self {
            id,
            version,
            history,
        })
    }
}
