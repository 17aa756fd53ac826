#![forbid(unsafe_code)]

pub mod error;
pub mod gate;
pub mod history;
pub mod profile;

pub use error::TravelError;
pub use gate::{AuthorizationGate, GateDecision};
pub use history::{AppendOutcome, HistoryAggregator};
pub use profile::ProfileService;
