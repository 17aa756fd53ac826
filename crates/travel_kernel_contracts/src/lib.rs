#![forbid(unsafe_code)]

pub mod common;
pub mod history;
pub mod hotel;
pub mod identity;
pub mod profile;
pub mod sanitize;
pub mod schema;

pub use common::{ContractViolation, Validate};
