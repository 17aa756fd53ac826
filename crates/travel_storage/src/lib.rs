#![forbid(unsafe_code)]

pub mod repo;
pub mod store;

pub use repo::{HistoryRepo, ProfileRepo};
pub use store::{DocumentStore, StorageError, StoreLocation};
