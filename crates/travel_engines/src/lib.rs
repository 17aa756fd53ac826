#![forbid(unsafe_code)]

pub mod hotels;
pub mod identity;
pub mod keywords;
pub mod provider;
