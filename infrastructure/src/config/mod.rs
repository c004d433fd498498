//! Configuration and secret storage adapters

pub mod secret;
pub mod store;
