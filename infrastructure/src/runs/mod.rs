//! Run record persistence

pub mod repository;
