//! Core types and the versioning engine for the timetravel record store.
//!
//! This crate is deliberately free of HTTP and SQL dependencies. Storage
//! substrates implement [`backend::Backend`]; the HTTP layer talks to
//! [`store::VersionedRecordStore`].

pub mod backend;
pub mod chain;
pub mod error;
pub mod lock;
pub mod memory;
pub mod patch;
pub mod record;
pub mod snapshot;
pub mod store;

pub use error::{Error, Result};

#[cfg(test)]
mod tests;
