//! Accord storage abstractions.
//!
//! This crate defines the storage contract for the transition core:
//! - the append-only progress ledger
//! - kind-specific document records and their progress pointer
//! - document artifacts bound to progress rows
//! - approver join rows carrying one-time verification tokens
//!
//! Design stance:
//! - Every lifecycle mutation goes through a [`LedgerTransaction`]; dropping
//!   it without `commit` discards all staged writes.
//! - Token consumption is a single conditional write owned by the backend.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod error;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
mod traits;

pub use error::{StorageError, StorageResult};
pub use memory::InMemoryStorage;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStorage;
pub use traits::{ApproverStore, LedgerStore, LedgerTransaction, Storage, TokenConsumption};
