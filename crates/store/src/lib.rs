//! Storage layer for the booking service.
//!
//! The [`Store`] trait is the single source of truth for appointment and
//! user state. Two implementations are provided: [`InMemoryStore`] for
//! tests and development, and [`PostgresStore`] backed by sqlx.
//!
//! All appointment mutation goes through [`Store::update_appointment`],
//! which merges a partial update, enforces the domain invariants, and
//! serializes concurrent updates to the same appointment id.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use store::Store;
