//! # Database Crate
//!
//! This crate is the persistence gateway of the review assigner. It owns every
//! read and write against the four relations (users, teams, pull requests and
//! reviewer links) and the transaction coordinator that groups them.
//!
//! ## Architectural Principles
//!
//! - **Unit of work:** callers receive an explicit transactional handle
//!   ([`UnitOfWork`]) and pass it down their call chain. There is no ambient
//!   connection state, so an in-memory store can stand in for PostgreSQL.
//! - **No business meaning:** errors say *what* happened (missing row, unique
//!   or foreign-key violation, I/O failure), never what it means to the caller.
//! - **Asynchronous & Pooled:** the PostgreSQL adapter uses a `PgPool` and one
//!   database transaction per unit of work.
//!
//! ## Public API
//!
//! - `connect` / `run_migrations`: pool construction and schema migrations.
//! - `run_atomic`: commit-on-success, rollback-on-failure wrapper.
//! - `DbRepository`: the PostgreSQL transaction coordinator.
//! - `InMemoryStore`: the process-local transaction coordinator.
//! - `DbError`: the specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod connection;
pub mod error;
pub mod gateway;
pub mod memory;
pub mod repository;

// Re-export the key components to create a clean, public-facing API.
pub use connection::{connect, run_migrations};
pub use error::DbError;
pub use gateway::{
    run_atomic, PullRequestGateway, TeamGateway, TransactionCoordinator, UnitOfWork, UserGateway,
};
pub use memory::InMemoryStore;
pub use repository::{DbRepository, PgUnitOfWork};
