//! The reviewer assignment engine and the team and user services around it.
//!
//! Everything here talks to storage through a [`database::TransactionCoordinator`],
//! one atomic scope per operation, so the same code runs against PostgreSQL and
//! against the in-memory store.

pub mod error;
pub mod picker;
pub mod pull_requests;
pub mod teams;
pub mod users;

pub use error::{EngineError, Entity};
pub use picker::ReviewerPicker;
pub use pull_requests::{ReviewEngine, MAX_REVIEWERS};
pub use teams::TeamService;
pub use users::UserService;

use database::TransactionCoordinator;
use std::sync::Arc;

/// Every service, wired to one coordinator and one random source.
#[derive(Clone)]
pub struct Services {
    pub pull_requests: ReviewEngine,
    pub teams: TeamService,
    pub users: UserService,
}

impl Services {
    pub fn new(coordinator: Arc<dyn TransactionCoordinator>, picker: Arc<ReviewerPicker>) -> Self {
        Self {
            pull_requests: ReviewEngine::new(Arc::clone(&coordinator), picker),
            teams: TeamService::new(Arc::clone(&coordinator)),
            users: UserService::new(coordinator),
        }
    }
}
