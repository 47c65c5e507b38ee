//! Relationship mutators: add and delete relatives.
//!
//! Every operation works on a copy of the committed dataset (callers obtain
//! one via `dataset::copy_dataset` or receive one back); the array backing
//! the live render is never touched, so a failed edit leaves nothing to
//! roll back.

pub mod add;
pub mod delete;

pub use add::{add_child, add_parents, add_partner, add_sibling, PartnerConfig};
pub use delete::{delete_node, DeleteOutcome, PendingDelete};

use crate::validation::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum EditError {
    /// Recoverable: callers branch on this without aborting the session.
    #[error("INVALID TWIN TYPE SET: {0}")]
    InvalidTwinType(String),
    #[error("Person {0} not found")]
    PersonNotFound(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}
