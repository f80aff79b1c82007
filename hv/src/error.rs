//! Settings error types

use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced by settings resolution and mutation
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Area not found: {0}")]
    AreaNotFound(String),

    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    #[error("Person not found: {0}")]
    PersonNotFound(String),

    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("Settings storage failed")]
    Storage(#[from] StoreError),
}

impl SettingsError {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }
}
