use thiserror::Error;

use crate::db::StoreError;

/// Failure taxonomy surfaced by the booking engine.
#[derive(Error, Debug)]
pub enum BookingError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("forbidden")]
    Forbidden,

    #[error("requested time overlaps an existing booking")]
    Conflict,

    #[error("invalid status: {0}")]
    InvalidStatus(String),

    #[error("invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("coach not found")]
    CoachNotFound,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl BookingError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::InvalidStateTransition(msg.into())
    }

    /// Status code the HTTP boundary answers with for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidInput(_) | Self::InvalidStatus(_) => 400,
            Self::Forbidden => 403,
            Self::CoachNotFound | Self::NotFound(_) => 404,
            Self::Conflict => 409,
            Self::InvalidStateTransition(_) => 422,
            Self::Internal(_) => 500,
        }
    }
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(entity) => Self::NotFound(entity),
            StoreError::UniqueViolation => Self::Conflict,
            other => Self::Internal(anyhow::Error::new(other)),
        }
    }
}
