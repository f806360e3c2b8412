//! Products service errors.

use std::num::TryFromIntError;

use sqlx::{
    Error,
    error::{DatabaseError, ErrorKind},
};
use thiserror::Error;

use crate::domain::products::search::SearchError;

#[derive(Debug, Error)]
pub enum ProductsServiceError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("product not found")]
    NotFound,

    #[error("product already deleted")]
    AlreadyDeleted,

    #[error("product already exists")]
    AlreadyExists,

    #[error("thumbnail not found")]
    ReferenceNotFound,

    #[error("thumbnail type not allowed")]
    ReferenceTypeNotAllowed,

    #[error("thumbnail is not public")]
    ReferenceNotPublic,

    #[error("invalid data")]
    InvalidData,

    #[error("invalid price value")]
    InvalidPrice(#[from] TryFromIntError),

    #[error("storage error")]
    Sql(#[source] Error),

    #[error("search projection error")]
    Search(#[source] SearchError),
}

/// Transport-neutral classification of a service error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStatus {
    Unauthenticated,
    NotFound,
    FailedPrecondition,
    AlreadyExists,
    Internal,
}

impl ProductsServiceError {
    /// Map the error onto the status a transport layer should report.
    pub fn status(&self) -> ErrorStatus {
        match self {
            Self::Unauthorized => ErrorStatus::Unauthenticated,
            Self::NotFound | Self::ReferenceNotFound => ErrorStatus::NotFound,
            Self::AlreadyDeleted
            | Self::ReferenceTypeNotAllowed
            | Self::ReferenceNotPublic
            | Self::InvalidData
            | Self::InvalidPrice(_) => ErrorStatus::FailedPrecondition,
            Self::AlreadyExists => ErrorStatus::AlreadyExists,
            Self::Sql(_) | Self::Search(_) => ErrorStatus::Internal,
        }
    }

    /// Whether the failure came from a backing store rather than the request.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::Sql(_) | Self::Search(_))
    }
}

impl From<Error> for ProductsServiceError {
    fn from(error: Error) -> Self {
        if matches!(error, Error::RowNotFound) {
            return Self::NotFound;
        }

        match error.as_database_error().map(DatabaseError::kind) {
            Some(ErrorKind::UniqueViolation) => Self::AlreadyExists,
            Some(ErrorKind::NotNullViolation | ErrorKind::CheckViolation) => Self::InvalidData,
            Some(ErrorKind::ForeignKeyViolation | ErrorKind::Other | _) | None => Self::Sql(error),
        }
    }
}

impl From<SearchError> for ProductsServiceError {
    fn from(error: SearchError) -> Self {
        Self::Search(error)
    }
}
