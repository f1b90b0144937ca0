use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Closed classification of data-access failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// The store could not be reached or the query failed.
    Network,
    /// The query succeeded but a required row does not exist.
    NotFound,
    /// A row came back that cannot be decoded into the data model.
    MalformedRow,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Network => "network",
            ErrorKind::NotFound => "not found",
            ErrorKind::MalformedRow => "malformed row",
        };
        f.write_str(label)
    }
}

/// Errors returned by data sources and stored in adapter state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DashboardError {
    #[error("network error: {0}")]
    Network(String),

    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("malformed {entity} row: {message}")]
    MalformedRow {
        entity: &'static str,
        message: String,
    },
}

impl DashboardError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DashboardError::Network(_) => ErrorKind::Network,
            DashboardError::NotFound { .. } => ErrorKind::NotFound,
            DashboardError::MalformedRow { .. } => ErrorKind::MalformedRow,
        }
    }

    pub fn not_found(entity: &'static str, key: impl fmt::Display) -> Self {
        DashboardError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn malformed(entity: &'static str, message: impl fmt::Display) -> Self {
        DashboardError::MalformedRow {
            entity,
            message: message.to_string(),
        }
    }

    /// Classify a `sqlx` failure for the given entity.
    pub fn from_sqlx(entity: &'static str, err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DashboardError::not_found(entity, "no matching row"),
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnIndexOutOfBounds { .. }
            | sqlx::Error::Decode(_) => DashboardError::malformed(entity, err),
            other => DashboardError::Network(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;
