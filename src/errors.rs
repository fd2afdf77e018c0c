use rusqlite::ErrorCode;
use thiserror::Error;

/// Error type for relgraph operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("schema error: {0}")]
    Schema(String),
    #[error("query error: {0}")]
    Query(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("referential error: {0}")]
    Referential(String),
    #[error(
        "merge conflict: {} {kind} entities match {criteria}: {conflicting_ids:?}",
        .conflicting_ids.len()
    )]
    MergeConflict {
        kind: String,
        criteria: String,
        conflicting_ids: Vec<i64>,
    },
    #[error("transaction state error: {0}")]
    TransactionState(String),
    #[error("storage busy: {0}")]
    Busy(String),
    #[error("retry exhausted after {attempts} attempts: {last_message}")]
    RetryExhausted { attempts: u32, last_message: String },
    #[error("pattern error: {0}")]
    Pattern(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl GraphError {
    pub fn connection<T: Into<String>>(msg: T) -> Self {
        GraphError::Connection(msg.into())
    }

    pub fn schema<T: Into<String>>(msg: T) -> Self {
        GraphError::Schema(msg.into())
    }

    pub fn query<T: Into<String>>(msg: T) -> Self {
        GraphError::Query(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        GraphError::Validation(msg.into())
    }

    pub fn referential<T: Into<String>>(msg: T) -> Self {
        GraphError::Referential(msg.into())
    }

    pub fn transaction_state<T: Into<String>>(msg: T) -> Self {
        GraphError::TransactionState(msg.into())
    }

    pub fn busy<T: Into<String>>(msg: T) -> Self {
        GraphError::Busy(msg.into())
    }

    pub fn pattern<T: Into<String>>(msg: T) -> Self {
        GraphError::Pattern(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        GraphError::Serialization(msg.into())
    }

    pub fn merge_conflict(
        kind: impl Into<String>,
        criteria: impl Into<String>,
        conflicting_ids: Vec<i64>,
    ) -> Self {
        GraphError::MergeConflict {
            kind: kind.into(),
            criteria: criteria.into(),
            conflicting_ids,
        }
    }

    /// Classifies a SQLite failure. Busy and locked conditions become
    /// [`GraphError::Busy`]; everything else is a query error.
    pub fn sqlite(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                GraphError::Busy(err.to_string())
            }
            _ => GraphError::Query(err.to_string()),
        }
    }

    /// True for failures a retry may resolve.
    pub fn is_transient(&self) -> bool {
        matches!(self, GraphError::Busy(_))
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(err: serde_json::Error) -> Self {
        GraphError::Serialization(err.to_string())
    }
}
