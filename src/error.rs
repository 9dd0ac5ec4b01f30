#[derive(thiserror::Error, Debug)]
pub enum ApprovalError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("storage failure: {0}")]
    Storage(String),
}

impl ApprovalError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn invalid(detail: impl Into<String>) -> Self {
        Self::InvalidTransition(detail.into())
    }

    /// Only storage failures abort a bulk batch; business-rule failures
    /// become per-item skip or failure entries.
    pub fn is_batch_fatal(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

impl From<sled::Error> for ApprovalError {
    fn from(err: sled::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<sled::transaction::TransactionError<()>> for ApprovalError {
    fn from(err: sled::transaction::TransactionError<()>) -> Self {
        Self::Storage(format!("{err:?}"))
    }
}

impl From<anyhow::Error> for ApprovalError {
    fn from(err: anyhow::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
