use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepoError {
    /// A call structurally required a property the entity does not declare.
    #[error("Developer error: property '{property}' does not exist on entity '{entity}'")]
    PropertyNotFound { entity: String, property: String },

    #[error("Developer error: {0}")]
    Developer(String),

    #[error("Entity '{0}' is not registered")]
    EntityNotRegistered(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Sequence contains more than one matching element ({0})")]
    MultipleResults(String),

    #[error("Entity '{entity}' with key {key} already exists")]
    DuplicateKey { entity: String, key: String },

    #[error("Entity '{entity}' with key {key} is already tracked")]
    AlreadyTracked { entity: String, key: String },

    #[error("Transaction error: {0}")]
    TransactionError(String),

    #[error("Transient fault: {0}")]
    Transient(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

impl RepoError {
    pub fn property_not_found(entity: impl Into<String>, property: impl Into<String>) -> Self {
        Self::PropertyNotFound {
            entity: entity.into(),
            property: property.into(),
        }
    }

    /// Misuse by the calling code, as opposed to a data or storage failure.
    pub fn is_developer_error(&self) -> bool {
        matches!(self, Self::PropertyNotFound { .. } | Self::Developer(_))
    }

    /// Faults the execution strategy is allowed to retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

pub type Result<T> = std::result::Result<T, RepoError>;

impl<T> From<std::sync::PoisonError<T>> for RepoError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}
