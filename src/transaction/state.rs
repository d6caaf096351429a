// ============================================================================
// Transaction State Management
// ============================================================================
//
// Each transaction moves through defined states: Active -> Committed/Aborted.
// The in-memory context keeps a copy of the storage taken at begin time and
// restores it on rollback.
//
// ============================================================================

use std::fmt;

use uuid::Uuid;

use crate::core::{RepoError, Result, Value};
use crate::storage::Storage;

/// Unique identifier for a transaction, stamped on `TransactionId` columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(pub Uuid);

impl TransactionId {
    pub fn new() -> Self {
        TransactionId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    pub fn to_value(&self) -> Value {
        Value::from(self.0)
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn_{}", self.0)
    }
}

/// Transaction state following the State Pattern
///
/// ```text
/// Active ──commit──> Committed
///   │
///   └──rollback──> Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    Aborted,
}

impl TransactionState {
    pub fn is_active(&self) -> bool {
        matches!(self, TransactionState::Active)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionState::Committed | TransactionState::Aborted)
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionState::Active => write!(f, "ACTIVE"),
            TransactionState::Committed => write!(f, "COMMITTED"),
            TransactionState::Aborted => write!(f, "ABORTED"),
        }
    }
}

/// An open transaction of the in-memory context.
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    state: TransactionState,
    /// Storage as it was when the transaction began
    snapshot: Option<Storage>,
    start_time: std::time::Instant,
}

impl Transaction {
    pub fn new(id: TransactionId, snapshot: Storage) -> Self {
        Self {
            id,
            state: TransactionState::Active,
            snapshot: Some(snapshot),
            start_time: std::time::Instant::now(),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn duration(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    /// Marks the transaction committed and drops the snapshot.
    pub fn commit(&mut self) -> Result<()> {
        if !self.state.is_active() {
            return Err(RepoError::TransactionError(format!(
                "Cannot commit: transaction {} is already {}",
                self.id, self.state
            )));
        }

        self.snapshot = None;
        self.state = TransactionState::Committed;
        Ok(())
    }

    /// Marks the transaction aborted and hands back the storage to restore.
    pub fn rollback(&mut self) -> Result<Storage> {
        if !self.state.is_active() {
            return Err(RepoError::TransactionError(format!(
                "Cannot rollback: transaction {} is already {}",
                self.id, self.state
            )));
        }

        self.state = TransactionState::Aborted;
        self.snapshot.take().ok_or_else(|| {
            RepoError::TransactionError(format!("Transaction {} has no snapshot", self.id))
        })
    }
}
