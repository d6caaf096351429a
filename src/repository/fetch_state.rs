use crate::config::RepositoryOptions;

/// Soft-delete visibility of one operation.
///
/// Observed once per operation and passed to every piece of that operation
/// that filters deleted rows, so the root query and any rewritten projection
/// agree even though the repository flag may reset in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchSnapshot {
    include_deleted: bool,
}

impl FetchSnapshot {
    pub fn including_deleted() -> Self {
        Self {
            include_deleted: true,
        }
    }

    pub fn excluding_deleted() -> Self {
        Self {
            include_deleted: false,
        }
    }

    pub fn include_deleted(self) -> bool {
        self.include_deleted
    }

    pub fn excludes_deleted(self) -> bool {
        !self.include_deleted
    }
}

/// Per-repository "fetch soft-deleted rows" override.
///
/// `fetch_deleted` is the value the next operation will observe. When
/// `reset_after_operation` is set, observing it snaps it back to the
/// configured default, so an override affects exactly one operation.
///
/// The state belongs to one repository instance, and a repository belongs to
/// one unit of work. Two interleaved operations on the same instance would
/// race on observe-and-reset; repository reads take `&mut self` so that
/// cannot happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftDeleteFetchState {
    default_fetch_deleted: bool,
    fetch_deleted: bool,
    reset_after_operation: bool,
    last_observed: Option<FetchSnapshot>,
}

impl SoftDeleteFetchState {
    pub fn new(default_fetch_deleted: bool, reset_after_operation: bool) -> Self {
        Self {
            default_fetch_deleted,
            fetch_deleted: default_fetch_deleted,
            reset_after_operation,
            last_observed: None,
        }
    }

    pub fn from_options(options: &RepositoryOptions) -> Self {
        Self::new(
            options.default_fetch_soft_deleted,
            options.reset_fetch_state_after_every_operation,
        )
    }

    pub fn set_fetch_deleted(&mut self, fetch_deleted: bool) {
        self.fetch_deleted = fetch_deleted;
    }

    pub fn set_reset_after_operation(&mut self, reset: bool) {
        self.reset_after_operation = reset;
    }

    /// Back to the configured default.
    pub fn reset(&mut self) {
        self.fetch_deleted = self.default_fetch_deleted;
    }

    pub fn is_fetching_deleted(&self) -> bool {
        self.fetch_deleted
    }

    pub fn resets_after_operation(&self) -> bool {
        self.reset_after_operation
    }

    /// Current value without consuming it.
    pub fn peek(&self) -> FetchSnapshot {
        FetchSnapshot {
            include_deleted: self.fetch_deleted,
        }
    }

    /// Reads the state for one operation, latches it, and resets if configured.
    pub fn observe(&mut self) -> FetchSnapshot {
        let snapshot = self.peek();
        self.last_observed = Some(snapshot);
        if self.reset_after_operation {
            self.reset();
        }
        snapshot
    }

    /// The snapshot latched by the latest [`observe`](Self::observe), or the
    /// current value if nothing was observed yet.
    pub fn last_observed(&self) -> FetchSnapshot {
        self.last_observed.unwrap_or_else(|| self.peek())
    }
}
