use shared::domain::{UserId, UserRecord};

/// What a confirmation dialog is pointed at, captured at the moment it
/// opens. Selection changes made afterwards do not retarget it.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmTarget {
    Single(UserRecord),
    Bulk(Vec<UserRecord>),
}

impl ConfirmTarget {
    pub fn ids(&self) -> Vec<UserId> {
        match self {
            Self::Single(record) => vec![record.id],
            Self::Bulk(records) => records.iter().map(|record| record.id).collect(),
        }
    }

    pub fn count(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Bulk(records) => records.len(),
        }
    }
}

/// Modal state machine gating destructive operations:
/// `Closed -> Open(target) -> Pending(target) -> Closed`.
///
/// `confirm` hands the target out exactly once; a second confirm while
/// the remote call is pending is a no-op, as is cancelling.
#[derive(Debug, Default, PartialEq)]
pub enum ConfirmationFlow {
    #[default]
    Closed,
    Open(ConfirmTarget),
    Pending(ConfirmTarget),
}

impl ConfirmationFlow {
    pub fn new() -> Self {
        Self::Closed
    }

    /// Open for a single record. Ignored if a dialog is already up.
    pub fn open_single(&mut self, record: UserRecord) -> bool {
        self.open(ConfirmTarget::Single(record))
    }

    /// Open for a snapshot of the selected records. An empty snapshot
    /// does not open anything.
    pub fn open_bulk(&mut self, records: Vec<UserRecord>) -> bool {
        if records.is_empty() {
            return false;
        }
        self.open(ConfirmTarget::Bulk(records))
    }

    fn open(&mut self, target: ConfirmTarget) -> bool {
        match self {
            Self::Closed => {
                *self = Self::Open(target);
                true
            }
            _ => false,
        }
    }

    /// Transition `Open -> Pending` and hand out the captured target.
    /// Returns `None` (no-op) when closed or already pending.
    pub fn confirm(&mut self) -> Option<ConfirmTarget> {
        match std::mem::take(self) {
            Self::Open(target) => {
                *self = Self::Pending(target.clone());
                Some(target)
            }
            other => {
                *self = other;
                None
            }
        }
    }

    /// Close an open dialog without acting. Ignored while pending; the
    /// dialog's controls are disabled until the call settles.
    pub fn cancel(&mut self) -> bool {
        match self {
            Self::Open(_) => {
                *self = Self::Closed;
                true
            }
            _ => false,
        }
    }

    /// Return to `Closed` and drop the captured target. Called after
    /// the operation outcome has been shown, whatever it was.
    pub fn finish(&mut self) {
        *self = Self::Closed;
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open(_))
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    pub fn target(&self) -> Option<&ConfirmTarget> {
        match self {
            Self::Closed => None,
            Self::Open(target) | Self::Pending(target) => Some(target),
        }
    }
}
