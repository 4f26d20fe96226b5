use crate::registers::RegionOverflow;
use crate::watchpoint::TriggerKind;

/// Target-control collaborator fault.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub struct TargetError<E>(pub E);

/// Thread-locals resolver fault.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub struct LocalsError<E>(pub E);

/// Error type of this crate.
///
/// Collaborator faults are propagated verbatim, never retried.
#[derive(thiserror::Error, Debug)]
pub enum Error<E1, E2> {
    /// A target-control fault occurred.
    #[error(transparent)]
    Target(#[from] TargetError<E1>),

    /// A thread-locals resolution fault occurred.
    #[error(transparent)]
    Locals(#[from] LocalsError<E2>),

    /// The target domain has exited.
    ///
    /// A normal, expected terminal condition of a resume cycle, not a
    /// fault; reported by later coordination calls on the same session.
    #[error("target domain terminated")]
    TargetTerminated,

    /// The requested thread no longer exists in the target domain.
    #[error("thread {0} not found in target domain")]
    ThreadNotFound(u64),

    /// A register output buffer is smaller than its canonical region.
    ///
    /// Rejected before any buffer is written.
    #[error(transparent)]
    BufferTooSmall(#[from] RegionOverflow),

    /// A watchpoint was activated without the `after` trigger flag.
    ///
    /// Only post-event watchpoints are supported by the channel.
    #[error("watchpoint trigger kind `{0:?}` lacks the after flag")]
    InvalidWatchpointConfiguration(TriggerKind),

    /// A memory transfer exceeds the channel's single-transfer maximum.
    #[error("transfer of {requested} bytes exceeds channel maximum of {max}")]
    TransferTooLarge {
        /// Requested transfer length.
        requested: usize,

        /// Maximum single-transfer size reported by the channel.
        max: usize,
    },
}

/// Result type of this crate.
pub type Result<T, E1, E2> = core::result::Result<T, Error<E1, E2>>;
