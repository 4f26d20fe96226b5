use std::fmt;
use std::ops::BitOr;

/// Raw status bits of a target thread, as reported by the target-control
/// library.
///
/// The bits are independently settable by the target and are not mutually
/// exclusive; [`ThreadState::classify`] imposes a single-valued reading.
/// The bit layout is a decoding detail of this crate and never crosses the
/// classifier.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreadFlags(u32);

impl ThreadFlags {
    /// The thread is eligible to run.
    pub const RUNNABLE: Self = Self(1 << 0);

    /// The thread is currently running.
    pub const RUNNING: Self = Self(1 << 1);

    /// The thread is being torn down.
    pub const DYING: Self = Self(1 << 2);

    /// The debugger asked the thread to suspend itself.
    pub const DEBUG_SUSPEND_REQUESTED: Self = Self(1 << 3);

    /// The thread halted in response to a debug-suspend request.
    pub const DEBUG_SUSPENDED: Self = Self(1 << 4);

    /// The thread is blocked on a monitor.
    pub const MONITOR_WAIT: Self = Self(1 << 5);

    /// The thread is blocked waiting for a notify.
    pub const NOTIFY_WAIT: Self = Self(1 << 6);

    /// The thread is blocked joining another thread.
    pub const JOIN_WAIT: Self = Self(1 << 7);

    /// The thread is in a timed sleep.
    pub const SLEEPING: Self = Self(1 << 8);

    /// The thread halted on a watchpoint.
    pub const WATCHPOINT: Self = Self(1 << 9);

    /// Builds flags from the raw bits of the target-control library.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns whether all bits of `other` are set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Single flag rendered as 0/1, for diagnostic trace lines.
    pub(crate) const fn bit(self, flag: Self) -> u32 {
        (self.0 & flag.0 != 0) as u32
    }
}

impl BitOr for ThreadFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for ThreadFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ThreadFlags({:#05x})", self.0)
    }
}

/// One target thread at a specific observation instant.
///
/// Immutable once constructed; a new observation produces a new value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DebugThread {
    /// Target thread handle.
    pub id: u64,

    /// Raw status bits at observation time.
    pub flags: ThreadFlags,
}

impl DebugThread {
    /// Classified state of this thread.
    pub fn state(&self) -> ThreadState {
        ThreadState::classify(self.flags)
    }

    /// Renders the full flag decomposition of this thread, one flag per
    /// field as 0/1.
    ///
    /// Operator-facing logging only; protocol decisions never read this.
    pub(crate) fn trace(&self) {
        let f = self.flags;

        tracing::trace!(
            thread = self.id,
            ra = f.bit(ThreadFlags::RUNNABLE),
            r = f.bit(ThreadFlags::RUNNING),
            dying = f.bit(ThreadFlags::DYING),
            rds = f.bit(ThreadFlags::DEBUG_SUSPEND_REQUESTED),
            ds = f.bit(ThreadFlags::DEBUG_SUSPENDED),
            mw = f.bit(ThreadFlags::MONITOR_WAIT),
            nw = f.bit(ThreadFlags::NOTIFY_WAIT),
            jw = f.bit(ThreadFlags::JOIN_WAIT),
            sl = f.bit(ThreadFlags::SLEEPING),
            wp = f.bit(ThreadFlags::WATCHPOINT),
        );
    }
}

/// Classified state of a halted target thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadState {
    /// Blocked on a monitor.
    MonitorWait,

    /// Blocked waiting for a notify.
    NotifyWait,

    /// Blocked joining another thread.
    JoinWait,

    /// In a timed sleep.
    Sleeping,

    /// Halted on a watchpoint.
    Watchpoint,

    /// Halted by debug suspension (default reading).
    Suspended,
}

impl ThreadState {
    /// Classifies raw status bits into a single state.
    ///
    /// Total and deterministic: the first matching flag in the fixed
    /// priority order monitor > notify > join > sleep > watchpoint wins,
    /// and everything else reads as [`Suspended`](Self::Suspended).
    /// Consumers branch on the reported state, so the order must not change.
    pub const fn classify(flags: ThreadFlags) -> Self {
        if flags.contains(ThreadFlags::MONITOR_WAIT) {
            Self::MonitorWait
        } else if flags.contains(ThreadFlags::NOTIFY_WAIT) {
            Self::NotifyWait
        } else if flags.contains(ThreadFlags::JOIN_WAIT) {
            Self::JoinWait
        } else if flags.contains(ThreadFlags::SLEEPING) {
            Self::Sleeping
        } else if flags.contains(ThreadFlags::WATCHPOINT) {
            Self::Watchpoint
        } else {
            Self::Suspended
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_defaults_to_suspended() {
        assert_eq!(
            ThreadState::classify(ThreadFlags::default()),
            ThreadState::Suspended
        );
        assert_eq!(
            ThreadState::classify(ThreadFlags::RUNNABLE | ThreadFlags::DEBUG_SUSPENDED),
            ThreadState::Suspended
        );
    }

    #[test]
    fn classify_follows_priority_order() {
        let all_waits = ThreadFlags::MONITOR_WAIT
            | ThreadFlags::NOTIFY_WAIT
            | ThreadFlags::JOIN_WAIT
            | ThreadFlags::SLEEPING
            | ThreadFlags::WATCHPOINT;

        assert_eq!(ThreadState::classify(all_waits), ThreadState::MonitorWait);
        assert_eq!(
            ThreadState::classify(ThreadFlags::NOTIFY_WAIT | ThreadFlags::SLEEPING),
            ThreadState::NotifyWait
        );
        assert_eq!(
            ThreadState::classify(ThreadFlags::JOIN_WAIT | ThreadFlags::WATCHPOINT),
            ThreadState::JoinWait
        );
    }

    #[test]
    fn sleeping_shadows_a_late_watchpoint_hit() {
        // A thread can hit a watchpoint before the target clears its sleep
        // flag; the sleep reading wins.
        assert_eq!(
            ThreadState::classify(ThreadFlags::SLEEPING | ThreadFlags::WATCHPOINT),
            ThreadState::Sleeping
        );
    }

    #[test]
    fn classify_is_total_over_every_flag_combination() {
        for bits in 0..(1 << 10) {
            // must produce a value for every combination, without panicking
            let _ = ThreadState::classify(ThreadFlags::from_bits(bits));
        }
    }
}
