use std::fmt;
use std::ops::BitOr;

/// Access kinds that trigger a memory watchpoint, as a bitmask.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerKind(u8);

impl TriggerKind {
    /// Report only after the triggering access has completed.
    ///
    /// The channel supports post-event watchpoints exclusively; activation
    /// without this flag is rejected.
    pub const AFTER: Self = Self(1 << 0);

    /// Read access.
    pub const READ: Self = Self(1 << 1);

    /// Write access.
    pub const WRITE: Self = Self(1 << 2);

    /// Execute access.
    pub const EXEC: Self = Self(1 << 3);

    /// No access kind.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Builds a kind from the raw bits of the target-control library.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns whether all bits of `other` are set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// This kind with all bits of `other` cleared.
    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

impl BitOr for TriggerKind {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::AFTER, "after"),
            (Self::READ, "read"),
            (Self::WRITE, "write"),
            (Self::EXEC, "exec"),
        ];

        let mut first = true;

        for (flag, name) in names {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }

        if first {
            f.write_str("(none)")?;
        }

        Ok(())
    }
}

/// Caller-supplied description of a watchpoint to activate.
///
/// Not retained by this crate; the target-control library is the source of
/// truth for active watchpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WatchpointDescriptor {
    /// Start of the watched memory range.
    pub address: u64,

    /// Length of the watched memory range, in bytes.
    pub size: u64,

    /// Access kinds that trigger the watchpoint.
    pub kind: TriggerKind,
}

/// Trigger information reported by the target-control library for a thread
/// halted at a watchpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WatchpointHit {
    /// Address whose access triggered the halt.
    pub address: u64,

    /// Raw trigger kind, including the configuration echo of
    /// [`TriggerKind::AFTER`].
    pub kind: TriggerKind,
}
