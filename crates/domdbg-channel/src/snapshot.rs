use crate::error::TargetError;
use crate::target::TargetControl;
use crate::thread::{DebugThread, ThreadFlags};

/// Thread-state capture of the whole target domain.
///
/// The collector is not atomic with respect to the target, but the returned
/// sequence is treated as one logical instant by every consumer. Snapshots
/// are only ever replaced wholesale, never mutated.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    threads: Vec<DebugThread>,
}

impl Snapshot {
    pub(crate) fn new(threads: Vec<DebugThread>) -> Self {
        Self { threads }
    }

    /// Threads captured by this snapshot, in collection order.
    pub fn threads(&self) -> &[DebugThread] {
        &self.threads
    }

    /// Number of captured threads.
    pub fn len(&self) -> usize {
        self.threads.len()
    }

    /// Returns whether the snapshot captured no thread.
    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    /// First thread with all bits of `flag` set.
    pub(crate) fn thread_with_flag(&self, flag: ThreadFlags) -> Option<&DebugThread> {
        self.threads.iter().find(|thread| thread.flags.contains(flag))
    }

    /// Diagnostic trace of every captured thread, one line each.
    pub(crate) fn trace(&self) {
        for thread in &self.threads {
            thread.trace();
        }
    }
}

/// Result of one collection pass over the target's thread list.
pub(crate) enum Collected {
    /// The domain is alive; its threads at this instant.
    Active(Snapshot),

    /// The listing came back empty where threads were expected: the domain
    /// has exited. Not an error of the collector; the coordinator decides
    /// what it means.
    TargetExited,
}

/// Collects a fresh snapshot from the target-control library.
///
/// The returned sequence is independent of any prior snapshot.
pub(crate) async fn collect<T: TargetControl>(
    target: &mut T,
) -> Result<Collected, TargetError<T::Error>> {
    match target.list_threads().await.map_err(TargetError)? {
        Some(threads) => Ok(Collected::Active(Snapshot::new(threads))),
        None => Ok(Collected::TargetExited),
    }
}
