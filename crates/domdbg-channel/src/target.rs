use std::future::Future;

use crate::registers::RawRegisters;
use crate::thread::DebugThread;
use crate::watchpoint::{TriggerKind, WatchpointHit};

/// Primitive operations of the target-control library.
///
/// Implementors own the transport to the guest domain, the in-target
/// suspend mechanism and the ISA-specific register layout tables; this
/// crate only composes the primitives into the stop-the-world protocol.
pub trait TargetControl {
    /// Error returned by this trait.
    type Error: std::error::Error;

    /// Attaches to the guest domain with the given ID.
    fn attach(&mut self, domain_id: u32) -> impl Future<Output = Result<(), Self::Error>>;

    /// Detaches from the guest domain.
    fn detach(&mut self) -> impl Future<Output = Result<(), Self::Error>>;

    /// Signs off from a domain that has exited.
    fn sign_off(&mut self) -> impl Future<Output = Result<(), Self::Error>>;

    /// Makes all currently-runnable threads actually run.
    fn resume_all(&mut self) -> impl Future<Output = Result<(), Self::Error>>;

    /// Forcibly suspends every remaining runnable thread.
    fn suspend_all(&mut self) -> impl Future<Output = Result<(), Self::Error>>;

    /// Suspends a single thread.
    fn suspend_thread(&mut self, thread_id: u64) -> impl Future<Output = Result<(), Self::Error>>;

    /// Executes a single instruction on the given thread.
    fn single_step(&mut self, thread_id: u64) -> impl Future<Output = Result<(), Self::Error>>;

    /// Sets the instruction pointer of the given thread.
    fn set_instr_ptr(
        &mut self,
        thread_id: u64,
        addr: u64,
    ) -> impl Future<Output = Result<(), Self::Error>>;

    /// Lists the threads of the domain with their raw status bits.
    ///
    /// Returns `None` when the listing comes back empty where threads were
    /// expected to exist: the domain has exited.
    fn list_threads(
        &mut self,
    ) -> impl Future<Output = Result<Option<Vec<DebugThread>>, Self::Error>>;

    /// Fetches the raw register block of the given thread, already laid out
    /// in the canonical regions.
    ///
    /// Returns `None` when the thread no longer exists.
    fn read_registers(
        &mut self,
        thread_id: u64,
    ) -> impl Future<Output = Result<Option<RawRegisters>, Self::Error>>;

    /// Reads target memory at `addr` into `buf`, returning the count
    /// actually read.
    fn read_memory(
        &mut self,
        addr: u64,
        buf: &mut [u8],
    ) -> impl Future<Output = Result<usize, Self::Error>>;

    /// Writes `data` into target memory at `addr`, returning the count
    /// actually written.
    fn write_memory(
        &mut self,
        addr: u64,
        data: &[u8],
    ) -> impl Future<Output = Result<usize, Self::Error>>;

    /// Largest single memory transfer the channel supports.
    fn max_transfer_size(&mut self) -> impl Future<Output = Result<usize, Self::Error>>;

    /// Activates a watchpoint over the given memory range.
    fn activate_watchpoint(
        &mut self,
        addr: u64,
        size: u64,
        kind: TriggerKind,
    ) -> impl Future<Output = Result<(), Self::Error>>;

    /// Deactivates the watchpoint over the given memory range.
    fn deactivate_watchpoint(
        &mut self,
        addr: u64,
        size: u64,
    ) -> impl Future<Output = Result<(), Self::Error>>;

    /// Trigger information for a thread halted at a watchpoint.
    fn watchpoint_info(
        &mut self,
        thread_id: u64,
    ) -> impl Future<Output = Result<WatchpointHit, Self::Error>>;

    /// Start address of the target's boot heap.
    fn boot_heap_start(&mut self) -> impl Future<Output = Result<u64, Self::Error>>;

    /// Sets the verbosity of the underlying transport.
    fn set_debug_level(&mut self, level: u32) -> impl Future<Output = Result<(), Self::Error>>;
}

/// Locator of per-thread storage blocks.
pub trait ThreadLocals {
    /// Error returned by this trait.
    type Error: std::error::Error;

    /// Locates the thread-locals block reachable from the given stack
    /// pointer.
    fn locate(&mut self, stack_ptr: u64) -> impl Future<Output = Result<u64, Self::Error>>;
}
