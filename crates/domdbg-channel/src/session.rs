use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::backoff::PollBackoff;
use crate::error::{Error, LocalsError, TargetError};
use crate::registers::RawRegisters;
use crate::snapshot::{self, Collected, Snapshot};
use crate::target::{TargetControl, ThreadLocals};
use crate::thread::{ThreadFlags, ThreadState};
use crate::watchpoint::{TriggerKind, WatchpointDescriptor};

/// Delay before the first poll after releasing the runnable threads, so the
/// domain gets a chance to make progress.
const INITIAL_POLL_DELAY: Duration = Duration::from_micros(500);

/// Growth of the poll sleep on every iteration without an observed halt.
const POLL_BACKOFF_INCREMENT: Duration = Duration::from_millis(2);

/// Debugging session over one guest domain connection.
///
/// Owns the two collaborators and the coordinator state for the lifetime of
/// the connection. The channel serves serial connections by creating a fresh
/// session per [`attach`](Self::attach); all coordinator state starts empty.
///
/// No query that depends on a thread being at rest is meaningful until a
/// [`resume`](Self::resume) cycle has completed and cached a snapshot.
pub struct Session<T, L> {
    target: T,
    locals: L,
    shared: Arc<Shared>,

    /// Maximum single-transfer size, queried from the target on first use.
    max_transfer: Option<usize>,
}

/// Coordinator state shared with [`SuspendHandle`]s.
struct Shared {
    /// Asynchronous suspend-all request flag.
    ///
    /// The one piece of genuine concurrency in the protocol: a concurrent
    /// control-path request may set it while [`Session::resume`] is polling.
    suspend_all: AtomicBool,

    /// Rested-state cache and termination marker, guarded as one unit.
    rest: Mutex<RestState>,
}

impl Shared {
    fn rest_state(&self) -> MutexGuard<'_, RestState> {
        self.rest.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Default)]
struct RestState {
    /// Threads found at rest by the last completed resume cycle.
    ///
    /// Only ever replaced wholesale, by the suspend-all completion step.
    threads_at_rest: Option<Snapshot>,

    /// The target domain has exited; terminal for this session.
    terminated: bool,
}

/// Outcome of a [`resume`](Session::resume) cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resumption {
    /// The domain reached a new consistent halted state; the rested
    /// snapshot has been cached.
    Rested,

    /// The target domain exited during the cycle. A normal terminal
    /// outcome, not a fault.
    TargetExited,
}

/// Per-thread report produced by [`gather_threads`](Session::gather_threads).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReportedThread {
    /// Target thread handle.
    pub id: u64,

    /// Classified state at collection time.
    pub state: ThreadState,

    /// Instruction pointer at collection time.
    pub instr_ptr: u64,

    /// Thread-locals block located from the thread's stack pointer.
    pub locals_block: u64,
}

/// Cloneable handle for signalling a suspend-all request into a session,
/// typically from another task while [`Session::resume`] is polling.
#[derive(Clone)]
pub struct SuspendHandle {
    shared: Arc<Shared>,
}

impl SuspendHandle {
    /// Requests that an in-flight resume cycle stop the world instead of
    /// waiting for a thread to halt by itself.
    ///
    /// Never blocks and always succeeds. A polling resume cycle observes
    /// the request within at most one backoff interval.
    pub fn request_suspend_all(&self) {
        self.shared.suspend_all.store(true, Ordering::Release);
    }
}

impl<T: TargetControl, L: ThreadLocals> Session<T, L> {
    /// Attaches to the guest domain with the given ID and starts a fresh
    /// session.
    pub async fn attach(
        mut target: T,
        locals: L,
        domain_id: u32,
    ) -> crate::Result<Self, T::Error, L::Error> {
        tracing::debug!(domain_id, "attaching to guest domain");

        target.attach(domain_id).await.map_err(TargetError)?;

        Ok(Self {
            target,
            locals,
            shared: Arc::new(Shared {
                suspend_all: AtomicBool::new(false),
                rest: Mutex::new(RestState::default()),
            }),
            max_transfer: None,
        })
    }

    /// Detaches from the guest domain, consuming the session.
    pub async fn detach(mut self) -> crate::Result<(), T::Error, L::Error> {
        tracing::debug!("detaching from guest domain");

        self.target.detach().await.map_err(TargetError)?;

        Ok(())
    }

    /// Returns a handle for requesting a suspend-all from another task.
    pub fn suspend_handle(&self) -> SuspendHandle {
        SuspendHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Last rested snapshot, cached by a completed resume cycle.
    pub fn threads_at_rest(&self) -> Option<Snapshot> {
        self.shared.rest_state().threads_at_rest.clone()
    }

    /// Runs one full resume cycle: releases every runnable thread, then
    /// polls until the domain halts again, and caches the new rested
    /// snapshot.
    ///
    /// Blocks until a thread suspends itself (breakpoint, watchpoint, an
    /// explicit debug-suspend) or a [`SuspendHandle`] request arrives, then
    /// forcibly suspends the remaining runnable threads. Wall-clock time is
    /// bounded only by target behavior; no timeout is enforced at this
    /// layer.
    ///
    /// The forcible suspend is not atomic with respect to the target: a
    /// thread may become runnable again (a sleep expiring, an interrupt
    /// waking a driver thread) after it is issued and before the final
    /// snapshot. Such a thread observes the still-pending suspend condition
    /// and halts on its own next cooperative check, and all control
    /// operations thereafter act only on threads found in the final
    /// snapshot, so the window is bounded and self-correcting.
    #[tracing::instrument(name = "Resume", skip_all)]
    pub async fn resume(&mut self) -> crate::Result<Resumption, T::Error, L::Error> {
        {
            let mut rest = self.shared.rest_state();

            if rest.terminated {
                return Ok(Resumption::TargetExited);
            }

            // release the previous rested snapshot before the domain moves
            rest.threads_at_rest = None;
        }

        tracing::debug!("resuming all runnable threads");
        self.target.resume_all().await.map_err(TargetError)?;

        tokio::time::sleep(INITIAL_POLL_DELAY).await;

        let mut backoff = PollBackoff::new(POLL_BACKOFF_INCREMENT);

        while !self.shared.suspend_all.load(Ordering::Acquire) {
            tracing::trace!("waiting for a thread to block");

            let threads = match snapshot::collect(&mut self.target).await? {
                Collected::Active(threads) => threads,
                Collected::TargetExited => return self.sign_off_terminated().await,
            };

            threads.trace();

            if let Some(thread) = threads.thread_with_flag(ThreadFlags::DEBUG_SUSPENDED) {
                tracing::debug!(thread = thread.id, "thread reached debug suspension");
                self.shared.suspend_all.store(true, Ordering::Release);
            } else {
                tokio::time::sleep(backoff.next_delay()).await;
            }
        }

        // At least one thread is debug-suspended, or a suspend-all request
        // arrived. Halt the remaining runnable threads; any thread waking
        // concurrently will debug-suspend itself.
        self.shared.suspend_all.store(false, Ordering::Release);

        tracing::debug!("suspending all threads");
        self.target.suspend_all().await.map_err(TargetError)?;

        let threads = match snapshot::collect(&mut self.target).await? {
            Collected::Active(threads) => threads,
            Collected::TargetExited => return self.sign_off_terminated().await,
        };

        threads.trace();

        self.shared.rest_state().threads_at_rest = Some(threads);

        Ok(Resumption::Rested)
    }

    /// Signs off from the exited domain and marks the session terminated.
    ///
    /// The sign-off is best-effort: a failure must not mask the termination
    /// outcome.
    async fn sign_off_terminated(&mut self) -> crate::Result<Resumption, T::Error, L::Error> {
        if let Err(e) = self.target.sign_off().await {
            tracing::warn!(error = %e, "sign-off after domain exit");
        }

        self.shared.rest_state().terminated = true;

        tracing::debug!("target domain terminated");

        Ok(Resumption::TargetExited)
    }

    /// Enumerates every thread currently in the target with its classified
    /// state, instruction pointer and thread-locals block.
    ///
    /// Performs a fresh collection, independent of the cached rested
    /// snapshot.
    #[tracing::instrument(name = "GatherThreads", skip_all)]
    pub async fn gather_threads(&mut self) -> crate::Result<Vec<ReportedThread>, T::Error, L::Error> {
        if self.shared.rest_state().terminated {
            return Err(Error::TargetTerminated);
        }

        let threads = match snapshot::collect(&mut self.target).await? {
            Collected::Active(threads) => threads,
            Collected::TargetExited => {
                self.shared.rest_state().terminated = true;
                return Err(Error::TargetTerminated);
            }
        };

        let mut reported = Vec::with_capacity(threads.len());

        for thread in threads.threads() {
            tracing::trace!(thread = thread.id, "gathering thread");

            let regs = self.checked_registers(thread.id).await?;

            let locals_block = self
                .locals
                .locate(regs.stack_ptr)
                .await
                .map_err(LocalsError)?;

            reported.push(ReportedThread {
                id: thread.id,
                state: thread.state(),
                instr_ptr: regs.instr_ptr,
                locals_block,
            });
        }

        Ok(reported)
    }

    /// Reads the given thread's registers into the three canonical region
    /// buffers.
    ///
    /// All-or-nothing: fails with [`Error::BufferTooSmall`] before touching
    /// any buffer if a declared capacity is insufficient; on success all
    /// three regions are written in full.
    pub async fn read_registers(
        &mut self,
        thread_id: u64,
        integer: &mut [u8],
        floating_point: &mut [u8],
        state: &mut [u8],
    ) -> crate::Result<(), T::Error, L::Error> {
        let regs = self.checked_registers(thread_id).await?;

        regs.copy_into(integer, floating_point, state)?;

        Ok(())
    }

    /// Raw register fetch with a best-effort diagnostic dump when the
    /// thread has vanished mid-query.
    async fn checked_registers(
        &mut self,
        thread_id: u64,
    ) -> crate::Result<RawRegisters, T::Error, L::Error> {
        match self
            .target
            .read_registers(thread_id)
            .await
            .map_err(TargetError)?
        {
            Some(regs) => Ok(regs),
            None => {
                tracing::error!(thread = thread_id, "cannot get registers for thread");
                self.dump_threads().await;
                Err(Error::ThreadNotFound(thread_id))
            }
        }
    }

    /// Diagnostic dump of the current thread list, for postmortem
    /// debugging. Never fails the caller.
    async fn dump_threads(&mut self) {
        if self.shared.rest_state().terminated {
            return;
        }

        match self.target.list_threads().await {
            Ok(Some(threads)) => Snapshot::new(threads).trace(),
            Ok(None) => tracing::trace!("no threads to dump, domain exited"),
            Err(e) => tracing::warn!(error = %e, "thread dump failed"),
        }
    }

    /// Suspends a single thread.
    pub async fn suspend(&mut self, thread_id: u64) -> crate::Result<(), T::Error, L::Error> {
        self.target
            .suspend_thread(thread_id)
            .await
            .map_err(TargetError)?;

        Ok(())
    }

    /// Executes a single instruction on the given thread.
    pub async fn single_step(&mut self, thread_id: u64) -> crate::Result<(), T::Error, L::Error> {
        self.target
            .single_step(thread_id)
            .await
            .map_err(TargetError)?;

        Ok(())
    }

    /// Sets the instruction pointer of the given thread.
    pub async fn set_instr_ptr(
        &mut self,
        thread_id: u64,
        addr: u64,
    ) -> crate::Result<(), T::Error, L::Error> {
        self.target
            .set_instr_ptr(thread_id, addr)
            .await
            .map_err(TargetError)?;

        Ok(())
    }

    /// Largest single memory transfer the channel supports.
    ///
    /// Queried from the target-control library on first use, then cached
    /// for the session.
    pub async fn max_transfer_size(&mut self) -> crate::Result<usize, T::Error, L::Error> {
        if let Some(max) = self.max_transfer {
            return Ok(max);
        }

        let max = self
            .target
            .max_transfer_size()
            .await
            .map_err(TargetError)?;

        self.max_transfer = Some(max);

        Ok(max)
    }

    /// Reads `len` bytes of target memory starting at `addr`.
    ///
    /// A partial transfer surfaces verbatim as a shorter buffer; chunking
    /// above [`max_transfer_size`](Self::max_transfer_size) is the caller's
    /// responsibility.
    pub async fn read_memory(
        &mut self,
        addr: u64,
        len: usize,
    ) -> crate::Result<Vec<u8>, T::Error, L::Error> {
        let max = self.max_transfer_size().await?;

        if len > max {
            return Err(Error::TransferTooLarge {
                requested: len,
                max,
            });
        }

        let mut buf = vec![0; len];

        let count = self
            .target
            .read_memory(addr, &mut buf)
            .await
            .map_err(TargetError)?;

        buf.truncate(count);

        Ok(buf)
    }

    /// Writes `data` into target memory starting at `addr`, returning the
    /// count actually written.
    pub async fn write_memory(
        &mut self,
        addr: u64,
        data: &[u8],
    ) -> crate::Result<usize, T::Error, L::Error> {
        let max = self.max_transfer_size().await?;

        if data.len() > max {
            return Err(Error::TransferTooLarge {
                requested: data.len(),
                max,
            });
        }

        let count = self
            .target
            .write_memory(addr, data)
            .await
            .map_err(TargetError)?;

        Ok(count)
    }

    /// Activates a memory watchpoint.
    ///
    /// Only post-event watchpoints are supported: a descriptor whose kind
    /// lacks [`TriggerKind::AFTER`] is rejected before the target-control
    /// library is invoked.
    pub async fn activate_watchpoint(
        &mut self,
        descriptor: WatchpointDescriptor,
    ) -> crate::Result<(), T::Error, L::Error> {
        if !descriptor.kind.contains(TriggerKind::AFTER) {
            return Err(Error::InvalidWatchpointConfiguration(descriptor.kind));
        }

        self.target
            .activate_watchpoint(descriptor.address, descriptor.size, descriptor.kind)
            .await
            .map_err(TargetError)?;

        Ok(())
    }

    /// Deactivates the watchpoint over the given memory range.
    pub async fn deactivate_watchpoint(
        &mut self,
        address: u64,
        size: u64,
    ) -> crate::Result<(), T::Error, L::Error> {
        self.target
            .deactivate_watchpoint(address, size)
            .await
            .map_err(TargetError)?;

        Ok(())
    }

    /// First thread of the last rested snapshot halted at a watchpoint.
    ///
    /// Scans the cached snapshot only, never a fresh collection; `None`
    /// when no resume cycle has completed or no thread is at a watchpoint.
    pub fn thread_at_watchpoint(&self) -> Option<u64> {
        self.shared
            .rest_state()
            .threads_at_rest
            .as_ref()
            .and_then(|threads| {
                threads
                    .threads()
                    .iter()
                    .find(|thread| thread.state() == ThreadState::Watchpoint)
                    .map(|thread| thread.id)
            })
    }

    /// Address whose access triggered the current watchpoint halt, if any
    /// rested thread is at a watchpoint.
    pub async fn watchpoint_address(&mut self) -> crate::Result<Option<u64>, T::Error, L::Error> {
        let Some(thread_id) = self.thread_at_watchpoint() else {
            tracing::debug!("no thread at watchpoint");
            return Ok(None);
        };

        let hit = self
            .target
            .watchpoint_info(thread_id)
            .await
            .map_err(TargetError)?;

        Ok(Some(hit.address))
    }

    /// Trigger kind of the watchpoint the given thread is halted at.
    ///
    /// The [`TriggerKind::AFTER`] flag is stripped from the raw value: it
    /// is a configuration echo, not trigger information.
    pub async fn watchpoint_trigger_kind(
        &mut self,
        thread_id: u64,
    ) -> crate::Result<TriggerKind, T::Error, L::Error> {
        let hit = self
            .target
            .watchpoint_info(thread_id)
            .await
            .map_err(TargetError)?;

        Ok(hit.kind.without(TriggerKind::AFTER))
    }

    /// Start address of the target's boot heap.
    pub async fn boot_heap_start(&mut self) -> crate::Result<u64, T::Error, L::Error> {
        self.target
            .boot_heap_start()
            .await
            .map_err(TargetError)
            .map_err(Into::into)
    }

    /// Sets the verbosity of the underlying transport.
    pub async fn set_transport_debug_level(
        &mut self,
        level: u32,
    ) -> crate::Result<(), T::Error, L::Error> {
        self.target
            .set_debug_level(level)
            .await
            .map_err(TargetError)?;

        Ok(())
    }
}
