//! Control core of a remote debugging channel for guest virtual machine
//! domains.
//!
//! A debugger process observes and controls the threads of a separate
//! guest domain through a small set of primitive operations (attach,
//! suspend/resume a thread, read/write memory and registers, watchpoints)
//! implemented by a target-control library. This crate composes those
//! primitives into a correct, observable stop-the-world protocol:
//!
//! * [`Session::resume`] releases every runnable thread, then polls the
//!   domain until a thread halts on its own or a concurrent
//!   [`SuspendHandle::request_suspend_all`] arrives, forcibly suspends the
//!   remainder and caches the resulting *rested* snapshot;
//! * the rested snapshot is the sole basis for watchpoint attribution and
//!   any control operation that requires a thread to be at rest;
//! * raw thread status bits are decoded into a single-valued
//!   [`ThreadState`] by a fixed-priority classification.
//!
//! The transport between debugger and target, the in-target suspend
//! mechanism and the architecture-specific register encodings are out of
//! scope; they live behind the [`TargetControl`] and [`ThreadLocals`]
//! traits.

mod backoff;
mod error;
mod registers;
mod session;
mod snapshot;
mod target;
mod thread;
mod watchpoint;

pub use self::error::{Error, LocalsError, Result, TargetError};
pub use self::registers::{RawRegisters, RegionOverflow, RegisterRegion};
pub use self::session::{ReportedThread, Resumption, Session, SuspendHandle};
pub use self::snapshot::Snapshot;
pub use self::target::{TargetControl, ThreadLocals};
pub use self::thread::{DebugThread, ThreadFlags, ThreadState};
pub use self::watchpoint::{TriggerKind, WatchpointDescriptor, WatchpointHit};
