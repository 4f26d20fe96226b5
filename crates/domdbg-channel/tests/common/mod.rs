use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use domdbg_channel::{
    DebugThread, RawRegisters, SuspendHandle, TargetControl, ThreadFlags, ThreadLocals,
    TriggerKind, WatchpointHit,
};

/// Primitive operation recorded by [ScriptedTarget].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Call {
    Attach,
    Detach,
    SignOff,
    ResumeAll,
    SuspendAll,
    SuspendThread,
    SingleStep,
    SetInstrPtr,
    ListThreads,
    ReadRegisters,
    ReadMemory,
    WriteMemory,
    MaxTransferSize,
    ActivateWatchpoint,
    DeactivateWatchpoint,
    WatchpointInfo,
    BootHeapStart,
    SetDebugLevel,
}

/// Fault of the scripted collaborators.
#[derive(thiserror::Error, Debug)]
#[error("scripted collaborator fault")]
pub struct ScriptFault;

/// Scripted behavior and call log of a [ScriptedTarget].
pub struct TargetScript {
    /// Successive thread listings; `None` means the domain has exited.
    /// Exhausting the script panics, so a runaway poll loop fails the test.
    pub listings: VecDeque<Option<Vec<DebugThread>>>,

    /// Register blocks by thread ID; absent threads read as vanished.
    pub registers: HashMap<u64, RawRegisters>,

    /// Watchpoint trigger info by thread ID.
    pub watchpoint_hits: HashMap<u64, WatchpointHit>,

    /// Largest single transfer reported by the channel.
    pub max_transfer: usize,

    /// Caps memory transfers to simulate partial reads/writes.
    pub transfer_limit: Option<usize>,

    /// Requests a suspend-all through the handle once the given number of
    /// listings has been served.
    pub suspend_after_listings: Option<(usize, SuspendHandle)>,

    /// Every primitive invocation, in order.
    pub calls: Vec<Call>,

    listings_served: usize,
}

impl Default for TargetScript {
    fn default() -> Self {
        Self {
            listings: VecDeque::new(),
            registers: HashMap::new(),
            watchpoint_hits: HashMap::new(),
            max_transfer: 4096,
            transfer_limit: None,
            suspend_after_listings: None,
            calls: Vec::new(),
            listings_served: 0,
        }
    }
}

impl TargetScript {
    pub fn count(&self, call: Call) -> usize {
        self.calls.iter().filter(|c| **c == call).count()
    }
}

/// Target-control double driven by a [TargetScript] shared with the test.
pub struct ScriptedTarget {
    script: Arc<Mutex<TargetScript>>,
}

impl ScriptedTarget {
    /// Returns the double and the script handle the test keeps.
    pub fn new(script: TargetScript) -> (Self, Arc<Mutex<TargetScript>>) {
        let script = Arc::new(Mutex::new(script));

        (
            Self {
                script: Arc::clone(&script),
            },
            script,
        )
    }

    fn script(&self) -> MutexGuard<'_, TargetScript> {
        self.script.lock().unwrap()
    }
}

impl TargetControl for ScriptedTarget {
    type Error = ScriptFault;

    async fn attach(&mut self, _domain_id: u32) -> Result<(), ScriptFault> {
        self.script().calls.push(Call::Attach);
        Ok(())
    }

    async fn detach(&mut self) -> Result<(), ScriptFault> {
        self.script().calls.push(Call::Detach);
        Ok(())
    }

    async fn sign_off(&mut self) -> Result<(), ScriptFault> {
        self.script().calls.push(Call::SignOff);
        Ok(())
    }

    async fn resume_all(&mut self) -> Result<(), ScriptFault> {
        self.script().calls.push(Call::ResumeAll);
        Ok(())
    }

    async fn suspend_all(&mut self) -> Result<(), ScriptFault> {
        self.script().calls.push(Call::SuspendAll);
        Ok(())
    }

    async fn suspend_thread(&mut self, _thread_id: u64) -> Result<(), ScriptFault> {
        self.script().calls.push(Call::SuspendThread);
        Ok(())
    }

    async fn single_step(&mut self, _thread_id: u64) -> Result<(), ScriptFault> {
        self.script().calls.push(Call::SingleStep);
        Ok(())
    }

    async fn set_instr_ptr(&mut self, _thread_id: u64, _addr: u64) -> Result<(), ScriptFault> {
        self.script().calls.push(Call::SetInstrPtr);
        Ok(())
    }

    async fn list_threads(&mut self) -> Result<Option<Vec<DebugThread>>, ScriptFault> {
        let mut script = self.script();

        script.calls.push(Call::ListThreads);

        let listing = script
            .listings
            .pop_front()
            .unwrap_or_else(|| panic!("thread listing script exhausted"));

        script.listings_served += 1;

        if let Some((after, handle)) = &script.suspend_after_listings {
            if script.listings_served >= *after {
                handle.request_suspend_all();
            }
        }

        Ok(listing)
    }

    async fn read_registers(&mut self, thread_id: u64) -> Result<Option<RawRegisters>, ScriptFault> {
        let mut script = self.script();

        script.calls.push(Call::ReadRegisters);

        Ok(script.registers.get(&thread_id).cloned())
    }

    async fn read_memory(&mut self, _addr: u64, buf: &mut [u8]) -> Result<usize, ScriptFault> {
        let mut script = self.script();

        script.calls.push(Call::ReadMemory);

        let count = script.transfer_limit.map_or(buf.len(), |limit| limit.min(buf.len()));

        buf[..count].fill(0xab);

        Ok(count)
    }

    async fn write_memory(&mut self, _addr: u64, data: &[u8]) -> Result<usize, ScriptFault> {
        let mut script = self.script();

        script.calls.push(Call::WriteMemory);

        Ok(script
            .transfer_limit
            .map_or(data.len(), |limit| limit.min(data.len())))
    }

    async fn max_transfer_size(&mut self) -> Result<usize, ScriptFault> {
        let mut script = self.script();

        script.calls.push(Call::MaxTransferSize);

        Ok(script.max_transfer)
    }

    async fn activate_watchpoint(
        &mut self,
        _addr: u64,
        _size: u64,
        _kind: TriggerKind,
    ) -> Result<(), ScriptFault> {
        self.script().calls.push(Call::ActivateWatchpoint);
        Ok(())
    }

    async fn deactivate_watchpoint(&mut self, _addr: u64, _size: u64) -> Result<(), ScriptFault> {
        self.script().calls.push(Call::DeactivateWatchpoint);
        Ok(())
    }

    async fn watchpoint_info(&mut self, thread_id: u64) -> Result<WatchpointHit, ScriptFault> {
        let mut script = self.script();

        script.calls.push(Call::WatchpointInfo);

        Ok(*script
            .watchpoint_hits
            .get(&thread_id)
            .unwrap_or_else(|| panic!("no scripted watchpoint hit for thread {thread_id}")))
    }

    async fn boot_heap_start(&mut self) -> Result<u64, ScriptFault> {
        self.script().calls.push(Call::BootHeapStart);
        Ok(0x4000_0000)
    }

    async fn set_debug_level(&mut self, _level: u32) -> Result<(), ScriptFault> {
        self.script().calls.push(Call::SetDebugLevel);
        Ok(())
    }
}

/// Thread-locals double resolving stack pointers through a fixed map.
#[derive(Default)]
pub struct MappedLocals(pub HashMap<u64, u64>);

impl ThreadLocals for MappedLocals {
    type Error = ScriptFault;

    async fn locate(&mut self, stack_ptr: u64) -> Result<u64, ScriptFault> {
        Ok(*self
            .0
            .get(&stack_ptr)
            .unwrap_or_else(|| panic!("no scripted locals block for stack pointer {stack_ptr:#x}")))
    }
}

pub fn runnable(id: u64) -> DebugThread {
    DebugThread {
        id,
        flags: ThreadFlags::RUNNABLE | ThreadFlags::RUNNING,
    }
}

pub fn halted(id: u64, flags: ThreadFlags) -> DebugThread {
    DebugThread { id, flags }
}

pub fn regs(instr_ptr: u64, stack_ptr: u64) -> RawRegisters {
    RawRegisters {
        instr_ptr,
        stack_ptr,
        integer: vec![1; 16],
        floating_point: vec![2; 32],
        state: vec![3; 8],
    }
}
