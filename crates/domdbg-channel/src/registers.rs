use std::fmt;

/// Register block of a target thread.
///
/// The target-control library lays the block out in the three canonical
/// regions (its ISA tables own the target-specific encoding); this crate
/// only validates caller buffers and copies.
#[derive(Clone, Debug, Default)]
pub struct RawRegisters {
    /// Instruction pointer.
    pub instr_ptr: u64,

    /// Stack pointer, used to locate the thread-locals block.
    pub stack_ptr: u64,

    /// Canonical integer register region.
    pub integer: Vec<u8>,

    /// Canonical floating-point register region.
    pub floating_point: Vec<u8>,

    /// Canonical state/status register region.
    pub state: Vec<u8>,
}

impl RawRegisters {
    /// Copies the three canonical regions into the caller's buffers.
    ///
    /// All-or-nothing: every declared capacity is validated before any
    /// buffer is touched, so a [`RegionOverflow`] leaves all three buffers
    /// unmodified. On success each region is written in full, into the
    /// prefix of its buffer.
    pub fn copy_into(
        &self,
        integer: &mut [u8],
        floating_point: &mut [u8],
        state: &mut [u8],
    ) -> Result<(), RegionOverflow> {
        check_capacity(RegisterRegion::Integer, &self.integer, integer)?;
        check_capacity(
            RegisterRegion::FloatingPoint,
            &self.floating_point,
            floating_point,
        )?;
        check_capacity(RegisterRegion::State, &self.state, state)?;

        integer[..self.integer.len()].copy_from_slice(&self.integer);
        floating_point[..self.floating_point.len()].copy_from_slice(&self.floating_point);
        state[..self.state.len()].copy_from_slice(&self.state);

        Ok(())
    }
}

fn check_capacity(
    region: RegisterRegion,
    data: &[u8],
    buf: &[u8],
) -> Result<(), RegionOverflow> {
    if buf.len() < data.len() {
        Err(RegionOverflow {
            region,
            needed: data.len(),
            capacity: buf.len(),
        })
    } else {
        Ok(())
    }
}

/// Canonical register region names, for capacity errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegisterRegion {
    /// Integer registers.
    Integer,

    /// Floating-point registers.
    FloatingPoint,

    /// State/status registers.
    State,
}

impl fmt::Display for RegisterRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => f.write_str("integer"),
            Self::FloatingPoint => f.write_str("floating-point"),
            Self::State => f.write_str("state"),
        }
    }
}

/// A caller buffer is smaller than the canonical region it must hold.
#[derive(thiserror::Error, Clone, Copy, Debug, PartialEq, Eq)]
#[error("{region} register buffer too small: capacity {capacity}, need {needed}")]
pub struct RegionOverflow {
    /// Region whose buffer overflowed.
    pub region: RegisterRegion,

    /// Size of the canonical region.
    pub needed: usize,

    /// Capacity the caller declared.
    pub capacity: usize,
}
