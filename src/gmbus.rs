//! GMBUS (hardware-assisted DDC two-wire bus) driver.

use {
    crate::mmio::{poll_until, MmioPort, PollBudget},
    bitflags::bitflags,
    core::ops::RangeInclusive,
};

const GMBUS_SELECT: u32 = 0xc5100;
const GMBUS_COMMAND: u32 = 0xc5104;
const GMBUS_STATUS: u32 = 0xc5108;
const GMBUS_DATA: u32 = 0xc510c;

bitflags! {
    #[derive(Debug, Copy, Clone)]
    pub struct GmbusStatus: u32 {
        /// Another agent holds the bus
        const INUSE        = 1 << 15;
        /// Engine paused in a wait cycle
        const HW_WAIT      = 1 << 14;
        /// Clock stretched past the stall limit
        const STALL_TIMEOUT = 1 << 13;
        const INT          = 1 << 12;
        /// Data register may be read/written
        const HW_RDY       = 1 << 11;
        /// Peripheral did not acknowledge
        const SATOER       = 1 << 10;
        /// Transaction in progress
        const ACTIVE       = 1 << 9;
    }
}

const SW_RDY: u32 = 1 << 30;
const CYCLE_WAIT: u32 = 1 << 25;
const BYTE_COUNT_SHIFT: u32 = 16;
const PERIPHERAL_ADDR_SHIFT: u32 = 1;
const DIR_READ: u32 = 1 << 0;

/// Multiplexed pins worth probing for a DDC-wired monitor, in probe order.
/// Lower numbers are reserved or disabled, higher ones unrouted.
pub const PINS: RangeInclusive<u8> = 2..=6;

/// Polls before a ready wait is abandoned.
///
/// The hardware gives no forward-progress guarantee here; the reference
/// behavior is to spin forever. A finite default keeps a dead engine from
/// hanging bring-up, and `PollBudget::Unbounded` restores the old behavior.
pub const DEFAULT_POLL_BOUND: u32 = 1 << 20;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GmbusError {
    /// The engine flagged a bus-level failure (no ack); the pin is not
    /// wired as a two-wire bus.
    BusFault,
    /// Ready never appeared within the poll budget.
    Stalled,
}

/// Composes a command-register word for one bus cycle.
fn command_word(addr: u8, byte_count: u16, read: bool) -> u32 {
    ((addr as u32) << PERIPHERAL_ADDR_SHIFT)
        | ((byte_count as u32) << BYTE_COUNT_SHIFT)
        | if read { DIR_READ } else { 0 }
        | CYCLE_WAIT
        | SW_RDY
}

pub struct Gmbus {
    poll_budget: PollBudget,
}

impl Default for Gmbus {
    fn default() -> Self {
        Self::new()
    }
}

impl Gmbus {
    pub fn new() -> Self {
        Self {
            poll_budget: PollBudget::Bounded(DEFAULT_POLL_BOUND),
        }
    }

    pub fn with_poll_budget(poll_budget: PollBudget) -> Self {
        Self { poll_budget }
    }

    /// Reads `buf.len()` bytes from peripheral `addr` on `pin`, starting at
    /// register index 0.
    ///
    /// One indexed read is three cycles: a one-byte index write, an N-byte
    /// read drained one 32-bit word at a time, and a final ready wait for the
    /// stop condition. A fault anywhere leaves `buf` partially filled; the
    /// caller is expected to validate the payload, not this layer.
    pub fn read_indexed<P: MmioPort>(
        &self,
        port: &mut P,
        pin: u8,
        addr: u8,
        buf: &mut [u8],
    ) -> Result<(), GmbusError> {
        port.write32(GMBUS_SELECT, pin as u32);
        self.wait_ready(port)?;

        // Set the read index. The data register is loaded before the command
        // so the engine clocks it out as the cycle's single payload byte.
        port.write32(GMBUS_DATA, 0);
        port.write32(GMBUS_COMMAND, command_word(addr, 1, false));
        let _ = self.wait_ready(port);

        port.write32(GMBUS_COMMAND, command_word(addr, buf.len() as u16, true));
        for chunk in buf.chunks_mut(4) {
            self.wait_ready(port)?;
            let word = port.read32(GMBUS_DATA);
            for (dst, src) in chunk.iter_mut().zip(word.to_le_bytes()) {
                *dst = src;
            }
        }

        // Drain the stop condition.
        let _ = self.wait_ready(port);
        Ok(())
    }

    fn wait_ready<P: MmioPort>(&self, port: &P) -> Result<GmbusStatus, GmbusError> {
        poll_until(self.poll_budget, || {
            let status = GmbusStatus::from_bits_retain(port.read32(GMBUS_STATUS));
            if status.contains(GmbusStatus::SATOER) {
                Some(Err(GmbusError::BusFault))
            } else if status.contains(GmbusStatus::HW_RDY) {
                Some(Ok(status))
            } else {
                None
            }
        })
        .unwrap_or(Err(GmbusError::Stalled))
    }
}
