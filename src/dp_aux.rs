//! DisplayPort AUX channel driver.
//!
//! Half-duplex packet transactions against the per-pin CTL/DATA register
//! banks, plus the I2C-over-AUX sequence that fetches an EDID block from a
//! monitor whose DDC lines are not wired through.

use {
    crate::mmio::MmioPort,
    bitflags::bitflags,
    core::ops::RangeInclusive,
};

const AUX_CTL_BASE: u32 = 0x64010;
const AUX_DATA1_BASE: u32 = 0x64014;
const AUX_DATA2_BASE: u32 = 0x64018;
const PIN_STRIDE: u32 = 1 << 8;

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct AuxControl: u32 {
        /// Set to start a transaction; hardware clears it when done
        const SEND_BUSY     = 1 << 31;
        /// Transaction finished (write 1 to clear)
        const DONE          = 1 << 30;
        const INTERRUPT     = 1 << 29;
        /// No reply within the timeout (write 1 to clear)
        const TIMEOUT_ERROR = 1 << 28;
        /// Corrupt reply (write 1 to clear)
        const RECEIVE_ERROR = 1 << 25;
    }
}

const TIMEOUT_MAX: u32 = 3 << 26;
const MESSAGE_SIZE_SHIFT: u32 = 20;
const SYNC_PULSE_COUNT: u32 = 32;

/// Request operation codes, bits 28..31 of the first payload word.
const OP_I2C_WRITE: u8 = 0x0;
const OP_I2C_READ: u8 = 0x1;
/// Middle-of-transaction: keeps the emulated I2C transfer open.
const OP_MOT: u8 = 0x4;

/// AUX channel instances worth probing, in probe order.
pub const PINS: RangeInclusive<u8> = 0..=5;

/// Busy polls per transaction. The channel can wedge with BUSY stuck high,
/// so unlike the GMBUS waits this bound is part of the reference behavior.
pub const POLL_BOUND: u32 = 16384;

/// EDID lives behind this I2C address on the emulated bus.
const DDC_ADDR: u16 = 0x50;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AuxError {
    /// The channel reported no reply within its hardware timeout.
    Timeout,
    /// The reply arrived corrupt.
    Receive,
}

/// Composes the CTL word that starts a transaction of `message_size` bytes.
///
/// Writing the error bits back high clears any stale state from the previous
/// transaction as the new one starts. Sync-pulse counts are the fixed values
/// the reference platform wants.
fn send_ctl(message_size: u32) -> u32 {
    (AuxControl::SEND_BUSY
        | AuxControl::DONE
        | AuxControl::TIMEOUT_ERROR
        | AuxControl::RECEIVE_ERROR)
        .bits()
        | TIMEOUT_MAX
        | (message_size << MESSAGE_SIZE_SHIFT)
        | ((SYNC_PULSE_COUNT - 1) << 5)
        | (SYNC_PULSE_COUNT - 1)
}

/// Composes a request header word: operation, 16-bit address, length byte.
/// The header is packed big-endian within the word; length holds the
/// receive-buffer size minus one.
fn request_header(op: u8, addr: u16, len: u8) -> u32 {
    ((op as u32) << 28) | ((addr as u32) << 8) | len as u32
}

/// One AUX channel instance. The pin number selects the register bank.
pub struct AuxChannel {
    pin: u8,
}

impl AuxChannel {
    pub fn new(pin: u8) -> Self {
        Self { pin }
    }

    fn ctl(&self) -> u32 {
        AUX_CTL_BASE + (self.pin as u32) * PIN_STRIDE
    }

    fn data1(&self) -> u32 {
        AUX_DATA1_BASE + (self.pin as u32) * PIN_STRIDE
    }

    fn data2(&self) -> u32 {
        AUX_DATA2_BASE + (self.pin as u32) * PIN_STRIDE
    }

    /// Runs one transaction: payload already staged in the data registers,
    /// `message_size` bytes on the wire. Returns the final status, with the
    /// done/error bits cleared in hardware on the way out.
    ///
    /// The busy wait is bounded; a wedged channel falls through with
    /// SEND_BUSY still set and whatever error bits the engine latched.
    fn transaction<P: MmioPort>(&self, port: &mut P, message_size: u32) -> AuxControl {
        port.write32(self.ctl(), send_ctl(message_size));

        let mut polls = 0u32;
        let status = loop {
            let status = AuxControl::from_bits_retain(port.read32(self.ctl()));
            if !status.contains(AuxControl::SEND_BUSY) {
                break status;
            }
            polls += 1;
            if polls >= POLL_BOUND {
                break status;
            }
            core::hint::spin_loop();
        };

        port.write32(
            self.ctl(),
            (status
                | AuxControl::DONE
                | AuxControl::TIMEOUT_ERROR
                | AuxControl::RECEIVE_ERROR)
                .bits(),
        );
        status
    }

    fn check(status: AuxControl) -> Result<(), AuxError> {
        if status.contains(AuxControl::TIMEOUT_ERROR) {
            Err(AuxError::Timeout)
        } else if status.contains(AuxControl::RECEIVE_ERROR) {
            Err(AuxError::Receive)
        } else {
            Ok(())
        }
    }

    /// Fetches a 128-byte EDID block over I2C-over-AUX.
    ///
    /// Four phases: reset the peripheral's read offset to 0, probe with a
    /// plain one-byte write (the only phase whose status gates the pin),
    /// open the read transfer, then pull the block one byte per transaction
    /// out of bits 16..23 of DATA1.
    pub fn read_edid<P: MmioPort>(&self, port: &mut P, buf: &mut [u8]) -> Result<(), AuxError> {
        port.write32(self.data1(), request_header(OP_MOT | OP_I2C_WRITE, DDC_ADDR, 0));
        self.transaction(port, 3);

        let status = {
            port.write32(self.data1(), request_header(OP_I2C_WRITE, DDC_ADDR, 0));
            port.write32(self.data2(), 0);
            self.transaction(port, 5)
        };
        Self::check(status)?;

        port.write32(self.data1(), request_header(OP_MOT | OP_I2C_READ, DDC_ADDR, 0));
        self.transaction(port, 3);

        for byte in buf.iter_mut() {
            port.write32(self.data1(), request_header(OP_I2C_READ, DDC_ADDR, 0));
            self.transaction(port, 4);
            *byte = (port.read32(self.data1()) >> 16) as u8;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmio::fake::FakeMmio;

    #[test]
    fn send_ctl_layout() {
        let word = send_ctl(4);
        assert_eq!(word & (1 << 31), 1 << 31, "busy");
        assert_eq!(word & (1 << 30), 1 << 30, "done clear");
        assert_eq!(word & (1 << 28), 1 << 28, "timeout clear");
        assert_eq!(word & (3 << 26), 3 << 26, "max timeout select");
        assert_eq!(word & (1 << 25), 1 << 25, "receive clear");
        assert_eq!((word >> 20) & 0x1f, 4, "message size");
        assert_eq!((word >> 5) & 0x1f, 31, "fw sync pulse");
        assert_eq!(word & 0x1f, 31, "sync pulse");
    }

    #[test]
    fn request_header_layout() {
        // MOT|write to 0x50, zero length
        assert_eq!(request_header(0x4, 0x50, 0), 0x4000_5000);
        // plain read
        assert_eq!(request_header(0x1, 0x50, 0), 0x1000_5000);
    }

    #[test]
    fn busy_poll_is_bounded() {
        let mut port = FakeMmio::new();
        let ch = AuxChannel::new(0);
        port.set(ch.ctl(), AuxControl::SEND_BUSY.bits());

        ch.transaction(&mut port, 3);

        // One read per poll, and not a single one past the bound.
        assert_eq!(port.read_count(ch.ctl()), POLL_BOUND as usize);
    }

    #[test]
    fn transaction_clears_latched_flags() {
        let mut port = FakeMmio::new();
        let ch = AuxChannel::new(2);
        port.set(ch.ctl(), AuxControl::DONE.bits());

        let status = ch.transaction(&mut port, 5);

        assert_eq!(status, AuxControl::DONE);
        let clear = port.written(ch.ctl()).unwrap();
        assert_eq!(
            clear,
            (AuxControl::DONE | AuxControl::TIMEOUT_ERROR | AuxControl::RECEIVE_ERROR).bits()
        );
    }

    #[test]
    fn write_probe_error_stops_before_any_byte_read() {
        let mut port = FakeMmio::new();
        let ch = AuxChannel::new(0);
        port.set(ch.ctl(), AuxControl::RECEIVE_ERROR.bits());

        let mut buf = [0u8; 128];
        assert_eq!(ch.read_edid(&mut port, &mut buf), Err(AuxError::Receive));

        // Two transactions ran (offset reset + probe); the read phases never
        // started, so only two CTL start-writes carry SEND_BUSY.
        let starts = port
            .writes
            .iter()
            .filter(|&&(o, v)| o == ch.ctl() && v & AuxControl::SEND_BUSY.bits() != 0)
            .count();
        assert_eq!(starts, 2);
    }

    #[test]
    fn read_edid_decodes_byte_lane() {
        let mut port = FakeMmio::new();
        let ch = AuxChannel::new(1);
        port.set(ch.ctl(), 0); // idle, no errors

        // Each byte-read transaction pops one reply word; the byte rides in
        // bits 16..23.
        let mut buf = [0u8; 4];
        port.script(ch.data1(), (0u32..4).map(|i| (0xa0 + i) << 16));

        ch.read_edid(&mut port, &mut buf).unwrap();
        assert_eq!(buf, [0xa0, 0xa1, 0xa2, 0xa3]);
    }
}
