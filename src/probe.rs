//! EDID acquisition: every GMBUS pin first, then every AUX channel.

use {
    crate::{
        dp_aux::{self, AuxChannel},
        edid::{Edid, EDID_LEN},
        gmbus::{self, Gmbus},
        mmio::MmioPort,
    },
    log::debug,
};

/// I2C address of the monitor's EDID memory.
const DDC_ADDR: u8 = 0x50;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// Every pin on both transports was exhausted without a valid header.
    NotFound,
}

/// Outcome of one connection attempt.
enum PinOutcome {
    /// Full block with a valid header.
    Valid(Edid),
    /// Transfer completed but the header check failed.
    Invalid,
    /// The transport did not respond on this pin.
    Unavailable,
}

fn try_gmbus_pin<P: MmioPort>(port: &mut P, gmbus: &Gmbus, pin: u8) -> PinOutcome {
    let mut block = [0u8; EDID_LEN];
    match gmbus.read_indexed(port, pin, DDC_ADDR, &mut block) {
        Ok(()) => match Edid::from_bytes(block) {
            Some(edid) => PinOutcome::Valid(edid),
            None => PinOutcome::Invalid,
        },
        Err(_) => PinOutcome::Unavailable,
    }
}

fn try_aux_pin<P: MmioPort>(port: &mut P, pin: u8) -> PinOutcome {
    let mut block = [0u8; EDID_LEN];
    match AuxChannel::new(pin).read_edid(port, &mut block) {
        Ok(()) => match Edid::from_bytes(block) {
            Some(edid) => PinOutcome::Valid(edid),
            None => PinOutcome::Invalid,
        },
        Err(_) => PinOutcome::Unavailable,
    }
}

/// Hunts for the monitor's identification block.
///
/// GMBUS pins are tried in ascending order, then the AUX channels; the first
/// pin that yields a block with a valid header wins and no pin is ever
/// revisited. An invalid or partial block is treated exactly like a silent
/// pin: move on.
pub fn acquire_edid<P: MmioPort>(port: &mut P, gmbus: &Gmbus) -> Result<Edid, ProbeError> {
    for pin in gmbus::PINS {
        debug!("trying gmbus pin {pin}");
        match try_gmbus_pin(port, gmbus, pin) {
            PinOutcome::Valid(edid) => {
                debug!("edid found on gmbus pin {pin}");
                return Ok(edid);
            }
            PinOutcome::Invalid | PinOutcome::Unavailable => {}
        }
    }

    for pin in dp_aux::PINS {
        debug!("trying aux channel {pin}");
        match try_aux_pin(port, pin) {
            PinOutcome::Valid(edid) => {
                debug!("edid found on aux channel {pin}");
                return Ok(edid);
            }
            PinOutcome::Invalid | PinOutcome::Unavailable => {}
        }
    }

    Err(ProbeError::NotFound)
}
