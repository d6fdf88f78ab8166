//! Display pipe timing and primary plane programming.

use {
    crate::{
        edid::DisplayTiming,
        mmio::{poll_until, MmioPort, PollBudget},
    },
    log::debug,
};

// Pipe A timing registers.
const HTOTAL: u32 = 0x60000;
const HBLANK: u32 = 0x60004;
const HSYNC: u32 = 0x60008;
const VTOTAL: u32 = 0x6000c;
const VBLANK: u32 = 0x60010;
const VSYNC: u32 = 0x60014;
const VSYNCSHIFT: u32 = 0x60028;

const PIPECONF: u32 = 0x70008;
const PIPECONF_ENABLE: u32 = 1 << 31;
const PIPECONF_ACTIVE: u32 = 1 << 30;

// Primary plane.
const PLANE_CTL: u32 = 0x70180;
const PLANE_CTL_ENABLE: u32 = 1 << 31;
const PLANE_CTL_FORMAT_XRGB_8888: u32 = 4 << 24;
const PLANE_ADDR: u32 = 0x70184;
const PLANE_STRIDE: u32 = 0x70188;
const PLANE_SIZE: u32 = 0x70190;
const PLANE_SURF: u32 = 0x7019c;
const PLANE_OFFSET: u32 = 0x701a4;

/// Scanline pitch for a 32bpp surface, padded to the 64-byte granularity
/// the plane's stride register counts in.
pub fn stride_for_width(horz_active: u32) -> u32 {
    (horz_active * 4 + 63) & !63
}

/// Packs a start/end timing register: low half `start - 1`, high `end - 1`.
fn span(start: u32, end: u32) -> u32 {
    start.saturating_sub(1) | (end.saturating_sub(1) << 16)
}

pub struct Pipe {
    active_poll: PollBudget,
}

impl Default for Pipe {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipe {
    /// The active-flag wait defaults to unbounded, matching the reference:
    /// the bring-up environment is trusted to bring the pipe up eventually.
    pub fn new() -> Self {
        Self {
            active_poll: PollBudget::Unbounded,
        }
    }

    pub fn with_active_poll(active_poll: PollBudget) -> Self {
        Self { active_poll }
    }

    /// Programs the pipe timings and the plane, and returns the stride.
    ///
    /// `surface_offset` is the framebuffer's offset within the graphics
    /// aperture. Reprogramming an already-running pipe just overwrites
    /// everything; there is no incremental path.
    pub fn apply<P: MmioPort>(
        &self,
        port: &mut P,
        timing: &DisplayTiming,
        surface_offset: u32,
    ) -> u32 {
        let h = &timing.horizontal;
        let v = &timing.vertical;

        port.write32(VSYNCSHIFT, 0);

        port.write32(HTOTAL, span(h.active, h.total));
        port.write32(HBLANK, span(h.active, h.total));
        port.write32(HSYNC, span(h.sync_start, h.sync_end));

        port.write32(VTOTAL, span(v.active, v.total));
        port.write32(VBLANK, span(v.active, v.total));
        port.write32(VSYNC, span(v.sync_start, v.sync_end));

        let conf = port.read32(PIPECONF);
        port.write32(PIPECONF, conf | PIPECONF_ENABLE);
        poll_until(self.active_poll, || {
            (port.read32(PIPECONF) & PIPECONF_ACTIVE != 0).then_some(())
        });
        debug!("pipe active at {}x{}", h.active, v.active);

        let stride = stride_for_width(h.active);
        port.write32(PLANE_OFFSET, 0);
        port.write32(PLANE_STRIDE, stride >> 6);
        port.write32(PLANE_SIZE, span(h.active, v.active));
        port.write32(PLANE_ADDR, 0);
        port.write32(PLANE_SURF, surface_offset);
        port.write32(PLANE_CTL, PLANE_CTL_ENABLE | PLANE_CTL_FORMAT_XRGB_8888);
        debug!("plane enabled, stride {stride}");

        stride
    }
}
