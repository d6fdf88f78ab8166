//! Display bring-up context: identity probe, mode table, mode-set, blit
//! pass-through.

use {
    crate::{
        edid::Edid,
        gmbus::Gmbus,
        mmio::{MmioPort, PollBudget},
        pipe::Pipe,
        probe::{acquire_edid, ProbeError},
    },
    log::info,
};

// A mediated (GVT-g) instance publishes this marker and wants the plane
// surface programmed relative to its guest aperture offset.
const GVT_MAGIC_REG: u32 = 0x78000;
const GVT_MAGIC: u64 = 0x4776_5447_7654_4776;
const GVT_GMADR_REG: u32 = 0x78040;

/// The published scanout configuration. Pixels are packed 32-bit XRGB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeInfo {
    pub width: u32,
    pub height: u32,
    /// Bytes per scanline, 64-byte aligned.
    pub stride: u32,
    pub framebuffer_base: u64,
    pub framebuffer_size: usize,
}

/// A rectangle in framebuffer coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BltError {
    /// The compositor's scratch buffer cannot hold this mode; it needs at
    /// least this many bytes.
    ScratchTooSmall { needed: usize },
    /// Allocation failed; the mode-set is dead.
    OutOfResources,
    DeviceError,
}

/// The external compositing service.
///
/// Pixel pushing lives entirely behind this trait; the bring-up core only
/// hands it the mode once scanout is running and forwards blit requests.
pub trait BltEngine {
    /// Adopts a freshly programmed mode.
    fn configure(&mut self, mode: &ModeInfo) -> Result<(), BltError>;

    /// Grows the scratch buffer to at least `bytes`.
    fn grow_scratch(&mut self, bytes: usize) -> Result<(), BltError>;

    fn fill(&mut self, color: u32, dst: Rect) -> Result<(), BltError>;

    fn copy(&mut self, src: Rect, dst: Rect) -> Result<(), BltError>;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SetModeError {
    /// Mode index out of range (the table has exactly one entry).
    InvalidMode,
    /// `init` has not produced an identification block yet.
    NotProbed,
    Blt(BltError),
}

/// One attached display controller.
///
/// Owns the register window, the compositor, and all mutable bring-up state;
/// nothing here is process-wide. Dropping it drops the claim on the device.
pub struct DisplayController<P: MmioPort, B: BltEngine> {
    regs: P,
    blt: B,
    /// Physical base of the framebuffer aperture, as granted by the
    /// environment.
    framebuffer_base: u64,
    /// Aperture-relative surface offset, nonzero only under mediation.
    gmadr: u32,
    gmbus: Gmbus,
    pipe: Pipe,
    edid: Option<Edid>,
    mode: ModeInfo,
}

impl<P: MmioPort, B: BltEngine> DisplayController<P, B> {
    /// Until the monitor has been identified the single mode-table entry is
    /// a 1024x768 placeholder.
    pub fn new(regs: P, blt: B, framebuffer_base: u64) -> Self {
        Self::with_poll_budgets(
            regs,
            blt,
            framebuffer_base,
            PollBudget::Bounded(crate::gmbus::DEFAULT_POLL_BOUND),
            PollBudget::Unbounded,
        )
    }

    pub fn with_poll_budgets(
        regs: P,
        blt: B,
        framebuffer_base: u64,
        gmbus_poll: PollBudget,
        pipe_poll: PollBudget,
    ) -> Self {
        Self {
            regs,
            blt,
            framebuffer_base,
            gmadr: 0,
            gmbus: Gmbus::with_poll_budget(gmbus_poll),
            pipe: Pipe::with_active_poll(pipe_poll),
            edid: None,
            mode: ModeInfo {
                width: 1024,
                height: 768,
                stride: 0,
                framebuffer_base: 0,
                framebuffer_size: 0,
            },
        }
    }

    /// Identifies the attached monitor and fills in the real mode table.
    pub fn init(&mut self) -> Result<(), ProbeError> {
        self.gmadr = if self.regs.read64(GVT_MAGIC_REG) == GVT_MAGIC {
            self.regs.read32(GVT_GMADR_REG)
        } else {
            0
        };
        info!("surface offset {:#x}", self.gmadr);

        let edid = acquire_edid(&mut self.regs, &self.gmbus)?;
        let timing = edid.detailed_timing(0).timing();
        info!(
            "monitor {:04x}:{:04x}, preferred mode {}x{}",
            edid.vendor_id(),
            edid.product_id(),
            timing.horizontal.active,
            timing.vertical.active,
        );
        self.mode.width = timing.horizontal.active;
        self.mode.height = timing.vertical.active;
        self.edid = Some(edid);
        Ok(())
    }

    pub fn edid(&self) -> Option<&Edid> {
        self.edid.as_ref()
    }

    pub fn max_mode(&self) -> u32 {
        1
    }

    pub fn query_mode(&self, index: u32) -> Option<&ModeInfo> {
        (index == 0).then_some(&self.mode)
    }

    /// Brings up scanout for mode `index` and hands the result to the
    /// compositor.
    ///
    /// Safe to call again: the whole pipe/plane state is reprogrammed from
    /// scratch. A compositor that outgrew its scratch buffer gets one grow
    /// and one retry; anything else it reports is fatal to the call.
    pub fn set_mode(&mut self, index: u32) -> Result<(), SetModeError> {
        if index != 0 {
            return Err(SetModeError::InvalidMode);
        }
        let edid = self.edid.as_ref().ok_or(SetModeError::NotProbed)?;
        let timing = edid.detailed_timing(0).timing();

        let stride = self.pipe.apply(&mut self.regs, &timing, self.gmadr);

        self.mode = ModeInfo {
            width: timing.horizontal.active,
            height: timing.vertical.active,
            stride,
            framebuffer_base: self.framebuffer_base,
            framebuffer_size: stride as usize * timing.vertical.active as usize,
        };

        match self.blt.configure(&self.mode) {
            Ok(()) => Ok(()),
            Err(BltError::ScratchTooSmall { needed }) => {
                self.blt.grow_scratch(needed).map_err(SetModeError::Blt)?;
                self.blt.configure(&self.mode).map_err(SetModeError::Blt)
            }
            Err(e) => Err(SetModeError::Blt(e)),
        }
    }

    /// Blit pass-throughs. The controller adds nothing; rectangle handling
    /// is the compositor's problem.
    pub fn fill(&mut self, color: u32, dst: Rect) -> Result<(), BltError> {
        self.blt.fill(color, dst)
    }

    pub fn copy(&mut self, src: Rect, dst: Rect) -> Result<(), BltError> {
        self.blt.copy(src, dst)
    }
}
