//! Memory-mapped register access and polling helpers.

/// Raw access to the device's control-register window.
///
/// Offsets are byte offsets from the start of the window and are not range
/// checked here; an out-of-range offset is a caller bug. The hardware gives
/// no error channel for a failed access, so a dead bus reads as zero and is
/// indistinguishable from a register that really holds zero.
pub trait MmioPort {
    fn read32(&self, offset: u32) -> u32;
    fn write32(&mut self, offset: u32, value: u32);
    fn read64(&self, offset: u32) -> u64;
}

/// [`MmioPort`] over an already-mapped register window.
pub struct MmioRegion {
    base: *mut u8,
}

impl MmioRegion {
    /// # Safety
    ///
    /// `base` must point at a mapped, uncached device register window that
    /// stays valid for the lifetime of the returned region, and no other
    /// code may access the same window concurrently.
    pub unsafe fn new(base: *mut u8) -> Self {
        Self { base }
    }
}

impl MmioPort for MmioRegion {
    fn read32(&self, offset: u32) -> u32 {
        unsafe { core::ptr::read_volatile(self.base.add(offset as usize) as *const u32) }
    }

    fn write32(&mut self, offset: u32, value: u32) {
        unsafe { core::ptr::write_volatile(self.base.add(offset as usize) as *mut u32, value) }
    }

    fn read64(&self, offset: u32) -> u64 {
        unsafe { core::ptr::read_volatile(self.base.add(offset as usize) as *const u64) }
    }
}

/// How long a status poll may spin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollBudget {
    /// Give up after at most this many polls.
    Bounded(u32),
    /// Spin until the condition holds. A stuck peripheral hangs the caller.
    Unbounded,
}

/// Polls `f` until it yields a value, within `budget`.
///
/// `Bounded(n)` calls `f` at most `n` times and returns `None` once the
/// budget is spent.
pub fn poll_until<T, F>(budget: PollBudget, mut f: F) -> Option<T>
where
    F: FnMut() -> Option<T>,
{
    match budget {
        PollBudget::Bounded(n) => {
            for _ in 0..n {
                if let Some(v) = f() {
                    return Some(v);
                }
                core::hint::spin_loop();
            }
            None
        }
        PollBudget::Unbounded => loop {
            if let Some(v) = f() {
                return Some(v);
            }
            core::hint::spin_loop();
        },
    }
}
