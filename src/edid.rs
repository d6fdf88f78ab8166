//! EDID block parsing and detailed-timing decode.

/// Size of the base EDID block.
pub const EDID_LEN: usize = 128;

/// Fixed 8-byte header every valid block starts with.
const HEADER: [u8; 8] = [0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x00];

const DETAIL_TIMINGS_OFFSET: usize = 54;
const DETAIL_TIMING_LEN: usize = 18;

/// A monitor's 128-byte identification block.
///
/// Validation is header-only: the checksum byte is carried but never
/// verified, matching what real blocks in the field get away with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edid {
    bytes: [u8; EDID_LEN],
}

impl Edid {
    /// Accepts a block iff it starts with the fixed header.
    pub fn from_bytes(bytes: [u8; EDID_LEN]) -> Option<Self> {
        if bytes[..8] == HEADER {
            Some(Self { bytes })
        } else {
            None
        }
    }

    pub fn as_bytes(&self) -> &[u8; EDID_LEN] {
        &self.bytes
    }

    fn u16_at(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.bytes[offset], self.bytes[offset + 1]])
    }

    pub fn vendor_id(&self) -> u16 {
        self.u16_at(8)
    }

    pub fn product_id(&self) -> u16 {
        self.u16_at(10)
    }

    pub fn serial_number(&self) -> u32 {
        u32::from_le_bytes([
            self.bytes[12],
            self.bytes[13],
            self.bytes[14],
            self.bytes[15],
        ])
    }

    pub fn version(&self) -> (u8, u8) {
        (self.bytes[18], self.bytes[19])
    }

    pub fn extension_count(&self) -> u8 {
        self.bytes[126]
    }

    /// Returns detailed-timing descriptor `n` (0..4). Only descriptor 0 is
    /// used for bring-up; the monitor puts its preferred mode there.
    pub fn detailed_timing(&self, n: usize) -> DetailedTiming {
        assert!(n < 4);
        let offset = DETAIL_TIMINGS_OFFSET + n * DETAIL_TIMING_LEN;
        let d = &self.bytes[offset..offset + DETAIL_TIMING_LEN];
        DetailedTiming {
            pixel_clock: u16::from_le_bytes([d[0], d[1]]),
            horz_active: d[2],
            horz_blank: d[3],
            horz_active_blank_msb: d[4],
            vert_active: d[5],
            vert_blank: d[6],
            vert_active_blank_msb: d[7],
            horz_sync_offset: d[8],
            horz_sync_pulse: d[9],
            vert_sync: d[10],
            sync_msb: d[11],
        }
    }
}

/// One detailed-timing descriptor, still in its packed byte encoding.
///
/// Every count is 12 bits (vertical sync fields: 6) split between a
/// dedicated low byte and a slice of one of the shared MSB bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetailedTiming {
    /// Units of 10 kHz, little-endian in the block.
    pub pixel_clock: u16,
    pub horz_active: u8,
    pub horz_blank: u8,
    /// High nibble: horizontal active bits 8..12; low nibble: blank.
    pub horz_active_blank_msb: u8,
    pub vert_active: u8,
    pub vert_blank: u8,
    pub vert_active_blank_msb: u8,
    pub horz_sync_offset: u8,
    pub horz_sync_pulse: u8,
    /// High nibble: vertical sync offset bits 0..4; low nibble: pulse.
    pub vert_sync: u8,
    /// Two bits each, high to low: horizontal sync offset, horizontal sync
    /// pulse, vertical sync offset, vertical sync pulse.
    pub sync_msb: u8,
}

/// Horizontal or vertical scanout timing, in pixels or lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisTiming {
    pub active: u32,
    pub sync_start: u32,
    pub sync_end: u32,
    pub total: u32,
}

/// Decoded timing for one video mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayTiming {
    pub pixel_clock_khz: u32,
    pub horizontal: AxisTiming,
    pub vertical: AxisTiming,
}

impl DetailedTiming {
    /// Reassembles the split fields and derives the sync geometry.
    ///
    /// No plausibility checks: a zeroed descriptor decodes to zeros and it
    /// is the caller's business what to do about it.
    pub fn timing(&self) -> DisplayTiming {
        let horz_active =
            self.horz_active as u32 | (((self.horz_active_blank_msb >> 4) as u32) << 8);
        let horz_blank =
            self.horz_blank as u32 | (((self.horz_active_blank_msb & 0xf) as u32) << 8);
        let horz_sync_offset =
            self.horz_sync_offset as u32 | (((self.sync_msb >> 6) as u32) << 8);
        let horz_sync_pulse =
            self.horz_sync_pulse as u32 | ((((self.sync_msb >> 4) & 0x3) as u32) << 8);

        let vert_active =
            self.vert_active as u32 | (((self.vert_active_blank_msb >> 4) as u32) << 8);
        let vert_blank =
            self.vert_blank as u32 | (((self.vert_active_blank_msb & 0xf) as u32) << 8);
        let vert_sync_offset =
            (self.vert_sync >> 4) as u32 | ((((self.sync_msb >> 2) & 0x3) as u32) << 4);
        let vert_sync_pulse =
            (self.vert_sync & 0xf) as u32 | (((self.sync_msb & 0x3) as u32) << 4);

        DisplayTiming {
            pixel_clock_khz: self.pixel_clock as u32 * 10,
            horizontal: AxisTiming {
                active: horz_active,
                sync_start: horz_active + horz_sync_offset,
                sync_end: horz_active + horz_sync_offset + horz_sync_pulse,
                total: horz_active + horz_blank,
            },
            vertical: AxisTiming {
                active: vert_active,
                sync_start: vert_active + vert_sync_offset,
                sync_end: vert_active + vert_sync_offset + vert_sync_pulse,
                total: vert_active + vert_blank,
            },
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{block_with_descriptor, descriptor_1080p};
    use super::*;

    /// Packs decoded counts back into the descriptor byte layout.
    fn encode(
        pixel_clock: u16,
        h: (u32, u32, u32, u32), // active, blank, sync offset, sync pulse
        v: (u32, u32, u32, u32),
    ) -> [u8; 18] {
        let mut d = [0u8; 18];
        d[0] = pixel_clock as u8;
        d[1] = (pixel_clock >> 8) as u8;
        d[2] = h.0 as u8;
        d[3] = h.1 as u8;
        d[4] = (((h.0 >> 8) as u8) << 4) | ((h.1 >> 8) as u8);
        d[5] = v.0 as u8;
        d[6] = v.1 as u8;
        d[7] = (((v.0 >> 8) as u8) << 4) | ((v.1 >> 8) as u8);
        d[8] = h.2 as u8;
        d[9] = h.3 as u8;
        d[10] = (((v.2 & 0xf) as u8) << 4) | (v.3 & 0xf) as u8;
        d[11] = (((h.2 >> 8) as u8) << 6)
            | ((((h.3 >> 8) & 0x3) as u8) << 4)
            | ((((v.2 >> 4) & 0x3) as u8) << 2)
            | (((v.3 >> 4) & 0x3) as u8);
        d
    }

    #[test]
    fn header_only_validation() {
        let good = block_with_descriptor(&descriptor_1080p());
        assert!(Edid::from_bytes(good).is_some());

        // Arbitrary garbage after the header is fine; no checksum.
        let mut noisy = good;
        for (i, b) in noisy[8..].iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(37);
        }
        assert!(Edid::from_bytes(noisy).is_some());

        // A single flipped header byte is not.
        let mut bad = good;
        bad[3] = 0xfe;
        assert!(Edid::from_bytes(bad).is_none());
    }

    #[test]
    fn identity_fields() {
        let mut bytes = block_with_descriptor(&descriptor_1080p());
        bytes[8] = 0x34;
        bytes[9] = 0x12;
        bytes[10] = 0x78;
        bytes[11] = 0x56;
        bytes[12..16].copy_from_slice(&0xdead_beefu32.to_le_bytes());
        bytes[18] = 1;
        bytes[19] = 4;
        bytes[126] = 1;

        let edid = Edid::from_bytes(bytes).unwrap();
        assert_eq!(edid.vendor_id(), 0x1234);
        assert_eq!(edid.product_id(), 0x5678);
        assert_eq!(edid.serial_number(), 0xdead_beef);
        assert_eq!(edid.version(), (1, 4));
        assert_eq!(edid.extension_count(), 1);
    }

    #[test]
    fn decodes_1080p() {
        let edid = Edid::from_bytes(block_with_descriptor(&descriptor_1080p())).unwrap();
        let t = edid.detailed_timing(0).timing();

        assert_eq!(t.pixel_clock_khz, 148_500);
        assert_eq!(
            t.horizontal,
            AxisTiming {
                active: 1920,
                sync_start: 1968,
                sync_end: 2000,
                total: 2080,
            }
        );
        assert_eq!(
            t.vertical,
            AxisTiming {
                active: 1080,
                sync_start: 1083,
                sync_end: 1088,
                total: 1125,
            }
        );
    }

    #[test]
    fn split_msb_fields_use_their_own_slices() {
        // Force every high-bit slice to a distinct non-zero value.
        let d = encode(
            0x0102,
            (0x923, 0xa45, 0x167, 0x289),
            (0xb21, 0xc43, 0x31, 0x25),
        );
        let edid = Edid::from_bytes(block_with_descriptor(&d)).unwrap();
        let t = edid.detailed_timing(0).timing();

        assert_eq!(t.horizontal.active, 0x923);
        assert_eq!(t.horizontal.total, 0x923 + 0xa45);
        assert_eq!(t.horizontal.sync_start, 0x923 + 0x167);
        assert_eq!(t.horizontal.sync_end, 0x923 + 0x167 + 0x289);
        assert_eq!(t.vertical.active, 0xb21);
        assert_eq!(t.vertical.total, 0xb21 + 0xc43);
        assert_eq!(t.vertical.sync_start, 0xb21 + 0x31);
        assert_eq!(t.vertical.sync_end, 0xb21 + 0x31 + 0x25);
    }

    #[test]
    fn decode_reencode_round_trip() {
        let cases = [
            ((0x3a02, (1920, 160, 48, 32), (1080, 45, 3, 5))),
            ((0x15e9, (1024, 320, 24, 136), (768, 38, 3, 6))),
            ((0xffff, (0xfff, 0xfff, 0x3ff, 0x3ff), (0xfff, 0xfff, 0x3f, 0x3f))),
            ((0, (0, 0, 0, 0), (0, 0, 0, 0))),
        ];
        for (clock, h, v) in cases {
            let bytes = encode(clock, h, v);
            let edid = Edid::from_bytes(block_with_descriptor(&bytes)).unwrap();
            let d = edid.detailed_timing(0);
            let t = d.timing();

            // Decoded counts match the encoder's inputs...
            assert_eq!(t.pixel_clock_khz, clock as u32 * 10);
            assert_eq!(t.horizontal.active, h.0);
            assert_eq!(t.horizontal.total - t.horizontal.active, h.1);
            assert_eq!(t.horizontal.sync_start - t.horizontal.active, h.2);
            assert_eq!(t.horizontal.sync_end - t.horizontal.sync_start, h.3);
            assert_eq!(t.vertical.active, v.0);
            assert_eq!(t.vertical.total - t.vertical.active, v.1);
            assert_eq!(t.vertical.sync_start - t.vertical.active, v.2);
            assert_eq!(t.vertical.sync_end - t.vertical.sync_start, v.3);

            // ...and re-packing them reproduces the original bytes exactly.
            let reencoded = encode(
                d.pixel_clock,
                (
                    t.horizontal.active,
                    t.horizontal.total - t.horizontal.active,
                    t.horizontal.sync_start - t.horizontal.active,
                    t.horizontal.sync_end - t.horizontal.sync_start,
                ),
                (
                    t.vertical.active,
                    t.vertical.total - t.vertical.active,
                    t.vertical.sync_start - t.vertical.active,
                    t.vertical.sync_end - t.vertical.sync_start,
                ),
            );
            assert_eq!(reencoded, bytes);
        }
    }

    #[test]
    fn absurd_descriptor_passes_through() {
        let edid = Edid::from_bytes(block_with_descriptor(&[0xff; 18])).unwrap();
        let t = edid.detailed_timing(0).timing();
        assert_eq!(t.horizontal.active, 0xfff);
        assert_eq!(t.vertical.sync_end - t.vertical.sync_start, 0x3f);
    }
}
