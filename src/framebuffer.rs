//! Bit-plane framebuffer consumed by the GPIO renderer.
//!
//! Pixels are not stored as RGB triples. They are stored already split into
//! the eight Binary Code Modulation bit-planes the renderer shifts out, so
//! scanning a row is nothing more than reading consecutive bytes.
//!
//! # Memory Layout
//! The buffer holds `8 * full_chain_width * rows_per_scan` bytes. The byte for
//! bit-plane `plane`, chained column `column` and row pair `row` lives at
//! `(row * 8 + plane) * full_chain_width + column`, so one plane of one row
//! pair is a contiguous run of columns.
//!
//! Each byte is an [`Entry`] carrying both rows that share an address:
//! - Bits 0-2: red, green, blue of the upper row (R1 G1 B1)
//! - Bits 3-5: red, green, blue of the lower row (R2 G2 B2)
//!
//! # Concurrent access
//! The renderer thread reads the front buffer while drawing code writes to
//! it. This is intentional: each byte is an [`AtomicU8`] accessed with
//! `Relaxed` ordering, which costs the same as a plain byte access on every
//! supported target. A drawing call that is in progress while a row is shifted
//! out may show up half-drawn for one refresh, the same tearing any directly
//! written display shows. Do not put a lock around this; the render loop has
//! no slack for one. Tear-free updates go through the back buffer and
//! [`crate::RgbLedMatrix::swap_buffers`].

use core::sync::atomic::{AtomicU8, Ordering};

use bitfield::bitfield;
use embedded_dma::ReadBuffer;
use embedded_graphics::pixelcolor::RgbColor;

use crate::tiling::Geometry;
use crate::{Color, PLANE_COUNT};

bitfield! {
    /// One bit-plane byte for one column of a row pair.
    ///
    /// The bit layout is as follows:
    /// - Bit 5: Blue channel for the lower row
    /// - Bit 4: Green channel for the lower row
    /// - Bit 3: Red channel for the lower row
    /// - Bit 2: Blue channel for the upper row
    /// - Bit 1: Green channel for the upper row
    /// - Bit 0: Red channel for the upper row
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct Entry(u8);
    impl Debug;
    pub blu2, set_blu2: 5;
    pub grn2, set_grn2: 4;
    pub red2, set_red2: 3;
    pub blu1, set_blu1: 2;
    pub grn1, set_grn1: 1;
    pub red1, set_red1: 0;
    /// RGB bits of the lower row.
    pub bottom, set_bottom: 5, 3;
    /// RGB bits of the upper row.
    pub top, set_top: 2, 0;
}

impl Entry {
    /// An entry with every color line off.
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    /// Wrap a raw byte read from the buffer.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// The raw byte.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Mask of the red bit for the upper row, shifted to the lower row when
    /// `lower` is set. Green and blue follow at the next two bits.
    #[inline]
    const fn red_mask(lower: bool) -> u8 {
        if lower {
            0x08
        } else {
            0x01
        }
    }

    /// Byte for a plane where both rows of the pair show the same color.
    #[inline]
    fn uniform(color: Color, plane: usize) -> u8 {
        let rgb = ((color.r() >> plane) & 1)
            | (((color.g() >> plane) & 1) << 1)
            | (((color.b() >> plane) & 1) << 2);
        rgb | (rgb << 3)
    }
}

/// The eight pre-expanded bit-planes for one full chained display.
pub struct FrameBuffer {
    geometry: Geometry,
    planes: Box<[AtomicU8]>,
}

impl FrameBuffer {
    /// Allocate an all-black buffer for `geometry`.
    #[must_use]
    pub fn new(geometry: Geometry) -> Self {
        let len = PLANE_COUNT * geometry.full_chain_width() * geometry.rows_per_scan();
        let planes = (0..len).map(|_| AtomicU8::new(0)).collect();
        Self { geometry, planes }
    }

    /// Geometry this buffer was laid out for.
    #[must_use]
    pub const fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Size of the buffer in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.planes.len()
    }

    /// Whether the buffer holds no bytes (never true for a valid geometry).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }

    #[inline]
    fn offset(&self, plane: usize, column: usize, row_pair: usize) -> usize {
        (row_pair * PLANE_COUNT + plane) * self.geometry.full_chain_width() + column
    }

    /// Every column of one bit-plane of one row pair, in shift-out order.
    #[inline]
    #[must_use]
    pub fn plane_row(&self, plane: usize, row_pair: usize) -> &[AtomicU8] {
        let start = self.offset(plane, 0, row_pair);
        &self.planes[start..start + self.geometry.full_chain_width()]
    }

    /// Read the packed byte at `(plane, column, row_pair)` of the chained strip.
    #[inline]
    #[must_use]
    pub fn entry(&self, plane: usize, column: usize, row_pair: usize) -> Entry {
        Entry(self.planes[self.offset(plane, column, row_pair)].load(Ordering::Relaxed))
    }

    /// Set a pixel in visual coordinates. Pixels off the display are ignored.
    #[inline]
    pub fn set_pixel(&self, x: i32, y: i32, color: Color) {
        if !self.geometry.contains(x, y) {
            return;
        }
        let (column, row) = self.geometry.remap_xy(x as usize, y as usize);
        self.set_strip_pixel(column, row, color);
    }

    fn set_strip_pixel(&self, column: usize, row: usize, color: Color) {
        let rows_per_scan = self.geometry.rows_per_scan();
        let red = Entry::red_mask(row >= rows_per_scan);
        let (green, blue) = (red << 1, red << 2);
        let row_pair = row % rows_per_scan;
        for plane in 0..PLANE_COUNT {
            let mut set = 0;
            if (color.r() >> plane) & 1 == 1 {
                set |= red;
            }
            if (color.g() >> plane) & 1 == 1 {
                set |= green;
            }
            if (color.b() >> plane) & 1 == 1 {
                set |= blue;
            }
            let clear = (red | green | blue) & !set;
            let byte = &self.planes[self.offset(plane, column, row_pair)];
            // read-modify-write: the other row of the pair shares this byte
            if set != 0 {
                byte.fetch_or(set, Ordering::Relaxed);
            }
            if clear != 0 {
                byte.fetch_and(!clear, Ordering::Relaxed);
            }
        }
    }

    /// Reconstruct the color stored for a visual pixel.
    ///
    /// Returns `None` off the display.
    #[must_use]
    pub fn pixel(&self, x: i32, y: i32) -> Option<Color> {
        if !self.geometry.contains(x, y) {
            return None;
        }
        let (column, row) = self.geometry.remap_xy(x as usize, y as usize);
        let rows_per_scan = self.geometry.rows_per_scan();
        let lower = row >= rows_per_scan;
        let (mut r, mut g, mut b) = (0u8, 0u8, 0u8);
        for plane in 0..PLANE_COUNT {
            let entry = self.entry(plane, column, row % rows_per_scan);
            let rgb = if lower { entry.bottom() } else { entry.top() };
            r |= (rgb & 1) << plane;
            g |= ((rgb >> 1) & 1) << plane;
            b |= ((rgb >> 2) & 1) << plane;
        }
        Some(Color::new(r, g, b))
    }

    /// Paint every pixel of the display with `color`.
    pub fn fill(&self, color: Color) {
        let width = self.geometry.full_chain_width();
        for (index, byte) in self.planes.iter().enumerate() {
            let plane = (index / width) % PLANE_COUNT;
            byte.store(Entry::uniform(color, plane), Ordering::Relaxed);
        }
    }

    /// Turn every pixel off.
    pub fn erase(&self) {
        for byte in &*self.planes {
            byte.store(0, Ordering::Relaxed);
        }
    }
}

unsafe impl ReadBuffer for FrameBuffer {
    type Word = u8;

    unsafe fn read_buffer(&self) -> (*const u8, usize) {
        // AtomicU8 has the same in-memory representation as u8
        (self.planes.as_ptr().cast::<u8>(), self.planes.len())
    }
}

impl core::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("geometry", &self.geometry)
            .field("size", &self.planes.len())
            .field("plane_count", &PLANE_COUNT)
            .field("plane_row_size", &self.geometry.full_chain_width())
            .finish()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for FrameBuffer {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "FrameBuffer {}", self.geometry);
        defmt::write!(f, " size: {}", self.planes.len());
        defmt::write!(f, " plane_row_size: {}", self.geometry.full_chain_width());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single() -> FrameBuffer {
        FrameBuffer::new(Geometry::new(64, 32).unwrap())
    }

    fn snapshot(fb: &FrameBuffer) -> Vec<u8> {
        fb.planes.iter().map(|b| b.load(Ordering::Relaxed)).collect()
    }

    #[test]
    fn test_entry_bit_layout() {
        let mut entry = Entry::new();
        entry.set_red1(true);
        entry.set_blu1(true);
        assert_eq!(entry.0, 0b0000_0101);
        assert_eq!(entry.top(), 0b101);
        assert_eq!(entry.bottom(), 0);

        entry.set_grn2(true);
        assert_eq!(entry.0, 0b0001_0101);
        assert_eq!(entry.bottom(), 0b010);

        entry.set_bottom(0b111);
        assert!(entry.red2() && entry.grn2() && entry.blu2());
        assert_eq!(entry.top(), 0b101);
    }

    #[test]
    fn test_buffer_size() {
        let fb = single();
        assert_eq!(fb.len(), 8 * 64 * 16);

        let chained = FrameBuffer::new(Geometry::chained(64, 64, 2, 1).unwrap());
        assert_eq!(chained.len(), 8 * 128 * 16);
        assert!(!chained.is_empty());
    }

    #[test]
    fn test_pixel_round_trip() {
        let fb = single();
        let colors = [
            Color::new(0, 0, 0),
            Color::new(255, 255, 255),
            Color::new(1, 2, 4),
            Color::new(128, 64, 192),
            Color::new(0xA5, 0x5A, 0x0F),
        ];
        for (n, color) in colors.into_iter().enumerate() {
            for (x, y) in [(0, 0), (63, 15), (10, 16), (33, 31)] {
                let x = (x + n as i32) % 64;
                fb.set_pixel(x, y, color);
                assert_eq!(fb.pixel(x, y), Some(color), "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn test_round_trip_through_chain() {
        let fb = FrameBuffer::new(Geometry::chained(32, 96, 3, 1).unwrap());
        for y in (0..96).step_by(7) {
            for x in (0..32).step_by(5) {
                let color = Color::new(x as u8 * 7, y as u8 * 2, (x + y) as u8);
                fb.set_pixel(x, y, color);
                assert_eq!(fb.pixel(x, y), Some(color));
            }
        }
    }

    #[test]
    fn test_bit_planes_encode_channels() {
        let fb = single();
        // upper half of the panel: bits 0-2
        fb.set_pixel(3, 2, Color::new(0b1000_0001, 0b0000_0010, 0));
        assert_eq!(fb.entry(0, 3, 2).0, 0b001);
        assert_eq!(fb.entry(1, 3, 2).0, 0b010);
        assert_eq!(fb.entry(7, 3, 2).0, 0b001);
        for plane in 2..7 {
            assert_eq!(fb.entry(plane, 3, 2).0, 0);
        }

        // lower half shares the row pair: bits 3-5
        fb.set_pixel(3, 18, Color::new(0, 0, 0b0001_0000));
        assert_eq!(fb.entry(4, 3, 2).0, 0b100_000);
        assert_eq!(fb.entry(0, 3, 2).0, 0b001);
    }

    #[test]
    fn test_pair_rows_do_not_clobber_each_other() {
        let fb = single();
        fb.set_pixel(9, 4, Color::WHITE);
        fb.set_pixel(9, 20, Color::BLACK);
        fb.set_pixel(9, 20, Color::RED);
        assert_eq!(fb.pixel(9, 4), Some(Color::WHITE));
        assert_eq!(fb.pixel(9, 20), Some(Color::RED));
        fb.set_pixel(9, 4, Color::BLACK);
        assert_eq!(fb.pixel(9, 20), Some(Color::RED));
    }

    #[test]
    fn test_out_of_bounds_is_a_no_op() {
        let fb = single();
        fb.fill(Color::new(12, 34, 56));
        let before = snapshot(&fb);
        for (x, y) in [(-1, 0), (0, -1), (64, 0), (0, 32), (i32::MAX, 3), (3, i32::MIN)] {
            fb.set_pixel(x, y, Color::WHITE);
            assert_eq!(fb.pixel(x, y), None);
        }
        assert_eq!(snapshot(&fb), before);
    }

    #[test]
    fn test_single_panel_addresses_column_x() {
        let fb = single();
        fb.set_pixel(5, 10, Color::WHITE);
        for plane in 0..PLANE_COUNT {
            assert_eq!(fb.entry(plane, 5, 10).top(), 0b111);
        }
        assert_eq!(snapshot(&fb).iter().filter(|b| **b != 0).count(), PLANE_COUNT);
    }

    #[test]
    fn test_chained_band_is_column_reversed() {
        let fb = FrameBuffer::new(Geometry::chained(64, 64, 2, 1).unwrap());
        fb.set_pixel(5, 10, Color::RED);
        fb.set_pixel(5, 40, Color::BLUE);

        // first band: column 5, row 10 (upper half)
        assert!(fb.entry(0, 5, 10).red1());
        // second band: upside down, so column 64 + 58 and row 23 (lower half, pair 7)
        assert!(fb.entry(0, 122, 7).blu2());
        assert_eq!(fb.entry(0, 64 + 5, 10).0, 0);
    }

    #[test]
    fn test_fill_and_erase() {
        let fb = single();
        let color = Color::new(0x81, 0x42, 0x24);
        fb.fill(color);
        for (x, y) in [(0, 0), (63, 31), (20, 16), (40, 15)] {
            assert_eq!(fb.pixel(x, y), Some(color));
        }
        fb.erase();
        assert!(snapshot(&fb).iter().all(|b| *b == 0));
    }

    #[test]
    fn test_plane_row_is_contiguous() {
        let fb = single();
        fb.set_pixel(7, 3, Color::new(0, 0b1000, 0));
        let row = fb.plane_row(3, 3);
        assert_eq!(row.len(), 64);
        assert_eq!(Entry(row[7].load(Ordering::Relaxed)).top(), 0b010);
    }

    #[test]
    fn test_read_buffer_covers_all_planes() {
        let fb = single();
        fb.set_pixel(0, 0, Color::new(1, 0, 0));
        let (ptr, len) = unsafe { fb.read_buffer() };
        assert_eq!(len, fb.len());
        let bytes = unsafe { core::slice::from_raw_parts(ptr, len) };
        assert_eq!(bytes[0], 0b001);
    }

    #[test]
    fn test_debug_output() {
        let output = format!("{:?}", single());
        assert!(output.contains("FrameBuffer"));
        assert!(output.contains("size: 8192"));
    }
}
