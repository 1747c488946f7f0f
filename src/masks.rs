//! Precomputed GPIO line masks.
//!
//! Every runtime GPIO write in the render loop is a single `set_high` or
//! `set_low` of a 64-bit mask. This module turns a [`PinMapping`] into the
//! masks and lookup tables the loop needs so that the hot path is nothing but
//! array indexing and bitwise OR.

use crate::framebuffer::Entry;
use crate::pins::PinMapping;

#[inline]
const fn bit(line: u8) -> u64 {
    1u64 << line
}

/// Line masks derived from a [`PinMapping`] for one panel height.
///
/// Owned by a single matrix instance and immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpioLineMasks {
    /// R1 line.
    pub r1: u64,
    /// G1 line.
    pub g1: u64,
    /// B1 line.
    pub b1: u64,
    /// R2 line.
    pub r2: u64,
    /// G2 line.
    pub g2: u64,
    /// B2 line.
    pub b2: u64,
    /// Output enable line.
    pub oe: u64,
    /// Shift clock line.
    pub clock: u64,
    /// Latch line.
    pub latch: u64,
    /// Address A line.
    pub a: u64,
    /// Address B line.
    pub b: u64,
    /// Address C line.
    pub c: u64,
    /// Address D line, zero when the panel does not use it.
    pub d: u64,
    /// Address E line, zero when the panel does not use it.
    pub e: u64,
    /// All six color lines.
    pub all_colors: u64,
    /// Every address line in use.
    pub all_address: u64,
    /// Every line in use.
    pub all_lines: u64,
    row_address: Box<[u64]>,
    color_select: [u64; 16],
}

impl GpioLineMasks {
    /// Build masks for a panel with `device_rows` physical scan rows.
    ///
    /// The pin mapping is expected to have passed [`PinMapping::validate`].
    #[must_use]
    pub fn new(pins: &PinMapping, device_rows: usize) -> Self {
        let d = if device_rows > 16 { bit(pins.d) } else { 0 };
        let e = if device_rows > 32 { bit(pins.e) } else { 0 };
        let address = [bit(pins.a), bit(pins.b), bit(pins.c), d, e];

        let row_address = (0..crate::compute_rows(device_rows))
            .map(|row| {
                address
                    .iter()
                    .enumerate()
                    .filter(|(n, _)| row & (1 << n) != 0)
                    .fold(0, |mask, (_, line)| mask | line)
            })
            .collect();

        let (r1, g1, b1) = (bit(pins.r1), bit(pins.g1), bit(pins.b1));
        let (r2, g2, b2) = (bit(pins.r2), bit(pins.g2), bit(pins.b2));
        let mut color_select = [0u64; 16];
        for rgb in 0..8 {
            let pick = |r: u64, g: u64, b: u64| {
                (if rgb & 0b001 != 0 { r } else { 0 })
                    | (if rgb & 0b010 != 0 { g } else { 0 })
                    | (if rgb & 0b100 != 0 { b } else { 0 })
            };
            color_select[rgb] = pick(r1, g1, b1);
            color_select[8 + rgb] = pick(r2, g2, b2);
        }

        let all_colors = r1 | g1 | b1 | r2 | g2 | b2;
        let all_address = address.iter().fold(0, |mask, line| mask | line);
        let (oe, clock, latch) = (bit(pins.oe), bit(pins.clock), bit(pins.latch));

        Self {
            r1,
            g1,
            b1,
            r2,
            g2,
            b2,
            oe,
            clock,
            latch,
            a: address[0],
            b: address[1],
            c: address[2],
            d,
            e,
            all_colors,
            all_address,
            all_lines: all_colors | all_address | oe | clock | latch,
            row_address,
            color_select,
        }
    }

    /// Address lines to drive high while showing `row_pair`.
    #[inline]
    #[must_use]
    pub fn row_address(&self, row_pair: usize) -> u64 {
        self.row_address[row_pair]
    }

    /// Number of distinct row addresses (row pairs per panel).
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.row_address.len()
    }

    /// Color lines to drive high for one packed bit-plane byte.
    #[inline]
    #[must_use]
    pub fn color_select(&self, entry: Entry) -> u64 {
        self.color_select[entry.top() as usize] | self.color_select[8 + entry.bottom() as usize]
    }

    /// Line numbers of every line in use, lowest first.
    pub fn lines(&self) -> impl Iterator<Item = u8> + '_ {
        (0..crate::pins::MAX_LINES).filter(|line| self.all_lines & bit(*line) != 0)
    }
}
