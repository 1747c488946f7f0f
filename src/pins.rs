//! Logical HUB75 signals mapped onto physical GPIO line numbers.

use crate::error::{Error, Result};

/// Width of every line mask; lines at or above this cannot be driven.
pub const MAX_LINES: u8 = 64;

/// Physical GPIO line for each HUB75 control signal.
///
/// The D and E address lines are only driven for panels tall enough to need
/// them (more than 16 and more than 32 scan rows respectively), so their
/// values are ignored on smaller panels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PinMapping {
    /// Red, upper half.
    pub r1: u8,
    /// Green, upper half.
    pub g1: u8,
    /// Blue, upper half.
    pub b1: u8,
    /// Red, lower half.
    pub r2: u8,
    /// Green, lower half.
    pub g2: u8,
    /// Blue, lower half.
    pub b2: u8,
    /// Output enable (active low).
    pub oe: u8,
    /// Shift clock.
    pub clock: u8,
    /// Latch / strobe.
    pub latch: u8,
    /// Row address bit 0.
    pub a: u8,
    /// Row address bit 1.
    pub b: u8,
    /// Row address bit 2.
    pub c: u8,
    /// Row address bit 3.
    pub d: u8,
    /// Row address bit 4.
    pub e: u8,
}

impl PinMapping {
    /// Adafruit RGB Matrix Bonnet wiring for panels up to 32 rows (E unused).
    pub const BONNET_32: Self = Self {
        r1: 5,
        g1: 13,
        b1: 6,
        r2: 12,
        g2: 16,
        b2: 23,
        oe: 4,
        clock: 17,
        latch: 21,
        a: 22,
        b: 26,
        c: 27,
        d: 20,
        e: 0,
    };

    /// Adafruit RGB Matrix Bonnet wiring for 64-row panels (E on line 24).
    pub const BONNET_64: Self = Self {
        e: 24,
        ..Self::BONNET_32
    };

    /// Signals that are driven for a panel with `device_rows` scan rows,
    /// paired with their line numbers.
    pub(crate) fn used_signals(
        &self,
        device_rows: usize,
    ) -> impl Iterator<Item = (&'static str, u8)> {
        let always = [
            ("R1", self.r1),
            ("G1", self.g1),
            ("B1", self.b1),
            ("R2", self.r2),
            ("G2", self.g2),
            ("B2", self.b2),
            ("OE", self.oe),
            ("CLK", self.clock),
            ("LAT", self.latch),
            ("A", self.a),
            ("B", self.b),
            ("C", self.c),
        ];
        let d = (device_rows > 16).then_some(("D", self.d));
        let e = (device_rows > 32).then_some(("E", self.e));
        always.into_iter().chain(d).chain(e)
    }

    /// Checks every driven line fits the mask width and is claimed once.
    ///
    /// # Errors
    ///
    /// [`Error::LineOutOfRange`] or [`Error::DuplicateLine`].
    pub fn validate(&self, device_rows: usize) -> Result<()> {
        let mut claimed: [Option<&'static str>; MAX_LINES as usize] = [None; MAX_LINES as usize];
        for (signal, line) in self.used_signals(device_rows) {
            if line >= MAX_LINES {
                return Err(Error::LineOutOfRange { signal, line });
            }
            if let Some(first) = claimed[line as usize] {
                return Err(Error::DuplicateLine {
                    line,
                    first,
                    second: signal,
                });
            }
            claimed[line as usize] = Some(signal);
        }
        Ok(())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for PinMapping {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "PinMapping {{ rgb1: {}/{}/{}, rgb2: {}/{}/{}, oe: {}, clk: {}, lat: {}, addr: {}/{}/{}/{}/{} }}",
            self.r1,
            self.g1,
            self.b1,
            self.r2,
            self.g2,
            self.b2,
            self.oe,
            self.clock,
            self.latch,
            self.a,
            self.b,
            self.c,
            self.d,
            self.e
        );
    }
}
