// Shared by the benches.

#![allow(dead_code)]

use hub75_gpio_matrix::{Geometry, GpioLines, PinMapping, RenderOptions, RgbLedMatrix};
use std::hint::black_box;

pub const WIDTH: usize = 64;
pub const HEIGHT: usize = 32;

/// Driver that accepts every line and discards every write.
pub struct NullGpio;

impl GpioLines for NullGpio {
    type Error = core::convert::Infallible;

    fn open_output(&mut self, _line: u8) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self, mask: u64) {
        black_box(mask);
    }

    fn set_low(&mut self, mask: u64) {
        black_box(mask);
    }
}

pub fn matrix(options: RenderOptions) -> RgbLedMatrix<NullGpio> {
    let geometry = Geometry::new(WIDTH, HEIGHT).expect("valid geometry");
    RgbLedMatrix::with_options(PinMapping::BONNET_32, geometry, NullGpio, options)
        .expect("null gpio opens every line")
}
