//! Software-scanned driver for HUB75 RGB LED matrix displays.
//!
//! ## How HUB75 LED Displays Work
//!
//! HUB75 RGB LED matrix panels are scanned, time-multiplexed displays that behave like a long
//! daisy-chained shift register rather than a random-access framebuffer.
//!
//! ### Signal names
//! - **R1 G1 B1 / R2 G2 B2** – Serial colour data for the upper and lower halves of the active scan line
//! - **CLK** – Shift-register clock; every rising edge pushes the six colour bits one pixel along
//! - **LAT / STB** – Latch; copies the shift-register contents to the LED drivers
//! - **OE** – Output-Enable (active LOW): LEDs are lit while OE is LOW and blanked when it is HIGH
//! - **A B C D (E)** – Row-address select lines (choose which pair of rows is lit)
//!
//! ### Brightness and colour depth (Binary Code Modulation)
//! Each LED is either on or off, so 8-bit colour is produced with **Binary Code Modulation
//! (BCM)**: every row pair is shown eight times, once per bit-plane, and plane `i` stays lit for
//! a period proportional to `2^i`. A channel value `v` is therefore lit for `v/255` of the row's
//! time. See [Batsocks – LED dimming using Binary Code Modulation](https://www.batsocks.co.uk/readme/art_bcm_1.htm).
//!
//! ## This crate
//!
//! There is no DMA or PIO engine here. A dedicated render thread bit-bangs the panel through a
//! [`GpioLines`] driver that can set or clear any set of lines with one register write:
//!
//! 1. **[`PinMapping`]** names the line of every HUB75 signal.
//! 2. **[`GpioLineMasks`]** precomputes the masks and lookup tables the scan loop needs.
//! 3. **[`FrameBuffer`]** stores pixels pre-split into the eight bit-planes.
//! 4. **[`RgbLedMatrix`]** owns two framebuffers (front and back), the GPIO driver and the render
//!    thread.
//! 5. **[`Canvas`]** draws into either buffer and implements the `embedded-graphics`
//!    `DrawTarget`, so every `embedded-graphics` primitive, font and image works on it.
//!
//! ```rust,no_run
//! # use hub75_gpio_matrix::{GpioLines, Geometry, PinMapping, RgbLedMatrix, Color};
//! # use embedded_graphics::pixelcolor::RgbColor;
//! # fn run<G: GpioLines>(gpio: G) -> Result<(), hub75_gpio_matrix::Error> {
//! let matrix = RgbLedMatrix::new(PinMapping::BONNET_32, Geometry::new(64, 32)?, gpio)?;
//! matrix.start_rendering()?;
//!
//! // draw off screen, then present the whole frame at once
//! matrix.back().fill(Color::BLACK);
//! matrix.back().fill_rectangle(8, 8, 16, 16, Color::RED);
//! matrix.swap_buffers();
//! # Ok(())
//! # }
//! ```
//!
//! ## Multiple Panels
//! Panels stacked vertically are wired as one serpentine chain with every other band upside
//! down. Describe the arrangement with [`Geometry::chained`]; all coordinate translation happens
//! inside [`FrameBuffer::set_pixel`].
//!
//! ## Available Feature Flags
//!
//! ### `defmt` Feature
//! Implements `defmt::Format` for the configuration and framebuffer types so they can be emitted
//! with the `defmt` logging framework. No functional changes; purely adds trait impls.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]

use embedded_graphics::pixelcolor::Rgb888;

pub mod canvas;
pub mod error;
pub mod framebuffer;
pub mod gpio;
pub mod masks;
pub mod matrix;
pub mod pins;
mod render;
pub mod tiling;

pub use canvas::{Canvas, Target};
pub use error::{Error, GeometryError, Result};
pub use framebuffer::{Entry, FrameBuffer};
pub use gpio::GpioLines;
pub use masks::GpioLineMasks;
pub use matrix::{RenderOptions, RgbLedMatrix};
pub use pins::PinMapping;
pub use tiling::Geometry;

/// Color type used in the framebuffer
pub type Color = Rgb888;

/// Bits per color channel.
pub const BITS: u8 = 8;

/// Number of Binary Code Modulation bit-planes per row pair.
pub const PLANE_COUNT: usize = BITS as usize;

/// Computes the number of row addresses of a panel with `rows` scan rows.
///
/// Each address lights two rows at once, one from each half of the panel.
/// A panel with an odd row count gets one extra, half-populated address.
///
/// # Arguments
///
/// * `rows` - Number of physical scan rows of one panel
///
/// # Returns
///
/// Number of row pairs the renderer cycles through
#[must_use]
pub const fn compute_rows(rows: usize) -> usize {
    rows.div_ceil(2)
}

/// On-time of a bit-plane in units of the plane-0 dwell.
///
/// # Arguments
///
/// * `plane` - Bit-plane index, `0..PLANE_COUNT`
///
/// # Returns
///
/// `2^plane`
#[must_use]
pub const fn plane_weight(plane: usize) -> u32 {
    1 << plane
}
