//! Drawing surface over one of the two framebuffers.
//!
//! A [`Canvas`] is a cheap, copyable view of either the front buffer (what is
//! on the panel right now) or the back buffer (the next frame). It resolves
//! the designation on every call, so a canvas obtained before
//! [`crate::RgbLedMatrix::swap_buffers`] keeps pointing at "the back buffer"
//! rather than at whichever memory used to be the back buffer.
//!
//! Besides its own helpers the canvas implements the `embedded-graphics`
//! [`DrawTarget`], so every primitive, font and image of that crate can be
//! drawn on it:
//!
//! ```rust,no_run
//! # use hub75_gpio_matrix::{Canvas, Color};
//! use embedded_graphics::prelude::*;
//! use embedded_graphics::primitives::{Line, PrimitiveStyle};
//! # fn draw(mut canvas: Canvas<'_>) {
//! Line::new(Point::new(0, 0), Point::new(63, 31))
//!     .into_styled(PrimitiveStyle::with_stroke(Color::GREEN, 1))
//!     .draw(&mut canvas)
//!     .unwrap();
//! # }
//! ```

use core::convert::Infallible;
use core::f64::consts::TAU;

use embedded_graphics::draw_target::DrawTarget;
use embedded_graphics::geometry::{OriginDimensions, Point, Size};
use embedded_graphics::image::GetPixel;
use embedded_graphics::mono_font::{MonoFont, MonoTextStyleBuilder};
use embedded_graphics::text::{Baseline, Text};
use embedded_graphics::{Drawable, Pixel};

use crate::framebuffer::FrameBuffer;
use crate::render::Shared;
use crate::Color;

/// Which of the two framebuffers a [`Canvas`] draws into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// The buffer the renderer is currently showing.
    Front,
    /// The buffer that becomes visible on the next swap.
    Back,
}

/// Drawing operations on the front or back buffer of a matrix.
///
/// Every operation takes visual coordinates. Pixels outside the display are
/// silently dropped, so shapes may hang off any edge.
#[derive(Clone, Copy)]
pub struct Canvas<'a> {
    shared: &'a Shared,
    target: Target,
}

impl<'a> Canvas<'a> {
    pub(crate) fn new(shared: &'a Shared, target: Target) -> Self {
        Self { shared, target }
    }

    /// The buffer this canvas draws into.
    #[must_use]
    pub const fn target(&self) -> Target {
        self.target
    }

    /// The framebuffer currently designated as this canvas' target.
    #[must_use]
    pub fn buffer(&self) -> &'a FrameBuffer {
        self.shared.buffer(self.target)
    }

    /// Display width in pixels.
    #[must_use]
    pub fn width(&self) -> usize {
        self.shared.geometry.width()
    }

    /// Display height in pixels.
    #[must_use]
    pub fn height(&self) -> usize {
        self.shared.geometry.height()
    }

    /// Set one pixel.
    #[inline]
    pub fn set_pixel(&self, x: i32, y: i32, color: Color) {
        self.buffer().set_pixel(x, y, color);
    }

    /// Read back one pixel, `None` off the display.
    #[must_use]
    pub fn pixel(&self, x: i32, y: i32) -> Option<Color> {
        self.buffer().pixel(x, y)
    }

    /// Paint the whole display.
    pub fn fill(&self, color: Color) {
        self.buffer().fill(color);
    }

    /// Paint the `width` x `height` rectangle whose top-left corner is `(x, y)`.
    pub fn fill_rectangle(&self, x: i32, y: i32, width: u32, height: u32, color: Color) {
        let buffer = self.buffer();
        let x_end = x.saturating_add(width.try_into().unwrap_or(i32::MAX));
        let y_end = y.saturating_add(height.try_into().unwrap_or(i32::MAX));
        let x_end = x_end.min(self.width() as i32);
        let y_end = y_end.min(self.height() as i32);
        for py in y.max(0)..y_end {
            for px in x.max(0)..x_end {
                buffer.set_pixel(px, py, color);
            }
        }
    }

    /// Plot the outline of a circle centred on `(xc, yc)`.
    ///
    /// The angle advances by `1 / radius` radians per plotted point, which
    /// keeps neighbouring points about one pixel apart. A radius of zero plots
    /// the centre.
    pub fn draw_circle(&self, xc: i32, yc: i32, radius: u32, color: Color) {
        if radius == 0 {
            self.set_pixel(xc, yc, color);
            return;
        }
        let r = f64::from(radius);
        let step = 1.0 / r;
        let mut angle = 0.0f64;
        while angle < TAU {
            let x = f64::from(xc) + r * angle.cos();
            let y = f64::from(yc) + r * angle.sin();
            self.set_pixel(x.round() as i32, y.round() as i32, color);
            angle += step;
        }
    }

    /// Draw `text` with its top-left corner at `(x, y)`.
    ///
    /// Set glyph pixels get `foreground`, clear ones `background`. Returns the
    /// x coordinate just past the last glyph.
    pub fn draw_text(
        &self,
        x: i32,
        y: i32,
        text: &str,
        font: &MonoFont<'_>,
        foreground: Color,
        background: Color,
    ) -> i32 {
        let style = MonoTextStyleBuilder::new()
            .font(font)
            .text_color(foreground)
            .background_color(background)
            .build();
        let mut target = *self;
        Text::with_baseline(text, Point::new(x, y), style, Baseline::Top)
            .draw(&mut target)
            .unwrap_or_else(|never| match never {})
            .x
    }

    /// Copy `image` with its top-left corner at `(x, y)`.
    pub fn draw_bitmap<I>(&self, x: i32, y: i32, image: &I)
    where
        I: GetPixel<Color = Color> + OriginDimensions,
    {
        self.blit(x, y, image, |color| color);
    }

    /// Copy `image`, replacing every pixel equal to `key` with `background`.
    pub fn draw_bitmap_keyed<I>(&self, x: i32, y: i32, image: &I, key: Color, background: Color)
    where
        I: GetPixel<Color = Color> + OriginDimensions,
    {
        self.blit(x, y, image, |color| if color == key { background } else { color });
    }

    fn blit<I>(&self, x: i32, y: i32, image: &I, map: impl Fn(Color) -> Color)
    where
        I: GetPixel<Color = Color> + OriginDimensions,
    {
        let buffer = self.buffer();
        let Size { width, height } = image.size();
        for iy in 0..height as i32 {
            for ix in 0..width as i32 {
                if let Some(color) = image.pixel(Point::new(ix, iy)) {
                    buffer.set_pixel(x.saturating_add(ix), y.saturating_add(iy), map(color));
                }
            }
        }
    }
}

impl core::fmt::Debug for Canvas<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Canvas")
            .field("target", &self.target)
            .field("geometry", &self.shared.geometry)
            .finish()
    }
}

impl OriginDimensions for Canvas<'_> {
    fn size(&self) -> Size {
        Size::new(self.width() as u32, self.height() as u32)
    }
}

impl DrawTarget for Canvas<'_> {
    type Color = Color;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let buffer = self.buffer();
        for Pixel(point, color) in pixels {
            buffer.set_pixel(point.x, point.y, color);
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.fill(color);
        Ok(())
    }
}
