//! The matrix handle: GPIO ownership, the render thread and double buffering.

use core::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use embedded_graphics::geometry::OriginDimensions;
use embedded_graphics::image::GetPixel;
use embedded_graphics::mono_font::MonoFont;

use crate::canvas::{Canvas, Target};
use crate::error::{Error, Result};
use crate::gpio::GpioLines;
use crate::masks::GpioLineMasks;
use crate::pins::PinMapping;
use crate::render::{self, Scanner, Shared};
use crate::tiling::Geometry;
use crate::Color;

/// Name given to the render thread.
pub const RENDER_THREAD_NAME: &str = "hub75-render";

/// Render thread configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Dwell of bit-plane 0. Plane `i` stays lit for `pwm_duration * 2^i`.
    pub pwm_duration: Duration,
    /// Ask for `SCHED_FIFO` at maximum priority. Ignored where unsupported.
    pub realtime_priority: bool,
    /// Pin the render thread to this CPU.
    pub cpu: Option<usize>,
}

impl RenderOptions {
    /// Plane-0 dwell used unless configured otherwise.
    pub const DEFAULT_PWM_DURATION: Duration = Duration::from_nanos(200);

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self {
            pwm_duration: Duration::from_nanos(100),
            realtime_priority: false,
            cpu: None,
        }
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            pwm_duration: Self::DEFAULT_PWM_DURATION,
            realtime_priority: true,
            cpu: None,
        }
    }
}

/// Where the GPIO driver currently lives.
enum Slot<G> {
    Idle(G),
    Running(JoinHandle<G>),
    /// The render thread panicked and the driver went down with it.
    Lost,
}

/// A HUB75 display (or chain of displays) driven from a background thread.
///
/// Drawing methods take `&self`, so the matrix can be shared between threads
/// (for example in an [`Arc`]) while it renders.
///
/// Dropping the matrix stops the render thread, waits for it to leave the
/// panel blanked and then drops the GPIO driver. Use
/// [`release`](Self::release) to get the driver back instead.
pub struct RgbLedMatrix<G: GpioLines> {
    shared: Arc<Shared>,
    slot: Mutex<Slot<G>>,
    options: RenderOptions,
}

impl<G: GpioLines> RgbLedMatrix<G> {
    /// Create a matrix with default [`RenderOptions`].
    ///
    /// # Errors
    ///
    /// See [`with_options`](Self::with_options).
    pub fn new(pins: PinMapping, geometry: Geometry, gpio: G) -> Result<Self> {
        Self::with_options(pins, geometry, gpio, RenderOptions::default())
    }

    /// Create a matrix.
    ///
    /// The pin mapping is validated against the geometry before any line is
    /// touched. Every line in use is then opened as an output and idled:
    /// OE high (blank), everything else low. Rendering does not start until
    /// [`start_rendering`](Self::start_rendering).
    ///
    /// # Errors
    ///
    /// [`Error::LineOutOfRange`] or [`Error::DuplicateLine`] for an invalid
    /// mapping, [`Error::OpenLine`] when the driver refuses a line.
    pub fn with_options(
        pins: PinMapping,
        geometry: Geometry,
        mut gpio: G,
        options: RenderOptions,
    ) -> Result<Self> {
        pins.validate(geometry.device_rows())?;
        let masks = GpioLineMasks::new(&pins, geometry.device_rows());

        for line in masks.lines() {
            gpio.open_output(line).map_err(|err| {
                log::error!("cannot open GPIO line {line} as an output: {err:?}");
                Error::OpenLine { line }
            })?;
        }
        gpio.set_high(masks.oe);
        gpio.set_low(masks.all_lines & !masks.oe);

        log::debug!(
            "matrix {}x{} ({}x{} chain), {} row pairs, {} bytes per buffer",
            geometry.width(),
            geometry.height(),
            geometry.chain_rows(),
            geometry.chain_columns(),
            masks.row_count(),
            crate::PLANE_COUNT * geometry.full_chain_width() * geometry.rows_per_scan()
        );

        Ok(Self {
            shared: Arc::new(Shared::new(geometry, masks, options.pwm_duration)),
            slot: Mutex::new(Slot::Idle(gpio)),
            options,
        })
    }

    fn lock_slot(&self) -> MutexGuard<'_, Slot<G>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn the render thread. Does nothing if it is already running.
    ///
    /// # Errors
    ///
    /// [`Error::RenderThreadPanicked`] when an earlier render thread died and
    /// took the GPIO driver with it, [`Error::Spawn`] when the thread cannot
    /// be created.
    pub fn start_rendering(&self) -> Result<()> {
        let shared = &self.shared;
        let mut slot = self.lock_slot();
        if shared
            .rendering
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }

        let gpio = match core::mem::replace(&mut *slot, Slot::Lost) {
            Slot::Idle(gpio) => gpio,
            // the previous loop already exited but was never reaped
            Slot::Running(handle) => match join(shared, handle) {
                Ok(gpio) => gpio,
                Err(err) => {
                    shared.rendering.store(false, Ordering::Release);
                    return Err(err);
                }
            },
            Slot::Lost => {
                shared.rendering.store(false, Ordering::Release);
                return Err(Error::RenderThreadPanicked);
            }
        };

        shared.safe_to_dispose.store(false, Ordering::Release);
        shared.request_measurement();
        let thread_shared = Arc::clone(shared);
        let options = self.options;
        let spawned = thread::Builder::new()
            .name(RENDER_THREAD_NAME.into())
            .spawn(move || render::run(gpio, thread_shared, options));

        match spawned {
            Ok(handle) => {
                *slot = Slot::Running(handle);
                Ok(())
            }
            Err(err) => {
                log::error!("cannot spawn render thread: {err}");
                shared.rendering.store(false, Ordering::Release);
                shared.safe_to_dispose.store(true, Ordering::Release);
                Err(Error::Spawn(err))
            }
        }
    }

    /// Stop the render thread and wait until it has blanked the panel.
    ///
    /// The loop notices the request at the end of the row pair it is showing,
    /// so this blocks for at most one row time.
    pub fn stop_rendering(&self) {
        let mut slot = self.lock_slot();
        self.shared.rendering.store(false, Ordering::Release);
        if let Slot::Running(_) = &*slot {
            if let Slot::Running(handle) = core::mem::replace(&mut *slot, Slot::Lost) {
                if let Ok(gpio) = join(&self.shared, handle) {
                    *slot = Slot::Idle(gpio);
                }
            }
        }
    }

    /// Whether the render thread has been asked to run.
    #[must_use]
    pub fn is_rendering(&self) -> bool {
        self.shared.rendering.load(Ordering::Acquire)
    }

    /// Show one full frame of the front buffer from the calling thread.
    ///
    /// Only available while the render thread is stopped. A pending swap is
    /// honoured at the end of the frame, as the render thread would. The panel
    /// is left blanked afterwards, so repeated calls are needed to keep an
    /// image visible.
    ///
    /// # Errors
    ///
    /// [`Error::Busy`] while rendering, [`Error::RenderThreadPanicked`] when
    /// the GPIO driver was lost.
    pub fn render_frame(&self) -> Result<()> {
        let mut slot = self.lock_slot();
        match &mut *slot {
            Slot::Idle(gpio) if !self.is_rendering() => {
                let masks = &self.shared.masks;
                gpio.set_low(masks.all_address);
                let mut scanner = Scanner::new(&self.shared);
                for _ in 0..masks.row_count() {
                    scanner.scan_row(&mut *gpio);
                }
                Ok(())
            }
            Slot::Lost => Err(Error::RenderThreadPanicked),
            Slot::Idle(_) | Slot::Running(_) => Err(Error::Busy),
        }
    }

    /// Stop rendering and hand back the GPIO driver, with OE high.
    ///
    /// # Errors
    ///
    /// [`Error::RenderThreadPanicked`] when the render thread died.
    pub fn release(self) -> Result<G> {
        self.stop_rendering();
        let slot = core::mem::replace(&mut *self.lock_slot(), Slot::Lost);
        match slot {
            Slot::Idle(gpio) => Ok(gpio),
            Slot::Running(_) | Slot::Lost => Err(Error::RenderThreadPanicked),
        }
    }

    /// Present the back buffer.
    ///
    /// While rendering, the swap is handed to the render thread, which
    /// performs it between frames; this call returns once it has happened,
    /// so the new back buffer is safe to draw into. Otherwise the buffers are
    /// exchanged immediately.
    pub fn swap_buffers(&self) {
        let shared = &self.shared;
        {
            // holding the slot keeps a render thread from being spawned
            let slot = self.lock_slot();
            if !matches!(*slot, Slot::Running(_)) {
                shared.swap();
                log::trace!("buffers swapped while stopped");
                return;
            }
            shared.swap_requested.store(true, Ordering::Release);
        }
        while shared.swap_requested.load(Ordering::Acquire) {
            if shared.safe_to_dispose.load(Ordering::Acquire) {
                // the loop exited before it saw the request
                let _slot = self.lock_slot();
                if shared.safe_to_dispose.load(Ordering::Acquire)
                    && shared
                        .swap_requested
                        .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                {
                    shared.swap();
                    break;
                }
            }
            thread::yield_now();
        }
        log::trace!("buffers swapped");
    }

    /// Canvas over the buffer on the panel right now.
    #[must_use]
    pub fn front(&self) -> Canvas<'_> {
        Canvas::new(&self.shared, Target::Front)
    }

    /// Canvas over the buffer shown after the next [`swap_buffers`](Self::swap_buffers).
    #[must_use]
    pub fn back(&self) -> Canvas<'_> {
        Canvas::new(&self.shared, Target::Back)
    }

    /// Canvas over `target`.
    #[must_use]
    pub fn canvas(&self, target: Target) -> Canvas<'_> {
        Canvas::new(&self.shared, target)
    }

    /// Set a pixel of the front buffer. Visible on the next refresh.
    pub fn set_pixel(&self, x: i32, y: i32, color: Color) {
        self.front().set_pixel(x, y, color);
    }

    /// Set a pixel of the back buffer.
    pub fn set_back_buffer_pixel(&self, x: i32, y: i32, color: Color) {
        self.back().set_pixel(x, y, color);
    }

    /// See [`Canvas::fill`].
    pub fn fill(&self, target: Target, color: Color) {
        self.canvas(target).fill(color);
    }

    /// See [`Canvas::fill_rectangle`].
    pub fn fill_rectangle(
        &self,
        target: Target,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        color: Color,
    ) {
        self.canvas(target).fill_rectangle(x, y, width, height, color);
    }

    /// See [`Canvas::draw_bitmap`].
    pub fn draw_bitmap<I>(&self, target: Target, x: i32, y: i32, image: &I)
    where
        I: GetPixel<Color = Color> + OriginDimensions,
    {
        self.canvas(target).draw_bitmap(x, y, image);
    }

    /// See [`Canvas::draw_text`].
    #[allow(clippy::too_many_arguments)]
    pub fn draw_text(
        &self,
        target: Target,
        x: i32,
        y: i32,
        text: &str,
        font: &MonoFont<'_>,
        foreground: Color,
        background: Color,
    ) -> i32 {
        self.canvas(target)
            .draw_text(x, y, text, font, foreground, background)
    }

    /// See [`Canvas::draw_circle`].
    pub fn draw_circle(&self, target: Target, xc: i32, yc: i32, radius: u32, color: Color) {
        self.canvas(target).draw_circle(xc, yc, radius, color);
    }

    /// Dwell of bit-plane 0.
    #[must_use]
    pub fn pwm_duration(&self) -> Duration {
        self.shared.pwm_duration()
    }

    /// Change the dwell of bit-plane 0, taking effect from the next row pair.
    ///
    /// Longer dwells are brighter and flicker more. The render thread times
    /// the next full frame at the new setting; see
    /// [`frame_time`](Self::frame_time).
    pub fn set_pwm_duration(&self, duration: Duration) {
        log::debug!("pwm duration set to {duration:?}");
        self.shared.set_pwm_duration(duration);
    }

    /// Time of the last measured full frame, `None` until one has been
    /// measured.
    #[must_use]
    pub fn frame_time(&self) -> Option<Duration> {
        self.shared.frame_time()
    }

    /// Refresh rate in frames per second derived from [`frame_time`](Self::frame_time).
    #[must_use]
    pub fn frame_rate(&self) -> Option<f64> {
        self.frame_time().map(|time| 1.0 / time.as_secs_f64())
    }

    /// Visual width in pixels.
    #[must_use]
    pub fn width(&self) -> usize {
        self.shared.geometry.width()
    }

    /// Visual height in pixels.
    #[must_use]
    pub fn height(&self) -> usize {
        self.shared.geometry.height()
    }

    /// Panel arrangement.
    #[must_use]
    pub fn geometry(&self) -> &Geometry {
        &self.shared.geometry
    }

    /// Line masks in use.
    #[must_use]
    pub fn masks(&self) -> &GpioLineMasks {
        &self.shared.masks
    }
}

/// Wait for the loop to finish blanking, then reap the thread.
fn join<G>(shared: &Shared, handle: JoinHandle<G>) -> Result<G> {
    while !shared.safe_to_dispose.load(Ordering::Acquire) {
        thread::yield_now();
    }
    handle.join().map_err(|_| {
        log::error!("render thread panicked; matrix can no longer drive the panel");
        Error::RenderThreadPanicked
    })
}

impl<G: GpioLines> Drop for RgbLedMatrix<G> {
    fn drop(&mut self) {
        self.stop_rendering();
    }
}

impl<G: GpioLines> core::fmt::Debug for RgbLedMatrix<G> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RgbLedMatrix")
            .field("geometry", &self.shared.geometry)
            .field("rendering", &self.is_rendering())
            .field("pwm_duration", &self.pwm_duration())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
