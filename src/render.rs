//! The render thread: row scanning, bit-plane output and BCM timing.
//!
//! For every row pair the loop shifts out each of the eight bit-planes and
//! lights it for `pwm_duration * 2^plane`:
//!
//! 1. OE HIGH (blank)
//! 2. for every chained column: drive the six color lines, pulse CLK
//! 3. pulse LAT, then OE LOW (light) and spin for the plane's dwell
//! 4. OE HIGH
//!
//! After the eighth plane the address lines move to the next row pair. A
//! requested buffer swap is only honoured when the address wraps back to the
//! first row pair, so a frame is never shown half from one buffer and half
//! from the other.
//!
//! Nothing in here allocates, locks or sleeps. Dwell times are far below the
//! scheduler's sleep granularity, so they are busy-waited on [`Instant`].

use core::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::canvas::Target;
use crate::framebuffer::{Entry, FrameBuffer};
use crate::gpio::GpioLines;
use crate::masks::GpioLineMasks;
use crate::matrix::RenderOptions;
use crate::tiling::Geometry;
use crate::{plane_weight, PLANE_COUNT};

/// State shared between the matrix handle, drawing callers and the render
/// thread.
pub(crate) struct Shared {
    pub(crate) geometry: Geometry,
    pub(crate) masks: GpioLineMasks,
    buffers: [FrameBuffer; 2],
    front: AtomicUsize,
    pub(crate) rendering: AtomicBool,
    pub(crate) safe_to_dispose: AtomicBool,
    pub(crate) swap_requested: AtomicBool,
    pwm_nanos: AtomicU64,
    measure_requested: AtomicBool,
    frame_nanos: AtomicU64,
}

impl Shared {
    pub(crate) fn new(geometry: Geometry, masks: GpioLineMasks, pwm_duration: Duration) -> Self {
        Self {
            geometry,
            masks,
            buffers: [FrameBuffer::new(geometry), FrameBuffer::new(geometry)],
            front: AtomicUsize::new(0),
            rendering: AtomicBool::new(false),
            safe_to_dispose: AtomicBool::new(true),
            swap_requested: AtomicBool::new(false),
            pwm_nanos: AtomicU64::new(duration_nanos(pwm_duration)),
            measure_requested: AtomicBool::new(false),
            frame_nanos: AtomicU64::new(0),
        }
    }

    /// The buffer currently designated as `target`.
    #[inline]
    pub(crate) fn buffer(&self, target: Target) -> &FrameBuffer {
        let front = self.front.load(Ordering::Acquire);
        match target {
            Target::Front => &self.buffers[front],
            Target::Back => &self.buffers[front ^ 1],
        }
    }

    /// Exchange the front and back designations.
    pub(crate) fn swap(&self) {
        self.front.fetch_xor(1, Ordering::AcqRel);
    }

    pub(crate) fn pwm_duration(&self) -> Duration {
        Duration::from_nanos(self.pwm_nanos.load(Ordering::Relaxed))
    }

    pub(crate) fn set_pwm_duration(&self, duration: Duration) {
        self.pwm_nanos.store(duration_nanos(duration), Ordering::Relaxed);
        self.request_measurement();
    }

    /// Ask the render thread to time its next full frame.
    pub(crate) fn request_measurement(&self) {
        self.measure_requested.store(true, Ordering::Release);
    }

    pub(crate) fn frame_time(&self) -> Option<Duration> {
        match self.frame_nanos.load(Ordering::Acquire) {
            0 => None,
            nanos => Some(Duration::from_nanos(nanos)),
        }
    }
}

fn duration_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

/// Spin until `duration` has elapsed.
#[inline]
fn spin_for(duration: Duration) {
    let start = Instant::now();
    while start.elapsed() < duration {
        core::hint::spin_loop();
    }
}

/// Walks the row pairs of the front buffer one at a time.
pub(crate) struct Scanner<'a> {
    shared: &'a Shared,
    row: usize,
    frame_started: Option<Instant>,
}

impl<'a> Scanner<'a> {
    pub(crate) fn new(shared: &'a Shared) -> Self {
        Self {
            shared,
            row: 0,
            frame_started: None,
        }
    }

    /// Show all eight bit-planes of the current row pair, then advance.
    pub(crate) fn scan_row<G: GpioLines>(&mut self, gpio: &mut G) {
        let shared = self.shared;
        let masks = &shared.masks;

        if self.row == 0
            && self.frame_started.is_none()
            && shared.measure_requested.swap(false, Ordering::AcqRel)
        {
            self.frame_started = Some(Instant::now());
        }

        let pwm = shared.pwm_duration();
        let buffer = shared.buffer(Target::Front);
        for plane in 0..PLANE_COUNT {
            gpio.set_high(masks.oe);
            for byte in buffer.plane_row(plane, self.row) {
                let select = masks.color_select(Entry::from_bits(byte.load(Ordering::Relaxed)));
                gpio.set_high(select);
                gpio.set_low(masks.all_colors & !select);
                gpio.set_high(masks.clock);
                gpio.set_low(masks.clock);
            }
            gpio.set_high(masks.latch);
            gpio.set_low(masks.latch);
            gpio.set_low(masks.oe);
            spin_for(pwm * plane_weight(plane));
            gpio.set_high(masks.oe);
        }

        let next = (self.row + 1) % masks.row_count();
        let (current, upcoming) = (masks.row_address(self.row), masks.row_address(next));
        gpio.set_low(current & !upcoming);
        gpio.set_high(upcoming);
        self.row = next;

        if next == 0 {
            self.end_of_frame();
        }
    }

    fn end_of_frame(&mut self) {
        let shared = self.shared;
        if let Some(started) = self.frame_started.take() {
            let elapsed = started.elapsed();
            shared
                .frame_nanos
                .store(duration_nanos(elapsed).max(1), Ordering::Release);
            log::debug!(
                "frame time {:?} ({:.1} fps) at pwm duration {:?}",
                elapsed,
                1.0 / elapsed.as_secs_f64(),
                shared.pwm_duration()
            );
        }
        if shared.swap_requested.load(Ordering::Acquire) {
            shared.swap();
            shared.swap_requested.store(false, Ordering::Release);
        }
    }
}

/// Blanks the panel and reports the loop as finished however it exits,
/// including by panic.
struct OutputGuard<'a, G: GpioLines> {
    gpio: &'a mut G,
    shared: &'a Shared,
}

impl<G: GpioLines> Drop for OutputGuard<'_, G> {
    fn drop(&mut self) {
        self.gpio.set_high(self.shared.masks.oe);
        // no-op after a requested stop, clears the flag after a panic
        self.shared.rendering.store(false, Ordering::Release);
        // nobody is left to honour a pending swap
        if self.shared.swap_requested.load(Ordering::Acquire) {
            self.shared.swap();
            self.shared.swap_requested.store(false, Ordering::Release);
        }
        self.shared.safe_to_dispose.store(true, Ordering::Release);
    }
}

/// Body of the render thread. Returns the GPIO driver once stopped.
pub(crate) fn run<G: GpioLines>(mut gpio: G, shared: Arc<Shared>, options: RenderOptions) -> G {
    {
        let mut guard = OutputGuard {
            gpio: &mut gpio,
            shared: &shared,
        };
        configure_thread(&options);
        log::info!(
            "render thread started: {}x{} over {} row pairs",
            shared.geometry.width(),
            shared.geometry.height(),
            shared.masks.row_count()
        );
        guard.gpio.set_low(shared.masks.all_address);
        let mut scanner = Scanner::new(&shared);
        while shared.rendering.load(Ordering::Acquire) {
            scanner.scan_row(&mut *guard.gpio);
        }
    }
    log::info!("render thread stopped");
    gpio
}

fn configure_thread(options: &RenderOptions) {
    if options.realtime_priority {
        raise_priority();
    }
    if let Some(cpu) = options.cpu {
        pin_to_cpu(cpu);
    }
}

#[cfg(target_os = "linux")]
fn raise_priority() {
    // SAFETY: sched_param is plain data and is fully initialised before use;
    // the calls only affect the current thread.
    let result = unsafe {
        let mut param: libc::sched_param = core::mem::zeroed();
        param.sched_priority = libc::sched_get_priority_max(libc::SCHED_FIFO);
        libc::pthread_setschedparam(libc::pthread_self(), libc::SCHED_FIFO, &param)
    };
    if result == 0 {
        log::debug!("render thread switched to SCHED_FIFO");
    } else {
        log::warn!(
            "render thread keeps default priority: {}",
            std::io::Error::from_raw_os_error(result)
        );
    }
}

#[cfg(not(target_os = "linux"))]
fn raise_priority() {
    log::debug!("real-time priority is not supported on this platform");
}

#[cfg(target_os = "linux")]
fn pin_to_cpu(cpu: usize) {
    if cpu >= libc::CPU_SETSIZE as usize {
        log::warn!("cannot pin render thread to cpu {cpu}: out of range");
        return;
    }
    // SAFETY: cpu_set_t is plain data, `cpu` is bounds checked above and pid 0
    // means the calling thread.
    let result = unsafe {
        let mut set: libc::cpu_set_t = core::mem::zeroed();
        libc::CPU_SET(cpu, &mut set);
        libc::sched_setaffinity(0, core::mem::size_of::<libc::cpu_set_t>(), &set)
    };
    if result == 0 {
        log::debug!("render thread pinned to cpu {cpu}");
    } else {
        log::warn!(
            "cannot pin render thread to cpu {cpu}: {}",
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(target_os = "linux"))]
fn pin_to_cpu(cpu: usize) {
    log::debug!("cpu affinity ({cpu}) is not supported on this platform");
}
