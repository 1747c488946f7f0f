//! Error types returned while configuring and driving a matrix.
//!
//! Drawing never fails: out-of-bounds pixels are clipped silently, so only
//! construction and render-thread management can produce an [`Error`].

use derive_more::{Display, Error};

use crate::tiling::{MAX_DEVICE_ROWS, MIN_DIMENSION};

/// Rejected panel geometry.
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum GeometryError {
    /// Visual width below the minimum.
    #[display("width {width} is below the minimum of {} pixels", MIN_DIMENSION)]
    WidthTooSmall {
        /// Requested width.
        width: usize,
    },
    /// Visual height below the minimum.
    #[display("height {height} is below the minimum of {} pixels", MIN_DIMENSION)]
    HeightTooSmall {
        /// Requested height.
        height: usize,
    },
    /// A chain dimension of zero panels.
    #[display("chain must be at least one panel in each direction (rows {rows}, columns {columns})")]
    EmptyChain {
        /// Requested number of chained panel rows.
        rows: usize,
        /// Requested number of chained panel columns.
        columns: usize,
    },
    /// A panel taller than the five address lines can select.
    #[display("{device_rows} scan rows per panel exceed the maximum of {}", MAX_DEVICE_ROWS)]
    TooManyRows {
        /// Scan rows of one panel, `height / chain_rows`.
        device_rows: usize,
    },
    /// Height does not split evenly across the chained panel rows.
    #[display("height {height} is not divisible by {chain_rows} chained panel rows")]
    UnevenChain {
        /// Requested height.
        height: usize,
        /// Requested number of chained panel rows.
        chain_rows: usize,
    },
}

/// Errors produced by [`crate::RgbLedMatrix`].
#[derive(Debug, Display, Error)]
pub enum Error {
    /// The requested geometry is invalid.
    #[display("invalid geometry: {_0}")]
    Geometry(GeometryError),
    /// A pin does not fit in the 64-bit line masks.
    #[display("GPIO line {line} for {signal} does not fit in a 64-bit line mask")]
    LineOutOfRange {
        /// Signal name, e.g. `"OE"`.
        signal: &'static str,
        /// Offending line number.
        line: u8,
    },
    /// Two signals share the same line.
    #[display("GPIO line {line} is mapped to both {first} and {second}")]
    DuplicateLine {
        /// Offending line number.
        line: u8,
        /// Signal that claimed the line first.
        first: &'static str,
        /// Signal that claimed it again.
        second: &'static str,
    },
    /// The GPIO driver refused to open a line as an output.
    #[display("GPIO line {line} could not be opened as an output")]
    OpenLine {
        /// Offending line number.
        line: u8,
    },
    /// The render thread could not be spawned.
    #[display("failed to spawn render thread: {_0}")]
    Spawn(std::io::Error),
    /// The render thread panicked and took the GPIO driver with it.
    #[display("render thread panicked; GPIO lines are no longer available")]
    RenderThreadPanicked,
    /// The render thread is driving the GPIO lines.
    #[display("the render thread is driving the panel")]
    Busy,
}

impl From<GeometryError> for Error {
    fn from(err: GeometryError) -> Self {
        Self::Geometry(err)
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_error_display() {
        let err = GeometryError::UnevenChain {
            height: 30,
            chain_rows: 4,
        };
        assert_eq!(
            err.to_string(),
            "height 30 is not divisible by 4 chained panel rows"
        );
        assert_eq!(
            GeometryError::TooManyRows { device_rows: 128 }.to_string(),
            "128 scan rows per panel exceed the maximum of 64"
        );
        assert_eq!(
            GeometryError::WidthTooSmall { width: 4 }.to_string(),
            "width 4 is below the minimum of 8 pixels"
        );
    }

    #[test]
    fn test_error_wraps_geometry() {
        let err: Error = GeometryError::HeightTooSmall { height: 2 }.into();
        assert!(matches!(
            err,
            Error::Geometry(GeometryError::HeightTooSmall { height: 2 })
        ));
        assert_eq!(
            err.to_string(),
            "invalid geometry: height 2 is below the minimum of 8 pixels"
        );
    }

    #[test]
    fn test_error_source_chain() {
        use std::error::Error as _;

        let err: Error = GeometryError::WidthTooSmall { width: 1 }.into();
        assert!(err.source().is_some());

        let err = Error::DuplicateLine {
            line: 4,
            first: "OE",
            second: "A",
        };
        assert!(err.source().is_none());
        assert_eq!(err.to_string(), "GPIO line 4 is mapped to both OE and A");
    }
}
