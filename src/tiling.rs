//! Display geometry and the chained-panel pixel remapping.
//!
//! Several physical panels can be chained into one larger visual display.
//! Panels that sit in the same band of rows are simply wider; stacked bands
//! are wired as one long serpentine chain where every other band is mounted
//! upside down. The renderer only ever sees a single strip of
//! [`Geometry::full_chain_width`] columns by [`Geometry::device_rows`] rows,
//! and [`Geometry::remap_xy`] translates visual coordinates onto that strip.

use crate::error::GeometryError;

/// Smallest accepted visual width or height.
pub const MIN_DIMENSION: usize = 8;

/// Tallest panel the A..E address lines can scan: 32 row pairs.
pub const MAX_DEVICE_ROWS: usize = 64;

/// Visual size of the display and how panels are tiled to form it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Geometry {
    width: usize,
    height: usize,
    chain_rows: usize,
    chain_columns: usize,
}

impl Geometry {
    /// A single panel of `width` × `height` pixels.
    ///
    /// # Errors
    ///
    /// See [`Geometry::chained`].
    pub fn new(width: usize, height: usize) -> Result<Self, GeometryError> {
        Self::chained(width, height, 1, 1)
    }

    /// A `width` × `height` display tiled from `chain_rows` bands of
    /// `chain_columns` panels each.
    ///
    /// # Errors
    ///
    /// Fails when either dimension is below [`MIN_DIMENSION`], a chain
    /// dimension is zero, `height` does not divide evenly into
    /// `chain_rows` bands, or a band is taller than [`MAX_DEVICE_ROWS`].
    pub fn chained(
        width: usize,
        height: usize,
        chain_rows: usize,
        chain_columns: usize,
    ) -> Result<Self, GeometryError> {
        if width < MIN_DIMENSION {
            return Err(GeometryError::WidthTooSmall { width });
        }
        if height < MIN_DIMENSION {
            return Err(GeometryError::HeightTooSmall { height });
        }
        if chain_rows == 0 || chain_columns == 0 {
            return Err(GeometryError::EmptyChain {
                rows: chain_rows,
                columns: chain_columns,
            });
        }
        if height % chain_rows != 0 {
            return Err(GeometryError::UnevenChain { height, chain_rows });
        }
        let device_rows = height / chain_rows;
        if device_rows > MAX_DEVICE_ROWS {
            return Err(GeometryError::TooManyRows { device_rows });
        }
        Ok(Self {
            width,
            height,
            chain_rows,
            chain_columns,
        })
    }

    /// Visual width in pixels.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Visual height in pixels.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Number of stacked panel bands.
    #[must_use]
    pub const fn chain_rows(&self) -> usize {
        self.chain_rows
    }

    /// Number of panels side by side in each band.
    #[must_use]
    pub const fn chain_columns(&self) -> usize {
        self.chain_columns
    }

    /// Physical scan rows of one panel.
    #[must_use]
    pub const fn device_rows(&self) -> usize {
        self.height / self.chain_rows
    }

    /// Distinct row addresses of one panel.
    #[must_use]
    pub const fn rows_per_scan(&self) -> usize {
        crate::compute_rows(self.device_rows())
    }

    /// Width of one physical panel.
    #[must_use]
    pub const fn panel_width(&self) -> usize {
        self.width / self.chain_columns
    }

    /// Number of columns shifted out per row: every band laid end to end.
    #[must_use]
    pub const fn full_chain_width(&self) -> usize {
        self.width * self.chain_rows
    }

    /// Whether `(x, y)` lies on the visual display.
    #[inline]
    #[must_use]
    pub const fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    /// Whether the band of panels at `panel_row` is mounted upside down.
    ///
    /// The band that is reversed alternates, starting from the first band when
    /// the number of bands is odd and from the second when it is even.
    #[inline]
    #[must_use]
    pub const fn is_band_reversed(&self, panel_row: usize) -> bool {
        let odd_chain = self.chain_rows & 1 == 1;
        let even_band = panel_row & 1 == 0;
        !(odd_chain ^ even_band)
    }

    /// Remap a visual pixel to `(column, row)` of the chained strip.
    ///
    /// `row` is in `0..device_rows()` and `column` in `0..full_chain_width()`.
    /// The caller must have checked [`Geometry::contains`].
    #[inline]
    #[must_use]
    pub fn remap_xy(&self, x: usize, y: usize) -> (usize, usize) {
        if self.chain_rows == 1 {
            return (x, y);
        }
        let device_rows = self.device_rows();
        let panel_row = y / device_rows;
        let row = y % device_rows;
        if self.is_band_reversed(panel_row) {
            // the band is rotated 180 degrees, so its rows run bottom-up as
            // well as its columns running right to left
            (
                panel_row * self.width + (self.width - 1 - x),
                device_rows - 1 - row,
            )
        } else {
            (panel_row * self.width + x, row)
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Geometry {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "Geometry {{ {}x{}, chain {}x{} }}",
            self.width,
            self.height,
            self.chain_rows,
            self.chain_columns
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_small_dimensions() {
        assert_eq!(
            Geometry::new(7, 32),
            Err(GeometryError::WidthTooSmall { width: 7 })
        );
        assert_eq!(
            Geometry::new(64, 4),
            Err(GeometryError::HeightTooSmall { height: 4 })
        );
        assert_eq!(
            Geometry::new(0, 0),
            Err(GeometryError::WidthTooSmall { width: 0 })
        );
    }

    #[test]
    fn test_rejects_uneven_or_empty_chain() {
        assert_eq!(
            Geometry::chained(64, 96, 5, 1),
            Err(GeometryError::UnevenChain {
                height: 96,
                chain_rows: 5
            })
        );
        assert_eq!(
            Geometry::chained(64, 64, 0, 1),
            Err(GeometryError::EmptyChain {
                rows: 0,
                columns: 1
            })
        );
        assert!(Geometry::chained(64, 64, 1, 0).is_err());
    }

    #[test]
    fn test_valid_geometries_report_inputs() {
        for width in [8, 16, 32, 63, 64, 128] {
            for height in [8, 16, 32, 48, 64, 96] {
                for chain_rows in 1..=4 {
                    let result = Geometry::chained(width, height, chain_rows, 1);
                    if height % chain_rows == 0 && height / chain_rows <= MAX_DEVICE_ROWS {
                        let geometry = result.unwrap();
                        assert_eq!(geometry.width(), width);
                        assert_eq!(geometry.height(), height);
                        assert_eq!(geometry.device_rows() * chain_rows, height);
                    } else {
                        assert!(result.is_err());
                    }
                }
            }
        }
    }

    #[test]
    fn test_rejects_panels_beyond_address_lines() {
        assert_eq!(
            Geometry::new(64, 128),
            Err(GeometryError::TooManyRows { device_rows: 128 })
        );
        assert_eq!(
            Geometry::chained(64, 130, 2, 1),
            Err(GeometryError::TooManyRows { device_rows: 65 })
        );
        // the same height split over two bands is fine
        let geometry = Geometry::chained(64, 128, 2, 1).unwrap();
        assert_eq!(geometry.device_rows(), MAX_DEVICE_ROWS);
        assert_eq!(geometry.rows_per_scan(), 32);
    }

    #[test]
    fn test_derived_sizes() {
        let geometry = Geometry::chained(128, 64, 2, 2).unwrap();
        assert_eq!(geometry.device_rows(), 32);
        assert_eq!(geometry.rows_per_scan(), 16);
        assert_eq!(geometry.panel_width(), 64);
        assert_eq!(geometry.full_chain_width(), 256);
    }

    #[test]
    fn test_single_band_is_identity() {
        let geometry = Geometry::new(64, 32).unwrap();
        for (x, y) in [(0, 0), (5, 10), (63, 31), (17, 16)] {
            assert_eq!(geometry.remap_xy(x, y), (x, y));
        }
    }

    #[test]
    fn test_band_parity() {
        let two = Geometry::chained(64, 64, 2, 1).unwrap();
        assert!(!two.is_band_reversed(0));
        assert!(two.is_band_reversed(1));

        let three = Geometry::chained(64, 96, 3, 1).unwrap();
        assert!(three.is_band_reversed(0));
        assert!(!three.is_band_reversed(1));
        assert!(three.is_band_reversed(2));
    }

    #[test]
    fn test_two_band_chain_reverses_second_band() {
        let geometry = Geometry::chained(64, 64, 2, 1).unwrap();
        // first band is straight
        assert_eq!(geometry.remap_xy(5, 10), (5, 10));
        // second band is upside down and follows the first in the chain
        assert_eq!(geometry.remap_xy(5, 40), (64 + 58, 23));
        assert_eq!(geometry.remap_xy(0, 32), (127, 31));
        assert_eq!(geometry.remap_xy(63, 63), (64, 0));
    }

    #[test]
    fn test_remap_stays_inside_strip() {
        let geometry = Geometry::chained(32, 96, 3, 1).unwrap();
        for y in 0..geometry.height() {
            for x in 0..geometry.width() {
                let (column, row) = geometry.remap_xy(x, y);
                assert!(column < geometry.full_chain_width());
                assert!(row < geometry.device_rows());
            }
        }
    }

    #[test]
    fn test_contains() {
        let geometry = Geometry::new(64, 32).unwrap();
        assert!(geometry.contains(0, 0));
        assert!(geometry.contains(63, 31));
        assert!(!geometry.contains(64, 0));
        assert!(!geometry.contains(0, 32));
        assert!(!geometry.contains(-1, 5));
        assert!(!geometry.contains(5, -1));
    }
}
