//! Affine georeferencing for routing grids

use serde::{Deserialize, Serialize};

/// Affine transformation between cell indices and geographic coordinates.
///
/// ```text
/// lon = origin_x + col * pixel_width
/// lat = origin_y + row * pixel_height
/// ```
///
/// Routing grids are regular lat/lon grids, so no rotation terms are carried.
/// For north-up grids `pixel_height` is negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// Longitude of the upper-left corner
    pub origin_x: f64,
    /// Latitude of the upper-left corner
    pub origin_y: f64,
    /// Cell size in the x direction
    pub pixel_width: f64,
    /// Cell size in the y direction, usually negative
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }

    /// Coordinates `(lon, lat)` of the centre of cell `(row, col)`
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        let x = self.origin_x + (col as f64 + 0.5) * self.pixel_width;
        let y = self.origin_y + (row as f64 + 0.5) * self.pixel_height;
        (x, y)
    }

}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}
