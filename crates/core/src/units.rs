//! Physical constants and grid-area unit conversion

use crate::grid::Grid;
use crate::warning::SoftWarning;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Earth radius used to convert steradian cell areas [m]
pub const EARTH_RADIUS: f64 = 6.37122e6;
/// Density of water [kg/m3]
pub const WATER_DENSITY: f64 = 1000.0;
pub const METERS_PER_KM: f64 = 1000.0;
pub const METERS_PER_MILE: f64 = 1609.34;
pub const SQ_METERS_PER_ACRE: f64 = 4046.856;
pub const SECS_PER_HOUR: f64 = 3600.0;
pub const SECS_PER_DAY: f64 = 24.0 * SECS_PER_HOUR;
pub const MM_PER_METER: f64 = 1000.0;
pub const CM_PER_METER: f64 = 100.0;

/// Units a grid-area field may be tagged with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaUnits {
    SquareRadians,
    SquareMeters,
    SquareKilometers,
    SquareMiles,
    Acres,
}

impl AreaUnits {
    /// Parse a unit tag.
    ///
    /// Unknown tags fall back to square meters and return a warning.
    pub fn parse(tag: &str) -> (Self, Option<SoftWarning>) {
        let units = match tag.trim() {
            "rad2" | "radians2" | "radian2" | "rad^2" | "radians^2" | "rads^2"
            | "radians squared" | "square-radians" => AreaUnits::SquareRadians,
            "m2" | "m^2" | "meters^2" | "meters2" | "square-meters" | "meters squared" => {
                AreaUnits::SquareMeters
            }
            "km2" | "km^2" | "kilometers^2" | "kilometers2" | "square-kilometers"
            | "kilometers squared" => AreaUnits::SquareKilometers,
            "mi2" | "mi^2" | "miles^2" | "miles" | "square-miles" | "miles squared" => {
                AreaUnits::SquareMiles
            }
            "acres" | "ac" | "ac." => AreaUnits::Acres,
            other => {
                return (
                    AreaUnits::SquareMeters,
                    Some(SoftWarning::UnrecognizedAreaUnits(other.to_string())),
                )
            }
        };
        (units, None)
    }

    /// Multiplier converting a value in these units to square meters
    pub fn to_square_meters(self) -> f64 {
        match self {
            AreaUnits::SquareRadians => EARTH_RADIUS * EARTH_RADIUS,
            AreaUnits::SquareMeters => 1.0,
            AreaUnits::SquareKilometers => METERS_PER_KM * METERS_PER_KM,
            AreaUnits::SquareMiles => METERS_PER_MILE * METERS_PER_MILE,
            AreaUnits::Acres => SQ_METERS_PER_ACRE,
        }
    }
}

impl fmt::Display for AreaUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AreaUnits::SquareRadians => "rad2",
            AreaUnits::SquareMeters => "m2",
            AreaUnits::SquareKilometers => "km2",
            AreaUnits::SquareMiles => "mi2",
            AreaUnits::Acres => "acres",
        };
        f.write_str(s)
    }
}

/// Convert a single area value tagged with `tag` to square meters.
pub fn area_to_square_meters(value: f64, tag: &str) -> (f64, Option<SoftWarning>) {
    let (units, warning) = AreaUnits::parse(tag);
    (value * units.to_square_meters(), warning)
}

/// Convert a whole area grid to square meters, emitting any unit warning.
pub fn area_grid_to_square_meters(area: &Grid<f64>, tag: &str) -> Grid<f64> {
    let (units, warning) = AreaUnits::parse(tag);
    if let Some(w) = warning {
        w.emit();
    }
    let factor = units.to_square_meters();
    tracing::debug!("converting cell areas from {} (x{})", units, factor);
    area.map(|a| a * factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_km2_to_m2() {
        let (m2, warning) = area_to_square_meters(2.0, "km2");
        assert_eq!(m2, 2_000_000.0);
        assert!(warning.is_none());
    }

    #[test]
    fn test_acres_to_m2() {
        let (m2, warning) = area_to_square_meters(1.0, "acres");
        assert_relative_eq!(m2, 4046.856, epsilon = 1e-9);
        assert!(warning.is_none());
    }

    #[test]
    fn test_radians_and_miles() {
        let (m2, _) = area_to_square_meters(1.0, "radians^2");
        assert_relative_eq!(m2, EARTH_RADIUS * EARTH_RADIUS);
        let (m2, _) = area_to_square_meters(1.0, "square-miles");
        assert_relative_eq!(m2, 1609.34 * 1609.34);
    }

    #[test]
    fn test_unknown_units_default_to_m2() {
        let (m2, warning) = area_to_square_meters(7.0, "hectares");
        assert_eq!(m2, 7.0);
        assert_eq!(
            warning,
            Some(SoftWarning::UnrecognizedAreaUnits("hectares".to_string()))
        );
    }

    #[test]
    fn test_grid_conversion() {
        let area = Grid::filled(2, 2, 3.0);
        let m2 = area_grid_to_square_meters(&area, "km^2");
        assert_eq!(m2.get(1, 1).unwrap(), 3.0e6);
        assert_eq!(m2.transform(), area.transform());
    }
}
