//! Reading and writing grids and JSON documents

mod geotiff;
mod json;

pub use geotiff::{read_geotiff, read_geotiff_from_buffer, write_geotiff, write_geotiff_to_buffer};
pub use json::{read_json, write_json};
