//! Grid data structures

mod array;
mod element;
mod geotransform;

pub use array::Grid;
pub use element::GridElement;
pub use geotransform::GeoTransform;
