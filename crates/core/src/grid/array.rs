//! Main grid type

use crate::error::{Error, Result};
use crate::grid::{GeoTransform, GridElement};
use ndarray::{Array2, ArrayView2, Zip};

/// A georeferenced 2-D grid of cell values.
///
/// Data is stored row-major as `(y, x)`, which is also the ordering used for
/// outlet and contributing-cell coordinates throughout the routing crates.
///
/// # Example
///
/// ```ignore
/// use uhroute_core::Grid;
///
/// let mut area: Grid<f64> = Grid::new(4, 5);
/// area.set(1, 2, 2.5e6)?;
/// assert_eq!(area.get(1, 2)?, 2.5e6);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T: GridElement> {
    data: Array2<T>,
    transform: GeoTransform,
}

impl<T: GridElement> Grid<T> {
    /// Create a new grid filled with zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            data: Array2::zeros((rows, cols)),
            transform: GeoTransform::default(),
        }
    }

    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self {
            data: Array2::from_elem((rows, cols), value),
            transform: GeoTransform::default(),
        }
    }

    /// Create a grid from row-major data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;

        Ok(Self::from_array(array))
    }

    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
        }
    }

    pub fn with_transform(mut self, transform: GeoTransform) -> Self {
        self.transform = transform;
        self
    }

    // Dimensions

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether `(row, col)` lies inside the grid
    pub fn contains(&self, row: usize, col: usize) -> bool {
        row < self.rows() && col < self.cols()
    }

    /// Fail with `ShapeMismatch` unless `other` has the same shape
    pub fn ensure_same_shape<U: GridElement>(&self, other: &Grid<U>, what: &str) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(Error::shape_mismatch(what, self.shape(), other.shape()));
        }
        Ok(())
    }

    // Data access

    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        match self.data.get_mut((row, col)) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            }),
        }
    }

    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    pub fn into_array(self) -> Array2<T> {
        self.data
    }

    // Metadata

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    // Element-wise operations

    /// Apply `f` to every cell, producing a new grid with the same georeferencing
    pub fn map<U: GridElement, F>(&self, f: F) -> Grid<U>
    where
        F: Fn(T) -> U,
    {
        Grid {
            data: self.data.mapv(f),
            transform: self.transform,
        }
    }

    /// Combine two grids of equal shape cell by cell
    pub fn zip_map<U: GridElement, F>(&self, other: &Grid<T>, what: &str, f: F) -> Result<Grid<U>>
    where
        F: Fn(T, T) -> U,
    {
        self.ensure_same_shape(other, what)?;
        let data = Zip::from(&self.data)
            .and(&other.data)
            .map_collect(|&a, &b| f(a, b));
        Ok(Grid {
            data,
            transform: self.transform,
        })
    }

    /// Sum of all finite cells as f64
    pub fn finite_sum(&self) -> f64 {
        self.data
            .iter()
            .filter(|v| v.is_finite_value())
            .filter_map(|v| v.to_f64())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_creation() {
        let grid: Grid<f64> = Grid::new(10, 20);
        assert_eq!(grid.rows(), 10);
        assert_eq!(grid.cols(), 20);
        assert_eq!(grid.shape(), (10, 20));
        assert!(grid.contains(9, 19));
        assert!(!grid.contains(10, 0));
    }

    #[test]
    fn test_grid_access() {
        let mut grid: Grid<f64> = Grid::new(3, 3);
        grid.set(1, 2, 42.0).unwrap();
        assert_eq!(grid.get(1, 2).unwrap(), 42.0);
        assert!(matches!(
            grid.get(3, 0),
            Err(Error::IndexOutOfBounds { row: 3, .. })
        ));
        assert!(grid.set(0, 3, 1.0).is_err());
    }

    #[test]
    fn test_from_vec_rejects_bad_length() {
        let err = Grid::<f64>::from_vec(vec![1.0; 5], 2, 3).unwrap_err();
        assert!(matches!(err, Error::InvalidDimensions { width: 3, height: 2 }));
    }

    #[test]
    fn test_zip_map_shape_mismatch() {
        let a: Grid<f64> = Grid::filled(2, 2, 1.0);
        let b: Grid<f64> = Grid::filled(2, 3, 1.0);
        let err = a.zip_map::<f64, _>(&b, "runoff/baseflow", |x, y| x + y).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn test_finite_sum_skips_nan() {
        let grid = Grid::from_vec(vec![1.0, f64::NAN, 2.5, 0.5], 2, 2).unwrap();
        assert_eq!(grid.finite_sum(), 4.0);
    }
}
