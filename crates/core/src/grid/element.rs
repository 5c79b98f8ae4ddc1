//! Cell value trait for grids

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// Trait for types that can be stored in a grid cell.
pub trait GridElement:
    Copy + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// Value used when a source cell cannot be represented
    fn fill_value() -> Self;

    /// Whether this value is finite (always true for integers)
    fn is_finite_value(&self) -> bool;

    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }
}

macro_rules! impl_grid_element_int {
    ($t:ty) => {
        impl GridElement for $t {
            fn fill_value() -> Self {
                0
            }

            fn is_finite_value(&self) -> bool {
                true
            }
        }
    };
}

macro_rules! impl_grid_element_float {
    ($t:ty) => {
        impl GridElement for $t {
            fn fill_value() -> Self {
                <$t>::NAN
            }

            fn is_finite_value(&self) -> bool {
                self.is_finite()
            }
        }
    };
}

impl_grid_element_int!(i32);
impl_grid_element_int!(i64);
impl_grid_element_int!(u32);
impl_grid_element_float!(f32);
impl_grid_element_float!(f64);
