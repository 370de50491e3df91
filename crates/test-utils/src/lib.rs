//! Shared test utilities for the nightlights workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Synthetic radiance and flag grid generators
//! - In-memory GeoTIFF encoding for raster fixtures
//! - Catalog CSV and quality-flag fixtures
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{fixtures, GeoTiffFixture};
//! ```

pub mod fixtures;
pub mod generators;
pub mod geotiff;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;
pub use geotiff::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Assert that every element of a grid is approximately `expected`.
///
/// Works with anything iterable over `&f32`/`&f64`, e.g. `ndarray` arrays.
#[macro_export]
macro_rules! assert_all_approx_eq {
    ($grid:expr, $expected:expr, $epsilon:expr) => {{
        for value in $grid.iter() {
            $crate::assert_approx_eq!(*value, $expected, $epsilon);
        }
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_assert_approx_eq_passes() {
        assert_approx_eq!(1.0001, 1.0, 0.001);
        assert_approx_eq!(0.0, 0.0, 0.0001);
        assert_approx_eq!(-5.5, -5.500001, 0.0001);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_assert_approx_eq_fails() {
        assert_approx_eq!(1.1, 1.0, 0.001);
    }

    #[test]
    fn test_assert_all_approx_eq_passes() {
        let grid = vec![2.0f32, 2.0001, 1.9999];
        assert_all_approx_eq!(grid, 2.0, 0.001);
    }
}
