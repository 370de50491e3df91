//! Test data generators for synthetic radiance and quality-flag grids.
//!
//! These generators create predictable, verifiable test data patterns
//! that can be used across the test suite. All grids are row-major.

/// Creates a radiance grid with a single value everywhere.
pub fn constant_grid(width: usize, height: usize, value: f32) -> Vec<f32> {
    vec![value; width * height]
}

/// Creates a test grid with predictable values.
///
/// Each cell value is calculated as: `row * width + col`
///
/// # Example
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(3, 2);
/// assert_eq!(grid, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f32> {
    (0..width * height).map(|i| i as f32).collect()
}

/// Creates a radiance grid resembling a lit settlement: a bright core that
/// falls off with distance from the grid center.
pub fn create_city_lights_grid(width: usize, height: usize, peak: f32) -> Vec<f32> {
    let cx = (width as f32 - 1.0) / 2.0;
    let cy = (height as f32 - 1.0) / 2.0;
    let radius = (cx * cx + cy * cy).sqrt().max(1.0);

    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let dx = col as f32 - cx;
            let dy = row as f32 - cy;
            let falloff = 1.0 - (dx * dx + dy * dy).sqrt() / radius;
            data.push(peak * falloff.max(0.0));
        }
    }
    data
}

/// Creates a flag grid with a single code everywhere.
pub fn constant_flags(width: usize, height: usize, code: u32) -> Vec<u32> {
    vec![code; width * height]
}

/// Creates a flag grid alternating between `good` and `bad` codes in a
/// checkerboard, starting with `good` at (0, 0).
pub fn checkerboard_flags(width: usize, height: usize, good: u32, bad: u32) -> Vec<u32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push(if (row + col) % 2 == 0 { good } else { bad });
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_test_grid() {
        let grid = create_test_grid(4, 2);
        assert_eq!(grid.len(), 8);
        assert_eq!(grid[5], 5.0);
    }

    #[test]
    fn test_city_lights_peak_at_center() {
        let grid = create_city_lights_grid(5, 5, 100.0);
        let center = grid[2 * 5 + 2];
        assert_eq!(center, 100.0);
        assert!(grid.iter().all(|&v| v <= center && v >= 0.0));
    }

    #[test]
    fn test_checkerboard_flags() {
        let flags = checkerboard_flags(3, 2, 1, 9);
        assert_eq!(flags, vec![1, 9, 1, 9, 1, 9]);
    }
}
