//! Dense row-major 2D grid.

use serde::{Deserialize, Serialize};

use fordyca_types::DiscreteCoord;

/// A dense `width x height` grid of `T`, stored row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid2D<T> {
    width: u32,
    height: u32,
    cells: Vec<T>,
}

impl<T> Grid2D<T> {
    /// Create a grid, initializing each cell from its coordinate.
    pub fn new(width: u32, height: u32, mut init: impl FnMut(DiscreteCoord) -> T) -> Self {
        let capacity = usize::try_from(u64::from(width).saturating_mul(u64::from(height)))
            .unwrap_or(0);
        let mut cells = Vec::with_capacity(capacity);
        for y in 0..height {
            for x in 0..width {
                cells.push(init(DiscreteCoord::new(x, y)));
            }
        }
        Self {
            width,
            height,
            cells,
        }
    }

    /// Number of columns.
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows.
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the grid has no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Whether `coord` lies inside the grid.
    pub const fn contains(&self, coord: DiscreteCoord) -> bool {
        coord.x < self.width && coord.y < self.height
    }

    fn offset(&self, coord: DiscreteCoord) -> Option<usize> {
        if !self.contains(coord) {
            return None;
        }
        let flat = u64::from(coord.y)
            .checked_mul(u64::from(self.width))?
            .checked_add(u64::from(coord.x))?;
        usize::try_from(flat).ok()
    }

    /// Immutable access to the cell at `coord`.
    pub fn get(&self, coord: DiscreteCoord) -> Option<&T> {
        self.offset(coord).and_then(|i| self.cells.get(i))
    }

    /// Mutable access to the cell at `coord`.
    pub fn get_mut(&mut self, coord: DiscreteCoord) -> Option<&mut T> {
        self.offset(coord).and_then(|i| self.cells.get_mut(i))
    }

    /// Iterate over all cells in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.cells.iter()
    }

    /// Iterate mutably over all cells in row-major order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.cells.iter_mut()
    }

    /// Coordinates of the square window of `radius` cells around `center`,
    /// clipped to the grid, in row-major order.
    pub fn window(&self, center: DiscreteCoord, radius: u32) -> impl Iterator<Item = DiscreteCoord> + use<T> {
        let (ll, ur) = self.window_bounds(center, radius);
        (ll.y..=ur.y).flat_map(move |y| (ll.x..=ur.x).map(move |x| DiscreteCoord::new(x, y)))
    }

    /// Inclusive lower-left and upper-right corners of the clipped window.
    ///
    /// For an empty grid both corners are the origin.
    pub fn window_bounds(&self, center: DiscreteCoord, radius: u32) -> (DiscreteCoord, DiscreteCoord) {
        let max_x = self.width.saturating_sub(1);
        let max_y = self.height.saturating_sub(1);
        let ll = DiscreteCoord::new(
            center.x.saturating_sub(radius).min(max_x),
            center.y.saturating_sub(radius).min(max_y),
        );
        let ur = DiscreteCoord::new(
            center.x.saturating_add(radius).min(max_x),
            center.y.saturating_add(radius).min(max_y),
        );
        (ll, ur)
    }
}
