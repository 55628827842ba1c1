use std::ops::Range;

/// Ghost cells per side. The second-order reconstruction reads one neighbour
/// and the face flux reads reconstructed values one cell further out.
pub const GHOST: usize = 2;

/// Conserved components per cell: h, hu, hv and one spare channel (kept so a
/// cell maps onto a 4-channel float texel).
pub const K: usize = 4;

/// Structured grid dimensions, fixed for the lifetime of a run. All state and
/// scratch buffers share these dimensions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridSpec {
    /// Interior cells in x.
    pub nx: usize,
    /// Interior cells in y.
    pub ny: usize,
    pub dx: f32,
    pub dy: f32,
}

impl GridSpec {
    pub fn new(nx: usize, ny: usize, width: f32, height: f32) -> Self {
        Self {
            nx,
            ny,
            dx: width / nx as f32,
            dy: height / ny as f32,
        }
    }

    /// Cells in x including ghost margin.
    pub fn total_x(&self) -> usize {
        self.nx + 2 * GHOST
    }

    /// Cells in y including ghost margin.
    pub fn total_y(&self) -> usize {
        self.ny + 2 * GHOST
    }

    /// Total cell count including ghosts.
    pub fn cell_count(&self) -> usize {
        self.total_x() * self.total_y()
    }

    /// Row-major flat index.
    #[inline]
    pub fn idx(&self, i: usize, j: usize) -> usize {
        j * self.total_x() + i
    }

    /// Interior column range.
    pub fn interior_x(&self) -> Range<usize> {
        GHOST..GHOST + self.nx
    }

    /// Interior row range.
    pub fn interior_y(&self) -> Range<usize> {
        GHOST..GHOST + self.ny
    }

    /// Reference cell size for the CFL bound.
    pub fn cell_size(&self) -> f32 {
        self.dx.min(self.dy)
    }

    /// Cell-center coordinate in normalized [0, 1] domain units for an
    /// interior cell index.
    pub fn cell_center(&self, i: usize, j: usize) -> (f32, f32) {
        (
            (i as f32 - GHOST as f32 + 0.5) / self.nx as f32,
            (j as f32 - GHOST as f32 + 0.5) / self.ny as f32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexing_is_row_major() {
        let grid = GridSpec::new(8, 4, 1.0, 1.0);
        assert_eq!(grid.total_x(), 12);
        assert_eq!(grid.total_y(), 8);
        assert_eq!(grid.idx(0, 0), 0);
        assert_eq!(grid.idx(3, 2), 2 * 12 + 3);
        assert_eq!(grid.cell_count(), 96);
    }

    #[test]
    fn cell_size_is_min_spacing() {
        let grid = GridSpec::new(10, 20, 1.0, 1.0);
        assert!(grid.dy < grid.dx);
        assert_eq!(grid.cell_size(), grid.dy);
    }
}
