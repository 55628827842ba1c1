use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::solver::error::SolverError;
use crate::solver::grid::{GridSpec, K};

/// Debug export of a finished state buffer.
///
/// Interior cells only, row-major, K floats per cell. JSON uses shortest
/// float representation, which round-trips every f32 bit-for-bit, so
/// export-then-import reproduces identical conserved quantities.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub nx: usize,
    pub ny: usize,
    pub time: f64,
    pub step: u64,
    pub fields: Vec<f32>,
}

impl Snapshot {
    /// Capture the interior of a full (ghost-padded) cell array.
    pub fn from_cells(grid: &GridSpec, cells: &[[f32; K]], time: f64, step: u64) -> Self {
        let mut fields = Vec::with_capacity(grid.nx * grid.ny * K);
        for j in grid.interior_y() {
            for i in grid.interior_x() {
                fields.extend_from_slice(&cells[grid.idx(i, j)]);
            }
        }
        Self {
            nx: grid.nx,
            ny: grid.ny,
            time,
            step,
            fields,
        }
    }

    /// Rebuild a full ghost-padded cell array. Ghost cells come back zeroed;
    /// the boundary pass rewrites them before any stencil read.
    pub fn into_cells(&self, grid: &GridSpec) -> Result<Vec<[f32; K]>, SolverError> {
        if self.nx != grid.nx || self.ny != grid.ny || self.fields.len() != self.nx * self.ny * K {
            return Err(SolverError::ShapeMismatch {
                expected_nx: grid.nx,
                expected_ny: grid.ny,
                got_nx: self.nx,
                got_ny: self.ny,
            });
        }
        let mut cells = vec![[0.0; K]; grid.cell_count()];
        let mut src = self.fields.chunks_exact(K);
        for j in grid.interior_y() {
            for i in grid.interior_x() {
                let chunk = src.next().expect("length checked above");
                cells[grid.idx(i, j)].copy_from_slice(chunk);
            }
        }
        Ok(cells)
    }

    pub fn to_json(&self) -> Result<String, SolverError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SolverError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn write_file(&self, path: &Path) -> Result<(), SolverError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn read_file(path: &Path) -> Result<Self, SolverError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_mismatch_is_rejected() {
        let grid = GridSpec::new(4, 4, 1.0, 1.0);
        let snap = Snapshot {
            nx: 8,
            ny: 4,
            time: 0.0,
            step: 0,
            fields: vec![0.0; 8 * 4 * K],
        };
        assert!(matches!(
            snap.into_cells(&grid),
            Err(SolverError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn json_round_trip_is_bit_exact() {
        // Values chosen to exercise non-terminating binary fractions.
        let snap = Snapshot {
            nx: 1,
            ny: 1,
            time: 0.1 + 0.2,
            step: 7,
            fields: vec![0.1_f32, -1.0e-7, 3.14159274, f32::MIN_POSITIVE],
        };
        let restored = Snapshot::from_json(&snap.to_json().unwrap()).unwrap();
        assert_eq!(restored.step, snap.step);
        assert_eq!(restored.time.to_bits(), snap.time.to_bits());
        for (a, b) in restored.fields.iter().zip(&snap.fields) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }
}
