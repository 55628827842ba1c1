//! CPU reference implementation of the finite-volume scheme.
//!
//! Mirrors the GPU kernels cell for cell: same boundary handling, same
//! minmod reconstruction, same central-upwind fluxes, same Shu-Osher stage
//! recombination. The test suite exercises the scheme here and the GPU path
//! is validated against it.

use rayon::prelude::*;

use crate::solver::config::{BoundaryPolicy, SolverConfig};
use crate::solver::error::SolverError;
use crate::solver::grid::{GridSpec, GHOST, K};
use crate::solver::snapshot::Snapshot;
use crate::solver::timestep::compute_dt;

pub type Cell = [f32; K];

#[inline]
fn add(a: Cell, b: Cell) -> Cell {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2], a[3] + b[3]]
}

#[inline]
fn sub(a: Cell, b: Cell) -> Cell {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2], a[3] - b[3]]
}

#[inline]
fn scale(a: Cell, s: f32) -> Cell {
    [a[0] * s, a[1] * s, a[2] * s, a[3] * s]
}

/// Scalar minmod of three slope candidates: smallest magnitude if all agree
/// in sign, zero otherwise (TVD property).
pub fn minmod3(a: f32, b: f32, c: f32) -> f32 {
    if a > 0.0 && b > 0.0 && c > 0.0 {
        a.min(b).min(c)
    } else if a < 0.0 && b < 0.0 && c < 0.0 {
        a.max(b).max(c)
    } else {
        0.0
    }
}

#[inline]
fn minmod_cell(a: Cell, b: Cell, c: Cell) -> Cell {
    [
        minmod3(a[0], b[0], c[0]),
        minmod3(a[1], b[1], c[1]),
        minmod3(a[2], b[2], c[2]),
        minmod3(a[3], b[3], c[3]),
    ]
}

/// Physical x-flux of the shallow-water system.
pub fn physical_flux_x(q: Cell, gravity: f32) -> Cell {
    let u = q[1] / q[0];
    [
        q[1],
        q[1] * u + 0.5 * gravity * q[0] * q[0],
        q[2] * u,
        q[3] * u,
    ]
}

/// Physical y-flux of the shallow-water system.
pub fn physical_flux_y(q: Cell, gravity: f32) -> Cell {
    let v = q[2] / q[0];
    [
        q[2],
        q[1] * v,
        q[2] * v + 0.5 * gravity * q[0] * q[0],
        q[3] * v,
    ]
}

/// Per-cell wave-speed magnitude, the eigenvalue bound the CFL condition
/// reduces over.
pub fn wave_speed(q: Cell, gravity: f32) -> f32 {
    let u = q[1] / q[0];
    let v = q[2] / q[0];
    let c = (gravity * q[0]).sqrt();
    (u.abs() + c).max(v.abs() + c)
}

#[inline]
fn cu_combine(fl: Cell, fr: Cell, ql: Cell, qr: Cell, ap: f32, am: f32) -> Cell {
    let d = ap - am;
    if !(d > 0.0) {
        return [0.0; K];
    }
    let mut out = [0.0; K];
    for k in 0..K {
        out[k] = (ap * fl[k] - am * fr[k]) / d + (ap * am / d) * (qr[k] - ql[k]);
    }
    out
}

/// Central-upwind numerical flux through a vertical face, from reconstructed
/// left and right states. One value per face; the two adjacent cells use it
/// with opposite sign, which is what makes the scheme conservative.
pub fn central_upwind_flux_x(ql: Cell, qr: Cell, gravity: f32) -> Cell {
    let ul = ql[1] / ql[0];
    let ur = qr[1] / qr[0];
    let cl = (gravity * ql[0]).sqrt();
    let cr = (gravity * qr[0]).sqrt();
    let ap = (ul + cl).max(ur + cr).max(0.0);
    let am = (ul - cl).min(ur - cr).min(0.0);
    cu_combine(
        physical_flux_x(ql, gravity),
        physical_flux_x(qr, gravity),
        ql,
        qr,
        ap,
        am,
    )
}

/// Central-upwind numerical flux through a horizontal face.
pub fn central_upwind_flux_y(ql: Cell, qr: Cell, gravity: f32) -> Cell {
    let vl = ql[2] / ql[0];
    let vr = qr[2] / qr[0];
    let cl = (gravity * ql[0]).sqrt();
    let cr = (gravity * qr[0]).sqrt();
    let ap = (vl + cl).max(vr + cr).max(0.0);
    let am = (vl - cl).min(vr - cr).min(0.0);
    cu_combine(
        physical_flux_y(ql, gravity),
        physical_flux_y(qr, gravity),
        ql,
        qr,
        ap,
        am,
    )
}

pub struct CpuSolver {
    grid: GridSpec,
    config: SolverConfig,
    alphas: Vec<f32>,
    /// One state buffer per RK stage plus the frame-initial stage.
    q: Vec<Vec<Cell>>,
    sx: Vec<Cell>,
    sy: Vec<Cell>,
    fx: Vec<Cell>,
    fy: Vec<Cell>,
    eig: Vec<f32>,
    dt: f32,
    time: f64,
    step_index: u64,
}

impl CpuSolver {
    pub fn new(config: SolverConfig) -> Result<Self, SolverError> {
        config.validate()?;
        let grid = config.grid();
        let alphas = config.rk_table()?;
        let n = grid.cell_count();
        let mut q = vec![vec![[0.0; K]; n]; alphas.len() + 1];
        q[0] = config.initial.seed(&grid);
        Ok(Self {
            grid,
            config,
            alphas,
            q,
            sx: vec![[0.0; K]; n],
            sy: vec![[0.0; K]; n],
            fx: vec![[0.0; K]; n],
            fy: vec![[0.0; K]; n],
            eig: vec![0.0; n],
            dt: 0.0,
            time: 0.0,
            step_index: 0,
        })
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn step_index(&self) -> u64 {
        self.step_index
    }

    pub fn dt(&self) -> f32 {
        self.dt
    }

    /// Full ghost-padded stage-0 state.
    pub fn state(&self) -> &[Cell] {
        &self.q[0]
    }

    /// Interior cells, row-major.
    pub fn interior(&self) -> Vec<Cell> {
        let mut out = Vec::with_capacity(self.grid.nx * self.grid.ny);
        for j in self.grid.interior_y() {
            for i in self.grid.interior_x() {
                out.push(self.q[0][self.grid.idx(i, j)]);
            }
        }
        out
    }

    /// Replace the interior of the stage-0 state, e.g. for handcrafted test
    /// grids. Ghost cells are zeroed until the next boundary pass.
    pub fn load_interior(&mut self, cells: &[Cell]) -> Result<(), SolverError> {
        if cells.len() != self.grid.nx * self.grid.ny {
            return Err(SolverError::ShapeMismatch {
                expected_nx: self.grid.nx,
                expected_ny: self.grid.ny,
                got_nx: cells.len(),
                got_ny: 1,
            });
        }
        let q0 = &mut self.q[0];
        q0.iter_mut().for_each(|c| *c = [0.0; K]);
        let mut src = cells.iter();
        for j in self.grid.interior_y() {
            for i in self.grid.interior_x() {
                q0[self.grid.idx(i, j)] = *src.next().expect("length checked above");
            }
        }
        Ok(())
    }

    /// Enforce the per-axis boundary policy on a stage buffer in place.
    /// Must run before every reconstruction that reads the buffer.
    pub fn apply_boundary(&mut self, stage: usize) {
        let tx = self.grid.total_x();
        let ty = self.grid.total_y();
        let q = &mut self.q[stage];

        let bc_x = self.config.boundary_x;
        for j in 0..ty {
            let row = j * tx;
            match bc_x {
                BoundaryPolicy::Reflective => {
                    q[row + 1] = mirror_x(q[row + 2]);
                    q[row] = mirror_x(q[row + 3]);
                    q[row + tx - 2] = mirror_x(q[row + tx - 3]);
                    q[row + tx - 1] = mirror_x(q[row + tx - 4]);
                }
                BoundaryPolicy::Periodic => {
                    q[row] = q[row + tx - 4];
                    q[row + 1] = q[row + tx - 3];
                    q[row + tx - 2] = q[row + 2];
                    q[row + tx - 1] = q[row + 3];
                }
                BoundaryPolicy::Outflow => {
                    q[row] = q[row + 2];
                    q[row + 1] = q[row + 2];
                    q[row + tx - 2] = q[row + tx - 3];
                    q[row + tx - 1] = q[row + tx - 3];
                }
            }
        }

        let bc_y = self.config.boundary_y;
        for i in 0..tx {
            match bc_y {
                BoundaryPolicy::Reflective => {
                    q[tx + i] = mirror_y(q[2 * tx + i]);
                    q[i] = mirror_y(q[3 * tx + i]);
                    q[(ty - 2) * tx + i] = mirror_y(q[(ty - 3) * tx + i]);
                    q[(ty - 1) * tx + i] = mirror_y(q[(ty - 4) * tx + i]);
                }
                BoundaryPolicy::Periodic => {
                    q[i] = q[(ty - 4) * tx + i];
                    q[tx + i] = q[(ty - 3) * tx + i];
                    q[(ty - 2) * tx + i] = q[2 * tx + i];
                    q[(ty - 1) * tx + i] = q[3 * tx + i];
                }
                BoundaryPolicy::Outflow => {
                    q[i] = q[2 * tx + i];
                    q[tx + i] = q[2 * tx + i];
                    q[(ty - 2) * tx + i] = q[(ty - 3) * tx + i];
                    q[(ty - 1) * tx + i] = q[(ty - 3) * tx + i];
                }
            }
        }
    }

    fn reconstruct(&mut self, stage: usize) {
        let tx = self.grid.total_x();
        let ty = self.grid.total_y();
        let q = &self.q[stage];
        self.sx
            .par_chunks_mut(tx)
            .zip(self.sy.par_chunks_mut(tx))
            .enumerate()
            .for_each(|(j, (sx_row, sy_row))| {
                if j < 1 || j >= ty - 1 {
                    return;
                }
                for i in 1..tx - 1 {
                    let c = q[j * tx + i];
                    let w = q[j * tx + i - 1];
                    let e = q[j * tx + i + 1];
                    let s = q[(j - 1) * tx + i];
                    let n = q[(j + 1) * tx + i];
                    sx_row[i] = minmod_cell(sub(c, w), scale(sub(e, w), 0.5), sub(e, c));
                    sy_row[i] = minmod_cell(sub(c, s), scale(sub(n, s), 0.5), sub(n, c));
                }
            });
    }

    fn evaluate_fluxes(&mut self, stage: usize) {
        let tx = self.grid.total_x();
        let ty = self.grid.total_y();
        let gravity = self.config.gravity;
        let q = &self.q[stage];
        let sx = &self.sx;
        let sy = &self.sy;
        self.fx
            .par_chunks_mut(tx)
            .zip(self.fy.par_chunks_mut(tx))
            .zip(self.eig.par_chunks_mut(tx))
            .enumerate()
            .for_each(|(j, ((fx_row, fy_row), e_row))| {
                for i in 0..tx {
                    let k = j * tx + i;
                    // Flux through the west face of cell (i, j).
                    if i >= GHOST && i <= tx - GHOST && j >= GHOST && j < ty - GHOST {
                        let ql = add(q[k - 1], scale(sx[k - 1], 0.5));
                        let qr = sub(q[k], scale(sx[k], 0.5));
                        fx_row[i] = central_upwind_flux_x(ql, qr, gravity);
                    }
                    // Flux through the south face of cell (i, j).
                    if j >= GHOST && j <= ty - GHOST && i >= GHOST && i < tx - GHOST {
                        let ql = add(q[k - tx], scale(sy[k - tx], 0.5));
                        let qr = sub(q[k], scale(sy[k], 0.5));
                        fy_row[i] = central_upwind_flux_y(ql, qr, gravity);
                    }
                    if i >= GHOST && i < tx - GHOST && j >= GHOST && j < ty - GHOST {
                        e_row[i] = wave_speed(q[k], gravity);
                    }
                }
            });
    }

    // Not NaN-preserving, matching the device max reduction; the finite scan
    // is the anomaly detector.
    fn lambda_max(&self) -> f32 {
        self.eig.iter().fold(0.0f32, |acc, &v| if v > acc { v } else { acc })
    }

    fn integrate(&mut self, stage: usize) {
        let tx = self.grid.total_x();
        let ty = self.grid.total_y();
        let a = self.alphas[stage];
        let dtdx = self.dt / self.grid.dx;
        let dtdy = self.dt / self.grid.dy;
        let fx = &self.fx;
        let fy = &self.fy;
        let (head, tail) = self.q.split_at_mut(stage + 1);
        let q0 = &head[0];
        let qs = &head[stage];
        tail[0]
            .par_chunks_mut(tx)
            .enumerate()
            .for_each(|(j, row)| {
                if j < GHOST || j >= ty - GHOST {
                    return;
                }
                for i in GHOST..tx - GHOST {
                    let k = j * tx + i;
                    let mut out = [0.0; K];
                    for m in 0..K {
                        let div =
                            dtdx * (fx[k + 1][m] - fx[k][m]) + dtdy * (fy[k + tx][m] - fy[k][m]);
                        out[m] = a * q0[k][m] + (1.0 - a) * (qs[k][m] - div);
                    }
                    row[i] = out;
                }
            });
    }

    /// Advance one frame. Returns the dt used, shared by every stage.
    pub fn step(&mut self) -> f32 {
        let n_rk = self.alphas.len();
        for s in 0..n_rk {
            self.apply_boundary(s);
            self.reconstruct(s);
            self.evaluate_fluxes(s);
            if s == 0 {
                self.dt = compute_dt(
                    self.lambda_max(),
                    self.config.cfl,
                    self.grid.cell_size(),
                    self.config.max_dt,
                );
            }
            self.integrate(s);
        }
        // Accepted result becomes next frame's stage 0.
        let (head, tail) = self.q.split_at_mut(n_rk);
        head[0].copy_from_slice(&tail[0]);
        self.time += self.dt as f64;
        self.step_index += 1;
        if self.config.check_numerics {
            self.check_finite();
        }
        self.dt
    }

    fn check_finite(&self) {
        for j in self.grid.interior_y() {
            for i in self.grid.interior_x() {
                let cell = self.q[0][self.grid.idx(i, j)];
                if cell.iter().any(|v| !v.is_finite()) {
                    log::warn!(
                        "non-finite state at cell ({}, {}) after frame {}",
                        i - GHOST,
                        j - GHOST,
                        self.step_index
                    );
                    return;
                }
            }
        }
    }

    pub fn export_snapshot(&self) -> Snapshot {
        Snapshot::from_cells(&self.grid, &self.q[0], self.time, self.step_index)
    }

    pub fn restore_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), SolverError> {
        let cells = snapshot.into_cells(&self.grid)?;
        self.q[0] = cells;
        self.time = snapshot.time;
        self.step_index = snapshot.step;
        Ok(())
    }
}

#[inline]
fn mirror_x(v: Cell) -> Cell {
    [v[0], -v[1], v[2], v[3]]
}

#[inline]
fn mirror_y(v: Cell) -> Cell {
    [v[0], v[1], -v[2], v[3]]
}
