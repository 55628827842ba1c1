use serde::{Deserialize, Serialize};

use crate::solver::error::SolverError;
use crate::solver::grid::GridSpec;
use crate::solver::init::InitialCondition;

/// Boundary treatment for one grid axis. Configuration, not mutable
/// simulation state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryPolicy {
    /// Mirror the adjacent interior cell, negating the edge-normal momentum.
    Reflective,
    /// Copy the state from the opposite side of the grid.
    Periodic,
    /// Copy the adjacent interior cell unchanged.
    Outflow,
}

impl BoundaryPolicy {
    /// Encoding shared with the WGSL kernels.
    pub fn code(self) -> u32 {
        match self {
            BoundaryPolicy::Reflective => 0,
            BoundaryPolicy::Periodic => 1,
            BoundaryPolicy::Outflow => 2,
        }
    }
}

/// Full configuration surface of the solver. One struct, one generic solver;
/// grid size, stage count and boundary handling are not baked into variants.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SolverConfig {
    pub nx: usize,
    pub ny: usize,
    pub domain_width: f32,
    pub domain_height: f32,
    /// Number of Runge-Kutta stages (1..=3 unless `rk_alpha` is supplied).
    pub rk_stages: usize,
    /// Per-stage Shu-Osher combination coefficients. `None` selects the
    /// built-in SSP table for `rk_stages`.
    pub rk_alpha: Option<Vec<f32>>,
    pub cfl: f32,
    /// Upper bound on dt, also used verbatim when the state is static.
    pub max_dt: f32,
    pub gravity: f32,
    pub boundary_x: BoundaryPolicy,
    pub boundary_y: BoundaryPolicy,
    pub initial: InitialCondition,
    /// Scan the accepted state for NaN/Inf after each frame and log a
    /// warning. Non-fatal.
    pub check_numerics: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            nx: 256,
            ny: 256,
            domain_width: 1.0,
            domain_height: 1.0,
            rk_stages: 2,
            rk_alpha: None,
            cfl: 0.5,
            max_dt: 0.1,
            gravity: 9.81,
            boundary_x: BoundaryPolicy::Reflective,
            boundary_y: BoundaryPolicy::Reflective,
            initial: InitialCondition::default(),
            check_numerics: false,
        }
    }
}

impl SolverConfig {
    pub fn grid(&self) -> GridSpec {
        GridSpec::new(self.nx, self.ny, self.domain_width, self.domain_height)
    }

    /// Resolve the per-stage combination coefficients, validating any
    /// user-supplied table.
    pub fn rk_table(&self) -> Result<Vec<f32>, SolverError> {
        if let Some(alphas) = &self.rk_alpha {
            if alphas.len() != self.rk_stages {
                return Err(SolverError::InvalidConfig(format!(
                    "rk_alpha has {} entries for {} stages",
                    alphas.len(),
                    self.rk_stages
                )));
            }
            for &a in alphas {
                if !a.is_finite() || !(0.0..1.0).contains(&a) {
                    return Err(SolverError::InvalidConfig(format!(
                        "rk_alpha entry {a} outside [0, 1)"
                    )));
                }
            }
            return Ok(alphas.clone());
        }
        rk_alpha_defaults(self.rk_stages).ok_or_else(|| {
            SolverError::InvalidConfig(format!(
                "no built-in RK table for {} stages; supply rk_alpha",
                self.rk_stages
            ))
        })
    }

    pub fn validate(&self) -> Result<(), SolverError> {
        if self.nx == 0 || self.ny == 0 {
            return Err(SolverError::InvalidConfig("grid must be non-empty".into()));
        }
        if !(self.domain_width > 0.0) || !(self.domain_height > 0.0) {
            return Err(SolverError::InvalidConfig(
                "domain extents must be positive".into(),
            ));
        }
        if !(self.cfl > 0.0) {
            return Err(SolverError::InvalidConfig("cfl must be positive".into()));
        }
        if !(self.max_dt > 0.0) {
            return Err(SolverError::InvalidConfig("max_dt must be positive".into()));
        }
        if self.rk_stages == 0 {
            return Err(SolverError::InvalidConfig(
                "at least one RK stage is required".into(),
            ));
        }
        self.rk_table().map(|_| ())
    }
}

/// Built-in Shu-Osher SSP coefficient tables. Stage `s` combines
/// `alpha * initial + (1 - alpha) * substep`.
pub fn rk_alpha_defaults(stages: usize) -> Option<Vec<f32>> {
    match stages {
        1 => Some(vec![0.0]),
        2 => Some(vec![0.0, 0.5]),
        3 => Some(vec![0.0, 0.75, 1.0 / 3.0]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        SolverConfig::default().validate().unwrap();
    }

    #[test]
    fn rk_tables_match_ssp_schemes() {
        assert_eq!(rk_alpha_defaults(1).unwrap(), vec![0.0]);
        assert_eq!(rk_alpha_defaults(2).unwrap(), vec![0.0, 0.5]);
        assert_eq!(rk_alpha_defaults(3).unwrap(), vec![0.0, 0.75, 1.0 / 3.0]);
        assert!(rk_alpha_defaults(4).is_none());
    }

    #[test]
    fn custom_rk_table_must_match_stage_count() {
        let config = SolverConfig {
            rk_stages: 2,
            rk_alpha: Some(vec![0.0]),
            ..Default::default()
        };
        assert!(matches!(
            config.rk_table(),
            Err(SolverError::InvalidConfig(_))
        ));
    }

    #[test]
    fn four_stages_without_table_is_rejected() {
        let config = SolverConfig {
            rk_stages: 4,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
