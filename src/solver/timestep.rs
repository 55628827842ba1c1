/// CFL-stable timestep from the reduced maximum wave speed.
///
/// Computed once per frame; every Runge-Kutta stage of that frame shares the
/// result. A static state (zero maximum wave speed) yields `max_dt` instead
/// of a division by zero; a nonzero wave speed caps the quotient at `max_dt`.
/// A NaN `lambda_max` propagates into the returned dt, but the max reductions
/// feeding it are not NaN-preserving (a NaN cell is simply not the maximum),
/// so state anomalies are detected by the per-frame finite scan, not here.
pub fn compute_dt(lambda_max: f32, cfl: f32, cell_size: f32, max_dt: f32) -> f32 {
    if lambda_max == 0.0 {
        return max_dt;
    }
    let dt = cfl * cell_size / lambda_max;
    if dt > max_dt {
        max_dt
    } else {
        dt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cfl_bound_is_exact() {
        // Exact arithmetic, not just "stable".
        let lambda = 3.5_f32;
        let cfl = 0.45_f32;
        let cell = 0.01_f32;
        assert_eq!(compute_dt(lambda, cfl, cell, 1.0), cfl * cell / lambda);
    }

    #[test]
    fn static_state_returns_max_dt() {
        assert_eq!(compute_dt(0.0, 0.5, 0.01, 0.25), 0.25);
    }

    #[test]
    fn dt_is_clamped_to_max() {
        assert_eq!(compute_dt(1e-9, 0.5, 0.01, 0.25), 0.25);
    }

    #[test]
    fn nan_wave_speed_propagates() {
        assert!(compute_dt(f32::NAN, 0.5, 0.01, 0.25).is_nan());
    }
}
