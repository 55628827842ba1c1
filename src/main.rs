use std::path::PathBuf;
use std::str::FromStr;

use swe2::solver::cpu::CpuSolver;
use swe2::solver::gpu::GpuSolver;
use swe2::solver::{SolverConfig, SolverError};

fn parse<T: FromStr>(value: Option<String>, flag: &str) -> Result<T, SolverError> {
    value
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| SolverError::InvalidConfig(format!("{flag} needs a value")))
}

fn main() -> Result<(), SolverError> {
    env_logger::init();

    let mut config = SolverConfig::default();
    let mut frames: u64 = 100;
    let mut use_cpu = false;
    let mut output: Option<PathBuf> = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--cpu" => use_cpu = true,
            "--frames" => frames = parse(args.next(), "--frames")?,
            "--nx" => config.nx = parse(args.next(), "--nx")?,
            "--ny" => config.ny = parse(args.next(), "--ny")?,
            "--cfl" => config.cfl = parse(args.next(), "--cfl")?,
            "--max-dt" => config.max_dt = parse(args.next(), "--max-dt")?,
            "--rk-stages" => config.rk_stages = parse(args.next(), "--rk-stages")?,
            "--check-numerics" => config.check_numerics = true,
            "--output" => output = Some(PathBuf::from(parse::<String>(args.next(), "--output")?)),
            other => {
                return Err(SolverError::InvalidConfig(format!(
                    "unknown argument `{other}`"
                )))
            }
        }
    }

    let snapshot = if use_cpu {
        let mut solver = CpuSolver::new(config)?;
        for _ in 0..frames {
            let dt = solver.step();
            log::debug!("frame {} t={:.6} dt={:.3e}", solver.step_index(), solver.time(), dt);
        }
        log::info!("cpu run done: {} frames, t={:.6}", frames, solver.time());
        solver.export_snapshot()
    } else {
        let mut solver = GpuSolver::new(config)?;
        for _ in 0..frames {
            let dt = solver.step();
            log::debug!("frame {} t={:.6} dt={:.3e}", solver.step_index(), solver.time(), dt);
        }
        log::info!("gpu run done: {} frames, t={:.6}", frames, solver.time());
        solver.export_snapshot()
    };

    if let Some(path) = output {
        snapshot.write_file(&path)?;
        log::info!("state written to {}", path.display());
    }

    Ok(())
}
