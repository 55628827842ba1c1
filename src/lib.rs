pub mod solver;

pub use solver::{
    BoundaryPolicy, GridSpec, InitialCondition, Snapshot, SolverConfig, SolverError,
};
