pub mod config;
pub mod cpu;
pub mod error;
pub mod gpu;
pub mod grid;
pub mod init;
pub mod snapshot;
pub mod timestep;

pub use config::{BoundaryPolicy, SolverConfig};
pub use error::SolverError;
pub use grid::GridSpec;
pub use init::InitialCondition;
pub use snapshot::Snapshot;
