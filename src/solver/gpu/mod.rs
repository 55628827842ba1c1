pub mod buffers;
pub mod context;
pub mod graph;
pub mod pipelines;
pub mod readback;
pub mod render;
pub mod solver;

pub use context::GpuContext;
pub use solver::GpuSolver;
