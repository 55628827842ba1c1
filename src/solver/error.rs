use thiserror::Error;

/// Error taxonomy for the solver core.
///
/// Everything here is structural: a failed allocation, a shape or
/// configuration mistake, or a kernel that does not build. None of these are
/// retried; they propagate to the caller, which decides whether to abort or
/// restart with corrected parameters.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("device buffer allocation of {requested} bytes exceeds limit of {limit} bytes")]
    Allocation { requested: u64, limit: u64 },

    #[error("buffer/grid shape mismatch: expected {expected_nx}x{expected_ny}, got {got_nx}x{got_ny}")]
    ShapeMismatch {
        expected_nx: usize,
        expected_ny: usize,
        got_nx: usize,
        got_ny: usize,
    },

    #[error("kernel `{kernel}` failed to build:\n{log}")]
    Compile { kernel: String, log: String },

    #[error("no kernel named `{0}` in the registry")]
    UnknownKernel(String),

    #[error("no suitable GPU adapter available")]
    NoAdapter,

    #[error("device request failed: {0}")]
    Device(String),

    #[error("invalid solver configuration: {0}")]
    InvalidConfig(String),

    #[error("frame plan is ill-formed: {0}")]
    Plan(String),

    #[error("snapshot serialization failed: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
