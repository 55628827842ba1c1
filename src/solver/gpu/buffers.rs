use bytemuck::{Pod, Zeroable};

use crate::solver::config::SolverConfig;
use crate::solver::error::SolverError;
use crate::solver::gpu::context::GpuContext;
use crate::solver::grid::{GridSpec, K};

/// Workgroup width of the wave-speed reduction kernel. Must match
/// `reduce_max.wgsl`.
pub const REDUCE_WORKGROUP: u32 = 256;

/// Grid-wide constants, uploaded once. Layout must match the `SimParams`
/// struct in the WGSL kernels.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct SimParams {
    pub nx: u32,
    pub ny: u32,
    pub dx: f32,
    pub dy: f32,
    pub gravity: f32,
    pub bc_x: u32,
    pub bc_y: u32,
    pub _pad: u32,
}

/// Per-stage integration constants, rewritten by the host every frame after
/// the timestep reduction.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct StageParams {
    pub dt: f32,
    pub alpha: f32,
    pub dt_dx: f32,
    pub dt_dy: f32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ReduceParams {
    pub n: u32,
    pub num_partials: u32,
    pub _pad0: u32,
    pub _pad1: u32,
}

/// Every device buffer the solver owns, allocated together and freed
/// together. Nothing else in the solver creates storage buffers.
pub struct StateBufferSet {
    /// Conserved state, one buffer per RK stage plus the frame-initial
    /// stage: `q[0]` holds the accepted state, `q[s + 1]` the output of
    /// stage `s`.
    pub q: Vec<wgpu::Buffer>,
    pub slope_x: wgpu::Buffer,
    pub slope_y: wgpu::Buffer,
    pub flux_x: wgpu::Buffer,
    pub flux_y: wgpu::Buffer,
    pub wave_speed: wgpu::Buffer,
    pub reduce_partials: wgpu::Buffer,
    pub lambda_max: wgpu::Buffer,
    pub sim_params: wgpu::Buffer,
    /// One uniform per RK stage; `compute_rk` binds its own.
    pub stage_params: Vec<wgpu::Buffer>,
    pub reduce_params_pass1: wgpu::Buffer,
    pub reduce_params_pass2: wgpu::Buffer,
    pub num_partials: u32,
}

impl StateBufferSet {
    pub fn allocate(
        context: &GpuContext,
        grid: &GridSpec,
        stages: usize,
    ) -> Result<Self, SolverError> {
        let n = grid.cell_count() as u64;
        let cell_bytes = n * (K as u64) * 4;
        let scalar_bytes = n * 4;

        let limits = context.device.limits();
        let limit = (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);
        if cell_bytes > limit {
            return Err(SolverError::Allocation {
                requested: cell_bytes,
                limit,
            });
        }

        let num_partials = ((n as u32) + REDUCE_WORKGROUP - 1) / REDUCE_WORKGROUP;

        let storage = |label: &str, size: u64| {
            context.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_DST
                    | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            })
        };
        let uniform = |label: &str, size: u64| {
            context.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };

        let q = (0..=stages)
            .map(|s| storage(&format!("state-q{s}"), cell_bytes))
            .collect();
        let stage_params = (0..stages)
            .map(|s| uniform(&format!("stage-params-{s}"), 16))
            .collect();

        Ok(Self {
            q,
            slope_x: storage("slope-x", cell_bytes),
            slope_y: storage("slope-y", cell_bytes),
            flux_x: storage("flux-x", cell_bytes),
            flux_y: storage("flux-y", cell_bytes),
            wave_speed: storage("wave-speed", scalar_bytes),
            reduce_partials: storage("reduce-partials", (num_partials as u64) * 4),
            lambda_max: storage("lambda-max", 4),
            sim_params: uniform("sim-params", std::mem::size_of::<SimParams>() as u64),
            stage_params,
            reduce_params_pass1: uniform("reduce-params-1", 16),
            reduce_params_pass2: uniform("reduce-params-2", 16),
            num_partials,
        })
    }

    /// Upload the grid-wide constants and the reduction extents. Called once
    /// at startup.
    pub fn write_static_params(&self, context: &GpuContext, grid: &GridSpec, config: &SolverConfig) {
        let params = SimParams {
            nx: grid.nx as u32,
            ny: grid.ny as u32,
            dx: grid.dx,
            dy: grid.dy,
            gravity: config.gravity,
            bc_x: config.boundary_x.code(),
            bc_y: config.boundary_y.code(),
            _pad: 0,
        };
        context
            .queue
            .write_buffer(&self.sim_params, 0, bytemuck::bytes_of(&params));

        let n = grid.cell_count() as u32;
        let pass1 = ReduceParams {
            n,
            num_partials: self.num_partials,
            _pad0: 0,
            _pad1: 0,
        };
        let pass2 = ReduceParams {
            n: self.num_partials,
            num_partials: 1,
            _pad0: 0,
            _pad1: 0,
        };
        context
            .queue
            .write_buffer(&self.reduce_params_pass1, 0, bytemuck::bytes_of(&pass1));
        context
            .queue
            .write_buffer(&self.reduce_params_pass2, 0, bytemuck::bytes_of(&pass2));
    }

    pub fn write_stage_params(&self, context: &GpuContext, stage: usize, params: StageParams) {
        context
            .queue
            .write_buffer(&self.stage_params[stage], 0, bytemuck::bytes_of(&params));
    }

    /// Upload a full ghost-padded cell array into the accepted-state buffer.
    pub fn upload_state(&self, context: &GpuContext, cells: &[[f32; K]]) {
        context
            .queue
            .write_buffer(&self.q[0], 0, bytemuck::cast_slice(cells));
    }
}
