use std::sync::Arc;

use crate::solver::config::SolverConfig;
use crate::solver::error::SolverError;
use crate::solver::gpu::buffers::{StageParams, StateBufferSet};
use crate::solver::gpu::context::GpuContext;
use crate::solver::gpu::graph::{
    BufferRole, ComputeNode, CopyNode, FramePlan, HostNode, PlanNode,
};
use crate::solver::gpu::pipelines::KernelRegistry;
use crate::solver::gpu::readback::{read_buffer_cached, StagingBufferCache};
use crate::solver::gpu::render::RenderBridge;
use crate::solver::grid::{GridSpec, GHOST, K};
use crate::solver::snapshot::Snapshot;
use crate::solver::timestep::compute_dt;

struct FramePipelines {
    boundary_x: wgpu::ComputePipeline,
    boundary_y: wgpu::ComputePipeline,
    reconstruct: wgpu::ComputePipeline,
    flux: wgpu::ComputePipeline,
    reduce_pass1: wgpu::ComputePipeline,
    reduce_pass2: wgpu::ComputePipeline,
    rk: wgpu::ComputePipeline,
    render: wgpu::ComputePipeline,
}

impl FramePipelines {
    fn resolve(registry: &KernelRegistry) -> Result<Self, SolverError> {
        Ok(Self {
            boundary_x: registry.get("set_boundary_x")?.clone(),
            boundary_y: registry.get("set_boundary_y")?.clone(),
            reconstruct: registry.get("compute_reconstruct")?.clone(),
            flux: registry.get("evaluate_flux")?.clone(),
            reduce_pass1: registry.get("reduce_max_pass1")?.clone(),
            reduce_pass2: registry.get("reduce_max_pass2")?.clone(),
            rk: registry.get("compute_rk")?.clone(),
            render: registry.get("prepare_render")?.clone(),
        })
    }
}

/// Bind groups are created once, against each pipeline's auto layout.
/// Per-stage kernels get one group per stage slot.
struct BindGroups {
    boundary_x: Vec<wgpu::BindGroup>,
    boundary_y: Vec<wgpu::BindGroup>,
    reconstruct: Vec<wgpu::BindGroup>,
    flux: Vec<wgpu::BindGroup>,
    rk: Vec<wgpu::BindGroup>,
    reduce_pass1: wgpu::BindGroup,
    reduce_pass2: wgpu::BindGroup,
    render: wgpu::BindGroup,
}

fn buffer_entry(binding: u32, buffer: &wgpu::Buffer) -> wgpu::BindGroupEntry<'_> {
    wgpu::BindGroupEntry {
        binding,
        resource: buffer.as_entire_binding(),
    }
}

fn make_bind_group(
    device: &wgpu::Device,
    label: &str,
    pipeline: &wgpu::ComputePipeline,
    entries: &[wgpu::BindGroupEntry],
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout: &pipeline.get_bind_group_layout(0),
        entries,
    })
}

impl BindGroups {
    fn create(
        context: &GpuContext,
        pipelines: &FramePipelines,
        buffers: &StateBufferSet,
        render: &RenderBridge,
        stages: usize,
    ) -> Self {
        let device = &context.device;

        let mut boundary_x = Vec::with_capacity(stages);
        let mut boundary_y = Vec::with_capacity(stages);
        let mut reconstruct = Vec::with_capacity(stages);
        let mut flux = Vec::with_capacity(stages);
        let mut rk = Vec::with_capacity(stages);
        for s in 0..stages {
            let q_s = &buffers.q[s];
            boundary_x.push(make_bind_group(
                device,
                "bg-boundary-x",
                &pipelines.boundary_x,
                &[buffer_entry(0, &buffers.sim_params), buffer_entry(1, q_s)],
            ));
            boundary_y.push(make_bind_group(
                device,
                "bg-boundary-y",
                &pipelines.boundary_y,
                &[buffer_entry(0, &buffers.sim_params), buffer_entry(1, q_s)],
            ));
            reconstruct.push(make_bind_group(
                device,
                "bg-reconstruct",
                &pipelines.reconstruct,
                &[
                    buffer_entry(0, &buffers.sim_params),
                    buffer_entry(1, q_s),
                    buffer_entry(2, &buffers.slope_x),
                    buffer_entry(3, &buffers.slope_y),
                ],
            ));
            flux.push(make_bind_group(
                device,
                "bg-flux",
                &pipelines.flux,
                &[
                    buffer_entry(0, &buffers.sim_params),
                    buffer_entry(1, q_s),
                    buffer_entry(2, &buffers.slope_x),
                    buffer_entry(3, &buffers.slope_y),
                    buffer_entry(4, &buffers.flux_x),
                    buffer_entry(5, &buffers.flux_y),
                    buffer_entry(6, &buffers.wave_speed),
                ],
            ));
            rk.push(make_bind_group(
                device,
                "bg-rk",
                &pipelines.rk,
                &[
                    buffer_entry(0, &buffers.sim_params),
                    buffer_entry(1, &buffers.stage_params[s]),
                    buffer_entry(2, q_s),
                    buffer_entry(3, &buffers.q[0]),
                    buffer_entry(4, &buffers.flux_x),
                    buffer_entry(5, &buffers.flux_y),
                    buffer_entry(6, &buffers.q[s + 1]),
                ],
            ));
        }

        let reduce_pass1 = make_bind_group(
            device,
            "bg-reduce-1",
            &pipelines.reduce_pass1,
            &[
                buffer_entry(0, &buffers.reduce_params_pass1),
                buffer_entry(1, &buffers.wave_speed),
                buffer_entry(2, &buffers.reduce_partials),
            ],
        );
        // Pass 2 never references the source array, so its auto layout has
        // no slot for binding 1.
        let reduce_pass2 = make_bind_group(
            device,
            "bg-reduce-2",
            &pipelines.reduce_pass2,
            &[
                buffer_entry(0, &buffers.reduce_params_pass2),
                buffer_entry(2, &buffers.reduce_partials),
                buffer_entry(3, &buffers.lambda_max),
            ],
        );
        let render = make_bind_group(
            device,
            "bg-render",
            &pipelines.render,
            &[
                buffer_entry(0, &buffers.sim_params),
                buffer_entry(1, &buffers.q[0]),
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&render.view),
                },
            ],
        );

        Self {
            boundary_x,
            boundary_y,
            reconstruct,
            flux,
            rk,
            reduce_pass1,
            reduce_pass2,
            render,
        }
    }
}

/// Device-resident solver. Owns every GPU resource and a validated frame
/// plan; `step` replays the plan and advances the clock.
pub struct GpuSolver {
    context: GpuContext,
    grid: GridSpec,
    config: SolverConfig,
    alphas: Vec<f32>,
    pipelines: FramePipelines,
    buffers: StateBufferSet,
    bind: BindGroups,
    render: RenderBridge,
    readback: StagingBufferCache,
    plan: Arc<FramePlan<GpuSolver>>,
    dt: f32,
    time: f64,
    step_index: u64,
}

impl GpuSolver {
    pub fn new(config: SolverConfig) -> Result<Self, SolverError> {
        config.validate()?;
        let grid = config.grid();
        let alphas = config.rk_table()?;

        let context = pollster::block_on(GpuContext::new())?;
        let registry = KernelRegistry::compile(&context)?;
        let pipelines = FramePipelines::resolve(&registry)?;
        let buffers = StateBufferSet::allocate(&context, &grid, alphas.len())?;
        buffers.write_static_params(&context, &grid, &config);
        buffers.upload_state(&context, &config.initial.seed(&grid));
        let render = RenderBridge::new(&context, &grid);
        let bind = BindGroups::create(&context, &pipelines, &buffers, &render, alphas.len());
        let plan = Arc::new(build_frame_plan(alphas.len())?);

        log::info!(
            "gpu solver ready: {}x{} grid, {} RK stages",
            grid.nx,
            grid.ny,
            alphas.len()
        );

        Ok(Self {
            context,
            grid,
            config,
            alphas,
            pipelines,
            buffers,
            bind,
            render,
            readback: StagingBufferCache::default(),
            plan,
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

    pub fn render_view(&self) -> &wgpu::TextureView {
        &self.render.view
    }

    fn state_bytes(&self) -> u64 {
        (self.grid.cell_count() * K * 4) as u64
    }

    /// Advance one frame. Returns the dt used, shared by every stage.
    pub fn step(&mut self) -> f32 {
        let plan = self.plan.clone();
        plan.execute(self, |s| &s.context);
        self.time += self.dt as f64;
        self.step_index += 1;
        if self.config.check_numerics {
            self.check_finite();
        }
        self.dt
    }

    /// Host side of the frame: read the reduced wave speed, derive dt, and
    /// rewrite every stage uniform before the first integration dispatch.
    fn host_compute_dt(&mut self) {
        let bytes = read_buffer_cached(
            &self.context,
            &self.readback,
            &self.buffers.lambda_max,
            4,
            "lambda-readback",
        );
        let lambda = *bytemuck::from_bytes::<f32>(&bytes);
        self.dt = compute_dt(
            lambda,
            self.config.cfl,
            self.grid.cell_size(),
            self.config.max_dt,
        );
        log::debug!(
            "frame {}: lambda_max {} dt {}",
            self.step_index,
            lambda,
            self.dt
        );
        for (s, &alpha) in self.alphas.iter().enumerate() {
            self.buffers.write_stage_params(
                &self.context,
                s,
                StageParams {
                    dt: self.dt,
                    alpha,
                    dt_dx: self.dt / self.grid.dx,
                    dt_dy: self.dt / self.grid.dy,
                },
            );
        }
    }

    /// Full ghost-padded accepted state, read back from the device.
    pub fn read_state(&self) -> Vec<[f32; K]> {
        let bytes = read_buffer_cached(
            &self.context,
            &self.readback,
            &self.buffers.q[0],
            self.state_bytes(),
            "state-readback",
        );
        bytemuck::pod_collect_to_vec(&bytes)
    }

    /// Interior cells, row-major.
    pub fn interior(&self) -> Vec<[f32; K]> {
        let cells = self.read_state();
        let mut out = Vec::with_capacity(self.grid.nx * self.grid.ny);
        for j in self.grid.interior_y() {
            for i in self.grid.interior_x() {
                out.push(cells[self.grid.idx(i, j)]);
            }
        }
        out
    }

    /// Replace the interior of the accepted state. Ghost cells are zeroed
    /// until the next boundary pass.
    pub fn load_interior(&mut self, cells: &[[f32; K]]) -> Result<(), SolverError> {
        if cells.len() != self.grid.nx * self.grid.ny {
            return Err(SolverError::ShapeMismatch {
                expected_nx: self.grid.nx,
                expected_ny: self.grid.ny,
                got_nx: cells.len(),
                got_ny: 1,
            });
        }
        let mut padded = vec![[0.0; K]; self.grid.cell_count()];
        let mut src = cells.iter();
        for j in self.grid.interior_y() {
            for i in self.grid.interior_x() {
                padded[self.grid.idx(i, j)] = *src.next().expect("length checked above");
            }
        }
        self.buffers.upload_state(&self.context, &padded);
        Ok(())
    }

    pub fn export_snapshot(&self) -> Snapshot {
        Snapshot::from_cells(&self.grid, &self.read_state(), self.time, self.step_index)
    }

    pub fn restore_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), SolverError> {
        let cells = snapshot.into_cells(&self.grid)?;
        self.buffers.upload_state(&self.context, &cells);
        self.time = snapshot.time;
        self.step_index = snapshot.step;
        Ok(())
    }

    fn check_finite(&self) {
        let cells = self.read_state();
        for j in self.grid.interior_y() {
            for i in self.grid.interior_x() {
                let cell = cells[self.grid.idx(i, j)];
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
}

fn cells_2d(s: &GpuSolver, _stage: usize) -> (u32, u32, u32) {
    let tx = s.grid.total_x() as u32;
    let ty = s.grid.total_y() as u32;
    ((tx + 7) / 8, (ty + 7) / 8, 1)
}

/// The fixed per-frame node sequence. The timestep reduction runs once, on
/// the stage-0 wave speeds; every stage integrates with the dt it produced.
fn build_frame_plan(stages: usize) -> Result<FramePlan<GpuSolver>, SolverError> {
    use BufferRole::*;

    let mut nodes: Vec<PlanNode<GpuSolver>> = Vec::new();
    for s in 0..stages {
        nodes.push(PlanNode::Compute(ComputeNode {
            label: "set_boundary_x",
            stage: s,
            pipeline: |sv, _| &sv.pipelines.boundary_x,
            bind_group: |sv, s| &sv.bind.boundary_x[s],
            workgroups: |sv, _| (((sv.grid.total_y() as u32) + 63) / 64, 1, 1),
            reads: vec![State(s)],
            writes: vec![State(s)],
        }));
        nodes.push(PlanNode::Compute(ComputeNode {
            label: "set_boundary_y",
            stage: s,
            pipeline: |sv, _| &sv.pipelines.boundary_y,
            bind_group: |sv, s| &sv.bind.boundary_y[s],
            workgroups: |sv, _| (((sv.grid.total_x() as u32) + 63) / 64, 1, 1),
            reads: vec![State(s)],
            writes: vec![State(s)],
        }));
        nodes.push(PlanNode::Compute(ComputeNode {
            label: "compute_reconstruct",
            stage: s,
            pipeline: |sv, _| &sv.pipelines.reconstruct,
            bind_group: |sv, s| &sv.bind.reconstruct[s],
            workgroups: cells_2d,
            reads: vec![State(s)],
            writes: vec![SlopeX, SlopeY],
        }));
        nodes.push(PlanNode::Compute(ComputeNode {
            label: "evaluate_flux",
            stage: s,
            pipeline: |sv, _| &sv.pipelines.flux,
            bind_group: |sv, s| &sv.bind.flux[s],
            workgroups: cells_2d,
            reads: vec![State(s), SlopeX, SlopeY],
            writes: vec![FluxX, FluxY, WaveSpeed],
        }));
        if s == 0 {
            nodes.push(PlanNode::Compute(ComputeNode {
                label: "reduce_max_pass1",
                stage: s,
                pipeline: |sv, _| &sv.pipelines.reduce_pass1,
                bind_group: |sv, _| &sv.bind.reduce_pass1,
                workgroups: |sv, _| (sv.buffers.num_partials, 1, 1),
                reads: vec![WaveSpeed],
                writes: vec![ReducePartials],
            }));
            nodes.push(PlanNode::Compute(ComputeNode {
                label: "reduce_max_pass2",
                stage: s,
                pipeline: |sv, _| &sv.pipelines.reduce_pass2,
                bind_group: |sv, _| &sv.bind.reduce_pass2,
                workgroups: |_, _| (1, 1, 1),
                reads: vec![ReducePartials],
                writes: vec![LambdaMax],
            }));
            nodes.push(PlanNode::Host(HostNode {
                label: "host_compute_dt",
                run: GpuSolver::host_compute_dt,
                reads: vec![LambdaMax],
                writes: vec![Timestep],
            }));
        }
        nodes.push(PlanNode::Compute(ComputeNode {
            label: "compute_rk",
            stage: s,
            pipeline: |sv, _| &sv.pipelines.rk,
            bind_group: |sv, s| &sv.bind.rk[s],
            workgroups: cells_2d,
            reads: vec![State(s), State(0), FluxX, FluxY, Timestep],
            writes: vec![State(s + 1)],
        }));
    }

    // The accepted result becomes next frame's stage 0.
    nodes.push(PlanNode::Copy(CopyNode {
        label: "copy_domain",
        src: |sv| &sv.buffers.q[sv.alphas.len()],
        dst: |sv| &sv.buffers.q[0],
        size: |sv| sv.state_bytes(),
        reads: vec![State(stages)],
        writes: vec![State(0)],
    }));
    nodes.push(PlanNode::Compute(ComputeNode {
        label: "prepare_render",
        stage: 0,
        pipeline: |sv, _| &sv.pipelines.render,
        bind_group: |sv, _| &sv.bind.render,
        workgroups: |sv, _| {
            (
                ((sv.grid.nx as u32) + 7) / 8,
                ((sv.grid.ny as u32) + 7) / 8,
                1,
            )
        },
        reads: vec![State(0)],
        writes: vec![RenderTarget],
    }));

    FramePlan::new(nodes)
}
