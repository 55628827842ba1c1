use std::collections::HashMap;

use crate::solver::error::SolverError;
use crate::solver::gpu::context::GpuContext;

/// WGSL sources, compiled as one module each.
const SHADER_SOURCES: &[(&str, &str)] = &[
    ("boundary", include_str!("shaders/boundary.wgsl")),
    ("reconstruct", include_str!("shaders/reconstruct.wgsl")),
    ("flux", include_str!("shaders/flux.wgsl")),
    ("reduce_max", include_str!("shaders/reduce_max.wgsl")),
    ("rk_stage", include_str!("shaders/rk_stage.wgsl")),
    ("render_prep", include_str!("shaders/render_prep.wgsl")),
];

/// Entry point -> owning module.
const KERNELS: &[(&str, &str)] = &[
    ("set_boundary_x", "boundary"),
    ("set_boundary_y", "boundary"),
    ("compute_reconstruct", "reconstruct"),
    ("evaluate_flux", "flux"),
    ("reduce_max_pass1", "reduce_max"),
    ("reduce_max_pass2", "reduce_max"),
    ("compute_rk", "rk_stage"),
    ("prepare_render", "render_prep"),
];

/// Compiled compute pipelines, one per kernel entry point. Compilation
/// failures are caught through device error scopes and surface as
/// `SolverError::Compile` with the shader log attached.
pub struct KernelRegistry {
    pipelines: HashMap<&'static str, wgpu::ComputePipeline>,
}

impl KernelRegistry {
    pub fn compile(context: &GpuContext) -> Result<Self, SolverError> {
        let device = &context.device;

        let mut modules: HashMap<&'static str, wgpu::ShaderModule> = HashMap::new();
        for &(name, source) in SHADER_SOURCES {
            device.push_error_scope(wgpu::ErrorFilter::Validation);
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(name),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
            if let Some(err) = pollster::block_on(device.pop_error_scope()) {
                return Err(SolverError::Compile {
                    kernel: name.to_string(),
                    log: err.to_string(),
                });
            }
            modules.insert(name, module);
        }

        let mut pipelines = HashMap::new();
        for &(entry, module_name) in KERNELS {
            let module = modules
                .get(module_name)
                .ok_or_else(|| SolverError::UnknownKernel(module_name.to_string()))?;
            device.push_error_scope(wgpu::ErrorFilter::Validation);
            let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(entry),
                layout: None,
                module,
                entry_point: Some(entry),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            });
            if let Some(err) = pollster::block_on(device.pop_error_scope()) {
                return Err(SolverError::Compile {
                    kernel: entry.to_string(),
                    log: err.to_string(),
                });
            }
            pipelines.insert(entry, pipeline);
        }

        Ok(Self { pipelines })
    }

    pub fn get(&self, name: &str) -> Result<&wgpu::ComputePipeline, SolverError> {
        self.pipelines
            .get(name)
            .ok_or_else(|| SolverError::UnknownKernel(name.to_string()))
    }
}
