use crate::solver::gpu::context::GpuContext;
use crate::solver::grid::GridSpec;

/// Interior-sized storage texture the `prepare_render` kernel writes each
/// frame: one texel per cell, all four components raw.
pub struct RenderBridge {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl RenderBridge {
    pub fn new(context: &GpuContext, grid: &GridSpec) -> Self {
        let texture = context.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("render-target"),
            size: wgpu::Extent3d {
                width: grid.nx as u32,
                height: grid.ny as u32,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba32Float,
            usage: wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}
