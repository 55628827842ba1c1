use std::collections::HashMap;
use std::sync::Mutex;

use crate::solver::gpu::context::GpuContext;

/// Reusable staging buffers keyed by size, so per-frame readbacks do not
/// allocate.
#[derive(Default)]
pub struct StagingBufferCache {
    buffers: Mutex<HashMap<u64, wgpu::Buffer>>,
}

impl StagingBufferCache {
    pub fn take_or_create(
        &self,
        device: &wgpu::Device,
        size: u64,
        label: &'static str,
    ) -> wgpu::Buffer {
        if let Some(buffer) = self.buffers.lock().unwrap().remove(&size) {
            return buffer;
        }
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    pub fn put(&self, size: u64, buffer: wgpu::Buffer) {
        self.buffers.lock().unwrap().insert(size, buffer);
    }
}

/// Copy `size` bytes of `buffer` to the host, blocking until the map
/// completes.
pub fn read_buffer_cached(
    context: &GpuContext,
    cache: &StagingBufferCache,
    buffer: &wgpu::Buffer,
    size: u64,
    label: &'static str,
) -> Vec<u8> {
    let staging_buffer = cache.take_or_create(&context.device, size, label);

    let mut encoder = context
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    encoder.copy_buffer_to_buffer(buffer, 0, &staging_buffer, 0, size);
    context.queue.submit(Some(encoder.finish()));

    let slice = staging_buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |v| tx.send(v).unwrap());
    let _ = context.device.poll(wgpu::PollType::wait());
    rx.recv().unwrap().unwrap();

    let data = slice.get_mapped_range();
    let result = data.to_vec();
    drop(data);
    staging_buffer.unmap();

    cache.put(size, staging_buffer);
    result
}
