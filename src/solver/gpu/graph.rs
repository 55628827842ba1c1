//! Frame execution plan.
//!
//! A frame is a fixed list of nodes: compute dispatches, buffer copies, and
//! host callbacks (the timestep readback). Each node declares which logical
//! buffers it reads and writes, and the plan is validated once at
//! construction: a node may not read an intra-frame buffer that no earlier
//! node has written. The node callbacks are plain `fn` pointers over the
//! solver type, so a plan is data and can be cloned and inspected freely.

use std::collections::HashSet;

use crate::solver::error::SolverError;
use crate::solver::gpu::context::GpuContext;

/// Logical name of a device buffer within a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferRole {
    /// Conserved-state buffer for a stage slot. Slot 0 persists across
    /// frames; higher slots are produced within the frame.
    State(usize),
    SlopeX,
    SlopeY,
    FluxX,
    FluxY,
    WaveSpeed,
    ReducePartials,
    LambdaMax,
    /// Stage uniform holding dt and the combination coefficient, written by
    /// the host after the reduction readback.
    Timestep,
    RenderTarget,
}

impl BufferRole {
    /// Roles that only exist within a frame must be written before read.
    /// `State(0)` carries over from the previous frame (or the initial
    /// seeding) and may be read first.
    fn needs_writer(self) -> bool {
        !matches!(self, BufferRole::State(0))
    }
}

pub struct ComputeNode<S> {
    pub label: &'static str,
    pub stage: usize,
    pub pipeline: fn(&S, usize) -> &wgpu::ComputePipeline,
    pub bind_group: fn(&S, usize) -> &wgpu::BindGroup,
    pub workgroups: fn(&S, usize) -> (u32, u32, u32),
    pub reads: Vec<BufferRole>,
    pub writes: Vec<BufferRole>,
}

pub struct CopyNode<S> {
    pub label: &'static str,
    pub src: fn(&S) -> &wgpu::Buffer,
    pub dst: fn(&S) -> &wgpu::Buffer,
    pub size: fn(&S) -> u64,
    pub reads: Vec<BufferRole>,
    pub writes: Vec<BufferRole>,
}

pub struct HostNode<S> {
    pub label: &'static str,
    pub run: fn(&mut S),
    pub reads: Vec<BufferRole>,
    pub writes: Vec<BufferRole>,
}

pub enum PlanNode<S> {
    Compute(ComputeNode<S>),
    Copy(CopyNode<S>),
    Host(HostNode<S>),
}

impl<S> PlanNode<S> {
    pub fn label(&self) -> &'static str {
        match self {
            PlanNode::Compute(n) => n.label,
            PlanNode::Copy(n) => n.label,
            PlanNode::Host(n) => n.label,
        }
    }

    pub fn reads(&self) -> &[BufferRole] {
        match self {
            PlanNode::Compute(n) => &n.reads,
            PlanNode::Copy(n) => &n.reads,
            PlanNode::Host(n) => &n.reads,
        }
    }

    pub fn writes(&self) -> &[BufferRole] {
        match self {
            PlanNode::Compute(n) => &n.writes,
            PlanNode::Copy(n) => &n.writes,
            PlanNode::Host(n) => &n.writes,
        }
    }
}

/// Check that no node reads an intra-frame role before some earlier node has
/// written it. Multiple writers of one role are legal: nodes run in declared
/// order within a single encoder, where consecutive passes are
/// barrier-ordered, so a later writer simply supersedes an earlier one.
pub fn validate_sequence(seq: &[(&str, &[BufferRole], &[BufferRole])]) -> Result<(), SolverError> {
    let mut written: HashSet<BufferRole> = HashSet::new();
    for (label, reads, writes) in seq {
        for role in *reads {
            if role.needs_writer() && !written.contains(role) {
                return Err(SolverError::Plan(format!(
                    "node `{label}` reads {role:?} before any node writes it"
                )));
            }
        }
        for role in *writes {
            written.insert(*role);
        }
    }
    Ok(())
}

pub struct FramePlan<S> {
    nodes: Vec<PlanNode<S>>,
}

impl<S> FramePlan<S> {
    pub fn new(nodes: Vec<PlanNode<S>>) -> Result<Self, SolverError> {
        let seq: Vec<_> = nodes
            .iter()
            .map(|n| (n.label(), n.reads(), n.writes()))
            .collect();
        validate_sequence(&seq)?;
        Ok(Self { nodes })
    }

    pub fn nodes(&self) -> &[PlanNode<S>] {
        &self.nodes
    }

    /// Run one frame. GPU work accumulates into a single command encoder,
    /// flushed before every host node so the host observes finished writes.
    pub fn execute(&self, state: &mut S, context: fn(&S) -> &GpuContext) {
        let mut encoder: Option<wgpu::CommandEncoder> = None;

        for node in &self.nodes {
            match node {
                PlanNode::Compute(n) => {
                    let enc = encoder.get_or_insert_with(|| {
                        context(state)
                            .device
                            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                                label: Some("frame-plan"),
                            })
                    });
                    let pipeline = (n.pipeline)(state, n.stage);
                    let bind_group = (n.bind_group)(state, n.stage);
                    let (x, y, z) = (n.workgroups)(state, n.stage);
                    let mut pass = enc.begin_compute_pass(&wgpu::ComputePassDescriptor {
                        label: Some(n.label),
                        timestamp_writes: None,
                    });
                    pass.set_pipeline(pipeline);
                    pass.set_bind_group(0, bind_group, &[]);
                    pass.dispatch_workgroups(x, y, z);
                }
                PlanNode::Copy(n) => {
                    let enc = encoder.get_or_insert_with(|| {
                        context(state)
                            .device
                            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                                label: Some("frame-plan"),
                            })
                    });
                    enc.copy_buffer_to_buffer((n.src)(state), 0, (n.dst)(state), 0, (n.size)(state));
                }
                PlanNode::Host(n) => {
                    if let Some(enc) = encoder.take() {
                        context(state).queue.submit(Some(enc.finish()));
                    }
                    (n.run)(state);
                }
            }
        }

        if let Some(enc) = encoder.take() {
            context(state).queue.submit(Some(enc.finish()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_sequence_validates() {
        let seq: &[(&str, &[BufferRole], &[BufferRole])] = &[
            ("reconstruct", &[BufferRole::State(0)], &[BufferRole::SlopeX]),
            (
                "flux",
                &[BufferRole::State(0), BufferRole::SlopeX],
                &[BufferRole::FluxX],
            ),
            ("rk", &[BufferRole::FluxX], &[BufferRole::State(1)]),
        ];
        validate_sequence(seq).unwrap();
    }

    #[test]
    fn read_before_write_is_rejected() {
        let seq: &[(&str, &[BufferRole], &[BufferRole])] = &[
            ("flux", &[BufferRole::SlopeX], &[BufferRole::FluxX]),
        ];
        let err = validate_sequence(seq).unwrap_err();
        assert!(matches!(err, SolverError::Plan(_)));
        assert!(err.to_string().contains("flux"));
    }

    #[test]
    fn sequential_writers_of_one_buffer_are_ordered() {
        // Both boundary passes mutate the same stage buffer back to back;
        // declared order plus encoder barriers makes that well-defined, so
        // the validator must accept it.
        let seq: &[(&str, &[BufferRole], &[BufferRole])] = &[
            ("boundary_x", &[BufferRole::State(0)], &[BufferRole::State(0)]),
            ("boundary_y", &[BufferRole::State(0)], &[BufferRole::State(0)]),
            ("predict", &[BufferRole::State(0)], &[BufferRole::SlopeX]),
            ("correct", &[BufferRole::State(0)], &[BufferRole::SlopeX]),
            ("flux", &[BufferRole::SlopeX], &[BufferRole::FluxX]),
        ];
        validate_sequence(seq).unwrap();
    }

    #[test]
    fn persistent_state_needs_no_writer() {
        let seq: &[(&str, &[BufferRole], &[BufferRole])] = &[
            ("boundary", &[BufferRole::State(0)], &[BufferRole::State(0)]),
        ];
        validate_sequence(seq).unwrap();
    }

    #[test]
    fn later_stage_state_needs_a_writer() {
        let seq: &[(&str, &[BufferRole], &[BufferRole])] = &[
            ("boundary", &[BufferRole::State(1)], &[BufferRole::State(1)]),
        ];
        assert!(validate_sequence(seq).is_err());
    }
}
