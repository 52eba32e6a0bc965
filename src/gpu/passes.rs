use std::fmt;

use crate::errors::{FilterError, Result};
use crate::gpu::init::GpuContext;
use crate::gpu::pipelines::{ImageBindGroups, PipelineSet, FULLSCREEN_VERTICES};
use crate::gpu::surface::OutputTarget;
use crate::gpu::texture::ImageTextureSet;
use crate::gpu::types::ImageTexture;
use crate::profiler::{PassStats, Profiler};

/// States of the pass executor. A run walks
/// `Idle -> Tensor -> BlurHorizontal -> BlurVertical -> Composite -> Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PassStage {
    #[default]
    Idle,
    Tensor,
    BlurHorizontal,
    BlurVertical,
    Composite,
}

impl PassStage {
    pub fn next(self) -> PassStage {
        match self {
            PassStage::Idle => PassStage::Tensor,
            PassStage::Tensor => PassStage::BlurHorizontal,
            PassStage::BlurHorizontal => PassStage::BlurVertical,
            PassStage::BlurVertical => PassStage::Composite,
            PassStage::Composite => PassStage::Idle,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PassStage::Idle => "idle",
            PassStage::Tensor => "structure_tensor_pass",
            PassStage::BlurHorizontal => "blur_horizontal_pass",
            PassStage::BlurVertical => "blur_vertical_pass",
            PassStage::Composite => "composite_pass",
        }
    }

    /// Texture the stage renders into; `None` for the surface frame.
    pub fn output_texture(self) -> Option<ImageTexture> {
        match self {
            PassStage::Tensor => Some(ImageTexture::StructureTensor),
            PassStage::BlurHorizontal => Some(ImageTexture::BlurA),
            PassStage::BlurVertical => Some(ImageTexture::BlurB),
            PassStage::Idle | PassStage::Composite => None,
        }
    }
}

impl fmt::Display for PassStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which stages a run submits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPlan {
    /// All four stages, after an image load or when cached tensor outputs are stale.
    Full,
    /// Only the settings-dependent composite; the blurred tensor from the last
    /// full run is still current.
    CompositeOnly,
}

impl RunPlan {
    pub fn stages(self) -> &'static [PassStage] {
        match self {
            RunPlan::Full => &[
                PassStage::Tensor,
                PassStage::BlurHorizontal,
                PassStage::BlurVertical,
                PassStage::Composite,
            ],
            RunPlan::CompositeOnly => &[PassStage::Composite],
        }
    }
}

/// Everything a run reads; borrowed from the session for the duration of one run.
pub struct PassResources<'a> {
    pub ctx: &'a GpuContext,
    pub pipelines: &'a PipelineSet,
    pub bind_groups: &'a ImageBindGroups,
    pub textures: &'a ImageTextureSet,
}

/// Sequences the render passes, one command encoding and submission per stage.
///
/// Stages only ever follow each other in queue-submission order, which is all
/// the synchronization the dependency chain needs.
#[derive(Debug, Default)]
pub struct PassExecutor {
    stage: PassStage,
    profiler: Profiler,
}

impl PassExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> PassStage {
        self.stage
    }

    pub fn stats(&self) -> PassStats {
        self.profiler.get_stats()
    }

    pub fn run(&mut self, res: &PassResources<'_>, output: &mut OutputTarget, plan: RunPlan) -> Result<()> {
        self.stage = PassStage::Idle;
        let result = self.run_stages(res, output, plan);
        if result.is_err() {
            tracing::warn!(stage = %self.stage, ?plan, "pass run aborted");
        }
        self.stage = PassStage::Idle;
        result
    }

    fn run_stages(&mut self, res: &PassResources<'_>, output: &mut OutputTarget, plan: RunPlan) -> Result<()> {
        for &stage in plan.stages() {
            self.enter(stage, plan)?;
            let Some((pipeline, bind_group)) = stage_bindings(stage, res) else {
                continue;
            };
            match stage.output_texture() {
                Some(target) => self.submit(res.ctx, stage, pipeline, bind_group, res.textures.view(target)),
                None => {
                    let frame = output.acquire(&res.ctx.device)?;
                    self.submit(res.ctx, stage, pipeline, bind_group, &frame.view);
                    frame.present();
                }
            }
        }
        self.enter(PassStage::Idle, plan)
    }

    /// Validates and performs a state transition.
    fn enter(&mut self, to: PassStage, plan: RunPlan) -> Result<()> {
        let from = self.stage;
        let skips_to_composite = plan == RunPlan::CompositeOnly && from == PassStage::Idle && to == PassStage::Composite;
        if to != from.next() && !skips_to_composite {
            return Err(FilterError::InvalidOperation {
                message: format!("pass '{to}' cannot follow '{from}'"),
            });
        }
        self.stage = to;
        Ok(())
    }

    fn submit(
        &mut self,
        ctx: &GpuContext,
        stage: PassStage,
        pipeline: &wgpu::RenderPipeline,
        bind_group: &wgpu::BindGroup,
        target: &wgpu::TextureView,
    ) {
        self.profiler.start_timer(stage);

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(stage.label()),
            });

        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(stage.label()),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            rpass.set_pipeline(pipeline);
            rpass.set_bind_group(0, bind_group, &[]);
            rpass.draw(0..FULLSCREEN_VERTICES, 0..1);
        }

        ctx.queue.submit(Some(encoder.finish()));

        self.profiler.increment_counter(stage);
        self.profiler.end_timer(stage);
    }
}

/// Pipeline and bind group a stage draws with; `None` for `Idle`.
fn stage_bindings<'a>(
    stage: PassStage,
    res: &PassResources<'a>,
) -> Option<(&'a wgpu::RenderPipeline, &'a wgpu::BindGroup)> {
    match stage {
        PassStage::Idle => None,
        PassStage::Tensor => Some((&res.pipelines.tensor, &res.bind_groups.tensor)),
        PassStage::BlurHorizontal => Some((&res.pipelines.blur, &res.bind_groups.blur_horizontal)),
        PassStage::BlurVertical => Some((&res.pipelines.blur, &res.bind_groups.blur_vertical)),
        PassStage::Composite => Some((&res.pipelines.composite, &res.bind_groups.composite)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_cycle_back_to_idle() {
        let mut stage = PassStage::Idle;
        let mut visited = Vec::new();
        loop {
            stage = stage.next();
            if stage == PassStage::Idle {
                break;
            }
            visited.push(stage);
        }
        assert_eq!(visited, RunPlan::Full.stages());
    }

    #[test]
    fn full_run_transitions_are_accepted_in_order() {
        let mut executor = PassExecutor::new();
        for &stage in RunPlan::Full.stages() {
            executor.enter(stage, RunPlan::Full).unwrap();
        }
        executor.enter(PassStage::Idle, RunPlan::Full).unwrap();
        assert_eq!(executor.stage(), PassStage::Idle);
    }

    #[test]
    fn out_of_order_transitions_are_rejected() {
        let mut executor = PassExecutor::new();
        assert!(executor.enter(PassStage::BlurHorizontal, RunPlan::Full).is_err());
        assert!(executor.enter(PassStage::Composite, RunPlan::Full).is_err());
        assert_eq!(executor.stage(), PassStage::Idle);

        executor.enter(PassStage::Tensor, RunPlan::Full).unwrap();
        assert!(executor.enter(PassStage::BlurVertical, RunPlan::Full).is_err());
        assert_eq!(executor.stage(), PassStage::Tensor);
    }

    #[test]
    fn composite_only_plan_skips_straight_to_composite() {
        let mut executor = PassExecutor::new();
        assert_eq!(RunPlan::CompositeOnly.stages(), &[PassStage::Composite]);
        executor.enter(PassStage::Composite, RunPlan::CompositeOnly).unwrap();
        executor.enter(PassStage::Idle, RunPlan::CompositeOnly).unwrap();
        assert_eq!(executor.stats().total_submissions(), 0);
    }

    #[test]
    fn output_textures_chain_through_the_blur() {
        assert_eq!(PassStage::Tensor.output_texture(), Some(ImageTexture::StructureTensor));
        assert_eq!(PassStage::BlurHorizontal.output_texture(), Some(ImageTexture::BlurA));
        assert_eq!(PassStage::BlurVertical.output_texture(), Some(ImageTexture::BlurB));
        assert_eq!(PassStage::Composite.output_texture(), None);
    }
}
