//! Depth Pre Pass
//!
//! Packs scene depth into a persistent RGBA16F target before the main pass.
//! Consumers are the TAA resolve (`depthInput`) and the SSSS blur chain; when
//! neither runs, nothing is recorded.
//!
//! # Data Flow
//! ```text
//! opaque + mask → PrePass → sceneDepthPacked{id}
//! ```

use std::any::Any;

use crate::camera::Camera;
use crate::camera_info::{CameraInfo, DEPTH_STENCIL_FORMAT, HDR_RADIANCE_FORMAT};
use crate::context::RenderingContext;
use crate::errors::Result;
use crate::graph::{LoadOp, PassId, QueueHint, RenderGraph, Residency, SceneFlags, StoreOp};
use crate::pass_builder::{FrameEnv, PassBuilder, PassLookup, order};

/// Format of the packed scene depth target.
pub const PACKED_DEPTH_FORMAT: wgpu::TextureFormat = HDR_RADIANCE_FORMAT;

#[derive(Debug, Default)]
pub struct PrePassBuilder;

impl PrePassBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Whether any later stage samples the packed depth.
    #[must_use]
    pub fn is_needed(env: &FrameEnv<'_>, info: &CameraInfo) -> bool {
        env.settings.taa.enabled || info.ssss_enabled()
    }
}

impl PassBuilder for PrePassBuilder {
    fn name(&self) -> &'static str {
        "prepass"
    }

    fn render_order(&self) -> i32 {
        order::PRE
    }

    fn window_resize(
        &mut self,
        graph: &mut RenderGraph,
        env: &FrameEnv<'_>,
        info: &CameraInfo,
        _camera: &Camera,
    ) -> Result<()> {
        if !Self::is_needed(env, info) {
            return Ok(());
        }
        graph.add_render_target(
            &info.scene_depth_packed(),
            PACKED_DEPTH_FORMAT,
            info.width(),
            info.height(),
            Residency::Persistent,
        )?;
        graph.add_depth_stencil(
            &info.texture_name("prepassDepth"),
            DEPTH_STENCIL_FORMAT,
            info.width(),
            info.height(),
            Residency::Memoryless,
        )
    }

    fn setup(
        &mut self,
        graph: &mut RenderGraph,
        env: &FrameEnv<'_>,
        _lookup: &PassLookup<'_>,
        info: &CameraInfo,
        camera: &Camera,
        ctx: &mut RenderingContext,
    ) -> Result<Option<PassId>> {
        let decision = info.needs_offscreen(env.settings);
        let (_, depth) = info.main_targets(decision);
        ctx.depth_stencil_name = Some(depth);

        if !Self::is_needed(env, info) {
            return Ok(ctx.last_pass);
        }

        let mut pass = graph.add_render_pass(info.width(), info.height(), "default");
        pass.set_name("prepassDepth")
            .set_viewport(info.fill_viewport())
            .add_render_target(
                &info.scene_depth_packed(),
                LoadOp::Clear(wgpu::Color::TRANSPARENT),
                StoreOp::Store,
            )
            .add_depth_stencil(
                &info.texture_name("prepassDepth"),
                LoadOp::Clear(Default::default()),
                StoreOp::Discard,
            );
        pass.add_queue(QueueHint::Opaque, "prepass")
            .add_scene(camera.id, SceneFlags::OPAQUE | SceneFlags::MASK, None);

        Ok(Some(pass.id()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
