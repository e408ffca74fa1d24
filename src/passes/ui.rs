//! UI overlay: 2D draws (and the profiler on the profiler camera) appended to
//! the last recorded pass of the camera.

use std::any::Any;

use crate::camera::Camera;
use crate::camera_info::CameraInfo;
use crate::context::RenderingContext;
use crate::errors::Result;
use crate::graph::{PassId, QueueHint, RenderGraph};
use crate::pass_builder::{FrameEnv, PassBuilder, PassLookup, order};

#[derive(Debug, Default)]
pub struct UiPassBuilder;

impl UiPassBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl PassBuilder for UiPassBuilder {
    fn name(&self) -> &'static str {
        "ui"
    }

    fn render_order(&self) -> i32 {
        order::UI
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
        let Some(mut pass) = ctx.last_pass.and_then(|id| graph.pass_mut(id)) else {
            log::warn!("UI pass has no previous render pass to draw into, 2D drawing ignored");
            return Ok(None);
        };

        let profiler = info.is_profiler_camera(env.profiler_camera);
        if profiler {
            pass.show_statistics(true);
        }
        let mut queue = pass.add_queue(QueueHint::Blend, "default");
        queue.add_draw_2d(camera.id);
        if profiler {
            queue.add_profiler(camera.id);
        }

        Ok(Some(pass.id()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
