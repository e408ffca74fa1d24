//! Temporal Anti-Aliasing Resolve
//!
//! Blends the jittered current frame with a reprojected history buffer.
//!
//! # History Buffers
//!
//! Two persistent targets per camera, `taaFrame0{window}_{camera}` and
//! `taaFrame1{window}_{camera}`. Which one is read and which one is written
//! follows the ping-pong flag of the
//! [`JitterSequence`](crate::jitter::JitterSequence), so the buffer swap and
//! the jitter sample always advance together:
//!
//! ```text
//! ping_pong = true  : read taaFrame0 ─► resolve ─► write taaFrame1
//! ping_pong = false : read taaFrame1 ─► resolve ─► write taaFrame0
//! ```
//!
//! Cameras sharing a window keep separate buffers and separate state.
//!
//! # Frame Classification
//!
//! | State          | Condition                        | Blend weight          |
//! |----------------|----------------------------------|-----------------------|
//! | `First`        | first frame after a resize       | history ignored       |
//! | `Taa`          | view-projection changed          | `1`                   |
//! | `Ssaa`         | view-projection unchanged        | `1 / static frames`   |
//!
//! A static camera keeps accumulating; any camera motion resets the counter.

use std::any::Any;

use glam::{Mat4, Vec4};
use rustc_hash::FxHashMap;

use crate::camera::{Camera, CameraId};
use crate::camera_info::CameraInfo;
use crate::context::RenderingContext;
use crate::errors::{PipelineError, Result};
use crate::graph::{LoadOp, PassId, QueueHint, RenderGraph, Residency, StoreOp};
use crate::pass_builder::{FrameEnv, PassBuilder, PassLookup, order};

const RESOLVE_PASS: u32 = 4;

/// Per-frame classification, passed to the shader as `taaParams.x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaaMode {
    First = 0,
    Taa = 1,
    Ssaa = 2,
}

/// Temporal state of one camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaaHistory {
    prev_view_proj: Mat4,
    static_frame_count: u32,
    first_frame: bool,
    last_mode: Option<TaaMode>,
}

impl Default for TaaHistory {
    fn default() -> Self {
        Self {
            prev_view_proj: Mat4::IDENTITY,
            static_frame_count: 0,
            first_frame: true,
            last_mode: None,
        }
    }
}

impl TaaHistory {
    /// Classifies the frame rendered with `view_proj` and advances the state.
    pub fn classify(&mut self, view_proj: Mat4) -> TaaMode {
        let mode = if self.first_frame {
            self.first_frame = false;
            self.static_frame_count = 1;
            TaaMode::First
        } else if view_proj == self.prev_view_proj {
            self.static_frame_count += 1;
            TaaMode::Ssaa
        } else {
            self.static_frame_count = 1;
            TaaMode::Taa
        };
        self.last_mode = Some(mode);
        mode
    }

    #[inline]
    #[must_use]
    pub fn static_frame_count(&self) -> u32 {
        self.static_frame_count
    }

    #[inline]
    #[must_use]
    pub fn last_mode(&self) -> Option<TaaMode> {
        self.last_mode
    }

    #[inline]
    #[must_use]
    pub fn prev_view_proj(&self) -> Mat4 {
        self.prev_view_proj
    }

    /// Blend weight of the current frame.
    #[inline]
    #[must_use]
    pub fn blend_weight(&self) -> f32 {
        1.0 / self.static_frame_count.max(1) as f32
    }
}

fn history_name(info: &CameraInfo, camera: CameraId, index: u32) -> String {
    format!("taaFrame{index}{}_{}", info.id(), camera.0)
}

/// `(read, write)` history names for the given ping-pong state.
#[must_use]
pub fn history_targets(info: &CameraInfo, camera: CameraId, ping_pong: bool) -> (String, String) {
    let frame0 = history_name(info, camera, 0);
    let frame1 = history_name(info, camera, 1);
    if ping_pong {
        (frame0, frame1)
    } else {
        (frame1, frame0)
    }
}

#[derive(Debug, Default)]
pub struct TaaPassBuilder {
    histories: FxHashMap<(u32, CameraId), TaaHistory>,
}

impl TaaPassBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// History of `camera` on `window`; `None` until its first resize.
    #[must_use]
    pub fn history(&self, window: u32, camera: CameraId) -> Option<&TaaHistory> {
        self.histories.get(&(window, camera))
    }
}

impl PassBuilder for TaaPassBuilder {
    fn name(&self) -> &'static str {
        "taa"
    }

    fn render_order(&self) -> i32 {
        order::POST
    }

    fn window_resize(
        &mut self,
        graph: &mut RenderGraph,
        _env: &FrameEnv<'_>,
        info: &CameraInfo,
        camera: &Camera,
    ) -> Result<()> {
        for index in [0, 1] {
            graph.add_render_target(
                &history_name(info, camera.id, index),
                info.radiance_format(),
                info.width(),
                info.height(),
                Residency::Persistent,
            )?;
        }
        // Old history no longer matches the new targets.
        self.histories.insert((info.id(), camera.id), TaaHistory::default());
        Ok(())
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
        let Some(history) = self.histories.get_mut(&(info.id(), camera.id)) else {
            log::debug!("TAA history for camera {:?} on window {} not initialized", camera.id, info.id());
            return Ok(ctx.last_pass);
        };
        let Some(util) = env.util_material("TAA") else {
            return Ok(ctx.last_pass);
        };
        let current = ctx
            .color_name()
            .ok_or(PipelineError::NoColorTarget { builder: "taa" })?
            .to_owned();

        let (read, write) = history_targets(info, camera.id, env.jitter.ping_pong());

        let view_proj = camera.view_proj();
        let mode = history.classify(view_proj);
        let motion = history.prev_view_proj() * camera.view().inverse();
        let params = Vec4::new(mode as u32 as f32, history.blend_weight(), 0.0, 0.0);

        let mut pass = graph.add_render_pass(info.width(), info.height(), "taa-resolve");
        pass.set_name("taaResolve")
            .add_render_target(&write, LoadOp::Discard, StoreOp::Store)
            .add_texture(&current, "currentInput")
            .add_texture(&read, "historyInput")
            .add_texture(&info.scene_depth_packed(), "depthInput")
            .set_vec4("taaMotion0", motion.x_axis)
            .set_vec4("taaMotion1", motion.y_axis)
            .set_vec4("taaMotion2", motion.z_axis)
            .set_vec4("taaMotion3", motion.w_axis)
            .set_vec4("taaParams", params);
        pass.add_queue(QueueHint::None, "default")
            .add_fullscreen_quad(util, RESOLVE_PASS);

        history.prev_view_proj = view_proj;
        ctx.color_name = Some(write);
        Ok(Some(pass.id()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
