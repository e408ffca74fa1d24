//! Post-Process Chain
//!
//! Full-screen effects applied between the scene radiance and the window.
//!
//! ```text
//! ctx.color ─► [pre-TAA effects] ─► TAA ─► [post-TAA effects] ─► FSR ─► window
//!              (bloom, tone map /           (FXAA)                │
//!               color grading)                                    └─ or copyToScreen
//! ```
//!
//! Pre-TAA effects render into the radiance-format intermediates, post-TAA
//! effects into the LDR intermediates. Each bucket ping-pongs between two
//! targets so no pass ever samples the target it writes. When nothing writes
//! the window, a single `copyToScreen` blit does.
//!
//! The chain is skipped when the main pass already rendered into the window.

use std::any::Any;

use glam::Vec2;

use crate::camera::Camera;
use crate::camera_info::{CameraInfo, LDR_COLOR_FORMAT};
use crate::context::RenderingContext;
use crate::errors::{PipelineError, Result};
use crate::graph::{LoadOp, PassId, QueueHint, RenderGraph, Residency, StoreOp};
use crate::pass_builder::{FrameEnv, PassBuilder, PassLookup, order};
use crate::passes::taa::TaaPassBuilder;
use crate::settings::PipelineSettings;

const BLIT_PASS: u32 = 1;

/// One full-screen stage of the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostEffect {
    Bloom,
    ToneMapping,
    ColorGrading,
    Fxaa,
}

impl PostEffect {
    /// Enabled effects, each bucket sorted by render order.
    #[must_use]
    pub fn collect(settings: &PipelineSettings, hdr: bool) -> (Vec<PostEffect>, Vec<PostEffect>) {
        let mut pre = Vec::new();
        if settings.bloom.is_active() {
            pre.push(Self::Bloom);
        }
        if settings.color_grading.is_active() {
            pre.push(Self::ColorGrading);
        } else if hdr {
            pre.push(Self::ToneMapping);
        }

        let mut post = Vec::new();
        if settings.fxaa.is_active() {
            post.push(Self::Fxaa);
        }

        pre.sort_by_key(|e| e.render_order(settings));
        post.sort_by_key(|e| e.render_order(settings));
        (pre, post)
    }

    #[must_use]
    pub fn render_order(self, settings: &PipelineSettings) -> i32 {
        match self {
            Self::Bloom => settings.bloom.render_order,
            Self::ToneMapping => settings.tone_mapping.render_order,
            Self::ColorGrading => settings.color_grading.render_order,
            Self::Fxaa => settings.fxaa.render_order,
        }
    }

    /// Whether the effect runs on scene radiance, before TAA.
    #[must_use]
    pub fn before_taa(self) -> bool {
        !matches!(self, Self::Fxaa)
    }

    fn record(
        self,
        graph: &mut RenderGraph,
        env: &FrameEnv<'_>,
        (width, height): (u32, u32),
        input: &str,
        output: &str,
    ) -> PassId {
        let settings = env.settings;
        match self {
            Self::Bloom => {
                let bloom = &settings.bloom;
                let mut pass = graph.add_render_pass(width, height, "bloom");
                pass.set_name("bloom")
                    .add_render_target(output, LoadOp::Discard, StoreOp::Store)
                    .add_texture(input, "inputTexture")
                    .set_float("threshold", bloom.threshold)
                    .set_float("intensity", bloom.intensity)
                    .set_float("iterations", bloom.iterations as f32)
                    .set_float("enableAlphaMask", if bloom.enable_alpha_mask { 1.0 } else { 0.0 });
                if let Some(material) = bloom.filter_material() {
                    pass.add_queue(QueueHint::None, "default")
                        .add_fullscreen_quad(material, bloom.kind as u32);
                }
                pass.id()
            }
            Self::ToneMapping => {
                let material = settings
                    .tone_mapping
                    .material
                    .or_else(|| env.util_material("tone mapping"));
                let mut pass = graph.add_render_pass(width, height, "tonemap");
                pass.set_name("toneMapping")
                    .add_render_target(output, LoadOp::Discard, StoreOp::Store)
                    .add_texture(input, "inputTexture")
                    .set_float("toneMappingType", env.features.tone_mapping_type() as f32);
                if let Some(material) = material {
                    pass.add_queue(QueueHint::None, "default")
                        .add_fullscreen_quad(material, 0);
                }
                pass.id()
            }
            Self::ColorGrading => {
                let grading = &settings.color_grading;
                let square = grading.color_grading_map.is_some_and(|lut| lut.is_square());
                let lut_size = grading
                    .color_grading_map
                    .map_or(Vec2::ZERO, |lut| Vec2::new(lut.width as f32, lut.height as f32));
                let layout = if square {
                    "cc-color-grading-8x8"
                } else {
                    "cc-color-grading-nx1"
                };
                let mut pass = graph.add_render_pass(width, height, layout);
                pass.set_name("colorGrading")
                    .add_render_target(output, LoadOp::Discard, StoreOp::Store)
                    .add_texture(input, "sceneColorMap")
                    .set_vec2("lutTextureSize", lut_size)
                    .set_float("contribute", grading.contribute);
                if let Some(material) = grading.material {
                    pass.add_queue(QueueHint::None, "default")
                        .add_fullscreen_quad(material, u32::from(square));
                }
                pass.id()
            }
            Self::Fxaa => {
                let mut pass = graph.add_render_pass(width, height, "fxaa");
                pass.set_name("fxaa")
                    .add_render_target(output, LoadOp::Discard, StoreOp::Store)
                    .add_texture(input, "inputTexture");
                if let Some(material) = settings.fxaa.material {
                    pass.add_queue(QueueHint::None, "default")
                        .add_fullscreen_quad(material, 0);
                }
                pass.id()
            }
        }
    }
}

/// Picks the intermediate of a ping-pong pair that is not `current`.
fn next_target<'a>(current: &str, (ping, pong): (&'a str, &'a str)) -> &'a str {
    if current == ping { pong } else { ping }
}

#[derive(Debug, Default)]
pub struct PostProcessPassBuilder {
    taa: TaaPassBuilder,
}

impl PostProcessPassBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn taa(&self) -> &TaaPassBuilder {
        &self.taa
    }

    fn add_fsr_pass(
        graph: &mut RenderGraph,
        env: &FrameEnv<'_>,
        info: &CameraInfo,
        input: &str,
        output: &str,
    ) -> PassId {
        let fsr = &env.settings.fsr;
        let mut pass = graph.add_render_pass(info.native_width(), info.native_height(), "fsr");
        pass.set_name("fsr")
            .add_render_target(output, LoadOp::Discard, StoreOp::Store)
            .add_texture(input, "inputTexture")
            .set_float("sharpness", fsr.sharpness);
        if let Some(material) = fsr.material {
            pass.add_queue(QueueHint::None, "default")
                .add_fullscreen_quad(material, 0);
        }
        pass.id()
    }

    fn add_blit_pass(
        graph: &mut RenderGraph,
        env: &FrameEnv<'_>,
        info: &CameraInfo,
        input: &str,
        output: &str,
    ) -> PassId {
        let mut pass = graph.add_render_pass(info.native_width(), info.native_height(), "screen-blit");
        pass.set_name("copyToScreen")
            .add_render_target(output, LoadOp::Discard, StoreOp::Store)
            .add_texture(input, "inputTexture");
        match env.resources.util_material {
            Some(util) => {
                pass.add_queue(QueueHint::None, "default")
                    .add_fullscreen_quad(util, BLIT_PASS);
            }
            None => log::warn!("Utility material missing, copy to screen has no draw"),
        }
        pass.id()
    }
}

impl PassBuilder for PostProcessPassBuilder {
    fn name(&self) -> &'static str {
        "post"
    }

    fn render_order(&self) -> i32 {
        order::POST
    }

    fn window_resize(
        &mut self,
        graph: &mut RenderGraph,
        env: &FrameEnv<'_>,
        info: &CameraInfo,
        camera: &Camera,
    ) -> Result<()> {
        let (w, h) = (info.width(), info.height());
        for prefix in ["postIntermediate", "postIntermediatePing"] {
            graph.add_render_target(&info.texture_name(prefix), info.radiance_format(), w, h, Residency::Managed)?;
        }
        for prefix in ["postLdrBuffer", "postLdrBufferPing"] {
            graph.add_render_target(&info.texture_name(prefix), LDR_COLOR_FORMAT, w, h, Residency::Managed)?;
        }
        if env.settings.taa.enabled {
            self.taa.window_resize(graph, env, info, camera)?;
        }
        Ok(())
    }

    fn setup(
        &mut self,
        graph: &mut RenderGraph,
        env: &FrameEnv<'_>,
        lookup: &PassLookup<'_>,
        info: &CameraInfo,
        camera: &Camera,
        ctx: &mut RenderingContext,
    ) -> Result<Option<PassId>> {
        let input = ctx
            .color_name()
            .ok_or(PipelineError::NoColorTarget { builder: self.name() })?
            .to_owned();
        let output = info.window_color();
        // Main pass rendered straight into the window.
        if input == output {
            return Ok(ctx.last_pass);
        }

        let size = (info.width(), info.height());
        let radiance = (
            info.texture_name("postIntermediate"),
            info.texture_name("postIntermediatePing"),
        );
        let ldr = (
            info.texture_name("postLdrBuffer"),
            info.texture_name("postLdrBufferPing"),
        );

        let (pre, post) = PostEffect::collect(env.settings, info.hdr_enabled());
        let mut last_pass = ctx.last_pass;
        let mut current = input;

        for effect in pre {
            let target = next_target(&current, (radiance.0.as_str(), radiance.1.as_str())).to_owned();
            last_pass = Some(effect.record(graph, env, size, &current, &target));
            current = target;
        }

        if env.settings.taa.enabled {
            ctx.color_name = Some(current);
            ctx.last_pass = last_pass;
            last_pass = self.taa.setup(graph, env, lookup, info, camera, ctx)?;
            current = ctx
                .color_name()
                .ok_or(PipelineError::NoColorTarget { builder: "taa" })?
                .to_owned();
        }

        for effect in post {
            let target = next_target(&current, (ldr.0.as_str(), ldr.1.as_str())).to_owned();
            last_pass = Some(effect.record(graph, env, size, &current, &target));
            current = target;
        }

        if env.settings.fsr.is_active() {
            last_pass = Some(Self::add_fsr_pass(graph, env, info, &current, &output));
            current.clone_from(&output);
        }

        if current != output {
            last_pass = Some(Self::add_blit_pass(graph, env, info, &current, &output));
        }

        ctx.color_name = Some(output);
        Ok(last_pass)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{MaterialHandle, TextureHandle};

    #[test]
    fn nothing_enabled_means_no_effects() {
        let (pre, post) = PostEffect::collect(&PipelineSettings::default(), false);
        assert!(pre.is_empty() && post.is_empty());
    }

    #[test]
    fn color_grading_replaces_tone_mapping() {
        let mut settings = PipelineSettings::default();
        assert_eq!(PostEffect::collect(&settings, true).0, vec![PostEffect::ToneMapping]);

        settings.color_grading.enabled = true;
        settings.color_grading.material = Some(MaterialHandle(1));
        settings.color_grading.color_grading_map = Some(TextureHandle::new(2, 64, 64));
        assert_eq!(PostEffect::collect(&settings, true).0, vec![PostEffect::ColorGrading]);
    }

    #[test]
    fn buckets_follow_render_order() {
        let mut settings = PipelineSettings::default();
        settings.bloom.enabled = true;
        settings.bloom.material = Some(MaterialHandle(1));
        settings.bloom.render_order = 200;
        settings.fxaa.enabled = true;
        settings.fxaa.material = Some(MaterialHandle(3));

        let (pre, post) = PostEffect::collect(&settings, true);
        assert_eq!(pre, vec![PostEffect::ToneMapping, PostEffect::Bloom]);
        assert_eq!(post, vec![PostEffect::Fxaa]);
        assert!(pre.iter().all(|e| e.before_taa()));
        assert!(!PostEffect::Fxaa.before_taa());
    }

    #[test]
    fn ping_pong_never_returns_current() {
        assert_eq!(next_target("a", ("a", "b")), "b");
        assert_eq!(next_target("b", ("a", "b")), "a");
        assert_eq!(next_target("radianceColor0", ("a", "b")), "a");
    }
}
