//! Screen-Space Subsurface Scattering
//!
//! Separable skin blur applied to the diffuse radiance of the main pass,
//! followed by a specular pass on top of the blurred result.
//!
//! ```text
//! color ─copy─► sssBlurred ─blur Y─► sssBlend ─blur X─► sssBlurred ─copy─► color
//!                                                                          │
//!                                                      specular (blend) ◄──┘
//! ```
//!
//! Both blur passes sample the packed scene depth written by the prepass and,
//! when registered, the external kernel LUT.

use std::any::Any;

use glam::Vec4;

use crate::camera::Camera;
use crate::camera_info::CameraInfo;
use crate::context::RenderingContext;
use crate::errors::{PipelineError, Result};
use crate::graph::{
    ExternalTexture, LoadOp, PassId, QueueHint, RenderGraph, ResourceFlags, Residency, SceneFlags, StoreOp,
};
use crate::pass_builder::{FrameEnv, PassBuilder, PassLookup, order};
use crate::settings::MaterialHandle;

/// Intermediate format of the blur chain.
pub const SSS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rg11b10Ufloat;

/// Graph name of the externally owned scattering kernel.
pub const KERNEL_LUT: &str = "sssKernelLut";

const COPY_PASS: u32 = 1;
const BLUR_X_PASS: u32 = 2;
const BLUR_Y_PASS: u32 = 3;

#[derive(Debug, Default)]
pub struct SssPassBuilder;

impl SssPassBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn add_blit(
        graph: &mut RenderGraph,
        info: &CameraInfo,
        name: &str,
        input: &str,
        output: &str,
        util: MaterialHandle,
    ) {
        let mut pass = graph.add_render_pass(info.width(), info.height(), "screen-blit");
        pass.set_name(name)
            .set_viewport(info.fill_viewport())
            .add_render_target(output, LoadOp::Discard, StoreOp::Store)
            .add_texture(input, "inputTexture");
        pass.add_queue(QueueHint::None, "default")
            .add_fullscreen_quad(util, COPY_PASS);
    }

    fn add_blur(
        graph: &mut RenderGraph,
        info: &CameraInfo,
        layout: &str,
        name: &str,
        (input, output): (&str, &str),
        sss_info: Vec4,
        util: (MaterialHandle, u32),
    ) {
        let has_lut = graph.has_external_texture(KERNEL_LUT);
        let mut pass = graph.add_render_pass(info.width(), info.height(), layout);
        pass.set_name(name)
            .set_viewport(info.fill_viewport())
            .add_render_target(output, LoadOp::Discard, StoreOp::Store)
            .add_texture(input, "colorInput")
            .add_texture(&info.scene_depth_packed(), "depthInput");
        if has_lut {
            pass.add_texture(KERNEL_LUT, KERNEL_LUT);
        }
        pass.set_vec4("sssInfo", sss_info);
        pass.add_queue(QueueHint::None, "default")
            .add_fullscreen_quad(util.0, util.1);
    }
}

impl PassBuilder for SssPassBuilder {
    fn name(&self) -> &'static str {
        "sss"
    }

    fn render_order(&self) -> i32 {
        order::SSS
    }

    fn window_resize(
        &mut self,
        graph: &mut RenderGraph,
        _env: &FrameEnv<'_>,
        info: &CameraInfo,
        _camera: &Camera,
    ) -> Result<()> {
        if !info.ssss_enabled() {
            return Ok(());
        }
        for prefix in ["sssBlurred", "sssBlend"] {
            graph.add_render_target(
                &info.texture_name(prefix),
                SSS_FORMAT,
                info.width(),
                info.height(),
                Residency::Managed,
            )?;
        }
        Ok(())
    }

    fn update_global_resources(
        &mut self,
        graph: &mut RenderGraph,
        env: &FrameEnv<'_>,
        info: &CameraInfo,
    ) -> Result<()> {
        if !info.ssss_enabled() {
            return Ok(());
        }
        match env.settings.sss.lut_texture {
            Some(lut) => graph.add_external_texture(
                KERNEL_LUT,
                ExternalTexture {
                    id: lut.id,
                    width: lut.width,
                    height: lut.height,
                    format: wgpu::TextureFormat::Rgba8Unorm,
                },
                ResourceFlags::SAMPLED,
            ),
            None => {
                log::warn!("SSS kernel LUT texture not set; blurring without it");
                Ok(())
            }
        }
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
        if !info.ssss_enabled() {
            return Ok(ctx.last_pass);
        }
        let Some(util) = env.util_material("SSSS") else {
            return Ok(ctx.last_pass);
        };
        let color = ctx
            .color_name()
            .ok_or(PipelineError::NoColorTarget { builder: self.name() })?
            .to_owned();
        let depth = ctx
            .depth_stencil_name()
            .ok_or(PipelineError::NoDepthStencilTarget { builder: self.name() })?
            .to_owned();

        let blurred = info.texture_name("sssBlurred");
        let blend = info.texture_name("sssBlend");
        let sss_info = Vec4::new(env.settings.sss.quality.as_f32(), 0.0, 0.0, 0.0);

        Self::add_blit(graph, info, "sssCopyDiffuse", &color, &blurred, util);
        Self::add_blur(
            graph,
            info,
            "ssss-blur-y",
            "ssssBlurY",
            (blurred.as_str(), blend.as_str()),
            sss_info,
            (util, BLUR_Y_PASS),
        );
        Self::add_blur(
            graph,
            info,
            "ssss-blur-x",
            "ssssBlurX",
            (blend.as_str(), blurred.as_str()),
            sss_info,
            (util, BLUR_X_PASS),
        );
        Self::add_blit(graph, info, "sssCopyBlurred", &blurred, &color, util);

        let mut specular = graph.add_render_pass(info.width(), info.height(), "default");
        specular
            .set_name("sssSpecular")
            .set_viewport(info.fill_viewport())
            .add_render_target(&color, LoadOp::Load, StoreOp::Store)
            .add_depth_stencil(&depth, LoadOp::Load, StoreOp::Discard);
        specular
            .add_queue(QueueHint::Blend, "specular-pass")
            .add_scene(camera.id, SceneFlags::BLEND, info.main_light().map(|l| l.id));

        Ok(Some(specular.id()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::camera::{RenderScene, RenderWindow};
    use crate::features::{PipelineFeatures, PipelineSceneData, StaticDevice};
    use crate::jitter::JitterSequence;
    use crate::pass_builder::{PassRegistry, PipelineResources};
    use crate::settings::PipelineSettings;
    use crate::window_info::WindowInfoRegistry;

    #[test]
    fn missing_depth_is_reported_as_depth() {
        let settings = PipelineSettings::default();
        let mut features = PipelineFeatures::default();
        features.reset(
            &StaticDevice::desktop(),
            &PipelineSceneData {
                skin_enabled: true,
                ..Default::default()
            },
        );
        let camera = Camera::new(1, RenderWindow::new(1, 64, 64), Arc::new(RenderScene::default()));
        let mut info = CameraInfo::default();
        info.reset(&camera, &settings, &features, &mut WindowInfoRegistry::new());
        assert!(info.ssss_enabled());

        let jitter = JitterSequence::new();
        let resources = PipelineResources {
            util_material: Some(MaterialHandle(1)),
            ..Default::default()
        };
        let env = FrameEnv {
            settings: &settings,
            features: &features,
            jitter: &jitter,
            resources: &resources,
            profiler_camera: None,
        };

        let mut ctx = RenderingContext::new();
        ctx.color_name = Some(info.radiance_color());
        let mut graph = RenderGraph::new();
        let builders: Vec<Box<dyn PassBuilder>> = vec![Box::new(SssPassBuilder::new())];
        let mut registry = PassRegistry::new(builders).unwrap();
        let mut result = None;
        registry.for_each_with_lookup(|builder, lookup| {
            result = Some(builder.setup(&mut graph, &env, lookup, &info, &camera, &mut ctx));
        });

        assert!(matches!(
            result,
            Some(Err(PipelineError::NoDepthStencilTarget { builder: "sss" }))
        ));
        assert!(graph.passes().is_empty());
    }
}
