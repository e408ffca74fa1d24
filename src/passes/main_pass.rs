//! Main Forward Pass
//!
//! Renders opaque and masked geometry lit by the main directional light, then
//! one additive queue per visible local light, then transparent geometry.
//!
//! # Target Selection
//!
//! ```text
//! needs_offscreen?  ── no  ──► windowColor{id} / windowDepthStencil{id}
//!        │
//!       yes ── shading scale? ── yes ──► scaledRadiance{id} / scaledDepthStencil{id}
//!                       └──────── no ──► radianceColor{id} / depthStencil{id}
//! ```
//!
//! With MSAA the pass renders into memoryless multisample targets and resolves
//! the color into the selected target at pass end.
//!
//! Reflection-probe passes (planar probes at runtime, cube probes in the
//! editor) are recorded before the main pass.

use std::any::Any;

use glam::{UVec2, Vec3, Vec4};

use crate::camera::{Camera, CameraId, LightId, ProbeType, ReflectionProbe};
use crate::camera_info::{CameraInfo, DEPTH_STENCIL_FORMAT};
use crate::context::RenderingContext;
use crate::errors::Result;
use crate::graph::{
    LoadOp, PassId, QueueHint, RenderGraph, RenderPassBuilder, ResourceFlags, Residency, SceneFlags, StoreOp,
};
use crate::pass_builder::{FrameEnv, PassBuilder, PassLookup, order};
use crate::passes::shadow::{ShadowPassBuilder, spot_shadow_map_name};

/// Upper bound on reflection probes rendered per camera.
pub const MAX_REFLECTION_PROBES: usize = 4;

const CUBE_FACES: usize = 6;

/// Encodes a linear color as RGBE with a base-1.1 shared exponent.
///
/// `w` carries the biased exponent divided by 255.
#[must_use]
pub fn pack_rgbe(rgb: Vec3) -> Vec4 {
    let max = rgb.max_element();
    let exponent = if max > 1e-4 {
        ((max.ln() / 1.1_f32.ln()).ceil() + 128.0).clamp(0.0, 255.0)
    } else {
        128.0
    };
    let scale = 1.0 / 1.1_f32.powf(exponent - 128.0);
    let encoded = ((rgb * scale).clamp(Vec3::ZERO, Vec3::ONE) * 255.0).round() / 255.0;
    encoded.extend(exponent / 255.0)
}

fn color_rgb(color: wgpu::Color) -> Vec3 {
    Vec3::new(color.r as f32, color.g as f32, color.b as f32)
}

/// Color + depth attachments, shadow-map binding and the opaque queue.
fn add_main_light_targets(
    pass: &mut RenderPassBuilder<'_>,
    info: &CameraInfo,
    camera: CameraId,
    (color, depth): (&str, &str),
    (color_store, depth_store): (StoreOp, StoreOp),
    shadow_map_bound: bool,
    main_light: Option<LightId>,
) {
    pass.set_viewport(info.fill_viewport());

    let color_load = if info.need_clear_color() {
        LoadOp::Clear(info.clear_color())
    } else {
        LoadOp::Load
    };
    pass.add_render_target(color, color_load, color_store);

    let depth_load = if info.need_depth_stencil() {
        LoadOp::Clear(info.depth_clear())
    } else {
        LoadOp::Load
    };
    pass.add_depth_stencil(depth, depth_load, depth_store);

    if shadow_map_bound {
        pass.add_texture(&info.shadow_map(), "cc_shadowMap");
    }

    pass.add_queue(QueueHint::None, "default")
        .add_scene(camera, SceneFlags::OPAQUE | SceneFlags::MASK, main_light);
}

#[derive(Debug, Default)]
pub struct MainPassBuilder;

impl MainPassBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn add_reflection_probe_passes(
        graph: &mut RenderGraph,
        env: &FrameEnv<'_>,
        info: &CameraInfo,
        shadow_map_bound: bool,
        main_light: Option<LightId>,
    ) -> Result<()> {
        let Some(source) = env.resources.reflection_probes.as_deref() else {
            return Ok(());
        };

        let mut rendered = 0;
        for probe in source.probes().into_iter().filter(|p| p.need_render) {
            if rendered == MAX_REFLECTION_PROBES {
                break;
            }
            let size = probe.render_area.max(UVec2::ONE);

            match probe.kind {
                ProbeType::Planar => {
                    if !info.planar_reflection_probe_enabled() {
                        continue;
                    }
                    let color = format!("planarProbeRT{rendered}");
                    let depth = format!("planarProbeDS{rendered}");
                    graph.add_render_window(&color, info.radiance_format(), size.x, size.y, probe.windows[0], None)?;
                    graph.add_depth_stencil(&depth, DEPTH_STENCIL_FORMAT, size.x, size.y, Residency::Memoryless)?;
                    Self::add_probe_pass(
                        graph,
                        info,
                        &probe,
                        format!("planarReflectionProbe{rendered}"),
                        (color.as_str(), depth.as_str()),
                        shadow_map_bound,
                        main_light,
                    );
                }
                ProbeType::Cube => {
                    if !env.resources.editor {
                        continue;
                    }
                    for face in 0..CUBE_FACES {
                        source.update_camera_dir(probe.id, face);
                        let color = format!("cubeProbeRT{rendered}{face}");
                        let depth = format!("cubeProbeDS{rendered}{face}");
                        graph.add_render_window(
                            &color,
                            info.radiance_format(),
                            size.x,
                            size.y,
                            probe.windows[face],
                            None,
                        )?;
                        graph.add_depth_stencil(&depth, DEPTH_STENCIL_FORMAT, size.x, size.y, Residency::Memoryless)?;
                        Self::add_probe_pass(
                            graph,
                            info,
                            &probe,
                            format!("cubeProbe{rendered}{face}"),
                            (color.as_str(), depth.as_str()),
                            shadow_map_bound,
                            main_light,
                        );
                    }
                    source.mark_baked(probe.id);
                }
            }
            rendered += 1;
        }

        if rendered > 0 {
            log::trace!("Recorded {rendered} reflection probe(s)");
        }
        Ok(())
    }

    fn add_probe_pass(
        graph: &mut RenderGraph,
        info: &CameraInfo,
        probe: &ReflectionProbe,
        name: String,
        (color, depth): (&str, &str),
        shadow_map_bound: bool,
        main_light: Option<LightId>,
    ) {
        let size = probe.render_area.max(UVec2::ONE);
        let mut pass = graph.add_render_pass(size.x, size.y, "default");
        pass.set_name(name);

        let color_load = if info.need_clear_color() {
            let rgbe = pack_rgbe(color_rgb(info.clear_color()));
            LoadOp::Clear(wgpu::Color {
                r: f64::from(rgbe.x),
                g: f64::from(rgbe.y),
                b: f64::from(rgbe.z),
                a: f64::from(rgbe.w),
            })
        } else {
            LoadOp::Load
        };
        pass.add_render_target(color, color_load, StoreOp::Store);

        let depth_load = if info.need_depth_stencil() {
            LoadOp::Clear(info.depth_clear())
        } else {
            LoadOp::Load
        };
        pass.add_depth_stencil(depth, depth_load, StoreOp::Discard);

        if shadow_map_bound {
            pass.add_texture(&info.shadow_map(), "cc_shadowMap");
        }

        pass.add_queue(QueueHint::None, "reflect-map").add_scene(
            probe.camera,
            SceneFlags::OPAQUE | SceneFlags::MASK | SceneFlags::REFLECTION_PROBE,
            main_light,
        );
    }
}

impl PassBuilder for MainPassBuilder {
    fn name(&self) -> &'static str {
        "main"
    }

    fn render_order(&self) -> i32 {
        order::MAIN
    }

    fn dependencies(&self) -> &'static [i32] {
        &[order::SHADOW]
    }

    fn window_resize(
        &mut self,
        graph: &mut RenderGraph,
        env: &FrameEnv<'_>,
        info: &CameraInfo,
        _camera: &Camera,
    ) -> Result<()> {
        let (w, h) = (info.width(), info.height());

        let decision = info.needs_offscreen(env.settings);
        if decision.offscreen {
            let (color, depth) = info.main_targets(decision);
            graph.add_render_target(&color, info.radiance_format(), w, h, Residency::Managed)?;
            graph.add_depth_stencil(&depth, DEPTH_STENCIL_FORMAT, w, h, Residency::Persistent)?;
        }

        if info.msaa_enabled() {
            let samples = info.msaa_samples();
            graph.add_texture(
                &info.msaa_radiance(),
                info.radiance_format(),
                w,
                h,
                samples,
                ResourceFlags::COLOR_ATTACHMENT,
                Residency::Memoryless,
            )?;
            graph.add_texture(
                &info.msaa_depth_stencil(),
                DEPTH_STENCIL_FORMAT,
                w,
                h,
                samples,
                ResourceFlags::DEPTH_STENCIL_ATTACHMENT,
                Residency::Memoryless,
            )?;
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
        let shadow = lookup.get::<ShadowPassBuilder>(order::SHADOW)?;
        let shadow_map_bound = shadow.main_light_pass().is_some();
        let main_light = info.main_light().map(|l| l.id);

        Self::add_reflection_probe_passes(graph, env, info, shadow_map_bound, main_light)?;

        let decision = info.needs_offscreen(env.settings);
        let (color, depth) = info.main_targets(decision);
        let (w, h) = (info.width(), info.height());

        let mut pass = if info.msaa_enabled() {
            let msaa_color = info.msaa_radiance();
            let mut pass = graph.add_multisample_render_pass(w, h, info.msaa_samples(), "default");
            pass.set_name("msaaForwardPass");
            // Multisample depth cannot be resolved portably; it is always discarded.
            add_main_light_targets(
                &mut pass,
                info,
                camera.id,
                (msaa_color.as_str(), info.msaa_depth_stencil().as_str()),
                (StoreOp::Discard, StoreOp::Discard),
                shadow_map_bound,
                main_light,
            );
            pass.resolve_render_target(&msaa_color, &color);
            pass
        } else {
            if cfg!(debug_assertions) && color == info.window_color() && depth != info.window_depth_stencil() {
                log::warn!("Default framebuffer cannot use a custom depth-stencil buffer ({depth})");
            }
            // The specular pass of subsurface scattering depth-tests against it.
            let depth_store = if info.ssss_enabled() {
                StoreOp::Store
            } else {
                StoreOp::Discard
            };
            let mut pass = graph.add_render_pass(w, h, "default");
            pass.set_name("forwardPass");
            add_main_light_targets(
                &mut pass,
                info,
                camera.id,
                (color.as_str(), depth.as_str()),
                (StoreOp::Store, depth_store),
                shadow_map_bound,
                main_light,
            );
            pass
        };

        for light in shadow.lights() {
            pass.add_queue(QueueHint::Blend, "forward-add")
                .set_name(light.kind.queue_name())
                .add_scene(camera.id, SceneFlags::BLEND, Some(light.id));
        }

        let max_spot = env.features.max_spot_shadow_maps() as usize;
        for (i, light) in shadow.shadow_enabled_spot_lights().iter().take(max_spot).enumerate() {
            pass.add_texture(&spot_shadow_map_name(i as u32), "cc_spotShadowMap");
            pass.add_queue(QueueHint::Blend, "forward-add")
                .add_scene(camera.id, SceneFlags::BLEND, Some(light.id));
        }

        if info.main_light_planar_shadow_enabled() {
            pass.add_queue(QueueHint::Blend, "planar-shadow").add_scene(
                camera.id,
                SceneFlags::SHADOW_CASTER | SceneFlags::PLANAR_SHADOW | SceneFlags::BLEND,
                main_light,
            );
        }

        let mut transparent = SceneFlags::BLEND;
        if camera.has_geometry_renderer {
            transparent |= SceneFlags::GEOMETRY;
        }
        pass.add_queue(QueueHint::Blend, "default")
            .add_scene(camera.id, transparent, main_light);

        let id = pass.id();
        ctx.color_name = Some(color);
        ctx.depth_stencil_name = Some(depth);
        Ok(Some(id))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgbe_of_black_uses_neutral_exponent() {
        assert_eq!(pack_rgbe(Vec3::ZERO), Vec4::new(0.0, 0.0, 0.0, 128.0 / 255.0));
    }

    #[test]
    fn rgbe_of_unit_color_is_identity() {
        assert_eq!(pack_rgbe(Vec3::ONE), Vec4::new(1.0, 1.0, 1.0, 128.0 / 255.0));
    }

    #[test]
    fn rgbe_exponent_grows_with_intensity() {
        let bright = pack_rgbe(Vec3::new(4.0, 2.0, 1.0));
        assert!(bright.w > 128.0 / 255.0);
        assert!(bright.x <= 1.0 && bright.x > bright.y && bright.y > bright.z);
    }
}
