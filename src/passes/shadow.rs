//! Shadow Pass
//!
//! Culls the scene's local lights against the camera frustum and renders:
//!
//! - the main directional light's cascades into one atlas (`shadowMap{id}`)
//! - up to `max_spot_shadow_maps` spot-light shadow maps (`spotShadowMap{i}`)
//!
//! The culled lists stay cached on the builder for the rest of the frame; the
//! main pass reads them through the pass lookup.
//!
//! # CSM Atlas Layout
//!
//! ```text
//! screen-space Y up (sign > 0)     screen-space Y down (sign < 0)
//! ┌─────────┬─────────┐            ┌─────────┬─────────┐
//! │ level 2 │ level 3 │            │ level 0 │ level 1 │
//! ├─────────┼─────────┤            ├─────────┼─────────┤
//! │ level 0 │ level 1 │            │ level 2 │ level 3 │
//! └─────────┴─────────┘            └─────────┴─────────┘
//! ```
//!
//! A single cascade, or a fixed-area light, uses the whole atlas.

use std::any::Any;

use glam::Vec3;

use crate::camera::{Camera, DirectionalLight, Light, RenderScene};
use crate::camera_info::{CameraInfo, DEPTH_STENCIL_FORMAT};
use crate::context::RenderingContext;
use crate::errors::Result;
use crate::features::PipelineFeatures;
use crate::geometry::{Aabb, Frustum};
use crate::graph::{LoadOp, PassId, QueueHint, RenderGraph, Residency, SceneFlags, StoreOp, Viewport};
use crate::pass_builder::{FrameEnv, PassBuilder, PassLookup, order};

const SHADOW_CASTER_PHASE: &str = "shadow-caster";

#[must_use]
pub fn spot_shadow_map_name(index: u32) -> String {
    format!("spotShadowMap{index}")
}

#[must_use]
pub fn spot_shadow_depth_name(index: u32) -> String {
    format!("spotShadowDepth{index}")
}

/// Cascades that fit the 2x2 shadow atlas.
pub const MAX_CASCADES: u32 = 4;

/// Atlas tile of one cascade.
///
/// `csm_level` is the light's cascade count; `screen_space_sign_y` picks which
/// half of the atlas cascade rows start from.
#[must_use]
pub fn csm_viewport(
    level: u32,
    csm_level: u32,
    fixed_area: bool,
    width: u32,
    height: u32,
    screen_space_sign_y: f32,
) -> Viewport {
    let (w, h) = (width as f32, height as f32);
    let (left, top, vw, vh) = if fixed_area || csm_level == 1 {
        (0.0, 0.0, w, h)
    } else {
        let column = (level % 2) as f32;
        let row = (level / 2) as f32;
        let top = if screen_space_sign_y > 0.0 {
            (1.0 - row) * 0.5 * h
        } else {
            row * 0.5 * h
        };
        (column * 0.5 * w, top, 0.5 * w, 0.5 * h)
    };
    Viewport {
        left: left.trunc().max(0.0) as u32,
        top: top.trunc().max(0.0) as u32,
        width: (vw.trunc() as u32).max(1),
        height: (vh.trunc() as u32).max(1),
    }
}

#[derive(Debug, Default)]
pub struct ShadowPassBuilder {
    lights: Vec<Light>,
    shadow_spot_lights: Vec<Light>,
    main_light_pass: Option<PassId>,
}

impl ShadowPassBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Visible non-shadowed local lights, rebuilt every setup.
    #[must_use]
    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    /// Visible shadow-casting spot lights, nearest first.
    #[must_use]
    pub fn shadow_enabled_spot_lights(&self) -> &[Light] {
        &self.shadow_spot_lights
    }

    /// Cascade pass recorded for the current camera, if any.
    #[must_use]
    pub fn main_light_pass(&self) -> Option<PassId> {
        self.main_light_pass
    }

    /// Frustum-culls every runtime light of `scene`.
    ///
    /// Spot lights that cast shadows go to a separate list, sorted by distance
    /// to `camera_pos` when given (insertion order otherwise).
    pub fn cull_lights(&mut self, scene: &RenderScene, frustum: &Frustum, camera_pos: Option<Vec3>) {
        self.lights.clear();
        self.shadow_spot_lights.clear();

        let visible = |light: &Light| !light.baked && frustum.intersects_sphere(light.position, light.range);

        for light in scene.spot_lights.iter().filter(|l| visible(l)) {
            if light.shadow_enabled {
                self.shadow_spot_lights.push(*light);
            } else {
                self.lights.push(*light);
            }
        }
        self.lights
            .extend(scene.sphere_lights.iter().filter(|l| visible(l)).copied());
        self.lights
            .extend(scene.point_lights.iter().filter(|l| visible(l)).copied());

        for light in &scene.ranged_dir_lights {
            let bounds = Aabb::RANGED_DIRECTIONAL_LIGHT.transform(&light.world);
            if frustum.intersects_aabb(&bounds) {
                self.lights.push(*light);
            }
        }

        if let Some(eye) = camera_pos {
            self.shadow_spot_lights.sort_by(|a, b| {
                a.position
                    .distance_squared(eye)
                    .total_cmp(&b.position.distance_squared(eye))
            });
        }
    }

    fn add_cascaded_shadow_map_pass(
        &mut self,
        graph: &mut RenderGraph,
        features: &PipelineFeatures,
        info: &CameraInfo,
        light: DirectionalLight,
        camera: &Camera,
    ) {
        let csm_level = if features.csm_supported() {
            light.csm_level.min(MAX_CASCADES)
        } else {
            1
        };
        if csm_level == 0 {
            return;
        }

        let size = features.shadow_map_size();
        let mut pass = graph.add_render_pass(size.x, size.y, "default");
        pass.set_name("cascadedShadowMap")
            .add_render_target(&info.shadow_map(), LoadOp::Clear(wgpu::Color::WHITE), StoreOp::Store)
            .add_depth_stencil(&info.shadow_depth(), LoadOp::Clear(Default::default()), StoreOp::Discard);

        for level in 0..csm_level {
            let viewport = csm_viewport(
                level,
                csm_level,
                light.shadow_fixed_area,
                size.x,
                size.y,
                features.screen_space_sign_y(),
            );
            let mut queue = pass.add_queue(QueueHint::None, SHADOW_CASTER_PHASE);
            // WebGPU takes the cascade rectangle from the light frustum itself.
            if !features.is_webgpu() {
                queue.set_viewport(viewport);
            }
            queue
                .add_scene(
                    camera.id,
                    SceneFlags::OPAQUE | SceneFlags::MASK | SceneFlags::SHADOW_CASTER,
                    None,
                )
                .use_light_frustum(light.id, level);
        }
        self.main_light_pass = Some(pass.id());
    }

    fn add_spot_light_shadow_passes(&self, graph: &mut RenderGraph, features: &PipelineFeatures, camera: &Camera) {
        let max = features.max_spot_shadow_maps() as usize;
        let size = features.shadow_map_size();
        for (i, light) in self.shadow_spot_lights.iter().take(max).enumerate() {
            let i = i as u32;
            let mut pass = graph.add_render_pass(size.x, size.y, "default");
            pass.set_name(format!("spotLightShadowPass{i}"))
                .add_render_target(&spot_shadow_map_name(i), LoadOp::Clear(wgpu::Color::WHITE), StoreOp::Store)
                .add_depth_stencil(&spot_shadow_depth_name(i), LoadOp::Clear(Default::default()), StoreOp::Discard);
            pass.add_queue(QueueHint::None, SHADOW_CASTER_PHASE)
                .add_scene(
                    camera.id,
                    SceneFlags::OPAQUE | SceneFlags::MASK | SceneFlags::SHADOW_CASTER,
                    None,
                )
                .use_light_frustum(light.id, 0);
        }
    }
}

impl PassBuilder for ShadowPassBuilder {
    fn name(&self) -> &'static str {
        "shadow"
    }

    fn render_order(&self) -> i32 {
        order::SHADOW
    }

    fn window_resize(
        &mut self,
        graph: &mut RenderGraph,
        env: &FrameEnv<'_>,
        info: &CameraInfo,
        _camera: &Camera,
    ) -> Result<()> {
        let size = env.features.shadow_map_size();
        graph.add_render_target(&info.shadow_map(), info.shadow_map_format(), size.x, size.y, Residency::Managed)?;
        graph.add_depth_stencil(&info.shadow_depth(), DEPTH_STENCIL_FORMAT, size.x, size.y, Residency::Managed)?;

        for i in 0..env.features.max_spot_shadow_maps() {
            graph.add_render_target(
                &spot_shadow_map_name(i),
                env.features.shadow_map_format(),
                size.x,
                size.y,
                Residency::Managed,
            )?;
            graph.add_depth_stencil(
                &spot_shadow_depth_name(i),
                DEPTH_STENCIL_FORMAT,
                size.x,
                size.y,
                Residency::Managed,
            )?;
        }
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
        self.main_light_pass = None;
        let Some(scene) = camera.scene.as_deref() else {
            self.lights.clear();
            self.shadow_spot_lights.clear();
            return Ok(ctx.last_pass);
        };

        graph.set_vec4("g_platform", env.features.platform());

        self.cull_lights(scene, &camera.frustum(), Some(camera.position()));

        if info.main_light_shadow_map_enabled()
            && let Some(light) = info.main_light()
        {
            self.add_cascaded_shadow_map_pass(graph, env.features, info, light, camera);
        }

        if !self.shadow_spot_lights.is_empty() {
            self.add_spot_light_shadow_passes(graph, env.features, camera);
        }

        Ok(ctx.last_pass)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
