//! Scene-side inputs: cameras, render windows, lights and reflection probes.
//!
//! These are plain records filled in by the host each frame. The pipeline
//! only reads them, except for the notifications sent back through
//! [`ReflectionProbeSource`].

use std::cell::RefCell;
use std::sync::Arc;

use bitflags::bitflags;
use glam::{Mat4, UVec2, Vec3, Vec4};

use crate::geometry::Frustum;
use crate::graph::ClearFlags;
use crate::settings::PipelineSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CameraId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LightId(pub u32);

/// What a camera is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CameraUsage {
    Editor,
    GameView,
    SceneView,
    Preview,
    #[default]
    Game,
}

impl CameraUsage {
    /// Editor scene view or asset preview; these resolve the editor settings
    /// override first.
    #[inline]
    #[must_use]
    pub fn is_editor_view(self) -> bool {
        matches!(self, Self::SceneView | Self::Preview)
    }
}

bitflags! {
    /// Visibility layers a camera renders.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct VisibilityLayers: u32 {
        const IGNORE_RAYCAST = 1 << 20;
        const GIZMOS         = 1 << 21;
        const EDITOR         = 1 << 22;
        const UI_3D          = 1 << 23;
        const SCENE_GIZMO    = 1 << 24;
        const UI_2D          = 1 << 25;
        const PROFILER       = 1 << 28;
        const DEFAULT        = 1 << 30;
    }
}

/// Output surface of a camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderWindow {
    pub id: u32,
    pub width: u32,
    pub height: u32,
    /// Backed by a presentable swap chain (as opposed to an offscreen window).
    pub has_swapchain: bool,
}

impl RenderWindow {
    #[must_use]
    pub const fn new(id: u32, width: u32, height: u32) -> Self {
        Self {
            id,
            width,
            height,
            has_swapchain: true,
        }
    }

    #[must_use]
    pub const fn offscreen(id: u32, width: u32, height: u32) -> Self {
        Self {
            id,
            width,
            height,
            has_swapchain: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Lights
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightKind {
    Sphere,
    Spot,
    Point,
    RangedDirectional,
}

impl LightKind {
    /// Queue label used in the forward pass.
    #[must_use]
    pub const fn queue_name(self) -> &'static str {
        match self {
            Self::Sphere => "sphere-light",
            Self::Spot => "spot-light",
            Self::Point => "point-light",
            Self::RangedDirectional => "ranged-directional-light",
        }
    }
}

/// A local light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub id: LightId,
    pub kind: LightKind,
    /// Fully baked lights contribute nothing at runtime.
    pub baked: bool,
    pub position: Vec3,
    pub range: f32,
    pub shadow_enabled: bool,
    /// Node world matrix; bounds ranged directional lights.
    pub world: Mat4,
}

impl Light {
    fn new(id: u32, kind: LightKind, position: Vec3, range: f32) -> Self {
        Self {
            id: LightId(id),
            kind,
            baked: false,
            position,
            range,
            shadow_enabled: false,
            world: Mat4::from_translation(position),
        }
    }

    #[must_use]
    pub fn spot(id: u32, position: Vec3, range: f32) -> Self {
        Self::new(id, LightKind::Spot, position, range)
    }

    #[must_use]
    pub fn sphere(id: u32, position: Vec3, range: f32) -> Self {
        Self::new(id, LightKind::Sphere, position, range)
    }

    #[must_use]
    pub fn point(id: u32, position: Vec3, range: f32) -> Self {
        Self::new(id, LightKind::Point, position, range)
    }

    #[must_use]
    pub fn ranged_directional(id: u32, world: Mat4) -> Self {
        Self {
            world,
            ..Self::new(id, LightKind::RangedDirectional, world.w_axis.truncate(), 0.0)
        }
    }

    #[must_use]
    pub fn with_shadow(mut self) -> Self {
        self.shadow_enabled = true;
        self
    }

    #[must_use]
    pub fn baked(mut self) -> Self {
        self.baked = true;
        self
    }
}

/// The scene's main directional light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub id: LightId,
    pub shadow_enabled: bool,
    /// Number of CSM cascades, `1..=4`.
    pub csm_level: u32,
    /// Fixed-area shadows render into the whole atlas.
    pub shadow_fixed_area: bool,
}

impl DirectionalLight {
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self {
            id: LightId(id),
            shadow_enabled: false,
            csm_level: 1,
            shadow_fixed_area: false,
        }
    }
}

/// Lights of one render scene.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderScene {
    pub main_light: Option<DirectionalLight>,
    pub spot_lights: Vec<Light>,
    pub sphere_lights: Vec<Light>,
    pub point_lights: Vec<Light>,
    pub ranged_dir_lights: Vec<Light>,
}

// ---------------------------------------------------------------------------
// Camera
// ---------------------------------------------------------------------------

/// Everything the pipeline needs to know about one camera for one frame.
#[derive(Debug, Clone)]
pub struct Camera {
    pub id: CameraId,
    pub usage: CameraUsage,
    pub window: Option<RenderWindow>,
    pub scene: Option<Arc<RenderScene>>,
    view: Mat4,
    projection: Mat4,
    view_proj: Mat4,
    pub clear_flags: ClearFlags,
    pub clear_color: wgpu::Color,
    pub clear_depth: f32,
    pub clear_stencil: u32,
    /// Normalized `(x, y, width, height)` viewport.
    pub viewport: Vec4,
    pub visibility: VisibilityLayers,
    pub has_geometry_renderer: bool,
    /// Per-camera settings override.
    pub settings: Option<Arc<PipelineSettings>>,
}

impl Camera {
    #[must_use]
    pub fn new(id: u32, window: RenderWindow, scene: Arc<RenderScene>) -> Self {
        Self {
            id: CameraId(id),
            usage: CameraUsage::Game,
            window: Some(window),
            scene: Some(scene),
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            view_proj: Mat4::IDENTITY,
            clear_flags: ClearFlags::COLOR | ClearFlags::DEPTH_STENCIL,
            clear_color: wgpu::Color::BLACK,
            clear_depth: 1.0,
            clear_stencil: 0,
            viewport: Vec4::new(0.0, 0.0, 1.0, 1.0),
            visibility: VisibilityLayers::all(),
            has_geometry_renderer: false,
            settings: None,
        }
    }

    /// Sets view and projection; the view-projection product is cached.
    pub fn set_view_projection(&mut self, view: Mat4, projection: Mat4) {
        self.view = view;
        self.projection = projection;
        self.view_proj = projection * view;
    }

    #[inline]
    #[must_use]
    pub fn view(&self) -> Mat4 {
        self.view
    }

    #[inline]
    #[must_use]
    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    #[inline]
    #[must_use]
    pub fn view_proj(&self) -> Mat4 {
        self.view_proj
    }

    /// World-space position recovered from the view matrix.
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.view.inverse().w_axis.truncate()
    }

    #[must_use]
    pub fn frustum(&self) -> Frustum {
        Frustum::from_matrix(self.view_proj)
    }

    #[inline]
    #[must_use]
    pub fn main_light(&self) -> Option<DirectionalLight> {
        self.scene.as_ref().and_then(|s| s.main_light)
    }
}

// ---------------------------------------------------------------------------
// Reflection probes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeType {
    Cube,
    Planar,
}

/// A reflection probe that may need rendering this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReflectionProbe {
    pub id: u32,
    pub kind: ProbeType,
    pub need_render: bool,
    /// Render area in pixels.
    pub render_area: UVec2,
    /// Camera the probe renders through.
    pub camera: CameraId,
    /// Planar: realtime target window. Cube: one window per face.
    pub windows: [u32; 6],
}

/// Optional reflection-probe collaborator.
///
/// Probes are read by value; the callbacks let the host update its own probe
/// state (camera direction per cube face, baked flag).
pub trait ReflectionProbeSource {
    fn probes(&self) -> Vec<ReflectionProbe>;

    /// Points the probe camera at the given cube face before it is recorded.
    fn update_camera_dir(&self, probe: u32, face: usize);

    /// Called once all six faces of a cube probe were recorded.
    fn mark_baked(&self, probe: u32);
}

/// In-memory [`ReflectionProbeSource`].
#[derive(Debug, Default)]
pub struct ReflectionProbeList {
    probes: RefCell<Vec<ReflectionProbe>>,
    face_updates: RefCell<Vec<(u32, usize)>>,
}

impl ReflectionProbeList {
    #[must_use]
    pub fn new(probes: Vec<ReflectionProbe>) -> Self {
        Self {
            probes: RefCell::new(probes),
            face_updates: RefCell::default(),
        }
    }

    /// `(probe, face)` pairs passed to `update_camera_dir`, in call order.
    #[must_use]
    pub fn face_updates(&self) -> Vec<(u32, usize)> {
        self.face_updates.borrow().clone()
    }
}

impl ReflectionProbeSource for ReflectionProbeList {
    fn probes(&self) -> Vec<ReflectionProbe> {
        self.probes.borrow().clone()
    }

    fn update_camera_dir(&self, probe: u32, face: usize) {
        self.face_updates.borrow_mut().push((probe, face));
    }

    fn mark_baked(&self, probe: u32) {
        for p in self.probes.borrow_mut().iter_mut().filter(|p| p.id == probe) {
            p.need_render = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_is_recovered_from_view() {
        let mut camera = Camera::new(0, RenderWindow::new(0, 4, 4), Arc::default());
        let eye = Vec3::new(1.0, 2.0, 3.0);
        camera.set_view_projection(Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y), Mat4::IDENTITY);
        assert!((camera.position() - eye).length() < 1e-4);
    }

    #[test]
    fn probe_list_marks_baked() {
        let list = ReflectionProbeList::new(vec![ReflectionProbe {
            id: 3,
            kind: ProbeType::Cube,
            need_render: true,
            render_area: UVec2::splat(128),
            camera: CameraId(9),
            windows: [0; 6],
        }]);
        list.mark_baked(3);
        assert!(!list.probes()[0].need_render);
    }
}
