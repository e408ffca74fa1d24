//! Per-camera derived state.
//!
//! [`CameraInfo`] is recomputed for every camera every frame from the camera,
//! the resolved settings and the feature snapshot. Nothing in it survives the
//! frame except what the [`WindowInfoRegistry`] caches.
//!
//! Resource names are keyed by render-window id so cameras sharing a window
//! share their targets.

use wgpu::TextureFormat;

use crate::camera::{Camera, CameraId, CameraUsage, DirectionalLight};
use crate::features::PipelineFeatures;
use crate::graph::{ClearFlags, DepthClear, Viewport};
use crate::settings::PipelineSettings;
use crate::window_info::{WindowInfo, WindowInfoRegistry};

pub const DEPTH_STENCIL_FORMAT: TextureFormat = TextureFormat::Depth24PlusStencil8;
pub const HDR_RADIANCE_FORMAT: TextureFormat = TextureFormat::Rgba16Float;
pub const LDR_COLOR_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;

/// Outcome of the offscreen-vs-window decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OffscreenDecision {
    /// Render resolution differs from native (shading scale active).
    pub shading_scale: bool,
    /// Main pass renders to an offscreen target instead of the window.
    pub offscreen: bool,
}

/// Everything that shapes the resources one camera declares on its window.
/// A change means that camera needs a new declaration phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeclarationKey {
    pub native_width: u32,
    pub native_height: u32,
    pub width: u32,
    pub height: u32,
    pub radiance_format: TextureFormat,
    pub offscreen: OffscreenDecision,
    pub msaa_samples: Option<u32>,
    pub ssss: bool,
    pub taa: bool,
    pub shadow_map_format: TextureFormat,
    pub shadow_map_size: glam::UVec2,
    pub max_spot_shadow_maps: u32,
}

/// Derived per-camera state, reset once per camera per frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraInfo {
    window: WindowInfo,
    camera: CameraId,
    usage: CameraUsage,
    radiance_format: TextureFormat,
    hdr: bool,
    ssss: bool,
    shadow_map_format: TextureFormat,
    main_light: Option<DirectionalLight>,
    main_light_shadow_map: bool,
    main_light_planar_shadow: bool,
    planar_probe: bool,
    msaa: bool,
    msaa_samples: u32,
    is_main_game_window: bool,
    is_game_view: bool,
    clear_flags: ClearFlags,
    clear_color: wgpu::Color,
    depth_clear: DepthClear,
    viewport: glam::Vec4,
}

impl Default for CameraInfo {
    fn default() -> Self {
        Self {
            window: WindowInfo::default(),
            camera: CameraId(u32::MAX),
            usage: CameraUsage::Game,
            radiance_format: LDR_COLOR_FORMAT,
            hdr: false,
            ssss: false,
            shadow_map_format: LDR_COLOR_FORMAT,
            main_light: None,
            main_light_shadow_map: false,
            main_light_planar_shadow: false,
            planar_probe: false,
            msaa: false,
            msaa_samples: 1,
            is_main_game_window: false,
            is_game_view: false,
            clear_flags: ClearFlags::empty(),
            clear_color: wgpu::Color::BLACK,
            depth_clear: DepthClear::default(),
            viewport: glam::Vec4::new(0.0, 0.0, 1.0, 1.0),
        }
    }
}

impl CameraInfo {
    /// Recomputes every field for `camera`. The camera must have a window.
    pub fn reset(
        &mut self,
        camera: &Camera,
        settings: &PipelineSettings,
        features: &PipelineFeatures,
        windows: &mut WindowInfoRegistry,
    ) {
        let scale = settings.effective_shading_scale();
        if let Some(window) = camera.window.as_ref() {
            let cached = windows.update(window, scale);
            self.window = WindowInfo::new(cached.id(), cached.native_width(), cached.native_height(), scale);
        }

        self.camera = camera.id;
        self.usage = camera.usage;

        self.hdr = features.is_hdr();
        self.radiance_format = if self.hdr {
            HDR_RADIANCE_FORMAT
        } else {
            LDR_COLOR_FORMAT
        };
        self.shadow_map_format = features.shadow_map_format();

        self.main_light = camera.main_light();
        let light_casts = self.main_light.is_some_and(|l| l.shadow_enabled);
        self.main_light_shadow_map = features.shadow_enabled() && !features.use_planar_shadow() && light_casts;
        self.main_light_planar_shadow = features.shadow_enabled() && features.use_planar_shadow() && light_casts;

        let has_swapchain = camera.window.is_some_and(|w| w.has_swapchain);
        self.is_main_game_window = camera.usage == CameraUsage::Game && has_swapchain;
        self.is_game_view = self.is_main_game_window || camera.usage == CameraUsage::GameView;
        self.planar_probe = self.is_main_game_window
            || matches!(camera.usage, CameraUsage::SceneView | CameraUsage::GameView);

        self.msaa = settings.msaa.enabled && !features.is_webgl1();
        self.msaa_samples = if self.msaa {
            settings.msaa.sample_count
        } else {
            1
        };
        // The blur chain reads single-sample depth, which MSAA discards.
        self.ssss = features.ssss_enabled() && !self.msaa;

        self.clear_flags = camera.clear_flags;
        self.clear_color = camera.clear_color;
        self.depth_clear = DepthClear {
            depth: camera.clear_depth,
            stencil: camera.clear_stencil,
            flags: camera.clear_flags & ClearFlags::DEPTH_STENCIL,
        };
        self.viewport = camera.viewport;
    }

    // ── Dimensions ─────────────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub fn window(&self) -> &WindowInfo {
        &self.window
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> u32 {
        self.window.id()
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.window.width()
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.window.height()
    }

    #[inline]
    #[must_use]
    pub fn native_width(&self) -> u32 {
        self.window.native_width()
    }

    #[inline]
    #[must_use]
    pub fn native_height(&self) -> u32 {
        self.window.native_height()
    }

    #[inline]
    #[must_use]
    pub fn shading_scale(&self) -> f32 {
        self.window.shading_scale()
    }

    // ── Flags ──────────────────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub fn camera(&self) -> CameraId {
        self.camera
    }

    #[inline]
    #[must_use]
    pub fn radiance_format(&self) -> TextureFormat {
        self.radiance_format
    }

    #[inline]
    #[must_use]
    pub fn hdr_enabled(&self) -> bool {
        self.hdr
    }

    #[inline]
    #[must_use]
    pub fn ssss_enabled(&self) -> bool {
        self.ssss
    }

    #[inline]
    #[must_use]
    pub fn shadow_map_format(&self) -> TextureFormat {
        self.shadow_map_format
    }

    #[inline]
    #[must_use]
    pub fn main_light(&self) -> Option<DirectionalLight> {
        self.main_light
    }

    #[inline]
    #[must_use]
    pub fn main_light_shadow_map_enabled(&self) -> bool {
        self.main_light_shadow_map
    }

    #[inline]
    #[must_use]
    pub fn main_light_planar_shadow_enabled(&self) -> bool {
        self.main_light_planar_shadow
    }

    #[inline]
    #[must_use]
    pub fn planar_reflection_probe_enabled(&self) -> bool {
        self.planar_probe
    }

    #[inline]
    #[must_use]
    pub fn msaa_enabled(&self) -> bool {
        self.msaa
    }

    #[inline]
    #[must_use]
    pub fn msaa_samples(&self) -> u32 {
        self.msaa_samples
    }

    #[inline]
    #[must_use]
    pub fn is_main_game_window(&self) -> bool {
        self.is_main_game_window
    }

    #[inline]
    #[must_use]
    pub fn is_game_view(&self) -> bool {
        self.is_game_view
    }

    #[inline]
    #[must_use]
    pub fn is_profiler_camera(&self, profiler: Option<CameraId>) -> bool {
        profiler == Some(self.camera)
    }

    // ── Clear state ────────────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub fn need_clear_color(&self) -> bool {
        self.clear_flags.intersects(ClearFlags::COLOR | ClearFlags::SKYBOX)
    }

    #[inline]
    #[must_use]
    pub fn need_depth_stencil(&self) -> bool {
        self.clear_flags.intersects(ClearFlags::DEPTH_STENCIL)
    }

    #[inline]
    #[must_use]
    pub fn clear_color(&self) -> wgpu::Color {
        self.clear_color
    }

    #[inline]
    #[must_use]
    pub fn depth_clear(&self) -> DepthClear {
        self.depth_clear
    }

    /// Camera viewport in pixels of the scaled render resolution.
    #[must_use]
    pub fn fill_viewport(&self) -> Viewport {
        self.viewport_for(self.width(), self.height())
    }

    /// Camera viewport in pixels of a `width` x `height` target.
    #[must_use]
    pub fn viewport_for(&self, width: u32, height: u32) -> Viewport {
        let (w, h) = (width as f32, height as f32);
        let v = self.viewport;
        Viewport {
            left: (v.x * w).round().max(0.0) as u32,
            top: (v.y * h).round().max(0.0) as u32,
            width: ((v.z * w).round() as u32).max(1),
            height: ((v.w * h).round() as u32).max(1),
        }
    }

    // ── Decisions ──────────────────────────────────────────────────────────

    /// Whether the main pass renders offscreen.
    ///
    /// Offscreen is forced by HDR, active color grading, an active shading
    /// scale, MSAA (resolve target) and by any stage that samples scene color
    /// afterwards (SSSS, bloom, FXAA, TAA, FSR).
    #[must_use]
    pub fn needs_offscreen(&self, settings: &PipelineSettings) -> OffscreenDecision {
        let shading_scale = settings.enable_shading_scale && self.shading_scale() != 1.0;
        let color_grading = settings.color_grading.is_active();
        let post_process = self.hdr || color_grading;
        let samples_scene_color = self.ssss
            || settings.bloom.is_active()
            || settings.fxaa.is_active()
            || settings.fsr.is_active()
            || settings.taa.enabled;
        OffscreenDecision {
            shading_scale,
            offscreen: post_process || shading_scale || self.msaa || samples_scene_color,
        }
    }

    /// Declaration-relevant snapshot for resize detection.
    #[must_use]
    pub fn declaration_key(&self, settings: &PipelineSettings, features: &PipelineFeatures) -> DeclarationKey {
        DeclarationKey {
            native_width: self.native_width(),
            native_height: self.native_height(),
            width: self.width(),
            height: self.height(),
            radiance_format: self.radiance_format,
            offscreen: self.needs_offscreen(settings),
            msaa_samples: self.msaa.then_some(self.msaa_samples),
            ssss: self.ssss,
            taa: settings.taa.enabled,
            shadow_map_format: self.shadow_map_format,
            shadow_map_size: features.shadow_map_size(),
            max_spot_shadow_maps: features.max_spot_shadow_maps(),
        }
    }

    // ── Resource names ─────────────────────────────────────────────────────

    /// `{prefix}{window id}`
    #[must_use]
    pub fn texture_name(&self, prefix: &str) -> String {
        format!("{prefix}{}", self.id())
    }

    #[must_use]
    pub fn window_color(&self) -> String {
        self.texture_name("windowColor")
    }

    #[must_use]
    pub fn window_depth_stencil(&self) -> String {
        self.texture_name("windowDepthStencil")
    }

    #[must_use]
    pub fn radiance_color(&self) -> String {
        self.texture_name("radianceColor")
    }

    #[must_use]
    pub fn depth_stencil(&self) -> String {
        self.texture_name("depthStencil")
    }

    #[must_use]
    pub fn scaled_radiance_color(&self) -> String {
        self.texture_name("scaledRadiance")
    }

    #[must_use]
    pub fn scaled_depth_stencil(&self) -> String {
        self.texture_name("scaledDepthStencil")
    }

    #[must_use]
    pub fn msaa_radiance(&self) -> String {
        self.texture_name("msaaRadiance")
    }

    #[must_use]
    pub fn msaa_depth_stencil(&self) -> String {
        self.texture_name("msaaDepthStencil")
    }

    #[must_use]
    pub fn shadow_map(&self) -> String {
        self.texture_name("shadowMap")
    }

    #[must_use]
    pub fn shadow_depth(&self) -> String {
        self.texture_name("shadowDepth")
    }

    #[must_use]
    pub fn scene_depth_packed(&self) -> String {
        self.texture_name("sceneDepthPacked")
    }

    /// Color/depth names the main pass writes, given the offscreen decision.
    #[must_use]
    pub fn main_targets(&self, decision: OffscreenDecision) -> (String, String) {
        match (decision.offscreen, decision.shading_scale) {
            (false, _) => (self.window_color(), self.window_depth_stencil()),
            (true, true) => (self.scaled_radiance_color(), self.scaled_depth_stencil()),
            (true, false) => (self.radiance_color(), self.depth_stencil()),
        }
    }
}

/// Profiler camera: the last camera whose window has a swap chain.
#[must_use]
pub fn decide_profiler_camera(cameras: &[Camera]) -> Option<CameraId> {
    cameras
        .iter()
        .rev()
        .find(|c| c.window.is_some_and(|w| w.has_swapchain))
        .map(|c| c.id)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::camera::{RenderScene, RenderWindow};
    use crate::features::{PipelineSceneData, StaticDevice};

    fn info_for(camera: &Camera, settings: &PipelineSettings, scene: &PipelineSceneData) -> CameraInfo {
        let mut features = PipelineFeatures::default();
        features.reset(&StaticDevice::desktop(), scene);
        let mut windows = WindowInfoRegistry::new();
        let mut info = CameraInfo::default();
        info.reset(camera, settings, &features, &mut windows);
        info
    }

    fn camera() -> Camera {
        Camera::new(1, RenderWindow::new(5, 1280, 720), Arc::new(RenderScene::default()))
    }

    #[test]
    fn names_are_keyed_by_window() {
        let info = info_for(&camera(), &PipelineSettings::default(), &PipelineSceneData::default());
        assert_eq!(info.window_color(), "windowColor5");
        assert_eq!(info.texture_name("taaFrame0"), "taaFrame05");
    }

    #[test]
    fn shading_scale_applies_only_when_enabled() {
        let mut settings = PipelineSettings {
            shading_scale: 0.5,
            ..Default::default()
        };
        let scene = PipelineSceneData::default();
        assert_eq!(info_for(&camera(), &settings, &scene).width(), 1280);
        settings.enable_shading_scale = true;
        let info = info_for(&camera(), &settings, &scene);
        assert_eq!((info.width(), info.height()), (640, 360));
        assert_eq!(info.native_width(), 1280);
    }

    #[test]
    fn msaa_disables_ssss() {
        let mut settings = PipelineSettings::default();
        let scene = PipelineSceneData {
            skin_enabled: true,
            ..Default::default()
        };
        assert!(info_for(&camera(), &settings, &scene).ssss_enabled());
        settings.msaa.enabled = true;
        let info = info_for(&camera(), &settings, &scene);
        assert!(info.msaa_enabled());
        assert!(!info.ssss_enabled());
    }

    #[test]
    fn viewport_is_rounded_and_clamped() {
        let mut cam = camera();
        cam.viewport = glam::Vec4::new(0.5, 0.25, 0.0, 0.5);
        let info = info_for(&cam, &PipelineSettings::default(), &PipelineSceneData::default());
        assert_eq!(info.fill_viewport(), Viewport::new(640, 180, 1, 360));
    }

    #[test]
    fn profiler_camera_is_last_with_swapchain() {
        let scene = Arc::new(RenderScene::default());
        let a = Camera::new(1, RenderWindow::new(0, 8, 8), Arc::clone(&scene));
        let b = Camera::new(2, RenderWindow::new(1, 8, 8), Arc::clone(&scene));
        let c = Camera::new(3, RenderWindow::offscreen(2, 8, 8), scene);
        assert_eq!(decide_profiler_camera(&[a, b, c]), Some(CameraId(2)));
        assert_eq!(decide_profiler_camera(&[]), None);
    }
}
