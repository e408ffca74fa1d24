//! Forward Pipeline Scheduler
//!
//! [`ForwardPipeline`] drives the pass builders for every camera of a frame.
//!
//! # Frame Flow
//!
//! ```text
//! render_frame(graph, device, scene_data, cameras)
//!   ├─ graph.begin_frame()
//!   ├─ per camera: own declaration key changed? ──► window_resize(camera)
//!   └─ setup(cameras)
//!        ├─ features.reset, profiler camera, jitter advance
//!        └─ per camera with scene + window:
//!             ├─ resolve settings, CameraInfo::reset
//!             ├─ update_global_resources on every builder
//!             └─ DEFAULT layer? ── yes ──► ctx.reset, builders in render order
//!                                └─ no ───► single simple pass
//! ```
//!
//! # Settings Resolution
//!
//! Editor scene views and previews take the editor override when present;
//! every other camera takes its own override; the pipeline default is the
//! fallback for both. A camera override that fails validation is ignored in
//! favor of the default.
//!
//! # Thread Safety
//!
//! The window cache and the jitter sequence are single-writer state owned by
//! the pipeline; the scheduler is not meant to be shared across threads.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::camera::{Camera, CameraId, VisibilityLayers};
use crate::camera_info::{CameraInfo, DeclarationKey, LDR_COLOR_FORMAT, decide_profiler_camera};
use crate::context::RenderingContext;
use crate::errors::Result;
use crate::features::{DeviceCapabilities, PipelineFeatures, PipelineSceneData};
use crate::graph::{LoadOp, QueueHint, RenderGraph, SceneFlags, StoreOp};
use crate::jitter::JitterSequence;
use crate::pass_builder::{FrameEnv, PassBuilder, PassRegistry, PipelineResources};
use crate::passes::default_builders;
use crate::settings::PipelineSettings;
use crate::window_info::{WindowInfo, WindowInfoRegistry};

/// Render-graph frame scheduler of the forward pipeline.
pub struct ForwardPipeline {
    registry: PassRegistry,
    resources: PipelineResources,
    features: PipelineFeatures,
    windows: WindowInfoRegistry,
    jitter: JitterSequence,
    context: RenderingContext,
    info: CameraInfo,
    default_settings: Arc<PipelineSettings>,
    editor_settings: Option<Arc<PipelineSettings>>,
    profiler_camera: Option<CameraId>,
    /// Last declaration key per (render window, camera).
    declared: FxHashMap<(u32, CameraId), DeclarationKey>,
}

impl std::fmt::Debug for ForwardPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForwardPipeline")
            .field("registry", &self.registry)
            .field("resources", &self.resources)
            .field("windows", &self.windows.len())
            .field("jitter", &self.jitter)
            .finish_non_exhaustive()
    }
}

impl ForwardPipeline {
    /// Pipeline with the built-in builders.
    pub fn new(resources: PipelineResources) -> Result<Self> {
        Self::with_builders(resources, default_builders())
    }

    /// Pipeline with a custom builder set. Fails on duplicate render orders
    /// or unresolved builder dependencies.
    pub fn with_builders(resources: PipelineResources, builders: Vec<Box<dyn PassBuilder>>) -> Result<Self> {
        let registry = PassRegistry::new(builders)?;
        log::debug!("Forward pipeline builders: {registry:?}");
        Ok(Self {
            registry,
            resources,
            features: PipelineFeatures::default(),
            windows: WindowInfoRegistry::new(),
            jitter: JitterSequence::new(),
            context: RenderingContext::new(),
            info: CameraInfo::default(),
            default_settings: Arc::new(PipelineSettings::default()),
            editor_settings: None,
            profiler_camera: None,
            declared: FxHashMap::default(),
        })
    }

    // ── Configuration ──────────────────────────────────────────────────────

    /// Validates and installs the global default settings.
    pub fn set_default_settings(&mut self, settings: Arc<PipelineSettings>) -> Result<()> {
        settings.validate()?;
        self.default_settings = settings;
        Ok(())
    }

    /// Settings used by editor scene views and previews.
    pub fn set_editor_settings(&mut self, settings: Option<Arc<PipelineSettings>>) -> Result<()> {
        if let Some(s) = &settings {
            s.validate()?;
        }
        self.editor_settings = settings;
        Ok(())
    }

    #[must_use]
    pub fn default_settings(&self) -> &Arc<PipelineSettings> {
        &self.default_settings
    }

    /// Settings that apply to `camera` this frame.
    #[must_use]
    pub fn resolve_settings(&self, camera: &Camera) -> Arc<PipelineSettings> {
        if camera.usage.is_editor_view() {
            return Arc::clone(self.editor_settings.as_ref().unwrap_or(&self.default_settings));
        }
        match &camera.settings {
            Some(settings) => match settings.validate() {
                Ok(()) => Arc::clone(settings),
                Err(e) => {
                    log::warn!("Camera {:?} settings override rejected, using defaults: {e}", camera.id);
                    Arc::clone(&self.default_settings)
                }
            },
            None => Arc::clone(&self.default_settings),
        }
    }

    #[must_use]
    pub fn resources(&self) -> &PipelineResources {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut PipelineResources {
        &mut self.resources
    }

    // ── State accessors ────────────────────────────────────────────────────

    #[must_use]
    pub fn registry(&self) -> &PassRegistry {
        &self.registry
    }

    #[must_use]
    pub fn features(&self) -> &PipelineFeatures {
        &self.features
    }

    #[must_use]
    pub fn jitter(&self) -> &JitterSequence {
        &self.jitter
    }

    /// Context left behind by the last camera processed.
    #[must_use]
    pub fn context(&self) -> &RenderingContext {
        &self.context
    }

    /// Derived state of the last camera processed.
    #[must_use]
    pub fn camera_info(&self) -> &CameraInfo {
        &self.info
    }

    #[must_use]
    pub fn profiler_camera(&self) -> Option<CameraId> {
        self.profiler_camera
    }

    #[must_use]
    pub fn window_info(&self, window: u32) -> Option<&WindowInfo> {
        self.windows.get(window)
    }

    /// Forgets a destroyed render window.
    pub fn remove_window(&mut self, window: u32) {
        self.windows.remove(window);
        self.declared.retain(|&(id, _), _| id != window);
    }

    /// The utility material is the only hard dependency.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.resources.util_material.is_some()
    }

    // ── Frame hooks ────────────────────────────────────────────────────────

    /// Declares every resource of `camera`'s window in a new declaration
    /// phase.
    pub fn window_resize(
        &mut self,
        graph: &mut RenderGraph,
        device: &dyn DeviceCapabilities,
        scene_data: &PipelineSceneData,
        camera: &Camera,
    ) -> Result<()> {
        if !self.is_ready() {
            log::warn!("Pipeline dependencies not ready, window resize skipped");
            return Ok(());
        }
        let Some(window) = camera.window else {
            return Ok(());
        };

        self.features.reset(device, scene_data);
        let settings = self.resolve_settings(camera);
        self.info
            .reset(camera, &settings, &self.features, &mut self.windows);

        graph.begin_declarations();
        graph.add_render_window(
            &self.info.window_color(),
            LDR_COLOR_FORMAT,
            self.info.native_width(),
            self.info.native_height(),
            window.id,
            Some(self.info.window_depth_stencil().as_str()),
        )?;

        let env = FrameEnv {
            settings: &settings,
            features: &self.features,
            jitter: &self.jitter,
            resources: &self.resources,
            profiler_camera: self.profiler_camera,
        };
        let info = &self.info;
        self.registry
            .try_for_each(|builder| builder.window_resize(graph, &env, info, camera))?;

        log::debug!(
            "Window {} declared at {}x{} (native {}x{})",
            window.id,
            info.width(),
            info.height(),
            info.native_width(),
            info.native_height()
        );
        self.declared
            .insert((window.id, camera.id), info.declaration_key(&settings, &self.features));
        Ok(())
    }

    /// Records every camera's passes. Builder failures are logged and the
    /// remaining builders still run.
    pub fn setup(
        &mut self,
        graph: &mut RenderGraph,
        device: &dyn DeviceCapabilities,
        scene_data: &PipelineSceneData,
        cameras: &[Camera],
    ) {
        if !self.is_ready() {
            log::warn!("Pipeline dependencies not ready, frame skipped");
            return;
        }

        self.features.reset(device, scene_data);
        self.profiler_camera = decide_profiler_camera(cameras);

        let taa_this_frame = cameras
            .iter()
            .filter(|c| c.scene.is_some() && c.window.is_some())
            .any(|c| self.resolve_settings(c).taa.enabled);
        if taa_this_frame {
            self.jitter.advance();
        }
        graph.set_vec4("g_jitter", self.jitter.value());

        for camera in cameras {
            if camera.scene.is_none() || camera.window.is_none() {
                continue;
            }
            self.setup_camera(graph, camera);
        }
    }

    fn setup_camera(&mut self, graph: &mut RenderGraph, camera: &Camera) {
        let settings = self.resolve_settings(camera);
        self.info
            .reset(camera, &settings, &self.features, &mut self.windows);
        log::trace!("Camera {:?} begin", camera.id);

        let env = FrameEnv {
            settings: &settings,
            features: &self.features,
            jitter: &self.jitter,
            resources: &self.resources,
            profiler_camera: self.profiler_camera,
        };
        let info = &self.info;

        let globals = self
            .registry
            .try_for_each(|builder| builder.update_global_resources(graph, &env, info));
        if let Err(e) = globals {
            log::error!("Global resource update failed for camera {:?}: {e}", camera.id);
        }

        if camera.visibility.contains(VisibilityLayers::DEFAULT) {
            let ctx = &mut self.context;
            ctx.reset();
            self.registry.for_each_with_lookup(|builder, lookup| {
                match builder.setup(graph, &env, lookup, info, camera, ctx) {
                    Ok(pass) => ctx.last_pass = pass,
                    Err(e) => log::error!("{} pass setup failed: {e}", builder.name()),
                }
            });
        } else {
            add_simple_pass(graph, info, camera, self.profiler_camera);
        }

        log::trace!("Camera {:?} end", camera.id);
    }

    /// One complete frame: opens the frame on `graph`, re-declares the
    /// targets of every camera whose declaration inputs changed, then records
    /// every camera.
    pub fn render_frame(
        &mut self,
        graph: &mut RenderGraph,
        device: &dyn DeviceCapabilities,
        scene_data: &PipelineSceneData,
        cameras: &[Camera],
    ) -> Result<()> {
        graph.begin_frame();
        if !self.is_ready() {
            log::warn!("Pipeline dependencies not ready, frame skipped");
            return Ok(());
        }

        self.features.reset(device, scene_data);
        for camera in cameras {
            let (Some(window), Some(_)) = (camera.window, camera.scene.as_ref()) else {
                continue;
            };
            let settings = self.resolve_settings(camera);
            self.info
                .reset(camera, &settings, &self.features, &mut self.windows);
            let key = self.info.declaration_key(&settings, &self.features);
            if self.declared.get(&(window.id, camera.id)) != Some(&key) {
                self.window_resize(graph, device, scene_data, camera)?;
            }
        }

        self.setup(graph, device, scene_data, cameras);
        Ok(())
    }
}

/// Single window pass for cameras outside the default layer (UI, gizmo and
/// profiler-only cameras).
fn add_simple_pass(graph: &mut RenderGraph, info: &CameraInfo, camera: &Camera, profiler: Option<CameraId>) {
    let (w, h) = (info.native_width(), info.native_height());
    let mut pass = graph.add_render_pass(w, h, "default");
    pass.set_name("simplePass").set_viewport(info.viewport_for(w, h));

    let color_load = if info.need_clear_color() {
        LoadOp::Clear(info.clear_color())
    } else {
        LoadOp::Load
    };
    pass.add_render_target(&info.window_color(), color_load, StoreOp::Store);

    let depth_load = if info.need_depth_stencil() {
        LoadOp::Clear(info.depth_clear())
    } else {
        LoadOp::Load
    };
    pass.add_depth_stencil(&info.window_depth_stencil(), depth_load, StoreOp::Discard);

    let show_profiler = info.is_profiler_camera(profiler);
    if show_profiler {
        pass.show_statistics(true);
    }
    let mut queue = pass.add_queue(QueueHint::Opaque, "default");
    queue.add_scene(
        camera.id,
        SceneFlags::OPAQUE | SceneFlags::BLEND | SceneFlags::MASK | SceneFlags::GEOMETRY,
        None,
    );
    queue.add_draw_2d(camera.id);
    if show_profiler {
        queue.add_profiler(camera.id);
    }
}
