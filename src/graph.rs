//! Recorded Render Graph
//!
//! [`RenderGraph`] is the declaration surface every pass builder talks to. It
//! does not touch the GPU: it records resource declarations, passes, queues
//! and uniforms so that a host backend can walk the result after
//! [`ForwardPipeline::setup`](crate::pipeline::ForwardPipeline::setup)
//! returns.
//!
//! # Lifetime Model
//!
//! ```text
//! begin_frame()      ── new declaration phase, passes + uniforms cleared
//!   add_render_target / add_depth_stencil / add_texture / add_render_window
//!   add_render_pass → RenderPassBuilder → QueueBuilder
//! validate()         ── first undeclared reference, if any
//! ```
//!
//! Resources outlive frames: they are keyed by name and de-duplicated, so
//! re-declaring an identical descriptor is a no-op. A descriptor may change
//! across declaration phases (window resize), never within one.
//!
//! # Resource References
//!
//! Referencing a name that was never declared is a programmer error. Debug
//! builds assert immediately; release builds log the name and keep it in the
//! diagnostics list surfaced by [`RenderGraph::validate`].

use std::fmt;

use bitflags::bitflags;
use glam::{Vec2, Vec4};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::camera::{CameraId, LightId};
use crate::errors::{PipelineError, Result};
use crate::settings::MaterialHandle;

// ─── Resources ────────────────────────────────────────────────────────────────

/// Storage policy of a graph resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Residency {
    /// Transient within one frame; the host may alias it.
    Managed,
    /// Tile-local, never read back by another pass (e.g. MSAA sources).
    Memoryless,
    /// Must survive across frames (TAA history, packed depth).
    Persistent,
    /// Owned outside the graph (e.g. a LUT texture asset).
    External,
    /// Swap-chain / render-window backed.
    Backbuffer,
}

bitflags! {
    /// How a resource may be bound.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceFlags: u32 {
        const SAMPLED                  = 1 << 0;
        const COLOR_ATTACHMENT         = 1 << 1;
        const DEPTH_STENCIL_ATTACHMENT = 1 << 2;
        const STORAGE                  = 1 << 3;
    }
}

/// What kind of vertex a declared name is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    RenderTarget,
    DepthStencil,
    Texture,
    Window,
    External,
}

/// Full descriptor of a declared resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceDesc {
    pub kind: ResourceKind,
    pub format: wgpu::TextureFormat,
    pub width: u32,
    pub height: u32,
    pub sample_count: u32,
    pub flags: ResourceFlags,
    pub residency: Residency,
}

/// Externally owned texture registered through
/// [`RenderGraph::add_external_texture`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExternalTexture {
    /// Host-side texture identity.
    pub id: u64,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

#[derive(Debug, Clone)]
struct DeclaredResource {
    desc: ResourceDesc,
    /// Declaration phase that last (re)declared the resource.
    phase: u64,
    /// Render window backing a `Window` resource.
    window: Option<u32>,
}

// ─── Pass Data ────────────────────────────────────────────────────────────────

/// Load behavior of an attachment; `V` is the clear value type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadOp<V> {
    Load,
    Clear(V),
    Discard,
}

/// Store behavior of an attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Store,
    Discard,
}

bitflags! {
    /// Which aspects a clear touches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ClearFlags: u32 {
        const COLOR   = 1 << 0;
        const DEPTH   = 1 << 1;
        const STENCIL = 1 << 2;
        /// Camera-only: clear color through the skybox.
        const SKYBOX  = 1 << 3;
        const DEPTH_STENCIL = Self::DEPTH.bits() | Self::STENCIL.bits();
    }
}

/// Clear value of a depth-stencil attachment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthClear {
    pub depth: f32,
    pub stencil: u32,
    pub flags: ClearFlags,
}

impl Default for DepthClear {
    fn default() -> Self {
        Self {
            depth: 1.0,
            stencil: 0,
            flags: ClearFlags::DEPTH_STENCIL,
        }
    }
}

/// An attachment slot of a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment<V> {
    pub name: String,
    pub load: LoadOp<V>,
    pub store: StoreOp,
}

/// Pixel rectangle inside a render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Viewport {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    #[inline]
    #[must_use]
    pub const fn new(left: u32, top: u32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Returns `true` if the two rectangles share at least one pixel.
    #[must_use]
    pub fn overlaps(&self, other: &Viewport) -> bool {
        self.left < other.left + other.width
            && other.left < self.left + self.width
            && self.top < other.top + other.height
            && other.top < self.top + self.height
    }

    #[inline]
    #[must_use]
    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Scalar/vector shader parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2(Vec2),
    Vec4(Vec4),
}

/// A sampled texture bound to a named shader slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureBinding {
    pub resource: String,
    pub slot: String,
}

bitflags! {
    /// Which scene content a scene draw collects.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SceneFlags: u32 {
        const OPAQUE           = 1 << 0;
        const MASK             = 1 << 1;
        const BLEND            = 1 << 2;
        const SHADOW_CASTER    = 1 << 3;
        const PLANAR_SHADOW    = 1 << 4;
        const GEOMETRY         = 1 << 5;
        const REFLECTION_PROBE = 1 << 6;
    }
}

/// Sorting / batching hint for a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueHint {
    None,
    Opaque,
    Mask,
    Blend,
}

/// Scene draw recorded in a queue.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneDraw {
    pub camera: CameraId,
    pub flags: SceneFlags,
    pub light: Option<LightId>,
    /// Shadow draw: render from the light's frustum (cascade level).
    pub light_frustum: Option<(LightId, u32)>,
}

impl SceneDraw {
    /// Draws this scene from the given light's view (CSM level for
    /// directional lights, `0` otherwise).
    pub fn use_light_frustum(&mut self, light: LightId, level: u32) -> &mut Self {
        self.light_frustum = Some((light, level));
        self
    }
}

/// Command recorded in a queue.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueCommand {
    Scene(SceneDraw),
    FullscreenQuad {
        material: MaterialHandle,
        pass_index: u32,
    },
    Draw2d(CameraId),
    Profiler(CameraId),
}

/// A render queue inside a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderQueue {
    pub hint: QueueHint,
    /// Material phase the queue renders with (`"default"`, `"shadow-caster"`, ...).
    pub phase: String,
    /// Debug label.
    pub name: Option<String>,
    pub viewport: Option<Viewport>,
    pub commands: Vec<QueueCommand>,
}

/// Handle of a recorded pass, valid for the frame it was recorded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassId(u32);

impl PassId {
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A recorded raster pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPass {
    pub id: PassId,
    pub name: String,
    /// Pipeline layout name (`"default"`, `"tonemap"`, ...).
    pub layout: String,
    pub width: u32,
    pub height: u32,
    pub sample_count: u32,
    pub viewport: Option<Viewport>,
    pub color: SmallVec<[Attachment<wgpu::Color>; 2]>,
    pub depth_stencil: Option<Attachment<DepthClear>>,
    pub textures: SmallVec<[TextureBinding; 4]>,
    pub uniforms: Vec<(String, UniformValue)>,
    /// `(multisampled source, single-sample destination)` resolves at pass end.
    pub resolves: SmallVec<[(String, String); 1]>,
    pub queues: SmallVec<[RenderQueue; 4]>,
    pub show_statistics: bool,
}

impl RenderPass {
    /// Names of every resource this pass writes.
    pub fn written(&self) -> impl Iterator<Item = &str> {
        self.color
            .iter()
            .map(|a| a.name.as_str())
            .chain(self.depth_stencil.iter().map(|a| a.name.as_str()))
            .chain(self.resolves.iter().map(|(_, dst)| dst.as_str()))
    }

    /// Names of every resource this pass samples.
    pub fn sampled(&self) -> impl Iterator<Item = &str> {
        self.textures.iter().map(|t| t.resource.as_str())
    }

    #[must_use]
    pub fn uniform(&self, name: &str) -> Option<UniformValue> {
        self.uniforms
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }
}

// ─── Graph ────────────────────────────────────────────────────────────────────

/// Recorded render graph for one frame plus the resources that persist across
/// frames.
///
/// # Thread Safety
///
/// Not `Sync` by contract: one scheduler writes it, one backend reads it.
#[derive(Default)]
pub struct RenderGraph {
    resources: FxHashMap<String, DeclaredResource>,
    passes: Vec<RenderPass>,
    uniforms: FxHashMap<String, UniformValue>,
    phase: u64,
    undeclared: Vec<String>,
}

impl fmt::Debug for RenderGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderGraph")
            .field("resources", &self.resources.len())
            .field("passes", &self.passes.len())
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

impl RenderGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new frame: drops recorded passes, uniforms and diagnostics and
    /// opens a new declaration phase. Declared resources are kept.
    pub fn begin_frame(&mut self) {
        self.passes.clear();
        self.uniforms.clear();
        self.undeclared.clear();
        self.phase += 1;
    }

    /// Opens a new declaration phase without touching recorded passes.
    /// Descriptors declared in earlier phases may be replaced afterwards.
    pub fn begin_declarations(&mut self) {
        self.phase += 1;
    }

    // ── Declarations ───────────────────────────────────────────────────────

    fn declare(&mut self, name: &str, desc: ResourceDesc, window: Option<u32>) -> Result<()> {
        match self.resources.get_mut(name) {
            Some(existing) if existing.desc == desc => {
                existing.phase = self.phase;
                existing.window = window;
                Ok(())
            }
            Some(existing) if existing.phase == self.phase => Err(PipelineError::ResourceConflict {
                name: name.to_owned(),
                existing: existing.desc,
                requested: desc,
            }),
            Some(existing) => {
                log::debug!(
                    "Redeclaring '{name}': {}x{} -> {}x{}",
                    existing.desc.width,
                    existing.desc.height,
                    desc.width,
                    desc.height
                );
                *existing = DeclaredResource {
                    desc,
                    phase: self.phase,
                    window,
                };
                Ok(())
            }
            None => {
                self.resources.insert(
                    name.to_owned(),
                    DeclaredResource {
                        desc,
                        phase: self.phase,
                        window,
                    },
                );
                Ok(())
            }
        }
    }

    /// Declares a single-sample color target.
    pub fn add_render_target(
        &mut self,
        name: &str,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        residency: Residency,
    ) -> Result<()> {
        self.declare(
            name,
            ResourceDesc {
                kind: ResourceKind::RenderTarget,
                format,
                width,
                height,
                sample_count: 1,
                flags: ResourceFlags::COLOR_ATTACHMENT | ResourceFlags::SAMPLED,
                residency,
            },
            None,
        )
    }

    /// Declares a single-sample depth-stencil target.
    pub fn add_depth_stencil(
        &mut self,
        name: &str,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        residency: Residency,
    ) -> Result<()> {
        self.declare(
            name,
            ResourceDesc {
                kind: ResourceKind::DepthStencil,
                format,
                width,
                height,
                sample_count: 1,
                flags: ResourceFlags::DEPTH_STENCIL_ATTACHMENT | ResourceFlags::SAMPLED,
                residency,
            },
            None,
        )
    }

    /// Declares a texture with explicit sample count and bind flags.
    pub fn add_texture(
        &mut self,
        name: &str,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        sample_count: u32,
        flags: ResourceFlags,
        residency: Residency,
    ) -> Result<()> {
        self.declare(
            name,
            ResourceDesc {
                kind: ResourceKind::Texture,
                format,
                width,
                height,
                sample_count: sample_count.max(1),
                flags,
                residency,
            },
            None,
        )
    }

    /// Declares a render-window color target and, optionally, its paired
    /// depth-stencil.
    pub fn add_render_window(
        &mut self,
        name: &str,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        window: u32,
        depth_stencil: Option<&str>,
    ) -> Result<()> {
        self.declare(
            name,
            ResourceDesc {
                kind: ResourceKind::Window,
                format,
                width,
                height,
                sample_count: 1,
                flags: ResourceFlags::COLOR_ATTACHMENT,
                residency: Residency::Backbuffer,
            },
            Some(window),
        )?;
        if let Some(ds) = depth_stencil {
            self.declare(
                ds,
                ResourceDesc {
                    kind: ResourceKind::DepthStencil,
                    format: crate::camera_info::DEPTH_STENCIL_FORMAT,
                    width,
                    height,
                    sample_count: 1,
                    flags: ResourceFlags::DEPTH_STENCIL_ATTACHMENT,
                    residency: Residency::Backbuffer,
                },
                Some(window),
            )?;
        }
        Ok(())
    }

    /// Registers an externally owned texture under `name`.
    pub fn add_external_texture(
        &mut self,
        name: &str,
        texture: ExternalTexture,
        flags: ResourceFlags,
    ) -> Result<()> {
        self.declare(
            name,
            ResourceDesc {
                kind: ResourceKind::External,
                format: texture.format,
                width: texture.width,
                height: texture.height,
                sample_count: 1,
                flags,
                residency: Residency::External,
            },
            None,
        )
    }

    #[must_use]
    pub fn has_external_texture(&self, name: &str) -> bool {
        self.resources
            .get(name)
            .is_some_and(|r| r.desc.kind == ResourceKind::External)
    }

    #[must_use]
    pub fn resource(&self, name: &str) -> Option<&ResourceDesc> {
        self.resources.get(name).map(|r| &r.desc)
    }

    #[must_use]
    pub fn contains_resource(&self, name: &str) -> bool {
        self.resources.contains_key(name)
    }

    /// Render window bound to a `Window` resource.
    #[must_use]
    pub fn resource_window(&self, name: &str) -> Option<u32> {
        self.resources.get(name).and_then(|r| r.window)
    }

    pub fn resource_names(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    fn check_declared(&mut self, name: &str) {
        let declared = self.resources.contains_key(name);
        debug_assert!(declared, "render graph resource '{name}' referenced before declaration");
        if !declared {
            log::error!("Render graph resource '{name}' referenced before declaration");
            self.undeclared.push(name.to_owned());
        }
    }

    fn check_attachment_size(&self, name: &str, width: u32, height: u32) {
        if let Some(res) = self.resources.get(name) {
            debug_assert!(
                res.desc.width == width && res.desc.height == height,
                "attachment '{name}' is {}x{}, pass is {width}x{height}",
                res.desc.width,
                res.desc.height
            );
        }
    }

    // ── Passes ─────────────────────────────────────────────────────────────

    /// Adds a single-sample raster pass.
    pub fn add_render_pass(&mut self, width: u32, height: u32, layout: &str) -> RenderPassBuilder<'_> {
        self.push_pass(width, height, 1, layout)
    }

    /// Adds a multisampled raster pass. Use
    /// [`RenderPassBuilder::resolve_render_target`] to resolve into a single-sample
    /// target at pass end.
    pub fn add_multisample_render_pass(
        &mut self,
        width: u32,
        height: u32,
        sample_count: u32,
        layout: &str,
    ) -> RenderPassBuilder<'_> {
        self.push_pass(width, height, sample_count.max(1), layout)
    }

    fn push_pass(&mut self, width: u32, height: u32, sample_count: u32, layout: &str) -> RenderPassBuilder<'_> {
        let id = PassId(self.passes.len() as u32);
        self.passes.push(RenderPass {
            id,
            name: String::new(),
            layout: layout.to_owned(),
            width,
            height,
            sample_count,
            viewport: None,
            color: SmallVec::new(),
            depth_stencil: None,
            textures: SmallVec::new(),
            uniforms: Vec::new(),
            resolves: SmallVec::new(),
            queues: SmallVec::new(),
            show_statistics: false,
        });
        RenderPassBuilder { graph: self, id }
    }

    /// Re-opens a pass recorded earlier in this frame.
    pub fn pass_mut(&mut self, id: PassId) -> Option<RenderPassBuilder<'_>> {
        (id.index() < self.passes.len()).then_some(RenderPassBuilder { graph: self, id })
    }

    #[must_use]
    pub fn pass(&self, id: PassId) -> Option<&RenderPass> {
        self.passes.get(id.index())
    }

    #[must_use]
    pub fn passes(&self) -> &[RenderPass] {
        &self.passes
    }

    /// Finds the first pass with the given debug name.
    #[must_use]
    pub fn find_pass(&self, name: &str) -> Option<&RenderPass> {
        self.passes.iter().find(|p| p.name == name)
    }

    // ── Global uniforms ────────────────────────────────────────────────────

    pub fn set_vec4(&mut self, name: &str, value: Vec4) {
        self.uniforms.insert(name.to_owned(), UniformValue::Vec4(value));
    }

    #[must_use]
    pub fn uniform(&self, name: &str) -> Option<UniformValue> {
        self.uniforms.get(name).copied()
    }

    // ── Validation ─────────────────────────────────────────────────────────

    /// Returns the first resource referenced this frame without being
    /// declared.
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = self.undeclared.first() {
            return Err(PipelineError::UndeclaredResource(name.clone()));
        }
        for pass in &self.passes {
            for name in pass.written().chain(pass.sampled()) {
                if !self.resources.contains_key(name) {
                    return Err(PipelineError::UndeclaredResource(name.to_owned()));
                }
            }
        }
        Ok(())
    }
}

// ─── Builders ─────────────────────────────────────────────────────────────────

/// Mutable view of one recorded pass.
pub struct RenderPassBuilder<'g> {
    graph: &'g mut RenderGraph,
    id: PassId,
}

impl RenderPassBuilder<'_> {
    #[inline]
    #[must_use]
    pub fn id(&self) -> PassId {
        self.id
    }

    fn pass(&mut self) -> &mut RenderPass {
        &mut self.graph.passes[self.id.index()]
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.pass().name = name.into();
        self
    }

    pub fn set_viewport(&mut self, viewport: Viewport) -> &mut Self {
        self.pass().viewport = Some(viewport);
        self
    }

    pub fn show_statistics(&mut self, show: bool) -> &mut Self {
        self.pass().show_statistics = show;
        self
    }

    pub fn add_render_target(
        &mut self,
        name: &str,
        load: LoadOp<wgpu::Color>,
        store: StoreOp,
    ) -> &mut Self {
        self.graph.check_declared(name);
        let (w, h) = (self.pass().width, self.pass().height);
        self.graph.check_attachment_size(name, w, h);
        self.pass().color.push(Attachment {
            name: name.to_owned(),
            load,
            store,
        });
        self
    }

    pub fn add_depth_stencil(
        &mut self,
        name: &str,
        load: LoadOp<DepthClear>,
        store: StoreOp,
    ) -> &mut Self {
        self.graph.check_declared(name);
        let (w, h) = (self.pass().width, self.pass().height);
        self.graph.check_attachment_size(name, w, h);
        self.pass().depth_stencil = Some(Attachment {
            name: name.to_owned(),
            load,
            store,
        });
        self
    }

    /// Binds a declared resource as a sampled texture.
    pub fn add_texture(&mut self, name: &str, slot: &str) -> &mut Self {
        self.graph.check_declared(name);
        self.pass().textures.push(TextureBinding {
            resource: name.to_owned(),
            slot: slot.to_owned(),
        });
        self
    }

    /// Resolves a multisampled attachment into a single-sample target at the
    /// end of the pass.
    pub fn resolve_render_target(&mut self, source: &str, destination: &str) -> &mut Self {
        self.graph.check_declared(source);
        self.graph.check_declared(destination);
        self.pass()
            .resolves
            .push((source.to_owned(), destination.to_owned()));
        self
    }

    pub fn set_float(&mut self, name: &str, value: f32) -> &mut Self {
        self.pass()
            .uniforms
            .push((name.to_owned(), UniformValue::Float(value)));
        self
    }

    pub fn set_vec2(&mut self, name: &str, value: Vec2) -> &mut Self {
        self.pass()
            .uniforms
            .push((name.to_owned(), UniformValue::Vec2(value)));
        self
    }

    pub fn set_vec4(&mut self, name: &str, value: Vec4) -> &mut Self {
        self.pass()
            .uniforms
            .push((name.to_owned(), UniformValue::Vec4(value)));
        self
    }

    /// Appends a queue rendered with the given material phase.
    pub fn add_queue(&mut self, hint: QueueHint, phase: &str) -> QueueBuilder<'_> {
        let pass = self.pass();
        pass.queues.push(RenderQueue {
            hint,
            phase: phase.to_owned(),
            name: None,
            viewport: None,
            commands: Vec::new(),
        });
        let index = pass.queues.len() - 1;
        QueueBuilder {
            queue: &mut pass.queues[index],
        }
    }
}

/// Mutable view of one queue.
pub struct QueueBuilder<'p> {
    queue: &'p mut RenderQueue,
}

impl QueueBuilder<'_> {
    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.queue.name = Some(name.into());
        self
    }

    pub fn set_viewport(&mut self, viewport: Viewport) -> &mut Self {
        self.queue.viewport = Some(viewport);
        self
    }

    pub fn add_scene(
        &mut self,
        camera: CameraId,
        flags: SceneFlags,
        light: Option<LightId>,
    ) -> &mut SceneDraw {
        self.queue.commands.push(QueueCommand::Scene(SceneDraw {
            camera,
            flags,
            light,
            light_frustum: None,
        }));
        match self.queue.commands.last_mut() {
            Some(QueueCommand::Scene(draw)) => draw,
            _ => unreachable!("scene draw was pushed on the line above"),
        }
    }

    pub fn add_fullscreen_quad(&mut self, material: MaterialHandle, pass_index: u32) -> &mut Self {
        self.queue.commands.push(QueueCommand::FullscreenQuad {
            material,
            pass_index,
        });
        self
    }

    pub fn add_draw_2d(&mut self, camera: CameraId) -> &mut Self {
        self.queue.commands.push(QueueCommand::Draw2d(camera));
        self
    }

    pub fn add_profiler(&mut self, camera: CameraId) -> &mut Self {
        self.queue.commands.push(QueueCommand::Profiler(camera));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RGBA8: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

    #[test]
    fn identical_redeclaration_is_noop() {
        let mut g = RenderGraph::new();
        g.begin_frame();
        g.add_render_target("color0", RGBA8, 64, 32, Residency::Managed).unwrap();
        g.add_render_target("color0", RGBA8, 64, 32, Residency::Managed).unwrap();
        assert_eq!(g.resource_names().count(), 1);
    }

    #[test]
    fn conflicting_redeclaration_in_same_phase_fails() {
        let mut g = RenderGraph::new();
        g.begin_frame();
        g.add_render_target("color0", RGBA8, 64, 32, Residency::Managed).unwrap();
        let err = g
            .add_render_target("color0", RGBA8, 128, 32, Residency::Managed)
            .unwrap_err();
        assert!(matches!(err, PipelineError::ResourceConflict { .. }));
    }

    #[test]
    fn resize_across_phases_updates_descriptor() {
        let mut g = RenderGraph::new();
        g.begin_frame();
        g.add_render_target("color0", RGBA8, 64, 32, Residency::Managed).unwrap();
        g.begin_frame();
        g.add_render_target("color0", RGBA8, 128, 64, Residency::Managed).unwrap();
        assert_eq!(g.resource("color0").map(|r| r.width), Some(128));
    }

    #[test]
    fn begin_frame_keeps_resources_and_drops_passes() {
        let mut g = RenderGraph::new();
        g.begin_frame();
        g.add_render_target("color0", RGBA8, 8, 8, Residency::Persistent).unwrap();
        g.add_render_pass(8, 8, "default")
            .add_render_target("color0", LoadOp::Discard, StoreOp::Store);
        assert_eq!(g.passes().len(), 1);
        g.begin_frame();
        assert!(g.passes().is_empty());
        assert!(g.contains_resource("color0"));
    }

    #[test]
    fn queue_records_scene_with_light_frustum() {
        let mut g = RenderGraph::new();
        g.begin_frame();
        g.add_render_target("shadow", RGBA8, 16, 16, Residency::Managed).unwrap();
        let mut pass = g.add_render_pass(16, 16, "default");
        pass.add_render_target("shadow", LoadOp::Clear(wgpu::Color::WHITE), StoreOp::Store);
        pass.add_queue(QueueHint::None, "shadow-caster")
            .add_scene(CameraId(1), SceneFlags::OPAQUE | SceneFlags::SHADOW_CASTER, None)
            .use_light_frustum(LightId(7), 2);
        let id = pass.id();
        let recorded = g.pass(id).unwrap();
        match &recorded.queues[0].commands[0] {
            QueueCommand::Scene(draw) => assert_eq!(draw.light_frustum, Some((LightId(7), 2))),
            other => panic!("unexpected command {other:?}"),
        }
        assert!(g.validate().is_ok());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "referenced before declaration")]
    fn undeclared_reference_asserts_in_debug() {
        let mut g = RenderGraph::new();
        g.begin_frame();
        g.add_render_pass(8, 8, "default").add_texture("missing", "inputTexture");
    }

    #[test]
    fn external_texture_is_queryable() {
        let mut g = RenderGraph::new();
        g.begin_frame();
        assert!(!g.has_external_texture("lut"));
        let tex = ExternalTexture {
            id: 3,
            width: 256,
            height: 16,
            format: RGBA8,
        };
        g.add_external_texture("lut", tex, ResourceFlags::SAMPLED).unwrap();
        assert!(g.has_external_texture("lut"));
    }

    #[test]
    fn viewport_overlap() {
        let a = Viewport::new(0, 0, 10, 10);
        let b = Viewport::new(10, 0, 10, 10);
        let c = Viewport::new(5, 5, 10, 10);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
    }
}
