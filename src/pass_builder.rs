//! Pass Builder Trait & Registry
//!
//! A pass builder owns one stage of the frame (shadow, main, post, ...). The
//! [`PassRegistry`] orders builders by their integer render order and hands
//! each running builder a [`PassLookup`] over the others, so later stages can
//! read state cached by earlier ones (the main pass reads the shadow pass's
//! culled light lists).
//!
//! # Design Principles
//! - `window_resize` declares resources; it runs on a declaration phase
//! - `update_global_resources` registers per-frame external resources
//! - `setup` records passes and returns the pass later builders append to
//! - A builder never reaches another builder except through [`PassLookup`]

use std::any::{Any, type_name};

use crate::camera::{Camera, CameraId, ReflectionProbeSource};
use crate::camera_info::CameraInfo;
use crate::context::RenderingContext;
use crate::errors::{PipelineError, Result};
use crate::features::PipelineFeatures;
use crate::graph::{PassId, RenderGraph};
use crate::jitter::JitterSequence;
use crate::settings::{MaterialHandle, PipelineSettings};

/// Render orders of the built-in builders.
pub mod order {
    pub const PRE: i32 = 0;
    pub const SHADOW: i32 = 200;
    pub const MAIN: i32 = 300;
    pub const SSS: i32 = 400;
    pub const POST: i32 = 500;
    pub const UI: i32 = 1000;
}

/// Shared collaborators owned by the pipeline.
#[derive(Default)]
pub struct PipelineResources {
    /// Utility material (copy, blur, TAA resolve). Without it the pipeline is
    /// not ready and records nothing.
    pub util_material: Option<MaterialHandle>,
    pub reflection_probes: Option<Box<dyn ReflectionProbeSource>>,
    /// Editor context: enables cube reflection-probe baking.
    pub editor: bool,
}

impl std::fmt::Debug for PipelineResources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineResources")
            .field("util_material", &self.util_material)
            .field("reflection_probes", &self.reflection_probes.is_some())
            .field("editor", &self.editor)
            .finish()
    }
}

/// Read-only per-camera environment passed to every hook.
#[derive(Clone, Copy)]
pub struct FrameEnv<'a> {
    pub settings: &'a PipelineSettings,
    pub features: &'a PipelineFeatures,
    pub jitter: &'a JitterSequence,
    pub resources: &'a PipelineResources,
    pub profiler_camera: Option<CameraId>,
}

impl FrameEnv<'_> {
    /// Utility material; warns when absent.
    pub fn util_material(&self, stage: &str) -> Option<MaterialHandle> {
        let util = self.resources.util_material;
        if util.is_none() {
            log::warn!("Utility material missing, {stage} skipped");
        }
        util
    }
}

/// One stage of the frame.
pub trait PassBuilder: Any {
    fn name(&self) -> &'static str;

    /// Unique ordering key; builders run in ascending order.
    fn render_order(&self) -> i32;

    /// Render orders this builder looks up at setup time.
    fn dependencies(&self) -> &'static [i32] {
        &[]
    }

    fn window_resize(
        &mut self,
        _graph: &mut RenderGraph,
        _env: &FrameEnv<'_>,
        _info: &CameraInfo,
        _camera: &Camera,
    ) -> Result<()> {
        Ok(())
    }

    fn update_global_resources(
        &mut self,
        _graph: &mut RenderGraph,
        _env: &FrameEnv<'_>,
        _info: &CameraInfo,
    ) -> Result<()> {
        Ok(())
    }

    /// Records this stage. Returns the pass later stages append to (usually
    /// the last pass recorded here, or `ctx.last_pass` when nothing was
    /// recorded).
    fn setup(
        &mut self,
        graph: &mut RenderGraph,
        env: &FrameEnv<'_>,
        lookup: &PassLookup<'_>,
        info: &CameraInfo,
        camera: &Camera,
        ctx: &mut RenderingContext,
    ) -> Result<Option<PassId>>;

    fn as_any(&self) -> &dyn Any;
}

/// View over every builder except the one currently running.
pub struct PassLookup<'a> {
    before: &'a [Box<dyn PassBuilder>],
    after: &'a [Box<dyn PassBuilder>],
}

impl<'a> PassLookup<'a> {
    /// An empty view, for builders driven outside a registry.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            before: &[],
            after: &[],
        }
    }

    #[must_use]
    pub fn find_by_order(&self, order: i32) -> Option<&'a dyn PassBuilder> {
        self.before
            .iter()
            .chain(self.after)
            .find(|b| b.render_order() == order)
            .map(|b| &**b)
    }

    /// Finds the builder registered under `order` and downcasts it.
    pub fn get<T: PassBuilder>(&self, order: i32) -> Result<&'a T> {
        let builder = self
            .find_by_order(order)
            .ok_or(PipelineError::MissingPassBuilder(order))?;
        builder
            .as_any()
            .downcast_ref::<T>()
            .ok_or(PipelineError::PassBuilderMismatch {
                order,
                expected: type_name::<T>(),
            })
    }
}

/// Builders sorted by render order.
pub struct PassRegistry {
    builders: Vec<Box<dyn PassBuilder>>,
}

impl std::fmt::Debug for PassRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.builders.iter().map(|b| (b.render_order(), b.name())))
            .finish()
    }
}

impl PassRegistry {
    /// Stable-sorts the builders, rejects duplicate orders and unresolved
    /// dependencies.
    pub fn new(mut builders: Vec<Box<dyn PassBuilder>>) -> Result<Self> {
        builders.sort_by_key(|b| b.render_order());

        if let Some(pair) = builders
            .windows(2)
            .find(|w| w[0].render_order() == w[1].render_order())
        {
            return Err(PipelineError::DuplicateRenderOrder(pair[0].render_order()));
        }

        for builder in &builders {
            for &dep in builder.dependencies() {
                if !builders.iter().any(|b| b.render_order() == dep) {
                    log::error!("{} depends on missing render order {dep}", builder.name());
                    return Err(PipelineError::MissingPassBuilder(dep));
                }
            }
        }

        Ok(Self { builders })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.builders.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }

    /// Render orders in execution order.
    #[must_use]
    pub fn orders(&self) -> Vec<i32> {
        self.builders.iter().map(|b| b.render_order()).collect()
    }

    #[must_use]
    pub fn find_by_order(&self, order: i32) -> Option<&dyn PassBuilder> {
        self.builders
            .iter()
            .find(|b| b.render_order() == order)
            .map(|b| &**b)
    }

    /// Downcasting variant of [`find_by_order`](Self::find_by_order).
    pub fn get<T: PassBuilder>(&self, order: i32) -> Result<&T> {
        PassLookup {
            before: &self.builders,
            after: &[],
        }
        .get(order)
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn PassBuilder> {
        self.builders.iter().map(|b| &**b)
    }

    /// Runs `f` on every builder in order, each with a lookup over the rest.
    pub fn for_each_with_lookup<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut dyn PassBuilder, &PassLookup<'_>),
    {
        for index in 0..self.builders.len() {
            let (before, rest) = self.builders.split_at_mut(index);
            if let Some((current, after)) = rest.split_first_mut() {
                let lookup = PassLookup {
                    before,
                    after,
                };
                f(&mut **current, &lookup);
            }
        }
    }

    /// Runs `f` on every builder in order, stopping at the first error.
    pub fn try_for_each<F>(&mut self, mut f: F) -> Result<()>
    where
        F: FnMut(&mut dyn PassBuilder) -> Result<()>,
    {
        for builder in &mut self.builders {
            f(&mut **builder)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Marker {
        order: i32,
        deps: &'static [i32],
    }

    impl PassBuilder for Marker {
        fn name(&self) -> &'static str {
            "marker"
        }

        fn render_order(&self) -> i32 {
            self.order
        }

        fn dependencies(&self) -> &'static [i32] {
            self.deps
        }

        fn setup(
            &mut self,
            _graph: &mut RenderGraph,
            _env: &FrameEnv<'_>,
            _lookup: &PassLookup<'_>,
            _info: &CameraInfo,
            _camera: &Camera,
            ctx: &mut RenderingContext,
        ) -> Result<Option<PassId>> {
            Ok(ctx.last_pass)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn marker(order: i32) -> Box<dyn PassBuilder> {
        Box::new(Marker { order, deps: &[] })
    }

    #[test]
    fn sorted_ascending() {
        let reg = PassRegistry::new(vec![marker(500), marker(0), marker(1000), marker(200)]).unwrap();
        assert_eq!(reg.orders(), vec![0, 200, 500, 1000]);
    }

    #[test]
    fn duplicate_orders_rejected() {
        let err = PassRegistry::new(vec![marker(1), marker(1)]).unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateRenderOrder(1)));
    }

    #[test]
    fn missing_dependency_rejected() {
        let dependent = Box::new(Marker { order: 300, deps: &[200] });
        let err = PassRegistry::new(vec![dependent]).unwrap_err();
        assert!(matches!(err, PipelineError::MissingPassBuilder(200)));
    }

    #[test]
    fn lookup_excludes_current_and_downcasts() {
        let mut reg = PassRegistry::new(vec![marker(0), marker(200), marker(300)]).unwrap();
        let mut seen = Vec::new();
        reg.for_each_with_lookup(|current, lookup| {
            let own = current.render_order();
            assert!(lookup.find_by_order(own).is_none());
            let others: Vec<i32> = [0, 200, 300]
                .into_iter()
                .filter(|o| lookup.find_by_order(*o).is_some())
                .collect();
            seen.push((own, others.len()));
        });
        assert_eq!(seen, vec![(0, 2), (200, 2), (300, 2)]);
        assert_eq!(reg.get::<Marker>(200).unwrap().order, 200);
    }
}
