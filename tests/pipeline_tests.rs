//! Frame Scheduler Tests
//!
//! Tests for:
//! - Builder ordering and per-camera context reset
//! - Readiness gating (no utility material → nothing recorded)
//! - Settings resolution (editor override, camera override, default)
//! - Window (re)declaration on resize and settings changes
//! - The single-pass path for cameras outside the default layer
//! - Profiler camera selection and the UI overlay

mod common;

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use forward_pipeline::graph::{QueueCommand, SceneFlags};
use forward_pipeline::passes::default_builders;
use forward_pipeline::{
    CameraId, CameraUsage, ForwardPipeline, PassBuilder, PassId, PassLookup, PipelineError, PipelineResources,
    PipelineSceneData, PipelineSettings, RenderGraph, RenderWindow, RenderingContext, VisibilityLayers, order,
};
use forward_pipeline::{CameraInfo, FrameEnv};

use common::*;

/// Records the context every camera's chain starts from.
#[derive(Default)]
struct ContextRecorder {
    seen: Rc<RefCell<Vec<RenderingContext>>>,
}

impl PassBuilder for ContextRecorder {
    fn name(&self) -> &'static str {
        "context-recorder"
    }

    fn render_order(&self) -> i32 {
        -1
    }

    fn setup(
        &mut self,
        _graph: &mut RenderGraph,
        _env: &FrameEnv<'_>,
        _lookup: &PassLookup<'_>,
        _info: &CameraInfo,
        _camera: &forward_pipeline::Camera,
        ctx: &mut RenderingContext,
    ) -> forward_pipeline::Result<Option<PassId>> {
        self.seen.borrow_mut().push(ctx.clone());
        Ok(ctx.last_pass)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Always fails its setup.
struct FailingBuilder;

impl PassBuilder for FailingBuilder {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn render_order(&self) -> i32 {
        450
    }

    fn setup(
        &mut self,
        _graph: &mut RenderGraph,
        _env: &FrameEnv<'_>,
        _lookup: &PassLookup<'_>,
        _info: &CameraInfo,
        _camera: &forward_pipeline::Camera,
        _ctx: &mut RenderingContext,
    ) -> forward_pipeline::Result<Option<PassId>> {
        Err(PipelineError::NoColorTarget { builder: "failing" })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Ordering and context
// ============================================================================

#[test]
fn builders_run_in_ascending_render_order() {
    let pipeline = pipeline();
    assert_eq!(
        pipeline.registry().orders(),
        vec![order::PRE, order::SHADOW, order::MAIN, order::SSS, order::POST, order::UI]
    );
}

#[test]
fn duplicate_builder_order_is_rejected() {
    let mut builders = default_builders();
    builders.push(Box::new(FailingBuilder));
    builders.push(Box::new(FailingBuilder));
    let err = ForwardPipeline::with_builders(resources(), builders).unwrap_err();
    assert!(matches!(err, PipelineError::DuplicateRenderOrder(450)));
}

#[test]
fn every_camera_starts_from_an_empty_context() {
    init_logger();
    let recorder = ContextRecorder::default();
    let seen = Rc::clone(&recorder.seen);
    let mut builders = default_builders();
    builders.push(Box::new(recorder));
    let mut pipeline = ForwardPipeline::with_builders(resources(), builders).unwrap();

    let mut graph = RenderGraph::new();
    let cameras = [camera(1, 1, 800, 600), camera(2, 2, 320, 240)];
    frame(&mut pipeline, &mut graph, &PipelineSceneData::default(), &cameras);

    let seen = seen.borrow();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|ctx| *ctx == RenderingContext::default()));
    assert_eq!(pipeline.context().color_name(), Some("windowColor2"));
}

#[test]
fn failing_builder_does_not_stop_the_chain() {
    init_logger();
    let mut builders = default_builders();
    builders.push(Box::new(FailingBuilder));
    let mut pipeline = ForwardPipeline::with_builders(resources(), builders).unwrap();

    let mut graph = RenderGraph::new();
    frame(&mut pipeline, &mut graph, &PipelineSceneData::default(), &[camera(1, 1, 800, 600)]);

    // UI still appended its queue to the forward pass.
    let forward = pass(&graph, "forwardPass");
    assert!(commands(forward).any(|c| *c == QueueCommand::Draw2d(CameraId(1))));
}

// ============================================================================
// Readiness
// ============================================================================

#[test]
fn missing_utility_material_records_nothing() {
    init_logger();
    let mut pipeline = ForwardPipeline::new(PipelineResources::default()).unwrap();
    assert!(!pipeline.is_ready());

    let mut graph = RenderGraph::new();
    let cam = camera(1, 1, 800, 600);
    frame(&mut pipeline, &mut graph, &PipelineSceneData::default(), &[cam]);

    assert!(graph.passes().is_empty());
    assert!(!graph.contains_resource("windowColor1"));
}

#[test]
fn cameras_without_scene_or_window_are_skipped() {
    let mut pipeline = pipeline();
    let mut graph = RenderGraph::new();

    let mut no_scene = camera(1, 1, 800, 600);
    no_scene.scene = None;
    let mut no_window = camera(2, 2, 800, 600);
    no_window.window = None;

    frame(&mut pipeline, &mut graph, &PipelineSceneData::default(), &[no_scene, no_window]);
    assert!(graph.passes().is_empty());
}

// ============================================================================
// Default frame
// ============================================================================

#[test]
fn default_frame_renders_straight_into_the_window() {
    let mut pipeline = pipeline();
    let mut graph = RenderGraph::new();
    frame(&mut pipeline, &mut graph, &PipelineSceneData::default(), &[camera(1, 7, 800, 600)]);

    assert_eq!(pass_names(&graph), vec!["forwardPass"]);
    let forward = pass(&graph, "forwardPass");
    assert_eq!((forward.width, forward.height), (800, 600));
    assert_eq!(forward.color[0].name, "windowColor7");
    assert_eq!(
        forward.depth_stencil.as_ref().map(|d| d.name.as_str()),
        Some("windowDepthStencil7")
    );

    let ui = forward.queues.last().unwrap();
    assert_eq!(
        ui.commands,
        vec![QueueCommand::Draw2d(CameraId(1)), QueueCommand::Profiler(CameraId(1))]
    );
    assert!(forward.show_statistics);
}

#[test]
fn jitter_only_advances_on_taa_frames() {
    let mut pipeline = pipeline();
    let mut graph = RenderGraph::new();
    let cam = camera(1, 1, 800, 600);

    frame(&mut pipeline, &mut graph, &PipelineSceneData::default(), std::slice::from_ref(&cam));
    assert_eq!(pipeline.jitter().sample_index(), 0);

    let mut settings = PipelineSettings::default();
    settings.taa.enabled = true;
    pipeline.set_default_settings(Arc::new(settings)).unwrap();
    for _ in 0..2 {
        frame(&mut pipeline, &mut graph, &PipelineSceneData::default(), std::slice::from_ref(&cam));
    }
    assert_eq!(pipeline.jitter().sample_index(), 2);
}

// ============================================================================
// Settings resolution
// ============================================================================

#[test]
fn settings_resolve_editor_then_camera_then_default() {
    let mut pipeline = pipeline();

    let mut editor = PipelineSettings::default();
    editor.taa.enabled = true;
    pipeline.set_editor_settings(Some(Arc::new(editor))).unwrap();

    let mut own = PipelineSettings::default();
    own.msaa.enabled = true;

    let mut scene_view = camera(1, 1, 800, 600);
    scene_view.usage = CameraUsage::SceneView;
    scene_view.settings = Some(Arc::new(own.clone()));
    assert!(pipeline.resolve_settings(&scene_view).taa.enabled);

    let mut game = camera(2, 2, 800, 600);
    game.settings = Some(Arc::new(own));
    assert!(pipeline.resolve_settings(&game).msaa.enabled);
    assert!(!pipeline.resolve_settings(&game).taa.enabled);

    let plain = camera(3, 3, 800, 600);
    assert_eq!(*pipeline.resolve_settings(&plain), PipelineSettings::default());
}

#[test]
fn invalid_settings_are_refused() {
    let mut pipeline = pipeline();
    let mut settings = PipelineSettings::default();
    settings.shading_scale = 0.0;
    assert!(pipeline.set_default_settings(Arc::new(settings)).is_err());
    assert_eq!(**pipeline.default_settings(), PipelineSettings::default());
}

#[test]
fn invalid_camera_override_falls_back_to_default() {
    let mut pipeline = pipeline();
    let mut graph = RenderGraph::new();

    let mut broken = PipelineSettings::default();
    broken.msaa.enabled = true;
    broken.msaa.sample_count = 3;
    broken.enable_shading_scale = true;
    broken.shading_scale = f32::NAN;

    let mut cam = camera(1, 1, 800, 600);
    cam.settings = Some(Arc::new(broken));
    assert_eq!(*pipeline.resolve_settings(&cam), PipelineSettings::default());

    frame(&mut pipeline, &mut graph, &PipelineSceneData::default(), &[cam]);
    assert_eq!(pass_names(&graph), vec!["forwardPass"]);
    let forward = pass(&graph, "forwardPass");
    assert_eq!(forward.sample_count, 1);
    assert_eq!((forward.width, forward.height), (800, 600));
}

// ============================================================================
// Window declarations
// ============================================================================

#[test]
fn scaled_dimensions_never_reach_zero() {
    let mut pipeline = pipeline_with(PipelineSettings {
        enable_shading_scale: true,
        shading_scale: 0.1,
        ..Default::default()
    });
    let mut graph = RenderGraph::new();
    frame(&mut pipeline, &mut graph, &PipelineSceneData::default(), &[camera(1, 1, 0, 5)]);

    let window = pipeline.window_info(1).unwrap();
    assert_eq!((window.native_width(), window.native_height()), (1, 5));
    assert_eq!((window.width(), window.height()), (1, 1));
    assert!(graph.passes().iter().all(|p| p.width >= 1 && p.height >= 1));
}

#[test]
fn window_resize_redeclares_targets() {
    let mut pipeline = pipeline();
    let mut graph = RenderGraph::new();
    let scene = PipelineSceneData::default();

    frame(&mut pipeline, &mut graph, &scene, &[camera(1, 1, 800, 600)]);
    assert_eq!(graph.resource("windowColor1").unwrap().width, 800);

    frame(&mut pipeline, &mut graph, &scene, &[camera(1, 1, 1024, 768)]);
    let color = graph.resource("windowColor1").unwrap();
    assert_eq!((color.width, color.height), (1024, 768));
    assert_eq!(graph.resource("postIntermediate1").unwrap().width, 1024);
    assert_eq!(graph.resource_window("windowColor1"), Some(1));
    assert_eq!(pass(&graph, "forwardPass").width, 1024);
}

#[test]
fn settings_change_declares_new_targets() {
    let mut pipeline = pipeline();
    let mut graph = RenderGraph::new();
    let scene = PipelineSceneData::default();
    let cam = camera(1, 1, 800, 600);

    frame(&mut pipeline, &mut graph, &scene, std::slice::from_ref(&cam));
    assert!(!graph.contains_resource("taaFrame01_1"));

    let mut settings = PipelineSettings::default();
    settings.taa.enabled = true;
    pipeline.set_default_settings(Arc::new(settings)).unwrap();
    frame(&mut pipeline, &mut graph, &scene, std::slice::from_ref(&cam));

    assert!(graph.contains_resource("taaFrame01_1"));
    assert!(graph.contains_resource("taaFrame11_1"));
    assert!(graph.contains_resource("sceneDepthPacked1"));
    assert!(graph.contains_resource("radianceColor1"));
}

#[test]
fn removed_window_is_declared_again() {
    let mut pipeline = pipeline();
    let mut graph = RenderGraph::new();
    let scene = PipelineSceneData::default();
    let cam = camera(1, 1, 800, 600);

    frame(&mut pipeline, &mut graph, &scene, std::slice::from_ref(&cam));
    assert!(pipeline.window_info(1).is_some());

    pipeline.remove_window(1);
    assert!(pipeline.window_info(1).is_none());

    frame(&mut pipeline, &mut graph, &scene, std::slice::from_ref(&cam));
    assert!(pipeline.window_info(1).is_some());
    assert_eq!(pass_names(&graph), vec!["forwardPass"]);
}

// ============================================================================
// Simple pipeline, profiler, UI
// ============================================================================

#[test]
fn non_default_layer_uses_single_native_pass() {
    let mut pipeline = pipeline_with(PipelineSettings {
        enable_shading_scale: true,
        shading_scale: 0.5,
        ..Default::default()
    });
    let mut graph = RenderGraph::new();
    let mut ui_camera = camera(4, 1, 800, 600);
    ui_camera.visibility = VisibilityLayers::UI_2D;
    frame(&mut pipeline, &mut graph, &PipelineSceneData::default(), &[ui_camera]);

    assert_eq!(pass_names(&graph), vec!["simplePass"]);
    let simple = pass(&graph, "simplePass");
    assert_eq!((simple.width, simple.height), (800, 600));
    assert_eq!(simple.color[0].name, "windowColor1");
    assert!(simple.show_statistics);

    let all: Vec<_> = commands(simple).collect();
    assert!(all.iter().any(|c| matches!(c,
        QueueCommand::Scene(draw) if draw.flags == SceneFlags::OPAQUE | SceneFlags::BLEND | SceneFlags::MASK | SceneFlags::GEOMETRY)));
    assert!(all.contains(&&QueueCommand::Draw2d(CameraId(4))));
    assert!(all.contains(&&QueueCommand::Profiler(CameraId(4))));
}

#[test]
fn profiler_goes_to_last_swapchain_camera() {
    let mut pipeline = pipeline();
    let mut graph = RenderGraph::new();

    let mut offscreen = camera(2, 2, 320, 240);
    offscreen.window = Some(RenderWindow::offscreen(2, 320, 240));
    let cameras = [camera(1, 1, 800, 600), offscreen];
    frame(&mut pipeline, &mut graph, &PipelineSceneData::default(), &cameras);

    assert_eq!(pipeline.profiler_camera(), Some(CameraId(1)));

    let offscreen_pass = graph
        .passes()
        .iter()
        .find(|p| p.color.first().is_some_and(|a| a.name == "windowColor2"))
        .unwrap();
    assert!(!offscreen_pass.show_statistics);
    assert!(commands(offscreen_pass).all(|c| !matches!(c, QueueCommand::Profiler(_))));
    assert!(commands(offscreen_pass).any(|c| *c == QueueCommand::Draw2d(CameraId(2))));
}
