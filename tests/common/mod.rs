//! Shared fixtures for the pipeline integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use forward_pipeline::graph::{QueueCommand, RenderPass};
use forward_pipeline::{
    Camera, DeviceCapabilities, ForwardPipeline, MaterialHandle, PipelineResources, PipelineSceneData,
    PipelineSettings, RenderGraph, RenderScene, RenderWindow, StaticDevice,
};

pub const UTIL: MaterialHandle = MaterialHandle(1);

pub const EPSILON: f64 = 1e-6;

pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn resources() -> PipelineResources {
    PipelineResources {
        util_material: Some(UTIL),
        ..Default::default()
    }
}

pub fn pipeline() -> ForwardPipeline {
    init_logger();
    ForwardPipeline::new(resources()).unwrap()
}

pub fn pipeline_with(settings: PipelineSettings) -> ForwardPipeline {
    let mut pipeline = pipeline();
    pipeline.set_default_settings(Arc::new(settings)).unwrap();
    pipeline
}

pub fn camera(id: u32, window: u32, width: u32, height: u32) -> Camera {
    Camera::new(id, RenderWindow::new(window, width, height), Arc::new(RenderScene::default()))
}

pub fn camera_in(id: u32, window: u32, scene: RenderScene) -> Camera {
    Camera::new(id, RenderWindow::new(window, 800, 600), Arc::new(scene))
}

/// One full frame on a fresh desktop device.
pub fn frame(
    pipeline: &mut ForwardPipeline,
    graph: &mut RenderGraph,
    scene_data: &PipelineSceneData,
    cameras: &[Camera],
) {
    frame_on(pipeline, graph, &StaticDevice::desktop(), scene_data, cameras);
}

pub fn frame_on(
    pipeline: &mut ForwardPipeline,
    graph: &mut RenderGraph,
    device: &dyn DeviceCapabilities,
    scene_data: &PipelineSceneData,
    cameras: &[Camera],
) {
    pipeline
        .render_frame(graph, device, scene_data, cameras)
        .unwrap();
    graph.validate().unwrap();
}

pub fn pass_names(graph: &RenderGraph) -> Vec<&str> {
    graph.passes().iter().map(|p| p.name.as_str()).collect()
}

pub fn pass<'g>(graph: &'g RenderGraph, name: &str) -> &'g RenderPass {
    graph
        .find_pass(name)
        .unwrap_or_else(|| panic!("pass '{name}' not recorded; got {:?}", pass_names(graph)))
}

pub fn commands(pass: &RenderPass) -> impl Iterator<Item = &QueueCommand> {
    pass.queues.iter().flat_map(|q| q.commands.iter())
}
