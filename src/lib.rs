#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

//! Render-graph frame scheduler of a forward rendering pipeline.
//!
//! Every frame, [`ForwardPipeline`] walks the cameras and, for each one,
//! runs an ordered chain of [`PassBuilder`]s that declare resources and
//! record passes on a [`RenderGraph`]: depth prepass, shadows, the forward
//! main pass, screen-space subsurface scattering, post-processing (with
//! TAA) and the UI overlay.

pub mod camera;
pub mod camera_info;
pub mod context;
pub mod errors;
pub mod features;
pub mod geometry;
pub mod graph;
pub mod jitter;
pub mod pass_builder;
pub mod passes;
pub mod pipeline;
pub mod settings;
pub mod window_info;

pub use camera::{Camera, CameraId, CameraUsage, Light, LightId, RenderScene, RenderWindow, VisibilityLayers};
pub use camera_info::{CameraInfo, DeclarationKey, OffscreenDecision};
pub use context::RenderingContext;
pub use errors::{PipelineError, Result};
pub use features::{DeviceCapabilities, GraphicsApi, PipelineFeatures, PipelineSceneData, StaticDevice};
pub use graph::{PassId, RenderGraph, Viewport};
pub use jitter::JitterSequence;
pub use pass_builder::{FrameEnv, PassBuilder, PassLookup, PassRegistry, PipelineResources, order};
pub use pipeline::ForwardPipeline;
pub use settings::{MaterialHandle, ObservableSettings, PipelineSettings, TextureHandle};
pub use window_info::{WindowInfo, WindowInfoRegistry};
