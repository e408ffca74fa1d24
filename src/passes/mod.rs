//! Built-in pass builders, one module per frame stage.
//!
//! | Builder                   | Order | Produces                                 |
//! |---------------------------|-------|------------------------------------------|
//! | [`PrePassBuilder`]        | 0     | packed scene depth                       |
//! | [`ShadowPassBuilder`]     | 200   | CSM atlas, spot shadow maps, light lists |
//! | [`MainPassBuilder`]       | 300   | scene radiance (offscreen or window)     |
//! | [`SssPassBuilder`]        | 400   | blurred skin diffuse + specular          |
//! | [`PostProcessPassBuilder`]| 500   | window color (owns [`TaaPassBuilder`])   |
//! | [`UiPassBuilder`]         | 1000  | 2D + profiler queue on the last pass     |

pub mod main_pass;
pub mod post;
pub mod prepass;
pub mod shadow;
pub mod sss;
pub mod taa;
pub mod ui;

pub use main_pass::{MAX_REFLECTION_PROBES, MainPassBuilder, pack_rgbe};
pub use post::{PostEffect, PostProcessPassBuilder};
pub use prepass::PrePassBuilder;
pub use shadow::{ShadowPassBuilder, csm_viewport};
pub use sss::SssPassBuilder;
pub use taa::{TaaHistory, TaaMode, TaaPassBuilder};
pub use ui::UiPassBuilder;

use crate::pass_builder::PassBuilder;

/// The default builder set, unsorted.
#[must_use]
pub fn default_builders() -> Vec<Box<dyn PassBuilder>> {
    vec![
        Box::new(PrePassBuilder::new()),
        Box::new(ShadowPassBuilder::new()),
        Box::new(MainPassBuilder::new()),
        Box::new(SssPassBuilder::new()),
        Box::new(PostProcessPassBuilder::new()),
        Box::new(UiPassBuilder::new()),
    ]
}
