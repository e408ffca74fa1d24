//! Error Types
//!
//! This module defines the error types used throughout the pipeline.
//!
//! # Overview
//!
//! The main error type [`PipelineError`] covers the failure modes that can
//! escape a builder or the scheduler:
//! - Resource declaration conflicts inside one declaration phase
//! - References to resources that were never declared
//! - Pass-builder registry misconfiguration
//! - Settings parsing and validation failures
//!
//! Capability shortfalls and missing optional collaborators are *not* errors:
//! they fall back or skip silently (with a log line at most).
//!
//! # Usage
//!
//! ```rust,ignore
//! use forward_pipeline::errors::{PipelineError, Result};
//!
//! fn resize() -> Result<()> {
//!     // Operations that may fail return Result
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::graph::ResourceDesc;

/// The main error type for the pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    // ========================================================================
    // Render Graph Errors
    // ========================================================================
    /// The same resource name was declared twice with different descriptors
    /// inside one declaration phase.
    #[error("Resource '{name}' redeclared as {requested:?}, already declared as {existing:?}")]
    ResourceConflict {
        /// Render-graph vertex name
        name: String,
        /// Descriptor already registered in this phase
        existing: ResourceDesc,
        /// Descriptor of the rejected declaration
        requested: ResourceDesc,
    },

    /// A pass referenced a resource that has not been declared.
    #[error("Resource referenced before declaration: {0}")]
    UndeclaredResource(String),

    /// A builder that consumes the carried color target ran before any
    /// builder produced one.
    #[error("No color target carried into the {builder} builder")]
    NoColorTarget {
        /// Name of the builder that needed the color target
        builder: &'static str,
    },

    /// A builder that depth-tests against the carried depth-stencil ran
    /// before any builder produced one.
    #[error("No depth-stencil target carried into the {builder} builder")]
    NoDepthStencilTarget {
        /// Name of the builder that needed the depth-stencil target
        builder: &'static str,
    },

    // ========================================================================
    // Pass Registry Errors
    // ========================================================================
    /// A builder depends on a render order no registered builder provides.
    #[error("No pass builder registered with render order {0}")]
    MissingPassBuilder(i32),

    /// Two builders share the same render order.
    #[error("Duplicate pass builder render order {0}")]
    DuplicateRenderOrder(i32),

    /// A builder found by order is not of the expected concrete type.
    #[error("Pass builder at render order {order} is not a {expected}")]
    PassBuilderMismatch {
        /// Render order that was looked up
        order: i32,
        /// Expected builder type name
        expected: &'static str,
    },

    // ========================================================================
    // Settings Errors
    // ========================================================================
    /// Settings contain an out-of-range value.
    #[error("Invalid pipeline settings: {0}")]
    InvalidSettings(String),

    /// JSON parsing error.
    #[error("Settings parse error: {0}")]
    SettingsParse(#[from] serde_json::Error),
}

/// Alias for `Result<T, PipelineError>`.
pub type Result<T> = std::result::Result<T, PipelineError>;
