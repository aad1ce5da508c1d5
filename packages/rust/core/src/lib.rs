//! Response pipeline for Researcher.
//!
//! Ties the search and inference collaborators together: optional web
//! search, time-aware prompt assembly, then a single chat completion.

pub mod pipeline;
pub mod prompt;

pub use pipeline::{
    Clock, LocalClock, PipelineConfig, PipelineOutput, PipelineProgress,
    ResponsePipeline, SilentProgress,
};
