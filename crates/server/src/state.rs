//! Application state
//!
//! Shared state across all handlers.

use std::sync::Arc;

use voxcard_config::Settings;
use voxcard_pipeline::PacedSynthesisPipeline;

/// Application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration
    pub config: Arc<Settings>,
    /// The synthesis pipeline, shared across requests
    pub pipeline: Arc<PacedSynthesisPipeline>,
}

impl AppState {
    pub fn new(config: Settings, pipeline: PacedSynthesisPipeline) -> Self {
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
        }
    }
}
