use std::sync::Arc;

use crate::coach::CoachPipeline;

/// Shared application state injected into handlers. The pipeline is the
/// only long-lived object; everything request-scoped stays in handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<CoachPipeline>,
}

impl AppState {
    pub fn new(pipeline: Arc<CoachPipeline>) -> Self {
        Self { pipeline }
    }
}
