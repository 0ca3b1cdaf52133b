//! HTTP adapter
//!
//! Translates JSON requests into [`InboundEvent`](crate::contract::InboundEvent)s
//! for the concurrency controller and serializes its responses back.

mod handlers;
mod types;

pub use handlers::create_router;

use crate::runtime::ProductionController;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<ProductionController>,
}

impl AppState {
    pub fn new(controller: Arc<ProductionController>) -> Self {
        Self { controller }
    }
}
