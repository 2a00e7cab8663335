//! HTTP surface standing in for the device transport

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;

use crate::runtime::RelayRuntime;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<RelayRuntime>,
}

impl AppState {
    pub fn new(runtime: RelayRuntime) -> Self {
        Self {
            runtime: Arc::new(runtime),
        }
    }
}
