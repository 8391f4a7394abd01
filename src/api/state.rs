//! Application state for the payroll engine API.
//!
//! This module defines the shared application state that is available
//! to all request handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{ConfigLoader, EngineSettings};
use crate::engine::PayrollEngine;

/// Shared application state.
///
/// Holds the engine, which owns the store and the loaded reference data.
#[derive(Clone)]
pub struct AppState {
    engine: Arc<PayrollEngine>,
}

impl AppState {
    /// Builds the engine from a loaded configuration.
    ///
    /// Planning work is bounded by the configured request timeout.
    pub fn new(config: ConfigLoader) -> Self {
        let timeout = Duration::from_millis(config.settings().server.request_timeout_ms);
        let engine = PayrollEngine::from_config(config.config()).with_planning_timeout(timeout);
        Self::with_engine(engine)
    }

    /// Wraps an already constructed engine.
    pub fn with_engine(engine: PayrollEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    /// Returns the engine.
    pub fn engine(&self) -> &PayrollEngine {
        &self.engine
    }

    /// Returns a shared handle to the engine for blocking work.
    pub fn engine_handle(&self) -> Arc<PayrollEngine> {
        Arc::clone(&self.engine)
    }

    /// Returns the engine settings.
    pub fn settings(&self) -> &EngineSettings {
        self.engine.settings()
    }
}
