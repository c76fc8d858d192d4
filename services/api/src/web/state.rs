//! services/api/src/web/state.rs
//!
//! Defines the application state shared by every request handler.

use crate::config::Config;
use reading_tracker_core::ports::{LibraryService, SessionCommandService};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The command surface used for listing, correcting and deleting sessions.
    pub sessions: Arc<dyn SessionCommandService>,
    pub library: Arc<dyn LibraryService>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Builds the state from a single store implementing both ports.
    pub fn new<S>(store: Arc<S>, config: Arc<Config>) -> Self
    where
        S: SessionCommandService + LibraryService + 'static,
    {
        Self {
            sessions: store.clone(),
            library: store,
            config,
        }
    }
}
