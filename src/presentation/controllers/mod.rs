//! HTTP controllers for handling requests

pub mod dependencies;

pub use dependencies::*;

use std::sync::Arc;

use crate::application::DependencyService;

/// Application state shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub dependency_service: Arc<dyn DependencyService>,
}
