pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;

use std::sync::Arc;

use crate::app::engine::NotificationEngine;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<NotificationEngine>,
    pub admin_token: Option<String>,
}
