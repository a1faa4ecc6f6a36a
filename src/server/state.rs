//! Shared application state injected into every handler.

use crate::config::ServerConfig;
use crate::convert::Converter;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub converter: Converter,
}
