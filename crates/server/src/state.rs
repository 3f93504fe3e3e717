use std::sync::Arc;

use tvguide_core::{Config, Guide, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    guide: Arc<Guide>,
}

impl AppState {
    pub fn new(config: Config, guide: Arc<Guide>) -> Self {
        Self { config, guide }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn guide(&self) -> &Guide {
        self.guide.as_ref()
    }
}
