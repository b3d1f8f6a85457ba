//! Application state for shared services

use std::sync::Arc;

use super::proxy::ProxyTarget;
use crate::domain::StatusTracker;
use crate::infrastructure::services::ProvisioningServiceTrait;

/// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub status: Arc<StatusTracker>,
    pub provisioning: Arc<dyn ProvisioningServiceTrait>,
    pub proxy: ProxyTarget,
}

impl AppState {
    pub fn new(
        status: Arc<StatusTracker>,
        provisioning: Arc<dyn ProvisioningServiceTrait>,
        proxy: ProxyTarget,
    ) -> Self {
        Self {
            status,
            provisioning,
            proxy,
        }
    }
}
