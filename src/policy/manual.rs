use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::errors::ClientError;
use crate::model::config::ConfigEntry;
use crate::policy::core::PolicyCore;

/// Downloads the config JSON only when [`ManualPollingPolicy::refresh`] is called.
pub struct ManualPollingPolicy {
    core: Arc<PolicyCore>,
}

impl ManualPollingPolicy {
    pub fn new(core: Arc<PolicyCore>) -> Self {
        core.sync_cache();
        core.mark_initialized();
        Self { core }
    }

    pub fn get_configuration(&self) -> Arc<ConfigEntry> {
        self.core.sync_cache()
    }

    pub async fn refresh(&self) -> Result<bool, ClientError> {
        self.core.fetch_if_older(DateTime::<Utc>::MAX_UTC).await
    }

    pub fn core(&self) -> &Arc<PolicyCore> {
        &self.core
    }
}
