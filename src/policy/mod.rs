use std::sync::Arc;
use std::time::Duration;

use log::warn;

use crate::errors::{ClientError, ErrorKind};
use crate::model::config::ConfigEntry;
use crate::model::enums::ClientCacheState;
use crate::policy::auto::AutoPollingPolicy;
use crate::policy::core::PolicyCore;
use crate::policy::lazy::LazyLoadingPolicy;
use crate::policy::manual::ManualPollingPolicy;

pub mod auto;
pub mod core;
pub mod factory;
pub mod lazy;
pub mod manual;

/// The refresh behavior selected by a [`crate::PollingMode`].
pub enum RefreshPolicy {
    AutoPoll(AutoPollingPolicy),
    LazyLoad(LazyLoadingPolicy),
    Manual(ManualPollingPolicy),
}

impl RefreshPolicy {
    /// Returns the config JSON snapshot to evaluate against, refreshing it if the mode requires.
    pub async fn get_configuration(&self) -> Arc<ConfigEntry> {
        match self {
            RefreshPolicy::AutoPoll(policy) => policy.get_configuration().await,
            RefreshPolicy::LazyLoad(policy) => policy.get_configuration().await,
            RefreshPolicy::Manual(policy) => policy.get_configuration(),
        }
    }

    /// Downloads the config JSON regardless of the age of the current one.
    pub async fn refresh(&self) -> Result<(), ClientError> {
        let result = match self {
            RefreshPolicy::AutoPoll(policy) => policy.refresh().await,
            RefreshPolicy::LazyLoad(policy) => policy.refresh().await,
            RefreshPolicy::Manual(policy) => policy.refresh().await,
        };
        match result {
            Ok(_) => Ok(()),
            Err(err) => {
                if err.kind == ErrorKind::OfflineClient {
                    warn!(event_id = err.kind.event_id(); "{err}");
                }
                Err(err)
            }
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.core().set_offline(offline);
    }

    pub fn is_offline(&self) -> bool {
        self.core().is_offline()
    }

    /// Waits at most `timeout` until the policy has completed its initialization.
    pub async fn wait_for_ready(&self, timeout: Duration) -> Result<ClientCacheState, ClientError> {
        let core = self.core();
        if !core.wait_initialized(timeout).await {
            return Err(ClientError::new(
                ErrorKind::ClientInitTimedOut,
                format!(
                    "The client did not initialize in {}ms.",
                    timeout.as_millis()
                ),
            ));
        }
        let fresh_for = match self {
            RefreshPolicy::AutoPoll(policy) => Some(policy.interval()),
            RefreshPolicy::LazyLoad(policy) => Some(policy.cache_ttl()),
            RefreshPolicy::Manual(_) => None,
        };
        Ok(core.cache_state(fresh_for))
    }

    /// Stops the background work of the policy.
    pub fn close(&self) {
        match self {
            RefreshPolicy::AutoPoll(policy) => policy.close(),
            RefreshPolicy::LazyLoad(policy) => policy.close(),
            RefreshPolicy::Manual(_) => {}
        }
    }

    pub fn core(&self) -> &Arc<PolicyCore> {
        match self {
            RefreshPolicy::AutoPoll(policy) => policy.core(),
            RefreshPolicy::LazyLoad(policy) => policy.core(),
            RefreshPolicy::Manual(policy) => policy.core(),
        }
    }
}
