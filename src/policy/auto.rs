use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{error, warn};
use tokio_util::sync::CancellationToken;

use crate::errors::{ClientError, ErrorKind};
use crate::model::config::ConfigEntry;
use crate::modes::OnConfigChanged;
use crate::policy::core::{older_than, PolicyCore};

const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Downloads the config JSON periodically in a background task.
pub struct AutoPollingPolicy {
    core: Arc<PolicyCore>,
    interval: Duration,
    max_init_wait: Duration,
    on_change: Option<OnConfigChanged>,
    init_wait_over: AtomicBool,
    token: CancellationToken,
    close: Once,
}

impl AutoPollingPolicy {
    pub fn new(
        core: Arc<PolicyCore>,
        interval: Duration,
        max_init_wait: Duration,
        on_change: Option<OnConfigChanged>,
    ) -> Self {
        let policy = Self {
            core,
            interval: interval.max(MIN_POLL_INTERVAL),
            max_init_wait,
            on_change,
            init_wait_over: AtomicBool::new(false),
            token: CancellationToken::new(),
            close: Once::new(),
        };
        policy.core.sync_cache();
        policy.start_poll();
        policy
    }

    pub async fn get_configuration(&self) -> Arc<ConfigEntry> {
        if !self.init_wait_over.load(Ordering::SeqCst) {
            if !self.core.wait_initialized(self.max_init_wait).await {
                warn!(event_id = ErrorKind::ClientInitTimedOut.event_id(); "`max_init_wait` for the very first fetch reached ({}ms). Returning cached config.", self.max_init_wait.as_millis());
            }
            self.init_wait_over.store(true, Ordering::SeqCst);
        }
        self.core.sync_cache()
    }

    pub async fn refresh(&self) -> Result<bool, ClientError> {
        let changed = self.core.fetch_if_older(DateTime::<Utc>::MAX_UTC).await?;
        if changed {
            if let Some(on_change) = self.on_change.as_ref() {
                on_change();
            }
        }
        Ok(changed)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn close(&self) {
        self.close.call_once(|| self.token.cancel());
    }

    pub fn core(&self) -> &Arc<PolicyCore> {
        &self.core
    }

    fn start_poll(&self) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(err) => {
                error!("Auto polling could not be started, a Tokio runtime is required. ({err})");
                self.core.mark_initialized();
                return;
            }
        };
        let core = Arc::clone(&self.core);
        let on_change = self.on_change.clone();
        let token = self.token.clone();
        let interval = self.interval;
        handle.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if core.is_offline() {
                            core.mark_initialized();
                            continue;
                        }
                        if let Ok(true) = core.fetch_if_older(older_than(interval / 2)).await {
                            if let Some(on_change) = on_change.as_ref() {
                                on_change();
                            }
                        }
                    },
                    _ = token.cancelled() => break,
                }
            }
        });
    }
}

impl Drop for AutoPollingPolicy {
    fn drop(&mut self) {
        self.close();
    }
}
