//! Gated reloads of the active backend and the slug index.
//!
//! There is no timer. A refresh happens when an administrator asks for one
//! ([`RefreshController::manual_refresh`]) or opportunistically on a read
//! ([`RefreshController::refresh_if_due`]). Both paths share the same
//! minimum-interval throttle and the same in-flight guard.
//!
//! ```text
//!                manual_refresh          refresh_if_due
//! disabled           skip                    skip
//! AlwaysCurrent      skip                    skip
//! initial delay      -                       skip
//! too many failures  -                       skip
//! min interval       skip                    skip
//! in flight          skip                    skip
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

use crate::models::RefreshConfig;
use crate::services::SlugIndex;
use crate::storage::{RefreshCapability, StorageAdapter};

/// Why a refresh did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum SkipReason {
    Disabled,
    /// The backend has no cached view to reload
    AlwaysCurrent,
    /// Cold-start grace period still running
    InitialDelay,
    /// Last successful refresh is younger than the minimum interval
    Throttled { retry_in_ms: u64 },
    InFlight,
    /// Automatic retries exhausted; only a manual refresh resets this
    TooManyFailures { attempts: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum RefreshOutcome {
    Refreshed { records: usize },
    Skipped(SkipReason),
    Failed { attempts: u32, message: String },
}

impl RefreshOutcome {
    pub fn is_refreshed(&self) -> bool {
        matches!(self, Self::Refreshed { .. })
    }
}

/// Read-only snapshot of the controller.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshStatus {
    pub enabled: bool,
    pub backend: &'static str,
    pub capability: RefreshCapability,
    pub last_refresh_at: Option<DateTime<Utc>>,
    pub time_since_last_refresh_ms: Option<u64>,
    pub failed_attempts: u32,
    pub in_flight: bool,
    pub min_refresh_interval_ms: u64,
    pub initial_delay_ms: u64,
    pub max_failed_attempts: u32,
}

#[derive(Debug, Default)]
struct RefreshState {
    /// Wall-clock time for reporting, monotonic time for throttling
    last_refresh: Option<(DateTime<Utc>, Instant)>,
    failed_attempts: u32,
}

pub struct RefreshController {
    adapter: Arc<dyn StorageAdapter>,
    index: Arc<SlugIndex>,
    config: RefreshConfig,
    enabled: AtomicBool,
    started_at: Instant,
    state: Mutex<RefreshState>,
    in_flight: tokio::sync::Mutex<()>,
}

impl RefreshController {
    pub fn new(adapter: Arc<dyn StorageAdapter>, index: Arc<SlugIndex>, config: RefreshConfig) -> Self {
        let enabled = !config.disable_auto_refresh;
        if !enabled {
            log::info!("Refresh disabled at startup");
        }
        Self {
            adapter,
            index,
            config,
            enabled: AtomicBool::new(enabled),
            started_at: Instant::now(),
            state: Mutex::new(RefreshState::default()),
            in_flight: tokio::sync::Mutex::new(()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Toggle refreshing. Does not touch the last refresh time.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        log::info!("Refresh {}", if enabled { "enabled" } else { "disabled" });
    }

    /// Administrative refresh. Ignores the cold-start grace period.
    pub async fn manual_refresh(&self) -> RefreshOutcome {
        if let Some(reason) = self.common_skip() {
            log::info!("Manual refresh skipped: {:?}", reason);
            return RefreshOutcome::Skipped(reason);
        }
        self.run().await
    }

    /// Refresh on a read path when every automatic gate is open.
    pub async fn refresh_if_due(&self) -> RefreshOutcome {
        if !self.is_enabled() {
            return RefreshOutcome::Skipped(SkipReason::Disabled);
        }
        if self.started_at.elapsed() < self.config.initial_delay() {
            return RefreshOutcome::Skipped(SkipReason::InitialDelay);
        }
        let attempts = self.failed_attempts();
        if attempts >= self.config.max_failed_attempts {
            return RefreshOutcome::Skipped(SkipReason::TooManyFailures { attempts });
        }
        if let Some(reason) = self.common_skip() {
            return RefreshOutcome::Skipped(reason);
        }
        log::debug!("Opportunistic refresh is due");
        self.run().await
    }

    fn common_skip(&self) -> Option<SkipReason> {
        if !self.is_enabled() {
            return Some(SkipReason::Disabled);
        }
        if self.adapter.refresh_capability() == RefreshCapability::AlwaysCurrent {
            return Some(SkipReason::AlwaysCurrent);
        }
        self.throttled()
    }

    fn throttled(&self) -> Option<SkipReason> {
        let elapsed = self.since_last_refresh()?;
        let interval = self.config.min_interval();
        (elapsed < interval).then(|| SkipReason::Throttled {
            retry_in_ms: millis(interval - elapsed),
        })
    }

    async fn run(&self) -> RefreshOutcome {
        let Ok(_guard) = self.in_flight.try_lock() else {
            return RefreshOutcome::Skipped(SkipReason::InFlight);
        };
        // Another caller may have finished a refresh between our gate check
        // and taking the guard.
        if let Some(reason) = self.throttled() {
            log::debug!("Refresh skipped after taking the guard: {:?}", reason);
            return RefreshOutcome::Skipped(reason);
        }

        let result = match self.adapter.reload().await {
            Ok(_) => self.index.build(self.adapter.as_ref()).await,
            Err(e) => Err(e),
        };

        let mut state = self.lock_state();
        match result {
            Ok(records) => {
                state.last_refresh = Some((Utc::now(), Instant::now()));
                state.failed_attempts = 0;
                log::info!("Refreshed {} backend: {} records", self.adapter.name(), records);
                RefreshOutcome::Refreshed { records }
            }
            Err(e) => {
                state.failed_attempts += 1;
                log::warn!(
                    "Refresh of {} backend failed (attempt {}): {}",
                    self.adapter.name(),
                    state.failed_attempts,
                    e
                );
                RefreshOutcome::Failed {
                    attempts: state.failed_attempts,
                    message: e.to_string(),
                }
            }
        }
    }

    pub fn status(&self) -> RefreshStatus {
        let state = self.lock_state();
        RefreshStatus {
            enabled: self.is_enabled(),
            backend: self.adapter.name(),
            capability: self.adapter.refresh_capability(),
            last_refresh_at: state.last_refresh.map(|(at, _)| at),
            time_since_last_refresh_ms: state.last_refresh.map(|(_, at)| millis(at.elapsed())),
            failed_attempts: state.failed_attempts,
            in_flight: self.in_flight.try_lock().is_err(),
            min_refresh_interval_ms: self.config.min_interval_ms,
            initial_delay_ms: self.config.initial_delay_ms,
            max_failed_attempts: self.config.max_failed_attempts,
        }
    }

    fn since_last_refresh(&self) -> Option<Duration> {
        self.lock_state().last_refresh.map(|(_, at)| at.elapsed())
    }

    fn failed_attempts(&self) -> u32 {
        self.lock_state().failed_attempts
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
