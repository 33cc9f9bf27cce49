use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, info};

use crate::config::AmazonSettings;

/// Allowed request rate expressed as `max_ops_per_window` per `window_secs`.
/// Either value being zero disables pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSettings {
    pub max_ops_per_window: u32,
    pub window_secs: u64,
}

impl RateLimitSettings {
    pub fn disabled() -> Self {
        Self {
            max_ops_per_window: 0,
            window_secs: 0,
        }
    }

    pub fn from_settings(settings: &AmazonSettings) -> Self {
        Self {
            max_ops_per_window: settings.max_ops_per_window,
            window_secs: settings.window_secs,
        }
    }

    pub fn per_request_interval(&self) -> Option<Duration> {
        if self.max_ops_per_window == 0 || self.window_secs == 0 {
            None
        } else {
            Some(Duration::from_secs_f64(
                self.window_secs as f64 / self.max_ops_per_window as f64,
            ))
        }
    }
}

/// Spaces consecutive requests at least one interval apart.
#[derive(Debug, Clone)]
pub struct RequestThrottle {
    settings: RateLimitSettings,
    state: Option<Arc<Mutex<Instant>>>,
}

impl RequestThrottle {
    pub fn new(settings: RateLimitSettings) -> Self {
        let state = settings
            .per_request_interval()
            .map(|_| Arc::new(Mutex::new(Instant::now())));
        match settings.per_request_interval() {
            Some(interval) => info!(
                max_ops_per_window = settings.max_ops_per_window,
                window_secs = settings.window_secs,
                interval_ms = interval.as_millis() as u64,
                "amazon: HTTP throttle configured"
            ),
            None => info!("amazon: HTTP throttle disabled; requests will fire immediately"),
        }
        Self { settings, state }
    }

    pub async fn wait(&self) {
        let Some(interval) = self.settings.per_request_interval() else {
            return;
        };

        let Some(state) = &self.state else {
            return;
        };

        let mut next_allowed = state.lock().await;
        let now = Instant::now();
        let wait_until = if now >= *next_allowed {
            now
        } else {
            *next_allowed
        };
        let sleep_duration = wait_until.saturating_duration_since(now);
        *next_allowed = wait_until + interval;
        drop(next_allowed);

        if !sleep_duration.is_zero() {
            debug!(sleep_ms = sleep_duration.as_millis() as u64, "amazon: throttling");
            sleep(sleep_duration).await;
        }
    }
}
