//! Rolling-window limit on job starts.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Allows at most `max` starts in any `window`, shared by every tenant and
/// service.
pub struct RateLimiter {
    max: usize,
    window: Duration,
    starts: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            max: max.max(1) as usize,
            window,
            starts: Mutex::new(VecDeque::new()),
        }
    }

    fn prune(&self, starts: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = starts.front() {
            if now.duration_since(*oldest) >= self.window {
                starts.pop_front();
            } else {
                break;
            }
        }
    }

    /// Time until a start is allowed; zero when one is allowed now.
    pub fn wait_time(&self) -> Duration {
        let now = Instant::now();
        let mut starts = self.starts.lock();
        self.prune(&mut starts, now);
        if starts.len() < self.max {
            return Duration::ZERO;
        }
        starts
            .front()
            .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
            .unwrap_or(Duration::ZERO)
    }

    /// Record a start if one is allowed now.
    #[cfg(test)]
    fn try_acquire(&self) -> bool {
        let now = Instant::now();
        let mut starts = self.starts.lock();
        self.prune(&mut starts, now);
        if starts.len() < self.max {
            starts.push_back(now);
            true
        } else {
            false
        }
    }

    /// Wait until a start is allowed, without recording one.
    pub async fn ready(&self) {
        loop {
            let wait = self.wait_time();
            if wait.is_zero() {
                return;
            }
            debug!("Rate limit reached, waiting {:?}", wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// Record a start unconditionally.
    pub fn record(&self) {
        let now = Instant::now();
        let mut starts = self.starts.lock();
        self.prune(&mut starts, now);
        starts.push_back(now);
    }

    /// Starts inside the current window.
    #[cfg(test)]
    fn in_window(&self) -> usize {
        let mut starts = self.starts.lock();
        self.prune(&mut starts, Instant::now());
        starts.len()
    }
}
