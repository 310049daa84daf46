// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// Wall-clock source shared by the rate-limit tracker and backoff layer.
///
/// The clock anchors a Unix timestamp on tokio's monotonic instant, so the
/// current time advances together with `tokio::time::sleep`. Under a paused
/// test runtime both jump forward in lockstep, which keeps multi-hour waits
/// testable without real delays.
use std::time::Duration;

use tokio::time::Instant;

/// Unix-time clock driven by tokio's timer.
#[derive(Debug, Clone, Copy,)]
pub struct Clock
{
    anchor_unix: i64,
    anchor:      Instant,
}

impl Clock
{
    /// Anchors the clock on the current system time.
    pub fn system() -> Self
    {
        Self::starting_at(chrono::Utc::now().timestamp(),)
    }

    /// Anchors the clock on an arbitrary Unix timestamp.
    pub fn starting_at(unix_seconds: i64,) -> Self
    {
        Self {
            anchor_unix: unix_seconds, anchor: Instant::now(),
        }
    }

    /// Current Unix time in whole seconds.
    pub fn now_unix(&self,) -> i64
    {
        let elapsed = i64::try_from(self.anchor.elapsed().as_secs(),).unwrap_or(i64::MAX,);
        self.anchor_unix.saturating_add(elapsed,)
    }

    /// Suspends the calling task for `duration`.
    pub async fn sleep(&self, duration: Duration,)
    {
        if !duration.is_zero() {
            tokio::time::sleep(duration,).await;
        }
    }
}

impl Default for Clock
{
    fn default() -> Self
    {
        Self::system()
    }
}
