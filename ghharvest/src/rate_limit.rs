// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Quota tracking for GitHub's REST ("core") and GraphQL request pools.
//!
//! Status is always fetched fresh from `/rate_limit`; nothing is cached
//! between calls. Waiting for a reset is serialized behind a single async
//! mutex so concurrent GraphQL batches never decide to sleep independently:
//! the second waiter re-reads the status after the first one wakes up.

use std::{fmt, str::FromStr, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{
    clock::Clock,
    error::{Error, Result},
    transport::Transport,
};

/// Quota pool a request is charged against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,)]
#[serde(rename_all = "lowercase")]
pub enum RequestClass
{
    /// REST requests.
    Core,
    /// GraphQL requests.
    Graphql,
}

impl RequestClass
{
    /// Key of the class inside the `/rate_limit` resources object.
    pub fn as_str(self,) -> &'static str
    {
        match self {
            Self::Core => "core",
            Self::Graphql => "graphql",
        }
    }
}

impl fmt::Display for RequestClass
{
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result
    {
        f.write_str(self.as_str(),)
    }
}

impl FromStr for RequestClass
{
    type Err = Error;

    fn from_str(value: &str,) -> Result<Self,>
    {
        match value.trim().to_ascii_lowercase().as_str() {
            "core" | "regular" => Ok(Self::Core,),
            "graphql" => Ok(Self::Graphql,),
            other => Err(Error::validation(format!(
                "unknown request class '{other}', expected 'core', 'regular' or 'graphql'"
            ),),),
        }
    }
}

/// Snapshot of one quota pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize,)]
pub struct RateLimitStatus
{
    /// Pool the snapshot describes.
    pub class:     RequestClass,
    /// Requests allowed per window.
    pub limit:     u64,
    /// Requests already spent in the window.
    pub used:      u64,
    /// Requests left in the window.
    pub remaining: u64,
    /// Unix time at which the window resets.
    pub reset_at:  i64,
}

impl RateLimitStatus
{
    /// Seconds to wait before the pool is usable again, if it is exhausted.
    ///
    /// Returns `None` while requests remain or once the reset time passed.
    pub fn wait_secs(&self, now_unix: i64,) -> Option<u64,>
    {
        if self.remaining == 0 && now_unix < self.reset_at {
            u64::try_from(self.reset_at - now_unix,).ok()
        } else {
            None
        }
    }
}

impl fmt::Display for RateLimitStatus
{
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result
    {
        let reset = chrono::DateTime::from_timestamp(self.reset_at, 0,)
            .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC",).to_string(),)
            .unwrap_or_else(|| self.reset_at.to_string(),);
        write!(
            f,
            "{}: {}/{} remaining ({} used), resets at {}",
            self.class, self.remaining, self.limit, self.used, reset
        )
    }
}

/// Tuning for [`RateLimitTracker::sleep_until_reset`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
#[serde(default)]
pub struct RateLimitConfig
{
    /// Ceiling on the cumulative wait of a single call (default: 2 hours).
    pub max_total_wait_secs: u64,
}

impl Default for RateLimitConfig
{
    fn default() -> Self
    {
        Self {
            max_total_wait_secs: 2 * 60 * 60,
        }
    }
}

#[derive(Debug, Deserialize,)]
struct RateLimitDocument
{
    resources: Resources,
}

#[derive(Debug, Deserialize,)]
struct Resources
{
    core:    Bucket,
    #[serde(default)]
    graphql: Option<Bucket,>,
}

#[derive(Debug, Deserialize,)]
struct Bucket
{
    limit:     u64,
    #[serde(default)]
    used:      u64,
    remaining: u64,
    reset:     i64,
}

/// Single owner of every rate-limit query and wait.
pub struct RateLimitTracker
{
    transport: Arc<dyn Transport,>,
    clock:     Clock,
    config:    RateLimitConfig,
    gate:      Mutex<(),>,
}

impl RateLimitTracker
{
    /// Creates a tracker querying `/rate_limit` through `transport`.
    pub fn new(transport: Arc<dyn Transport,>, clock: Clock, config: RateLimitConfig,) -> Self
    {
        Self {
            transport,
            clock,
            config,
            gate: Mutex::new((),),
        }
    }

    /// Fetches the current status of `class`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransientApi`] when `/rate_limit` cannot be reached,
    /// answers with a non-200 status or lacks the requested pool. No further
    /// request is safe without this information, so the error is never
    /// swallowed.
    pub async fn status(&self, class: RequestClass,) -> Result<RateLimitStatus,>
    {
        let response = self.transport.get("/rate_limit",).await?;
        if !response.is_success() {
            return Err(Error::transient(format!(
                "rate limit endpoint answered with status {}",
                response.status
            ),),);
        }

        let document: RateLimitDocument = response
            .json()
            .map_err(|e| Error::transient(format!("unreadable rate limit document: {e}"),),)?;
        let bucket = match class {
            RequestClass::Core => Some(document.resources.core,),
            RequestClass::Graphql => document.resources.graphql,
        }
        .ok_or_else(|| Error::transient(format!("rate limit document lacks '{class}' pool"),),)?;

        let status = RateLimitStatus {
            class,
            limit: bucket.limit,
            used: bucket.used,
            remaining: bucket.remaining,
            reset_at: bucket.reset,
        };
        debug!("{}", status);
        Ok(status,)
    }

    /// Blocks until `class` has quota left, then returns the fresh status.
    ///
    /// While the pool is exhausted and its reset lies in the future, the
    /// tracker sleeps until the reset and checks again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RateLimitUnrecoverable`] when the next wait would push
    /// the cumulative wait past `max_total_wait_secs`, and propagates
    /// [`Error::TransientApi`] from [`status`](Self::status).
    pub async fn sleep_until_reset(&self, class: RequestClass,) -> Result<RateLimitStatus,>
    {
        let _owner = self.gate.lock().await;
        let mut waited = 0u64;

        loop {
            let status = self.status(class,).await?;
            let Some(wait,) = status.wait_secs(self.clock.now_unix(),) else {
                return Ok(status,);
            };

            if waited.saturating_add(wait,) > self.config.max_total_wait_secs {
                return Err(Error::RateLimitUnrecoverable {
                    class:       class.to_string(),
                    waited_secs: waited,
                },);
            }

            info!("{} quota exhausted, sleeping {}s until reset", class, wait);
            self.clock.sleep(Duration::from_secs(wait,),).await;
            waited += wait;
        }
    }
}
