// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// Retry utilities with exponential backoff for API calls.
///
/// Every HTTP call issued by the harvester goes through [`BackoffRetrier`],
/// which distinguishes terminal answers (200, 204, 401 and 404) from
/// saturation and server faults that deserve another attempt after a
/// growing pause.
use std::{future::Future, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{clock::Clock, error::Result, transport::ApiResponse};

/// Configuration for retry behavior with exponential backoff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
#[serde(default)]
pub struct RetryConfig
{
    /// Maximum number of retries after the first attempt (default: 5).
    pub max_retries:         u32,
    /// Wait before the first retry in seconds (default: 120).
    pub initial_wait_secs:   u64,
    /// Pause taken before the final attempt once retries run out
    /// (default: 3600).
    pub exhausted_wait_secs: u64,
}

impl Default for RetryConfig
{
    fn default() -> Self
    {
        Self {
            max_retries: 5, initial_wait_secs: 120, exhausted_wait_secs: 3600,
        }
    }
}

/// Re-issues a request while it fails with a retryable outcome.
#[derive(Debug, Clone,)]
pub struct BackoffRetrier
{
    config: RetryConfig,
    clock:  Clock,
}

impl BackoffRetrier
{
    /// Creates a retrier sleeping on `clock`.
    pub fn new(config: RetryConfig, clock: Clock,) -> Self
    {
        Self {
            config, clock,
        }
    }

    /// Returns the active configuration.
    pub fn config(&self,) -> &RetryConfig
    {
        &self.config
    }

    /// Executes `request` until it yields a terminal response.
    ///
    /// HTTP 200 and 404 are returned immediately, as are 204 (empty
    /// collection) and 401 (credentials no wait can repair). Rate limiting
    /// (403/429), any other status and retryable transport errors cause a
    /// sleep of the current wait, after which the wait doubles. Once `max_retries` retries
    /// have been spent the retrier pauses for `exhausted_wait_secs` and makes
    /// one final attempt. The last outcome is returned unchanged when retries
    /// run out, so callers see the failing status.
    ///
    /// # Errors
    ///
    /// Propagates the transport error of the final attempt, or any
    /// non-retryable error immediately.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use ghharvest::{ApiResponse, BackoffRetrier, Clock, RetryConfig};
    ///
    /// # async fn example() -> ghharvest::Result<()> {
    /// let retrier = BackoffRetrier::new(RetryConfig::default(), Clock::system(),);
    /// let response = retrier
    ///     .attempt("rate limit probe", || async { Ok(ApiResponse::new(200, "{}",),) },)
    ///     .await?;
    /// assert!(response.is_success());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn attempt<F, Fut,>(
        &self,
        operation_name: &str,
        mut request: F,
    ) -> Result<ApiResponse,>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<ApiResponse,>,>,
    {
        let max_retries = self.config.max_retries;
        let mut retries = 0u32;
        let mut wait = self.config.initial_wait_secs;

        loop {
            if retries > 0 && retries == max_retries {
                warn!(
                    "{} exhausted {} retries, waiting {}s before the final attempt",
                    operation_name, max_retries, self.config.exhausted_wait_secs
                );
                self.clock.sleep(Duration::from_secs(self.config.exhausted_wait_secs,),).await;
            }

            let outcome = request().await;
            match &outcome {
                Ok(response,) if response.is_terminal() => {
                    if retries > 0 {
                        debug!("{} succeeded after {} retries", operation_name, retries);
                    }
                    return outcome;
                }
                Ok(response,) if response.is_rate_limited() => {
                    warn!(
                        "{}: API limit exceeded ({}), retry {}/{} in {}s",
                        operation_name,
                        response.status,
                        retries + 1,
                        max_retries,
                        wait
                    );
                }
                Ok(response,) => {
                    warn!(
                        "{}: request failed with status {}, retry {}/{} in {}s",
                        operation_name,
                        response.status,
                        retries + 1,
                        max_retries,
                        wait
                    );
                }
                Err(error,) if error.is_retryable() => {
                    warn!(
                        "{}: {}, retry {}/{} in {}s",
                        operation_name,
                        error,
                        retries + 1,
                        max_retries,
                        wait
                    );
                }
                Err(_,) => return outcome,
            }

            if retries >= max_retries {
                warn!("{} failed after {} retries", operation_name, max_retries);
                return outcome;
            }

            self.clock.sleep(Duration::from_secs(wait,),).await;
            wait = wait.saturating_mul(2,);
            retries += 1;
        }
    }
}
