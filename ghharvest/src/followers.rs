// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Bulk follower-count lookups through GraphQL aliases.
//!
//! Usernames are split into contiguous batches and each batch becomes one
//! synthesized query whose aliases `user1..userN` follow the input order.
//! Batches run concurrently behind a semaphore and are joined back by
//! batch index, so the output never depends on completion order.
//!
//! GitHub serves GraphQL to authenticated callers only. Without credentials,
//! or when the token is rejected, every count resolves to absent and the
//! harvest carries on with the REST data.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::{debug, warn};

use crate::{
    client::GitHubClient,
    error::{Error, Result},
    rate_limit::RequestClass,
};

/// Maximum number of aliases GitHub accepts in one document.
pub const GRAPHQL_ALIAS_CEILING: usize = 2000;

/// Tuning of the batch resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
#[serde(default)]
pub struct GraphqlConfig
{
    /// Usernames per GraphQL document (default: 2000).
    pub batch_size:         usize,
    /// Batches in flight at once (default: 5).
    pub concurrency:        usize,
    /// Attempts per batch before giving up on a missing payload
    /// (default: 10).
    pub max_batch_attempts: u32,
}

impl Default for GraphqlConfig
{
    fn default() -> Self
    {
        Self {
            batch_size: GRAPHQL_ALIAS_CEILING, concurrency: 5, max_batch_attempts: 10,
        }
    }
}

/// Follower count of one user, absent for renamed, deleted or private
/// accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
pub struct UserFollowerRecord
{
    pub login:          String,
    pub follower_count: Option<u64,>,
}

/// Builds the aliased follower query for `logins`.
///
/// # Example
///
/// ```
/// use ghharvest::follower_query;
///
/// let query = follower_query(&["octocat".to_owned()],);
/// assert_eq!(
///     query,
///     r#"query { user1: user(login: "octocat") { followers { totalCount } } }"#
/// );
/// ```
pub fn follower_query(logins: &[String],) -> String
{
    let mut query = String::from("query {",);
    for (index, login,) in logins.iter().enumerate() {
        query.push_str(&format!(
            " user{}: user(login: \"{}\") {{ followers {{ totalCount }} }}",
            index + 1,
            escape_login(login,)
        ),);
    }
    query.push_str(" }",);
    query
}

fn escape_login(login: &str,) -> String
{
    login.replace('\\', "\\\\",).replace('"', "\\\"",)
}

/// Resolves follower counts for many users with few requests.
#[derive(Clone,)]
pub struct BatchFollowerResolver
{
    client: GitHubClient,
    config: GraphqlConfig,
}

impl BatchFollowerResolver
{
    pub fn new(client: GitHubClient, config: GraphqlConfig,) -> Self
    {
        Self {
            client, config,
        }
    }

    /// Resolves `logins` with the configured batch size.
    ///
    /// # Errors
    ///
    /// See [`resolve_with_batch_size`](Self::resolve_with_batch_size).
    pub async fn resolve(&self, logins: &[String],) -> Result<Vec<UserFollowerRecord,>,>
    {
        self.resolve_with_batch_size(logins, self.config.batch_size,).await
    }

    /// Resolves `logins` in batches of `batch_size`.
    ///
    /// The result holds exactly one record per input login, in input order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBatchSize`] before any request when
    /// `batch_size` is zero or above [`GRAPHQL_ALIAS_CEILING`],
    /// [`Error::TransientApi`] when a batch never yields a payload, and
    /// [`Error::RateLimitUnrecoverable`] when the GraphQL quota does not
    /// recover in time.
    pub async fn resolve_with_batch_size(
        &self,
        logins: &[String],
        batch_size: usize,
    ) -> Result<Vec<UserFollowerRecord,>,>
    {
        if batch_size == 0 || batch_size > GRAPHQL_ALIAS_CEILING {
            return Err(Error::InvalidBatchSize {
                size:    batch_size,
                ceiling: GRAPHQL_ALIAS_CEILING,
            },);
        }
        if logins.is_empty() {
            return Ok(Vec::new(),);
        }
        if !self.client.is_authenticated() {
            warn!(
                "no credentials for GraphQL, follower counts of {} users left absent",
                logins.len()
            );
            return Ok(absent(logins,),);
        }

        let permits = Arc::new(Semaphore::new(self.config.concurrency.max(1,),),);
        let mut tasks = JoinSet::new();
        let batches: Vec<Vec<String,>,> =
            logins.chunks(batch_size,).map(<[String]>::to_vec,).collect();
        debug!("resolving {} users in {} batches", logins.len(), batches.len());

        for (index, batch,) in batches.into_iter().enumerate() {
            let permits = Arc::clone(&permits,);
            let resolver = self.clone();
            tasks.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| Error::transient(format!("batch limiter closed: {e}"),),)?;
                resolver.fetch_batch(index, &batch,).await.map(|records| (index, records,),)
            },);
        }

        let mut slots: Vec<Option<Vec<UserFollowerRecord,>,>,> = Vec::new();
        while let Some(joined,) = tasks.join_next().await {
            let (index, records,) =
                joined.map_err(|e| Error::transient(format!("batch task failed: {e}"),),)??;
            if slots.len() <= index {
                slots.resize(index + 1, None,);
            }
            slots[index] = Some(records,);
        }

        Ok(slots.into_iter().flatten().flatten().collect(),)
    }

    async fn fetch_batch(
        &self,
        index: usize,
        logins: &[String],
    ) -> Result<Vec<UserFollowerRecord,>,>
    {
        let query = follower_query(logins,);
        let attempts = self.config.max_batch_attempts.max(1,);

        for attempt in 1..=attempts {
            match self.client.graphql(&query,).await {
                Ok(response,) if response.is_unauthorized() => {
                    warn!("batch {} rejected with 401, follower counts left absent", index);
                    return Ok(absent(logins,),);
                }
                Ok(response,) => {
                    if let Some(data,) = payload(&response.body,) {
                        return Ok(join_aliases(logins, &data,),);
                    }
                    warn!(
                        "batch {} returned no data (status {}), attempt {}/{}",
                        index, response.status, attempt, attempts
                    );
                }
                Err(error,) if error.is_retryable() => {
                    warn!("batch {} failed: {}, attempt {}/{}", index, error, attempt, attempts);
                }
                Err(error,) => return Err(error,),
            }

            if attempt < attempts {
                self.client.rate_limits().sleep_until_reset(RequestClass::Graphql,).await?;
            }
        }

        Err(Error::transient(format!(
            "follower batch {index} returned no data after {attempts} attempts"
        ),),)
    }
}

fn payload(body: &str,) -> Option<Value,>
{
    let document: Value = serde_json::from_str(body,).ok()?;
    match document.get("data",) {
        Some(data,) if data.is_object() => Some(data.clone(),),
        _ => None,
    }
}

fn absent(logins: &[String],) -> Vec<UserFollowerRecord,>
{
    logins
        .iter()
        .map(|login| UserFollowerRecord {
            login:          login.clone(),
            follower_count: None,
        },)
        .collect()
}

fn join_aliases(logins: &[String], data: &Value,) -> Vec<UserFollowerRecord,>
{
    logins
        .iter()
        .enumerate()
        .map(|(position, login,)| UserFollowerRecord {
            login:          login.clone(),
            follower_count: data
                .get(format!("user{}", position + 1),)
                .and_then(|user| user.pointer("/followers/totalCount",),)
                .and_then(Value::as_u64,),
        },)
        .collect()
}
