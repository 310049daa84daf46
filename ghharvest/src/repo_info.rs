// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Popularity counters of a repository.

use serde::{Deserialize, Serialize};

use crate::{client::GitHubClient, error::Result, repository::RepositoryRef};

#[derive(Debug, Deserialize,)]
struct RepositoryCounters
{
    #[serde(default)]
    stargazers_count:  u64,
    #[serde(default)]
    subscribers_count: u64,
    #[serde(default)]
    forks_count:       u64,
    #[serde(default)]
    open_issues_count: u64,
}

/// Stars, watchers, forks and open issues of one repository.
///
/// `watchers` is the subscriber count; the REST `watchers_count` field
/// mirrors stars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
pub struct RepositoryStats
{
    pub url:         String,
    pub stargazers:  u64,
    pub watchers:    u64,
    pub forks:       u64,
    pub open_issues: u64,
}

/// Reads the counters of `repo`; `None` when the repository is gone.
///
/// # Errors
///
/// Returns [`Error::Api`](crate::Error::Api) for failing statuses and
/// propagates transport errors.
pub async fn fetch_repository_stats(
    client: &GitHubClient,
    repo: &RepositoryRef,
) -> Result<Option<RepositoryStats,>,>
{
    let counters: Option<RepositoryCounters,> =
        client.get_json(&format!("/repos/{}", repo.path()),).await?;
    Ok(counters.map(|counters| RepositoryStats {
        url:         repo.url(),
        stargazers:  counters.stargazers_count,
        watchers:    counters.subscribers_count,
        forks:       counters.forks_count,
        open_issues: counters.open_issues_count,
    },),)
}
