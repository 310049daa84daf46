// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// Contributor listing with bulk follower resolution.
///
/// Contributors are paged from `/repos/{owner}/{repo}/contributors` and
/// their follower counts are resolved through the batch resolver rather
/// than one profile request per contributor.
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    error::Result, followers::BatchFollowerResolver, paginator::Paginator,
    repository::RepositoryRef,
};

/// Contributor entry as returned by the REST API.
#[derive(Debug, Clone, Deserialize,)]
struct Contributor
{
    login:         String,
    #[serde(default)]
    contributions: u64,
    #[serde(rename = "type", default)]
    user_type:     String,
}

/// One contributor of one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
pub struct ContributorRecord
{
    pub repo_url:      String,
    pub login:         String,
    pub contributions: u64,
    pub is_bot:        bool,
    pub num_followers: Option<u64,>,
}

impl std::fmt::Display for ContributorRecord
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_,>,) -> std::fmt::Result
    {
        match self.num_followers {
            Some(followers,) => write!(
                f,
                "{} ({} contributions, {} followers)",
                self.login, self.contributions, followers
            ),
            None => write!(f, "{} ({} contributions)", self.login, self.contributions),
        }
    }
}

/// Fetches every contributor of `repo` with their follower counts.
///
/// # Arguments
///
/// * `paginator` - Page walker bound to the shared client
/// * `resolver` - Batch follower resolver
/// * `repo` - Repository to inspect
///
/// # Errors
///
/// Propagates pagination failures and batch resolution failures.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
///
/// use ghharvest::{
///     BatchFollowerResolver, Clock, GitHubClient, GraphqlConfig, HarvestConfig,
///     OctocrabTransport, Paginator, RepositoryRef, fetch_contributors,
/// };
///
/// # async fn example() -> ghharvest::Result<()> {
/// let transport = Arc::new(OctocrabTransport::new(None,)?,);
/// let client = GitHubClient::new(transport, &HarvestConfig::default(), Clock::system(),);
/// let paginator = Paginator::new(client.clone(), 100,);
/// let resolver = BatchFollowerResolver::new(client, GraphqlConfig::default(),);
/// let repo = RepositoryRef::parse("https://github.com/octocat/hello-world",)?;
/// for contributor in fetch_contributors(&paginator, &resolver, &repo,).await? {
///     println!("{}", contributor);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn fetch_contributors(
    paginator: &Paginator,
    resolver: &BatchFollowerResolver,
    repo: &RepositoryRef,
) -> Result<Vec<ContributorRecord,>,>
{
    debug!("Fetching contributors for {}", repo.path());

    let walk = paginator
        .collect::<Contributor,>(&format!("/repos/{}/contributors", repo.path()),)
        .await?;
    let logins: Vec<String,> = walk.items.iter().map(|c| c.login.clone(),).collect();
    let followers = resolver.resolve(&logins,).await?;

    let records: Vec<ContributorRecord,> = walk
        .items
        .into_iter()
        .zip(followers,)
        .map(|(contributor, follower,)| ContributorRecord {
            repo_url:      repo.url(),
            is_bot:        contributor.user_type == "Bot",
            login:         contributor.login,
            contributions: contributor.contributions,
            num_followers: follower.follower_count,
        },)
        .collect();

    info!("Found {} contributors for {}", records.len(), repo.path());

    Ok(records,)
}
