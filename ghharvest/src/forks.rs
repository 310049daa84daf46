// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Fork sampling and commits-ahead analysis.
//!
//! Forks of a repository are listed page by page, filtered to those created
//! before the cutoff that saw activity after creation, and capped with a
//! seeded sample. Each sampled fork then has its branches compared against
//! the same-named upstream branches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    classifier::{self, Verdict},
    client::GitHubClient,
    error::{Error, Result},
    paginator::{Paginator, SampleCap},
    repository::RepositoryRef,
    transport::encode_ref,
};

/// A fork counts as active only when updated more than this long after
/// creation.
pub const ACTIVITY_THRESHOLD_SECS: i64 = 600;

/// Branch names compared in addition to the upstream default branch.
pub const CONVENTIONAL_BRANCHES: [&str; 2] = ["main", "master"];

/// Owner of a fork.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
pub struct ForkOwner
{
    pub login: String,
}

/// Fork metadata as listed by `/repos/{owner}/{repo}/forks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
pub struct Fork
{
    pub name:             String,
    pub full_name:        String,
    pub owner:            ForkOwner,
    pub html_url:         String,
    pub created_at:       DateTime<Utc,>,
    pub updated_at:       DateTime<Utc,>,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub watchers_count:   u64,
    #[serde(default)]
    pub forks_count:      u64,
}

impl Fork
{
    /// Created strictly before `date_limit` and updated more than
    /// [`ACTIVITY_THRESHOLD_SECS`] after creation.
    pub fn is_valid(&self, date_limit: DateTime<Utc,>,) -> bool
    {
        self.created_at < date_limit
            && (self.updated_at - self.created_at).num_seconds() > ACTIVITY_THRESHOLD_SECS
    }

    pub fn repository(&self,) -> RepositoryRef
    {
        RepositoryRef {
            owner: self.owner.login.clone(),
            name:  self.name.clone(),
        }
    }
}

/// Commits a fork branch carries beyond its upstream counterpart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize,)]
pub struct CommitsAhead
{
    pub ahead_by:        u64,
    /// Messages in compare order; empty when `ahead_by` is zero.
    pub commit_messages: Vec<String,>,
}

/// Result of comparing one fork branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
pub struct BranchComparison
{
    pub branch_name: String,
    /// `None` when the branch is not comparable upstream.
    pub ahead:       Option<CommitsAhead,>,
}

/// A sampled fork with its branch comparisons.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub struct ForkAnalysis
{
    pub fork:        Fork,
    pub comparisons: Vec<BranchComparison,>,
}

/// Parameters bounding fork sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq,)]
pub struct ForkSampling
{
    pub sample_size: usize,
    pub seed:        u64,
    pub date_limit:  DateTime<Utc,>,
}

#[derive(Debug, Deserialize,)]
struct Branch
{
    name: String,
}

#[derive(Debug, Deserialize,)]
struct RepositoryDetails
{
    default_branch: String,
}

#[derive(Debug, Deserialize,)]
struct Comparison
{
    #[serde(default)]
    ahead_by: u64,
    #[serde(default)]
    commits:  Vec<ComparedCommit,>,
}

#[derive(Debug, Deserialize,)]
struct ComparedCommit
{
    commit: CommitDetail,
}

#[derive(Debug, Deserialize,)]
struct CommitDetail
{
    #[serde(default)]
    message: String,
}

/// Compares fork branches with their upstream.
#[derive(Clone,)]
pub struct ForkAheadAnalyzer
{
    client:    GitHubClient,
    paginator: Paginator,
    sampling:  ForkSampling,
}

impl ForkAheadAnalyzer
{
    pub fn new(client: GitHubClient, per_page: u32, sampling: ForkSampling,) -> Self
    {
        let paginator = Paginator::new(client.clone(), per_page,);
        Self {
            client,
            paginator,
            sampling,
        }
    }

    /// Lists the valid forks of `upstream`, capped to the sample size.
    ///
    /// # Errors
    ///
    /// Propagates pagination failures, including [`Error::NotFound`] for a
    /// missing repository.
    pub async fn sample_forks(&self, upstream: &RepositoryRef,) -> Result<Vec<Fork,>,>
    {
        let date_limit = self.sampling.date_limit;
        let walk = self
            .paginator
            .collect_where(
                &format!("/repos/{}/forks", upstream.path()),
                |fork: &Fork| fork.is_valid(date_limit,),
                Some(SampleCap {
                    size: self.sampling.sample_size,
                    seed: self.sampling.seed,
                },),
            )
            .await?;
        debug!(
            "{}: {} valid forks after {} pages (sampled: {})",
            upstream,
            walk.items.len(),
            walk.requests,
            walk.sampled
        );
        Ok(walk.items,)
    }

    /// Upstream default branch together with `main` and `master`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when the upstream repository is gone.
    pub async fn candidate_branches(&self, upstream: &RepositoryRef,) -> Result<Vec<String,>,>
    {
        let route = format!("/repos/{}", upstream.path());
        let Some(details,) = self.client.get_json::<RepositoryDetails,>(&route,).await? else {
            return Err(Error::NotFound {
                route,
            },);
        };

        let mut candidates: Vec<String,> =
            CONVENTIONAL_BRANCHES.iter().map(|name| (*name).to_owned(),).collect();
        if !candidates.contains(&details.default_branch,) {
            candidates.push(details.default_branch,);
        }
        Ok(candidates,)
    }

    /// Compares every candidate branch present on `fork` with `upstream`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when either repository is gone and
    /// propagates transport failures.
    pub async fn analyze(
        &self,
        upstream: &RepositoryRef,
        fork: &RepositoryRef,
    ) -> Result<Vec<BranchComparison,>,>
    {
        let candidates = self.candidate_branches(upstream,).await?;
        self.compare_candidates(upstream, fork, &candidates,).await
    }

    /// Samples the forks of `upstream` and analyzes each of them.
    ///
    /// Forks that disappeared between listing and comparison are skipped.
    ///
    /// # Errors
    ///
    /// Propagates failures listing forks or reading the upstream repository.
    pub async fn analyze_repository(&self, upstream: &RepositoryRef,) -> Result<Vec<ForkAnalysis,>,>
    {
        let candidates = self.candidate_branches(upstream,).await?;
        let forks = self.sample_forks(upstream,).await?;
        info!("{}: analyzing {} forks", upstream, forks.len());

        let mut analyses = Vec::with_capacity(forks.len(),);
        for fork in forks {
            match self.compare_candidates(upstream, &fork.repository(), &candidates,).await {
                Ok(comparisons,) => analyses.push(ForkAnalysis {
                    fork,
                    comparisons,
                },),
                Err(Error::NotFound {
                    route,
                },) => {
                    warn!("{}: fork {} vanished ({})", upstream, fork.full_name, route);
                }
                Err(error,) => return Err(error,),
            }
        }
        Ok(analyses,)
    }

    async fn compare_candidates(
        &self,
        upstream: &RepositoryRef,
        fork: &RepositoryRef,
        candidates: &[String],
    ) -> Result<Vec<BranchComparison,>,>
    {
        let walk = self
            .paginator
            .collect::<Branch,>(&format!("/repos/{}/branches", fork.path()),)
            .await?;

        let mut comparisons = Vec::new();
        for branch in walk.items {
            if !candidates.contains(&branch.name,) {
                continue;
            }
            let ahead = self.compare(upstream, fork, &branch.name,).await?;
            comparisons.push(BranchComparison {
                branch_name: branch.name,
                ahead,
            },);
        }
        Ok(comparisons,)
    }

    /// Compares `fork:branch` against `upstream:branch`.
    ///
    /// Returns `None` when the branch has no upstream counterpart or the
    /// comparison keeps failing.
    async fn compare(
        &self,
        upstream: &RepositoryRef,
        fork: &RepositoryRef,
        branch: &str,
    ) -> Result<Option<CommitsAhead,>,>
    {
        let branch = encode_ref(branch,);
        let route = format!(
            "/repos/{}/compare/{}:{}...{}:{}",
            fork.path(),
            upstream.owner,
            branch,
            fork.owner,
            branch
        );

        match self.client.get_json::<Comparison,>(&route,).await {
            Ok(Some(comparison,),) => {
                let commit_messages = if comparison.ahead_by > 0 {
                    comparison.commits.into_iter().map(|c| c.commit.message,).collect()
                } else {
                    Vec::new()
                };
                Ok(Some(CommitsAhead {
                    ahead_by: comparison.ahead_by,
                    commit_messages,
                },),)
            }
            Ok(None,) => {
                debug!("{}: branch {} does not exist upstream", fork, branch);
                Ok(None,)
            }
            Err(Error::Api {
                status, ..
            },) => {
                warn!("{}: comparing branch {} failed with status {}", fork, branch, status);
                Ok(None,)
            }
            Err(error,) => Err(error,),
        }
    }
}

/// Flat output row for one comparable fork branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
pub struct ForkRecord
{
    pub forked_from:            String,
    pub full_name:              String,
    pub owner:                  String,
    pub html_url:               String,
    pub fork_branch_name:       String,
    pub created_at:             DateTime<Utc,>,
    pub updated_at:             DateTime<Utc,>,
    pub stargazers_count:       u64,
    pub watchers_count:         u64,
    pub forks_count:            u64,
    pub commits_ahead_by:       u64,
    pub commit_msgs:            Vec<String,>,
    pub commit_classifications: Vec<Verdict,>,
    pub number_bugfix_msgs:     usize,
    pub bugfix_msgs:            Vec<String,>,
    pub owner_followers:        Option<u64,>,
}

impl ForkRecord
{
    /// Builds one record per comparable branch of `analysis`.
    pub fn from_analysis(
        forked_from: &RepositoryRef,
        analysis: &ForkAnalysis,
        owner_followers: Option<u64,>,
    ) -> Vec<Self,>
    {
        let fork = &analysis.fork;
        analysis
            .comparisons
            .iter()
            .filter_map(|comparison| {
                let ahead = comparison.ahead.as_ref()?;
                let commit_classifications: Vec<Verdict,> =
                    ahead.commit_messages.iter().map(|message| classifier::classify(message,),).collect();
                let bugfix_msgs: Vec<String,> = ahead
                    .commit_messages
                    .iter()
                    .zip(&commit_classifications,)
                    .filter(|(_, verdict,)| verdict.is_bugfix(),)
                    .map(|(message, _,)| message.clone(),)
                    .collect();

                Some(Self {
                    forked_from: forked_from.url(),
                    full_name: fork.full_name.clone(),
                    owner: fork.owner.login.clone(),
                    html_url: fork.html_url.clone(),
                    fork_branch_name: comparison.branch_name.clone(),
                    created_at: fork.created_at,
                    updated_at: fork.updated_at,
                    stargazers_count: fork.stargazers_count,
                    watchers_count: fork.watchers_count,
                    forks_count: fork.forks_count,
                    commits_ahead_by: ahead.ahead_by,
                    commit_msgs: ahead.commit_messages.clone(),
                    commit_classifications,
                    number_bugfix_msgs: bugfix_msgs.len(),
                    bugfix_msgs,
                    owner_followers,
                },)
            },)
            .collect()
    }
}
