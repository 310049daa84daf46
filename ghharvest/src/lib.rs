// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Rate-limit aware harvesting of GitHub repository data.
//!
//! The library walks the GitHub REST and GraphQL APIs under a shared quota:
//! every request goes through an exponential-backoff retrier, collection
//! endpoints are paginated with an optional seeded sampling cap, and
//! follower counts are resolved in large aliased GraphQL batches. On top of
//! these building blocks the harvesters collect fork activity, contributors,
//! repository counters, issues and issue comments, and a keyword classifier
//! labels commit messages as bug fixes.

mod classifier;
mod client;
mod clock;
mod config;
mod contributors;
mod error;
mod followers;
mod forks;
mod issues;
mod orchestrator;
mod output;
mod paginator;
mod rate_limit;
mod repo_info;
mod repository;
mod retry;
mod transport;

#[cfg(test)]
mod test_support;

pub use classifier::{
    BUGFIX_KEYWORDS, CommitClassification, FALSE_POSITIVE_KEYWORDS, Verdict, classify, classify_all,
    is_bugfix,
};
pub use client::{GRAPHQL_ROUTE, GitHubClient};
pub use clock::Clock;
pub use config::{HarvestConfig, MAX_PER_PAGE, load_config, parse_config, parse_date_limit};
pub use contributors::{ContributorRecord, fetch_contributors};
pub use error::{Error, Result, io_error};
pub use followers::{
    BatchFollowerResolver, GRAPHQL_ALIAS_CEILING, GraphqlConfig, UserFollowerRecord, follower_query,
};
pub use forks::{
    ACTIVITY_THRESHOLD_SECS, BranchComparison, CONVENTIONAL_BRANCHES, CommitsAhead, Fork,
    ForkAheadAnalyzer, ForkAnalysis, ForkOwner, ForkRecord, ForkSampling,
};
pub use issues::{CommentRecord, IssueRecord, fetch_comments, fetch_issues};
pub use orchestrator::{HarvestKind, HarvestOrchestrator, HarvestRecord, HarvestSummary};
pub use output::RecordWriter;
pub use paginator::{PageCursor, PageWalk, Paginator, SampleCap, sample};
pub use rate_limit::{RateLimitConfig, RateLimitStatus, RateLimitTracker, RequestClass};
pub use repo_info::{RepositoryStats, fetch_repository_stats};
pub use repository::{
    GITHUB_URL_PREFIX, HarvestInterval, RepositoryRef, load_manifest, parse_manifest,
};
pub use retry::{BackoffRetrier, RetryConfig};
pub use transport::{ApiResponse, OctocrabTransport, Transport, encode_ref};
