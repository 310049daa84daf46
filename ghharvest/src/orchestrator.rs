// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Sequential harvest over a manifest of repositories.
//!
//! Repositories are processed one at a time. Each one is validated before
//! any request, waits for core quota, runs the harvester of the selected
//! kind and has its records appended to the output. A repository that fails
//! is logged and counted as skipped; only output failures abort the run.

use std::{collections::HashMap, fmt, io::Write, str::FromStr, time::Duration};

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    client::GitHubClient,
    config::HarvestConfig,
    contributors::{ContributorRecord, fetch_contributors},
    error::{Error, Result},
    followers::BatchFollowerResolver,
    forks::{ForkAheadAnalyzer, ForkRecord, ForkSampling},
    issues::{CommentRecord, IssueRecord, fetch_comments, fetch_issues},
    output::RecordWriter,
    paginator::Paginator,
    rate_limit::RequestClass,
    repo_info::{RepositoryStats, fetch_repository_stats},
    repository::RepositoryRef,
};

/// Data set produced by a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash,)]
pub enum HarvestKind
{
    Forks,
    Contributors,
    RepoInfo,
    Issues,
    Comments,
}

impl HarvestKind
{
    /// Name used in logs and default output file names.
    pub fn as_str(self,) -> &'static str
    {
        match self {
            Self::Forks => "forks",
            Self::Contributors => "contributors",
            Self::RepoInfo => "repo_info",
            Self::Issues => "issues",
            Self::Comments => "comments",
        }
    }
}

impl fmt::Display for HarvestKind
{
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result
    {
        f.write_str(self.as_str(),)
    }
}

impl FromStr for HarvestKind
{
    type Err = Error;

    fn from_str(value: &str,) -> Result<Self,>
    {
        match value.trim().to_ascii_lowercase().replace('-', "_",).as_str() {
            "forks" => Ok(Self::Forks,),
            "contributors" => Ok(Self::Contributors,),
            "repo_info" => Ok(Self::RepoInfo,),
            "issues" => Ok(Self::Issues,),
            "comments" => Ok(Self::Comments,),
            other => Err(Error::validation(format!("unknown harvest kind '{other}'"),),),
        }
    }
}

/// Any record a harvester emits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize,)]
#[serde(untagged)]
pub enum HarvestRecord
{
    Fork(ForkRecord,),
    Contributor(ContributorRecord,),
    Repository(RepositoryStats,),
    Issue(IssueRecord,),
    Comment(CommentRecord,),
}

/// Outcome counters of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize,)]
pub struct HarvestSummary
{
    /// Repositories harvested successfully.
    pub processed: usize,
    /// Repositories rejected or failed.
    pub skipped:   usize,
    /// Records written.
    pub records:   usize,
}

impl fmt::Display for HarvestSummary
{
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result
    {
        write!(
            f,
            "{} repositories processed, {} skipped, {} records written",
            self.processed, self.skipped, self.records
        )
    }
}

/// Drives one harvest run.
pub struct HarvestOrchestrator
{
    client:        GitHubClient,
    config:        HarvestConfig,
    paginator:     Paginator,
    resolver:      BatchFollowerResolver,
    analyzer:      ForkAheadAnalyzer,
    show_progress: bool,
}

impl HarvestOrchestrator
{
    /// Builds the harvesters from `config`.
    ///
    /// Without a configured date limit, forks created before the start of
    /// the run are considered.
    pub fn new(client: GitHubClient, config: HarvestConfig,) -> Self
    {
        let date_limit = config.date_limit.unwrap_or_else(|| {
            DateTime::<Utc,>::from_timestamp(client.clock().now_unix(), 0,).unwrap_or_default()
        },);
        let sampling = ForkSampling {
            sample_size: config.sample_size,
            seed: config.seed,
            date_limit,
        };

        Self {
            paginator: Paginator::new(client.clone(), config.per_page,),
            resolver: BatchFollowerResolver::new(client.clone(), config.graphql.clone(),),
            analyzer: ForkAheadAnalyzer::new(client.clone(), config.per_page, sampling,),
            client,
            config,
            show_progress: false,
        }
    }

    /// Draws a progress bar on stderr while running.
    pub fn with_progress(mut self, show_progress: bool,) -> Self
    {
        self.show_progress = show_progress;
        self
    }

    /// Harvests `kind` for the configured interval of `urls`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an invalid interval and output
    /// errors from `writer`. Failures of individual repositories are
    /// counted in the summary instead.
    pub async fn run<W: Write,>(
        &self,
        kind: HarvestKind,
        urls: &[String],
        writer: &mut RecordWriter<W,>,
    ) -> Result<HarvestSummary,>
    {
        self.config.interval.validate()?;
        let selected = self.config.interval.slice(urls,);
        info!(
            "harvesting {} for {} repositories (interval {})",
            kind,
            selected.len(),
            self.config.interval.label()
        );

        let progress = self.progress_bar(selected.len(),)?;
        let delay = Duration::from_secs(self.config.repository_delay_secs,);
        let mut summary = HarvestSummary::default();

        for (position, url,) in selected.iter().enumerate() {
            progress.set_message(url.clone(),);

            match self.harvest_one(kind, url,).await {
                Ok(Some(records,),) => {
                    writer.write_all(&records,)?;
                    summary.processed += 1;
                    summary.records += records.len();
                    info!("{}: {} {} records", url, records.len(), kind);
                }
                Ok(None,) => {
                    summary.skipped += 1;
                    warn!("{}: repository not found, skipping", url);
                }
                Err(error,) => {
                    summary.skipped += 1;
                    warn!("{}: skipped: {}", url, error);
                }
            }
            progress.inc(1,);

            if position + 1 < selected.len() {
                self.client.clock().sleep(delay,).await;
            }
        }

        writer.flush()?;
        progress.finish_with_message(summary.to_string(),);
        info!("{}", summary);
        Ok(summary,)
    }

    /// Harvests one repository; `None` when it does not exist.
    async fn harvest_one(&self, kind: HarvestKind, url: &str,) -> Result<Option<Vec<HarvestRecord,>,>,>
    {
        let repo = RepositoryRef::parse(url,)?;
        self.client.rate_limits().sleep_until_reset(RequestClass::Core,).await?;

        let records = match kind {
            HarvestKind::Forks => self.harvest_forks(&repo,).await?,
            HarvestKind::Contributors => fetch_contributors(&self.paginator, &self.resolver, &repo,)
                .await?
                .into_iter()
                .map(HarvestRecord::Contributor,)
                .collect(),
            HarvestKind::RepoInfo => match fetch_repository_stats(&self.client, &repo,).await? {
                Some(stats,) => vec![HarvestRecord::Repository(stats,)],
                None => return Ok(None,),
            },
            HarvestKind::Issues => fetch_issues(&self.paginator, &self.resolver, &repo,)
                .await?
                .into_iter()
                .map(HarvestRecord::Issue,)
                .collect(),
            HarvestKind::Comments => fetch_comments(&self.paginator, &self.resolver, &repo,)
                .await?
                .into_iter()
                .map(HarvestRecord::Comment,)
                .collect(),
        };
        Ok(Some(records,),)
    }

    async fn harvest_forks(&self, repo: &RepositoryRef,) -> Result<Vec<HarvestRecord,>,>
    {
        let analyses = self.analyzer.analyze_repository(repo,).await?;

        let mut owners: Vec<String,> =
            analyses.iter().map(|analysis| analysis.fork.owner.login.clone(),).collect();
        owners.sort();
        owners.dedup();
        let followers: HashMap<String, Option<u64,>,> = self
            .resolver
            .resolve(&owners,)
            .await?
            .into_iter()
            .map(|record| (record.login, record.follower_count,),)
            .collect();

        Ok(analyses
            .iter()
            .flat_map(|analysis| {
                let owner_followers =
                    followers.get(&analysis.fork.owner.login,).copied().flatten();
                ForkRecord::from_analysis(repo, analysis, owner_followers,)
            },)
            .map(HarvestRecord::Fork,)
            .collect(),)
    }

    fn progress_bar(&self, len: usize,) -> Result<ProgressBar,>
    {
        if !self.show_progress {
            return Ok(ProgressBar::hidden(),);
        }
        let bar = ProgressBar::new(len as u64,);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}",)
            .map_err(|e| Error::validation(format!("invalid progress template: {e}"),),)?;
        bar.set_style(style,);
        Ok(bar,)
    }
}

#[cfg(test)]
mod tests
{
    use std::{path::Path, sync::Arc};

    use serde_json::{Value, json};
    use tokio::time::Instant;

    use super::*;
    use crate::{
        repository::HarvestInterval,
        test_support::{ScriptedTransport, TEST_EPOCH, echo_followers, rate_limit_body, test_client},
    };

    fn config() -> HarvestConfig
    {
        HarvestConfig {
            repository_delay_secs: 2,
            ..HarvestConfig::default()
        }
    }

    fn memory_writer() -> RecordWriter<Vec<u8,>,>
    {
        RecordWriter::from_writer(Vec::new(), Path::new("memory",), 1000,)
    }

    fn lines(writer: RecordWriter<Vec<u8,>,>,) -> Vec<Value,>
    {
        let bytes = writer.finish().expect("flushed",);
        String::from_utf8(bytes,)
            .expect("utf8",)
            .lines()
            .map(|line| serde_json::from_str(line,).expect("json",),)
            .collect()
    }

    fn urls(items: &[&str],) -> Vec<String,>
    {
        items.iter().map(|url| (*url).to_owned(),).collect()
    }

    #[test]
    fn kind_parses_cli_names()
    {
        assert_eq!("repo-info".parse::<HarvestKind>().expect("kind"), HarvestKind::RepoInfo);
        assert_eq!("Forks".parse::<HarvestKind>().expect("kind"), HarvestKind::Forks);
        assert!("stars".parse::<HarvestKind>().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn bad_repositories_are_skipped_and_run_continues()
    {
        let transport = Arc::new(
            ScriptedTransport::new()
                .rate_limit(4000, TEST_EPOCH + 3600,)
                .respond_json(
                    "/repos/o/first",
                    &json!({"stargazers_count": 5, "subscribers_count": 1, "forks_count": 2, "open_issues_count": 0}),
                )
                .respond_json(
                    "/repos/o/last",
                    &json!({"stargazers_count": 9, "subscribers_count": 3, "forks_count": 0, "open_issues_count": 4}),
                ),
        );
        let orchestrator = HarvestOrchestrator::new(test_client(Arc::clone(&transport,),), config(),);
        let manifest = urls(&[
            "https://github.com/o/first",
            "not a repository",
            "https://github.com/o/missing",
            "https://github.com/o/last",
        ],);
        let mut writer = memory_writer();
        let started = Instant::now();

        let summary =
            orchestrator.run(HarvestKind::RepoInfo, &manifest, &mut writer,).await.expect("run",);

        assert_eq!(summary, HarvestSummary {
            processed: 2, skipped: 2, records: 2,
        });
        assert_eq!(transport.count("/rate_limit",), 3, "invalid reference made no request");
        assert_eq!(started.elapsed(), Duration::from_secs(3 * 2,));
        let written = lines(writer,);
        assert_eq!(written[0]["url"], "https://github.com/o/first");
        assert_eq!(written[1]["open_issues"], 4);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_selects_manifest_window()
    {
        let transport = Arc::new(
            ScriptedTransport::new()
                .rate_limit(4000, TEST_EPOCH,)
                .respond_json("/repos/o/b", &json!({"stargazers_count": 1}),),
        );
        let settings = HarvestConfig {
            interval: HarvestInterval::new(1, Some(2,),),
            ..config()
        };
        let orchestrator = HarvestOrchestrator::new(test_client(Arc::clone(&transport,),), settings,);
        let mut writer = memory_writer();

        let summary = orchestrator
            .run(HarvestKind::RepoInfo, &urls(&["o/a", "o/b", "o/c"],), &mut writer,)
            .await
            .expect("run",);

        assert_eq!(summary.processed, 1);
        assert_eq!(transport.count("/repos/o/a",), 0);
        assert_eq!(transport.count("/repos/o/c",), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_core_quota_is_awaited_before_harvesting()
    {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond_json("/rate_limit", &rate_limit_body(0, TEST_EPOCH + 90, 5000, 0,),)
                .respond_json("/rate_limit", &rate_limit_body(5000, TEST_EPOCH + 3690, 5000, 0,),)
                .respond_json("/repos/o/r", &json!({"stargazers_count": 1}),),
        );
        let orchestrator = HarvestOrchestrator::new(test_client(Arc::clone(&transport,),), config(),);
        let mut writer = memory_writer();
        let started = Instant::now();

        let summary = orchestrator
            .run(HarvestKind::RepoInfo, &urls(&["o/r"],), &mut writer,)
            .await
            .expect("run",);

        assert_eq!(summary.processed, 1);
        assert_eq!(started.elapsed(), Duration::from_secs(90,));
        assert_eq!(transport.requests(), vec!["/rate_limit", "/rate_limit", "/repos/o/r"]);
    }

    #[tokio::test(start_paused = true)]
    async fn fork_harvest_attaches_owner_followers()
    {
        let fork = json!({
            "name": "proj",
            "full_name": "carol/proj",
            "owner": {"login": "carol"},
            "html_url": "https://github.com/carol/proj",
            "created_at": "2020-01-01T00:00:00Z",
            "updated_at": "2020-02-01T00:00:00Z",
            "stargazers_count": 1,
            "watchers_count": 1,
            "forks_count": 0
        });
        let transport = Arc::new(
            ScriptedTransport::new()
                .rate_limit(4000, TEST_EPOCH,)
                .respond_json("/repos/up/proj", &json!({"default_branch": "main"}),)
                .respond_json("/repos/up/proj/forks?per_page=100&page=1", &json!([fork]),)
                .respond_json("/repos/up/proj/forks?per_page=100&page=2", &json!([]),)
                .respond_json("/repos/carol/proj/branches?per_page=100&page=1", &json!([{"name": "main"}]),)
                .respond_json("/repos/carol/proj/branches?per_page=100&page=2", &json!([]),)
                .respond_json(
                    "/repos/carol/proj/compare/up:main...carol:main",
                    &json!({"ahead_by": 1, "commits": [{"commit": {"message": "fixed typo bug"}}]}),
                )
                .on_graphql(echo_followers,),
        );
        let orchestrator = HarvestOrchestrator::new(test_client(Arc::clone(&transport,),), config(),);
        let mut writer = memory_writer();

        let summary = orchestrator
            .run(HarvestKind::Forks, &urls(&["https://github.com/up/proj"],), &mut writer,)
            .await
            .expect("run",);

        assert_eq!(summary.records, 1);
        let written = lines(writer,);
        assert_eq!(written[0]["forked_from"], "https://github.com/up/proj");
        assert_eq!(written[0]["fork_branch_name"], "main");
        assert_eq!(written[0]["owner_followers"], 5);
        assert_eq!(written[0]["number_bugfix_msgs"], 1);
        assert_eq!(written[0]["commit_classifications"], json!(["Y"]));
    }
}
