// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Command-line interface for the ghharvest binary.
//!
//! Each harvest subcommand reads a manifest of repository URLs, processes
//! the configured interval and writes JSON Lines records. `rate-limit`
//! reports the remaining quota and `classify` labels commit messages
//! offline.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    process,
    sync::Arc,
};

use clap::{ArgAction, Args, Parser, Subcommand};
use ghharvest::{
    Clock, Error, GitHubClient, HarvestConfig, HarvestInterval, HarvestKind, HarvestOrchestrator,
    OctocrabTransport, RateLimitTracker, RecordWriter, RequestClass, Result, classify_all,
    io_error, load_config, load_manifest, parse_date_limit,
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Command line interface for harvesting GitHub repository data.
#[derive(Debug, Parser,)]
#[command(name = "ghharvest", version, about = "Harvest fork, contributor and issue data from GitHub")]
struct Cli
{
    /// YAML configuration file; flags override its values.
    #[arg(long = "config", value_name = "PATH", global = true)]
    config: Option<PathBuf,>,

    /// Personal access token; unauthenticated quota is used when absent.
    #[arg(long = "token", env = "GITHUB_TOKEN", hide_env_values = true, global = true)]
    token: Option<String,>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand,)]
/// Supported commands exposed by the CLI.
enum Command
{
    /// Compare sampled forks with their upstream and label ahead commits.
    Forks(HarvestArgs,),
    /// List contributors with their follower counts.
    Contributors(HarvestArgs,),
    /// Collect stars, watchers, forks and open issues.
    #[command(name = "repo-info")]
    RepoInfo(HarvestArgs,),
    /// Collect issues with their authors' follower counts.
    Issues(HarvestArgs,),
    /// Collect issue comments with their authors' follower counts.
    Comments(HarvestArgs,),
    /// Show the remaining core and GraphQL quota.
    #[command(name = "rate-limit")]
    RateLimit,
    /// Label each line of a file as bug fix (Y) or not (N).
    Classify(ClassifyArgs,),
}

impl Command
{
    fn harvest(&self,) -> Option<(HarvestKind, &HarvestArgs,),>
    {
        match self {
            Self::Forks(args,) => Some((HarvestKind::Forks, args,),),
            Self::Contributors(args,) => Some((HarvestKind::Contributors, args,),),
            Self::RepoInfo(args,) => Some((HarvestKind::RepoInfo, args,),),
            Self::Issues(args,) => Some((HarvestKind::Issues, args,),),
            Self::Comments(args,) => Some((HarvestKind::Comments, args,),),
            Self::RateLimit | Self::Classify(_,) => None,
        }
    }
}

/// Arguments shared by every harvest subcommand.
#[derive(Debug, Args, Default,)]
struct HarvestArgs
{
    /// Newline-delimited repository URL list.
    #[arg(long = "manifest", value_name = "PATH")]
    manifest: Option<PathBuf,>,

    /// First manifest index to process.
    #[arg(long = "start", value_name = "INDEX")]
    start: Option<usize,>,

    /// Manifest index to stop before.
    #[arg(long = "end", value_name = "INDEX")]
    end: Option<usize,>,

    /// Forks sampled per repository.
    #[arg(long = "sample-size", value_name = "N")]
    sample_size: Option<usize,>,

    /// Seed of the fork sample.
    #[arg(long = "seed", value_name = "SEED")]
    seed: Option<u64,>,

    /// Only forks created before this date (RFC 3339 or MM/DD/YYYY).
    #[arg(long = "date-limit", value_name = "DATE")]
    date_limit: Option<String,>,

    /// Output file; derived from the parameters when omitted.
    #[arg(long = "output", value_name = "PATH")]
    output: Option<PathBuf,>,

    /// Seconds to pause between repositories.
    #[arg(long = "delay", value_name = "SECS")]
    delay: Option<u64,>,

    /// Hide the progress bar.
    #[arg(long = "no-progress", action = ArgAction::SetTrue)]
    no_progress: bool,
}

impl HarvestArgs
{
    /// Applies the flags on top of `config` and re-validates it.
    fn apply(&self, config: &mut HarvestConfig,) -> Result<(),>
    {
        if let Some(manifest,) = &self.manifest {
            config.manifest = Some(manifest.clone(),);
        }
        if self.start.is_some() || self.end.is_some() {
            config.interval = HarvestInterval::new(
                self.start.unwrap_or(config.interval.start,),
                self.end.or(config.interval.end,),
            );
        }
        if let Some(sample_size,) = self.sample_size {
            config.sample_size = sample_size;
        }
        if let Some(seed,) = self.seed {
            config.seed = seed;
        }
        if let Some(date_limit,) = &self.date_limit {
            config.date_limit = Some(parse_date_limit(date_limit,)?,);
        }
        if let Some(output,) = &self.output {
            config.output = Some(output.clone(),);
        }
        if let Some(delay,) = self.delay {
            config.repository_delay_secs = delay;
        }
        config.validate()
    }
}

#[derive(Debug, Args,)]
struct ClassifyArgs
{
    /// File with one commit message per line.
    #[arg(long = "input", value_name = "PATH")]
    input: PathBuf,
}

/// Entry point that reports errors and sets the appropriate exit status.
#[tokio::main]
async fn main()
{
    init_tracing();
    if let Err(error,) = run(Cli::parse(),).await {
        eprintln!("{}", error.to_display_string());
        process::exit(1,);
    }
}

/// Logs to stderr, filtered by `RUST_LOG` (default `info`).
fn init_tracing()
{
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info",),);
    tracing_subscriber::fmt().with_env_filter(filter,).with_target(false,).with_writer(io::stderr,).init();
}

/// Executes the CLI using parsed arguments.
///
/// # Errors
///
/// Propagates configuration, network and output errors.
async fn run(cli: Cli,) -> Result<(),>
{
    let mut config = match &cli.config {
        Some(path,) => load_config(path,)?,
        None => HarvestConfig::default(),
    };

    if let Command::Classify(args,) = &cli.command {
        let mut stdout = io::stdout().lock();
        return run_classify(&args.input, &mut stdout,);
    }

    if cli.token.is_none() {
        warn!("GITHUB_TOKEN is not set, using the unauthenticated quota");
    }
    let transport = Arc::new(OctocrabTransport::new(cli.token.as_deref(),)?,);
    let client = GitHubClient::new(transport, &config, Clock::system(),);

    match cli.command.harvest() {
        Some((kind, args,),) => {
            args.apply(&mut config,)?;
            run_harvest(client, config, kind, !args.no_progress,).await
        }
        None => run_rate_limit(client.rate_limits(),).await,
    }
}

async fn run_harvest(
    client: GitHubClient,
    config: HarvestConfig,
    kind: HarvestKind,
    show_progress: bool,
) -> Result<(),>
{
    let manifest = config
        .manifest
        .clone()
        .ok_or_else(|| Error::validation("missing required --manifest <PATH> argument",),)?;
    let urls = load_manifest(&manifest,)?;
    let output = config.output_path(kind.as_str(),);
    let mut writer = RecordWriter::create(&output, config.checkpoint_every,)?;

    let orchestrator = HarvestOrchestrator::new(client, config,).with_progress(show_progress,);
    let summary = orchestrator.run(kind, &urls, &mut writer,).await?;
    writer.finish()?;

    println!("{summary} ({})", output.display());
    Ok((),)
}

async fn run_rate_limit(tracker: &RateLimitTracker,) -> Result<(),>
{
    for class in [RequestClass::Core, RequestClass::Graphql] {
        println!("{}", tracker.status(class,).await?);
    }
    Ok((),)
}

/// Classifies every non-blank line of `input` and writes `Y`/`N` per line
/// followed by a summary.
fn run_classify<W: Write,>(input: &Path, writer: &mut W,) -> Result<(),>
{
    let contents = fs::read_to_string(input,).map_err(|source| io_error(input, source,),)?;
    let messages: Vec<&str,> = contents.lines().filter(|line| !line.trim().is_empty(),).collect();
    let labels = classify_all(&messages,);
    let bugfixes = labels.iter().filter(|label| label.is_bugfix,).count();

    let write = |writer: &mut W, line: String| {
        writeln!(writer, "{line}").map_err(|source| io_error(Path::new("<stdout>",), source,),)
    };
    for label in &labels {
        let verdict = if label.is_bugfix { "Y" } else { "N" };
        write(writer, format!("{verdict}\t{}", label.message),)?;
    }
    write(writer, format!("{bugfixes} of {} messages are bug fixes", labels.len()),)
}
