// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Harvest configuration loaded from YAML and overridden from the CLI.
//!
//! Every field has a default, so an empty document is a valid
//! configuration. Nested sections tune the retrier, the rate-limit tracker
//! and the GraphQL batch resolver.

use std::{fs, path::{Path, PathBuf}};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    error::{self, Error, Result},
    followers::{GRAPHQL_ALIAS_CEILING, GraphqlConfig},
    rate_limit::RateLimitConfig,
    repository::HarvestInterval,
    retry::RetryConfig,
};

/// Largest page size GitHub serves.
pub const MAX_PER_PAGE: u32 = 100;

/// Root configuration document.
///
/// # Examples
///
/// ```
/// use ghharvest::HarvestConfig;
///
/// let yaml = r#"
/// sample_size: 25
/// date_limit: 03/15/2023
/// graphql:
///   concurrency: 2
/// "#;
/// let config: HarvestConfig = serde_yaml::from_str(yaml,).expect("valid configuration",);
/// assert_eq!(config.sample_size, 25);
/// assert_eq!(config.graphql.batch_size, 2000);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
#[serde(default, deny_unknown_fields)]
pub struct HarvestConfig
{
    /// Newline-delimited repository URL list.
    pub manifest:              Option<PathBuf,>,
    /// Output file; derived from the harvest parameters when absent.
    pub output:                Option<PathBuf,>,
    /// Window of the manifest to process.
    pub interval:              HarvestInterval,
    /// Forks kept per repository (default: 10).
    pub sample_size:           usize,
    /// Seed of the fork sample (default: 15).
    pub seed:                  u64,
    /// Only forks created before this instant are analyzed; defaults to the
    /// start of the run.
    #[serde(deserialize_with = "deserialize_date_limit")]
    pub date_limit:            Option<DateTime<Utc,>,>,
    /// Items per page (default: 100).
    pub per_page:              u32,
    /// Pause between repositories (default: 2).
    pub repository_delay_secs: u64,
    /// Records between output flushes (default: 1000).
    pub checkpoint_every:      usize,
    pub retry:                 RetryConfig,
    pub rate_limit:            RateLimitConfig,
    pub graphql:               GraphqlConfig,
}

impl Default for HarvestConfig
{
    fn default() -> Self
    {
        Self {
            manifest:              None,
            output:                None,
            interval:              HarvestInterval::default(),
            sample_size:           10,
            seed:                  15,
            date_limit:            None,
            per_page:              MAX_PER_PAGE,
            repository_delay_secs: 2,
            checkpoint_every:      1000,
            retry:                 RetryConfig::default(),
            rate_limit:            RateLimitConfig::default(),
            graphql:               GraphqlConfig::default(),
        }
    }
}

impl HarvestConfig
{
    /// Checks the invariants the harvesters rely on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] describing the first violated rule, or
    /// [`Error::InvalidBatchSize`] for a batch size outside the alias
    /// ceiling.
    pub fn validate(&self,) -> Result<(),>
    {
        if self.per_page == 0 || self.per_page > MAX_PER_PAGE {
            return Err(Error::validation(format!(
                "per_page must be between 1 and {MAX_PER_PAGE}, got {}",
                self.per_page
            ),),);
        }
        if self.sample_size == 0 {
            return Err(Error::validation("sample_size must be at least 1",),);
        }
        if self.checkpoint_every == 0 {
            return Err(Error::validation("checkpoint_every must be at least 1",),);
        }
        if self.graphql.batch_size == 0 || self.graphql.batch_size > GRAPHQL_ALIAS_CEILING {
            return Err(Error::InvalidBatchSize {
                size:    self.graphql.batch_size,
                ceiling: GRAPHQL_ALIAS_CEILING,
            },);
        }
        if self.graphql.concurrency == 0 {
            return Err(Error::validation("graphql.concurrency must be at least 1",),);
        }
        if self.graphql.max_batch_attempts == 0 {
            return Err(Error::validation("graphql.max_batch_attempts must be at least 1",),);
        }
        self.interval.validate()
    }

    /// Output path used when none is configured, e.g.
    /// `forks_seed=15_sample=10_interval_0_110.jsonl`.
    pub fn default_output_path(&self, kind: &str,) -> PathBuf
    {
        PathBuf::from(format!(
            "{kind}_seed={}_sample={}_interval_{}.jsonl",
            self.seed,
            self.sample_size,
            self.interval.label()
        ),)
    }

    /// Configured output path or [`default_output_path`](Self::default_output_path).
    pub fn output_path(&self, kind: &str,) -> PathBuf
    {
        self.output.clone().unwrap_or_else(|| self.default_output_path(kind,),)
    }
}

/// Loads and validates a configuration file.
///
/// # Errors
///
/// Returns [`Error::Io`] when the file cannot be read, [`Error::Parse`] for
/// malformed YAML and validation errors from [`HarvestConfig::validate`].
pub fn load_config(path: &Path,) -> Result<HarvestConfig,>
{
    let contents = fs::read_to_string(path,).map_err(|source| error::io_error(path, source,),)?;
    parse_config(&contents,)
}

/// Parses and validates a configuration document.
///
/// # Errors
///
/// Same as [`load_config`] minus I/O.
pub fn parse_config(contents: &str,) -> Result<HarvestConfig,>
{
    let config: HarvestConfig = if contents.trim().is_empty() {
        HarvestConfig::default()
    } else {
        serde_yaml::from_str(contents,)?
    };
    config.validate()?;
    Ok(config,)
}

/// Parses a cutoff given as RFC 3339 or `MM/DD/YYYY` (midnight UTC).
///
/// # Errors
///
/// Returns [`Error::Validation`] for any other format.
///
/// # Examples
///
/// ```
/// use ghharvest::parse_date_limit;
///
/// let limit = parse_date_limit("03/15/2023",)?;
/// assert_eq!(limit.to_rfc3339(), "2023-03-15T00:00:00+00:00");
/// # Ok::<(), ghharvest::Error>(())
/// ```
pub fn parse_date_limit(value: &str,) -> Result<DateTime<Utc,>,>
{
    let value = value.trim();
    if let Ok(instant,) = DateTime::parse_from_rfc3339(value,) {
        return Ok(instant.with_timezone(&Utc,),);
    }
    NaiveDate::parse_from_str(value, "%m/%d/%Y",)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0,),)
        .map(|midnight| midnight.and_utc(),)
        .ok_or_else(|| {
            Error::validation(format!(
                "invalid date limit '{value}': expected RFC 3339 or MM/DD/YYYY"
            ),)
        },)
}

fn deserialize_date_limit<'de, D,>(deserializer: D,) -> std::result::Result<Option<DateTime<Utc,>,>, D::Error,>
where
    D: Deserializer<'de,>,
{
    let value: Option<String,> = Option::deserialize(deserializer,)?;
    value
        .map(|raw| parse_date_limit(&raw,),)
        .transpose()
        .map_err(|e| serde::de::Error::custom(e.to_string(),),)
}

#[cfg(test)]
mod tests
{
    use std::io::Write;

    use super::*;

    #[test]
    fn empty_document_yields_defaults()
    {
        let config = parse_config("",).expect("defaults",);
        assert_eq!(config, HarvestConfig::default());
        assert_eq!(config.sample_size, 10);
        assert_eq!(config.seed, 15);
        assert_eq!(config.repository_delay_secs, 2);
        assert_eq!(config.checkpoint_every, 1000);
        assert_eq!(config.graphql.concurrency, 5);
        assert_eq!(config.rate_limit.max_total_wait_secs, 7200);
    }

    #[test]
    fn nested_sections_merge_with_defaults()
    {
        let yaml = r#"
            interval: { start: 0, end: 110 }
            retry:
              max_retries: 3
            graphql:
              batch_size: 500
        "#;
        let config = parse_config(yaml,).expect("valid",);
        assert_eq!(config.interval, HarvestInterval::new(0, Some(110,),));
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.initial_wait_secs, 120);
        assert_eq!(config.graphql.batch_size, 500);
        assert_eq!(config.graphql.max_batch_attempts, 10);
    }

    #[test]
    fn date_limit_accepts_both_formats()
    {
        let a = parse_config("date_limit: 2023-03-15T00:00:00Z",).expect("rfc3339",);
        let b = parse_config("date_limit: 03/15/2023",).expect("us date",);
        assert_eq!(a.date_limit, b.date_limit);
        assert!(parse_date_limit("15.03.2023").is_err());
    }

    #[test]
    fn validation_rejects_broken_values()
    {
        let error = parse_config("graphql: { batch_size: 2001 }",).expect_err("too large",);
        assert!(matches!(error, Error::InvalidBatchSize { size: 2001, .. }));

        for yaml in [
            "per_page: 0",
            "per_page: 101",
            "sample_size: 0",
            "graphql: { concurrency: 0 }",
            "interval: { start: 9, end: 3 }",
        ] {
            let error = parse_config(yaml,).expect_err(yaml,);
            assert!(matches!(error, Error::Validation { .. }), "{yaml}");
        }
    }

    #[test]
    fn unknown_fields_are_parse_errors()
    {
        let error = parse_config("sample: 3",).expect_err("unknown field",);
        assert!(matches!(error, Error::Parse { .. }));
    }

    #[test]
    fn default_output_path_encodes_parameters()
    {
        let config = HarvestConfig {
            interval: HarvestInterval::new(0, Some(110,),),
            ..HarvestConfig::default()
        };
        assert_eq!(
            config.output_path("forks",),
            PathBuf::from("forks_seed=15_sample=10_interval_0_110.jsonl")
        );
    }

    #[test]
    fn load_config_reads_file()
    {
        let mut file = tempfile::NamedTempFile::new().expect("temp file",);
        writeln!(file, "seed: 99").expect("write",);
        assert_eq!(load_config(file.path(),).expect("loaded",).seed, 99);
    }
}
