// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Repository references, harvest intervals and URL manifests.

use std::{fmt, fs, path::Path, str::FromStr};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{self, Error, Result};

/// Host prefix used when formatting a reference back into a URL.
pub const GITHUB_URL_PREFIX: &str = "https://github.com";

/// Owner and name of a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize,)]
pub struct RepositoryRef
{
    pub owner: String,
    pub name:  String,
}

impl RepositoryRef
{
    /// Splits a repository URL into owner and name.
    ///
    /// The last two path segments are used, so both
    /// `https://github.com/octocat/hello-world` and `octocat/hello-world/`
    /// are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidReference`] when either segment is missing or
    /// contains characters GitHub does not allow.
    ///
    /// # Example
    ///
    /// ```
    /// use ghharvest::RepositoryRef;
    ///
    /// let repo = RepositoryRef::parse("https://github.com/octocat/hello-world",)?;
    /// assert_eq!(repo.owner, "octocat");
    /// assert_eq!(repo.url(), "https://github.com/octocat/hello-world");
    /// # Ok::<(), ghharvest::Error>(())
    /// ```
    pub fn parse(url: &str,) -> Result<Self,>
    {
        let trimmed = url.trim().trim_end_matches('/',);
        let mut segments = trimmed.rsplit('/',);
        let name = segments.next().unwrap_or_default();
        let owner = segments.next().unwrap_or_default();

        if owner.is_empty() || name.is_empty() {
            return Err(Error::invalid_reference(url, "expected '<owner>/<repository>'",),);
        }

        let owner_pattern = Regex::new(r"^[A-Za-z0-9-]+$",)
            .map_err(|e| Error::validation(format!("invalid owner pattern: {e}"),),)?;
        let name_pattern = Regex::new(r"^[A-Za-z0-9._-]+$",)
            .map_err(|e| Error::validation(format!("invalid name pattern: {e}"),),)?;

        if !owner_pattern.is_match(owner,) {
            return Err(Error::invalid_reference(url, format!("invalid owner '{owner}'"),),);
        }
        if !name_pattern.is_match(name,) || name == "." || name == ".." {
            return Err(Error::invalid_reference(url, format!("invalid repository name '{name}'"),),);
        }

        Ok(Self {
            owner: owner.to_owned(),
            name:  name.to_owned(),
        },)
    }

    /// `owner/name` path used in API routes.
    pub fn path(&self,) -> String
    {
        format!("{}/{}", self.owner, self.name)
    }

    /// Canonical web URL.
    pub fn url(&self,) -> String
    {
        format!("{GITHUB_URL_PREFIX}/{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepositoryRef
{
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result
    {
        f.write_str(&self.url(),)
    }
}

impl FromStr for RepositoryRef
{
    type Err = Error;

    fn from_str(value: &str,) -> Result<Self,>
    {
        Self::parse(value,)
    }
}

/// Half-open `[start, end)` window into the manifest.
///
/// Restarting a run with a later `start` resumes a previous harvest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,)]
#[serde(default)]
pub struct HarvestInterval
{
    pub start: usize,
    /// Exclusive end; `None` runs to the end of the manifest.
    pub end:   Option<usize,>,
}

impl HarvestInterval
{
    pub fn new(start: usize, end: Option<usize,>,) -> Self
    {
        Self {
            start, end,
        }
    }

    /// Rejects windows whose end precedes their start.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for `start > end`.
    pub fn validate(&self,) -> Result<(),>
    {
        match self.end {
            Some(end,) if end < self.start => Err(Error::validation(format!(
                "interval start {} is after its end {}",
                self.start, end
            ),),),
            _ => Ok((),),
        }
    }

    /// Applies the window to `items`, clamping both bounds to its length.
    pub fn slice<'a, T,>(&self, items: &'a [T],) -> &'a [T]
    {
        let end = self.end.unwrap_or(items.len(),).min(items.len(),);
        let start = self.start.min(end,);
        &items[start..end]
    }

    /// Label used in default output file names.
    pub fn label(&self,) -> String
    {
        match self.end {
            Some(end,) => format!("{}_{}", self.start, end),
            None => format!("{}_end", self.start),
        }
    }
}

/// Reads a newline-delimited URL list, ignoring blank lines.
///
/// # Errors
///
/// Returns [`Error::Io`] when the file cannot be read.
pub fn load_manifest(path: &Path,) -> Result<Vec<String,>,>
{
    let contents = fs::read_to_string(path,).map_err(|source| error::io_error(path, source,),)?;
    Ok(parse_manifest(&contents,),)
}

/// Splits manifest contents into trimmed, non-blank lines.
pub fn parse_manifest(contents: &str,) -> Vec<String,>
{
    contents.lines().map(str::trim,).filter(|line| !line.is_empty(),).map(str::to_owned,).collect()
}
