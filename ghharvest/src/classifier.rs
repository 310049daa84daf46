// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Keyword heuristic labelling commit messages as bug fixes.
//!
//! A message is split into lower-cased whitespace tokens. It is a bug fix
//! when some token is a fix keyword and no token is a false-positive
//! keyword. Multi-word entries such as `"clean up"` are kept in the lists
//! but can never equal a single token.

use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Tokens that usually describe a bug fix.
pub const BUGFIX_KEYWORDS: [&str; 20] = [
    "fix",
    "fixing",
    "fixed",
    "bug",
    "bugged",
    "issue",
    "problem",
    "resolve",
    "resolved",
    "patch",
    "repair",
    "repaired",
    "repairing",
    "corrected",
    "correct",
    "address",
    "rectify",
    "resolve conflict",
    "hotfix",
    "solve",
];

/// Tokens that look like fixes but describe housekeeping.
pub const FALSE_POSITIVE_KEYWORDS: [&str; 13] = [
    "rename",
    "clean up",
    "clean",
    "refactor",
    "refactoring",
    "cleaning up",
    "cleaning",
    "renaming",
    "mispell",
    "misspelling",
    "merge",
    "merging",
    "compiler warning",
];

/// Outcome of classifying one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,)]
pub enum Verdict
{
    #[serde(rename = "Y")]
    Bugfix,
    #[serde(rename = "N")]
    Other,
}

impl Verdict
{
    pub fn is_bugfix(self,) -> bool
    {
        self == Self::Bugfix
    }

    pub fn as_str(self,) -> &'static str
    {
        match self {
            Self::Bugfix => "Y",
            Self::Other => "N",
        }
    }
}

impl fmt::Display for Verdict
{
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result
    {
        f.write_str(self.as_str(),)
    }
}

/// Classifies `message`.
///
/// # Example
///
/// ```
/// use ghharvest::{Verdict, classify};
///
/// assert_eq!(classify("Fix bug in parser"), Verdict::Bugfix);
/// assert_eq!(classify("Refactor and fix naming"), Verdict::Other);
/// ```
pub fn classify(message: &str,) -> Verdict
{
    let mut has_fix = false;
    for token in message.split_whitespace() {
        let token = token.to_lowercase();
        if FALSE_POSITIVE_KEYWORDS.contains(&token.as_str(),) {
            return Verdict::Other;
        }
        has_fix |= BUGFIX_KEYWORDS.contains(&token.as_str(),);
    }

    if has_fix { Verdict::Bugfix } else { Verdict::Other }
}

/// Shorthand for `classify(message).is_bugfix()`.
pub fn is_bugfix(message: &str,) -> bool
{
    classify(message,).is_bugfix()
}

/// Message paired with its label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
pub struct CommitClassification
{
    pub message:   String,
    pub is_bugfix: bool,
}

impl CommitClassification
{
    pub fn new(message: impl Into<String,>,) -> Self
    {
        let message = message.into();
        let is_bugfix = is_bugfix(&message,);
        Self {
            message, is_bugfix,
        }
    }
}

/// Classifies every message in parallel, preserving input order.
pub fn classify_all<S: AsRef<str,> + Sync,>(messages: &[S],) -> Vec<CommitClassification,>
{
    messages.par_iter().map(|message| CommitClassification::new(message.as_ref(),),).collect()
}
