// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Issue and issue-comment harvesting.
//!
//! The issues endpoint also lists pull requests, marked by a `pull_request`
//! object, and the comments endpoint also lists pull-request conversation
//! comments, whose web URL points below `/pull/`. Both are filtered out.
//! Entries with an empty body carry no text to analyze and
//! are dropped. Author follower counts are attached in one batch per
//! repository.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::{
    error::Result, followers::BatchFollowerResolver, paginator::Paginator,
    repository::RepositoryRef,
};

#[derive(Debug, Clone, Deserialize,)]
struct Author
{
    login: String,
}

#[derive(Debug, Clone, Deserialize,)]
struct Issue
{
    number:       u64,
    #[serde(default)]
    title:        Option<String,>,
    #[serde(default)]
    body:         Option<String,>,
    #[serde(default)]
    user:         Option<Author,>,
    state:        String,
    #[serde(default)]
    locked:       bool,
    created_at:   DateTime<Utc,>,
    updated_at:   DateTime<Utc,>,
    #[serde(default)]
    pull_request: Option<Value,>,
}

impl Issue
{
    fn is_plain_issue(&self,) -> bool
    {
        self.pull_request.is_none()
    }
}

#[derive(Debug, Clone, Deserialize,)]
struct IssueComment
{
    html_url:   String,
    issue_url:  String,
    #[serde(default)]
    body:       Option<String,>,
    #[serde(default)]
    user:       Option<Author,>,
    created_at: DateTime<Utc,>,
    updated_at: DateTime<Utc,>,
}

impl IssueComment
{
    /// `true` for `.../{owner}/{repo}/issues/{n}#issuecomment-{id}`.
    fn is_issue_comment(&self,) -> bool
    {
        let Some((page, anchor,),) = self.html_url.split_once('#',) else {
            return false;
        };
        anchor.starts_with("issuecomment",) && page.rsplit('/',).nth(1,) == Some("issues",)
    }

    fn issue_number(&self,) -> Option<u64,>
    {
        self.issue_url.rsplit('/',).next().and_then(|tail| tail.parse().ok(),)
    }
}

/// One issue with text and author popularity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
pub struct IssueRecord
{
    pub repository_owner: String,
    pub repository_name:  String,
    pub issue_number:     u64,
    pub created_at:       DateTime<Utc,>,
    pub updated_at:       DateTime<Utc,>,
    pub state:            String,
    pub locked:           bool,
    pub user:             Option<String,>,
    pub user_followers:   Option<u64,>,
    pub title:            String,
    pub body:             String,
}

/// One comment on an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
pub struct CommentRecord
{
    pub repository_owner: String,
    pub repository_name:  String,
    pub issue_number:     Option<u64,>,
    pub created_at:       DateTime<Utc,>,
    pub updated_at:       DateTime<Utc,>,
    pub user:             Option<String,>,
    pub user_followers:   Option<u64,>,
    pub body:             String,
}

fn non_empty(text: Option<String,>,) -> Option<String,>
{
    text.filter(|value| !value.trim().is_empty(),)
}

/// Resolves followers for the present logins, keeping `None` for anonymous
/// entries.
async fn followers_for(
    resolver: &BatchFollowerResolver,
    users: &[Option<String,>],
) -> Result<Vec<Option<u64,>,>,>
{
    let logins: Vec<String,> = users.iter().flatten().cloned().collect();
    let mut resolved = resolver.resolve(&logins,).await?.into_iter();
    Ok(users
        .iter()
        .map(|user| match user {
            Some(_,) => resolved.next().and_then(|record| record.follower_count,),
            None => None,
        },)
        .collect(),)
}

/// Fetches every issue of `repo`, excluding pull requests.
///
/// # Errors
///
/// Propagates pagination and follower resolution failures.
pub async fn fetch_issues(
    paginator: &Paginator,
    resolver: &BatchFollowerResolver,
    repo: &RepositoryRef,
) -> Result<Vec<IssueRecord,>,>
{
    let walk = paginator
        .collect_where(
            &format!("/repos/{}/issues?state=all", repo.path()),
            Issue::is_plain_issue,
            None,
        )
        .await?;

    let issues: Vec<(Issue, String, String,),> = walk
        .items
        .into_iter()
        .filter_map(|mut issue| {
            let title = non_empty(issue.title.take(),)?;
            let body = non_empty(issue.body.take(),)?;
            Some((issue, title, body,),)
        },)
        .collect();

    let users: Vec<Option<String,>,> =
        issues.iter().map(|(issue, _, _,)| issue.user.as_ref().map(|u| u.login.clone(),),).collect();
    let followers = followers_for(resolver, &users,).await?;

    let records: Vec<IssueRecord,> = issues
        .into_iter()
        .zip(users,)
        .zip(followers,)
        .map(|(((issue, title, body,), user,), user_followers,)| IssueRecord {
            repository_owner: repo.owner.clone(),
            repository_name: repo.name.clone(),
            issue_number: issue.number,
            created_at: issue.created_at,
            updated_at: issue.updated_at,
            state: issue.state,
            locked: issue.locked,
            user,
            user_followers,
            title,
            body,
        },)
        .collect();

    info!("Found {} issues for {}", records.len(), repo.path());
    Ok(records,)
}

/// Fetches every issue comment of `repo`, excluding pull-request comments.
///
/// # Errors
///
/// Propagates pagination and follower resolution failures.
pub async fn fetch_comments(
    paginator: &Paginator,
    resolver: &BatchFollowerResolver,
    repo: &RepositoryRef,
) -> Result<Vec<CommentRecord,>,>
{
    let walk = paginator
        .collect_where(
            &format!("/repos/{}/issues/comments", repo.path()),
            IssueComment::is_issue_comment,
            None,
        )
        .await?;

    let comments: Vec<(IssueComment, String,),> = walk
        .items
        .into_iter()
        .filter_map(|mut comment| {
            let body = non_empty(comment.body.take(),)?;
            Some((comment, body,),)
        },)
        .collect();

    let users: Vec<Option<String,>,> = comments
        .iter()
        .map(|(comment, _,)| comment.user.as_ref().map(|u| u.login.clone(),),)
        .collect();
    let followers = followers_for(resolver, &users,).await?;

    let records: Vec<CommentRecord,> = comments
        .into_iter()
        .zip(users,)
        .zip(followers,)
        .map(|(((comment, body,), user,), user_followers,)| CommentRecord {
            repository_owner: repo.owner.clone(),
            repository_name: repo.name.clone(),
            issue_number: comment.issue_number(),
            created_at: comment.created_at,
            updated_at: comment.updated_at,
            user,
            user_followers,
            body,
        },)
        .collect();

    info!("Found {} issue comments for {}", records.len(), repo.path());
    Ok(records,)
}
