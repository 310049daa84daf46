// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Page-number pagination over REST collection endpoints.
//!
//! The walk requests `page=1, 2, ...` until a page comes back empty (or
//! with 204, as GitHub answers for an empty repository). When a
//! [`SampleCap`] is supplied and the accumulated items outgrow it, the walk
//! stops early and keeps a seeded random sample instead, bounding the cost
//! of huge collections such as the fork list of a popular repository.

use rand::{SeedableRng, rngs::StdRng, seq::index};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{
    client::{GitHubClient, expect_success},
    error::Result,
};

/// Position of a pagination walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq,)]
pub struct PageCursor
{
    /// Next page to request, starting at 1.
    pub page:      u32,
    /// Items requested per page.
    pub per_page:  u32,
    /// Set once an empty page has been seen.
    pub exhausted: bool,
}

impl PageCursor
{
    /// Cursor positioned on the first page.
    pub fn new(per_page: u32,) -> Self
    {
        Self {
            page: 1, per_page, exhausted: false,
        }
    }

    /// Route of the current page, preserving any existing query string.
    pub fn route(&self, base: &str,) -> String
    {
        let separator = if base.contains('?',) { '&' } else { '?' };
        format!("{base}{separator}per_page={}&page={}", self.per_page, self.page)
    }

    fn advance(&mut self,)
    {
        self.page += 1;
    }

    fn exhaust(&mut self,)
    {
        self.exhausted = true;
    }
}

/// Early-exit bound for a walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq,)]
pub struct SampleCap
{
    /// Number of items to keep.
    pub size: usize,
    /// Seed making the sample reproducible.
    pub seed: u64,
}

/// Items gathered by a walk.
#[derive(Debug, Clone,)]
pub struct PageWalk<T,>
{
    /// Accepted items in page-arrival order.
    pub items:    Vec<T,>,
    /// Number of page requests issued.
    pub requests: u32,
    /// `true` when the walk stopped early and sampled.
    pub sampled:  bool,
}

/// Drives the page loop for one endpoint.
#[derive(Clone,)]
pub struct Paginator
{
    client:   GitHubClient,
    per_page: u32,
}

impl Paginator
{
    /// Creates a paginator requesting `per_page` items per page.
    pub fn new(client: GitHubClient, per_page: u32,) -> Self
    {
        Self {
            client,
            per_page: per_page.max(1,),
        }
    }

    /// Collects every item of `route`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`](crate::Error::NotFound) when a page answers
    /// 404, [`Error::Api`](crate::Error::Api) for any other non-success status
    /// after retries, and decoding errors for unexpected bodies.
    pub async fn collect<T: DeserializeOwned,>(&self, route: &str,) -> Result<PageWalk<T,>,>
    {
        self.collect_where(route, |_: &T| true, None,).await
    }

    /// Collects the items of `route` accepted by `keep`, optionally capped.
    ///
    /// Filtering happens as pages arrive, so the cap counts accepted items
    /// only. Once more than `cap.size` items are accepted the walk stops and
    /// returns exactly `cap.size` of them, chosen with `cap.seed`.
    ///
    /// # Errors
    ///
    /// Same as [`collect`](Self::collect).
    pub async fn collect_where<T, P,>(
        &self,
        route: &str,
        mut keep: P,
        cap: Option<SampleCap,>,
    ) -> Result<PageWalk<T,>,>
    where
        T: DeserializeOwned,
        P: FnMut(&T,) -> bool,
    {
        let mut cursor = PageCursor::new(self.per_page,);
        let mut items = Vec::new();
        let mut requests = 0u32;

        while !cursor.exhausted {
            let page_route = cursor.route(route,);
            let response = self.client.get(&page_route,).await?;
            requests += 1;
            if response.is_no_content() {
                debug!("{}: page {} has no content", route, cursor.page);
                cursor.exhaust();
                break;
            }
            expect_success(&page_route, &response,)?;

            let page: Vec<T,> = response.json()?;
            if page.is_empty() {
                cursor.exhaust();
                break;
            }

            debug!("{}: page {} returned {} items", route, cursor.page, page.len());
            items.extend(page.into_iter().filter(|item| keep(item,),),);
            cursor.advance();

            if let Some(cap,) = cap {
                if items.len() > cap.size {
                    debug!("{}: sampling {} of {} items", route, cap.size, items.len());
                    return Ok(PageWalk {
                        items: sample(items, cap,),
                        requests,
                        sampled: true,
                    },);
                }
            }
        }

        Ok(PageWalk {
            items,
            requests,
            sampled: false,
        },)
    }
}

/// Keeps `cap.size` items picked with a seeded RNG, in their original order.
pub fn sample<T,>(items: Vec<T,>, cap: SampleCap,) -> Vec<T,>
{
    if items.len() <= cap.size {
        return items;
    }

    let mut rng = StdRng::seed_from_u64(cap.seed,);
    let mut chosen = vec![false; items.len()];
    for picked in index::sample(&mut rng, items.len(), cap.size,) {
        chosen[picked] = true;
    }

    items.into_iter().zip(chosen,).filter_map(|(item, keep,)| keep.then_some(item,),).collect()
}
