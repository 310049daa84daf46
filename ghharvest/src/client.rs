// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! GitHub client combining the transport, backoff retrier and quota tracker.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::json;

use crate::{
    clock::Clock,
    config::HarvestConfig,
    error::{Error, Result},
    rate_limit::RateLimitTracker,
    retry::BackoffRetrier,
    transport::{ApiResponse, Transport},
};

/// Route of the GraphQL endpoint.
pub const GRAPHQL_ROUTE: &str = "/graphql";

/// Cheap-to-clone handle used by every harvesting component.
///
/// Clones share the transport and the single [`RateLimitTracker`].
#[derive(Clone,)]
pub struct GitHubClient
{
    transport: Arc<dyn Transport,>,
    retrier:   BackoffRetrier,
    tracker:   Arc<RateLimitTracker,>,
    clock:     Clock,
}

impl GitHubClient
{
    /// Wires a client from its configuration.
    pub fn new(transport: Arc<dyn Transport,>, config: &HarvestConfig, clock: Clock,) -> Self
    {
        let tracker =
            RateLimitTracker::new(Arc::clone(&transport,), clock, config.rate_limit.clone(),);
        Self {
            transport,
            retrier: BackoffRetrier::new(config.retry.clone(), clock,),
            tracker: Arc::new(tracker,),
            clock,
        }
    }

    /// Shared quota tracker.
    pub fn rate_limits(&self,) -> &RateLimitTracker
    {
        &self.tracker
    }

    /// Whether the transport sends credentials.
    pub fn is_authenticated(&self,) -> bool
    {
        self.transport.is_authenticated()
    }

    /// Clock used for every sleep issued through this client.
    pub fn clock(&self,) -> Clock
    {
        self.clock
    }

    /// `GET route` with backoff.
    ///
    /// The returned response may carry any status; 404 and exhausted retries
    /// are reported through [`ApiResponse::status`].
    ///
    /// # Errors
    ///
    /// Propagates transport errors that survived every retry.
    pub async fn get(&self, route: &str,) -> Result<ApiResponse,>
    {
        let transport = Arc::clone(&self.transport,);
        self.retrier
            .attempt(&format!("GET {route}"), || {
                let transport = Arc::clone(&transport,);
                let route = route.to_owned();
                async move { transport.get(&route,).await }
            },)
            .await
    }

    /// `GET route` decoded as JSON, with 404 mapped to `None`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] for a non-success status after retries and
    /// [`Error::Serialize`] for an unexpected body.
    pub async fn get_json<T: DeserializeOwned,>(&self, route: &str,) -> Result<Option<T,>,>
    {
        let response = self.get(route,).await?;
        if response.is_not_found() {
            return Ok(None,);
        }
        expect_success(route, &response,)?;
        response.json().map(Some,)
    }

    /// Posts a GraphQL document with backoff.
    ///
    /// # Errors
    ///
    /// Propagates transport errors that survived every retry.
    pub async fn graphql(&self, query: &str,) -> Result<ApiResponse,>
    {
        let transport = Arc::clone(&self.transport,);
        let body = json!({ "query": query });
        self.retrier
            .attempt("POST /graphql", || {
                let transport = Arc::clone(&transport,);
                let body = body.clone();
                async move { transport.post_json(GRAPHQL_ROUTE, &body,).await }
            },)
            .await
    }
}

/// Fails with [`Error::NotFound`] or [`Error::Api`] unless `response` is 200.
pub(crate) fn expect_success(route: &str, response: &ApiResponse,) -> Result<(),>
{
    if response.is_success() {
        Ok((),)
    } else if response.is_not_found() {
        Err(Error::NotFound {
            route: route.to_owned(),
        },)
    } else {
        Err(Error::Api {
            route:  route.to_owned(),
            status: response.status,
        },)
    }
}

#[cfg(test)]
mod tests
{
    use serde::Deserialize;
    use tokio::time::Instant;

    use super::*;
    use crate::test_support::{ScriptedTransport, test_client};

    #[derive(Debug, Deserialize,)]
    struct Repository
    {
        default_branch: String,
    }

    #[tokio::test]
    async fn get_json_decodes_success()
    {
        let transport = Arc::new(
            ScriptedTransport::new().respond("/repos/o/r", 200, r#"{"default_branch":"trunk"}"#,),
        );
        let client = test_client(transport,);

        let repo: Option<Repository,> = client.get_json("/repos/o/r",).await.expect("decoded",);
        assert_eq!(repo.expect("present",).default_branch, "trunk");
    }

    #[tokio::test]
    async fn get_json_maps_not_found_to_none()
    {
        let client = test_client(Arc::new(ScriptedTransport::new(),),);
        let repo: Option<Repository,> = client.get_json("/repos/o/gone",).await.expect("no error",);
        assert!(repo.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn get_json_reports_status_after_retries()
    {
        let transport = Arc::new(ScriptedTransport::new().respond("/repos/o/r", 502, "",),);
        let client = test_client(Arc::clone(&transport,),);
        let started = Instant::now();

        let error =
            client.get_json::<Repository,>("/repos/o/r",).await.expect_err("persistent 502",);

        assert!(matches!(error, Error::Api { status: 502, .. }));
        assert_eq!(transport.count("/repos/o/r",), 3);
        assert_eq!(started.elapsed(), std::time::Duration::from_secs(1 + 2 + 10,));
    }

    #[tokio::test]
    async fn graphql_posts_query_body()
    {
        let transport = Arc::new(ScriptedTransport::new().on_graphql(|query| {
            ApiResponse::new(200, json!({"data": {"echo": query}}).to_string(),)
        },),);
        let client = test_client(Arc::clone(&transport,),);

        let response = client.graphql("query { viewer { login } }",).await.expect("posted",);

        assert!(response.body.contains("viewer",));
        assert_eq!(transport.requests(), vec!["POST /graphql".to_owned()]);
    }

    #[test]
    fn expect_success_classifies_statuses()
    {
        assert!(expect_success("/x", &ApiResponse::new(200, "",)).is_ok());
        assert!(matches!(
            expect_success("/x", &ApiResponse::new(404, "",)),
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            expect_success("/x", &ApiResponse::new(429, "",)),
            Err(Error::Api { status: 429, .. })
        ));
    }
}
