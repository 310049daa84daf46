// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! In-memory transport used by unit tests.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::{
    client::GitHubClient,
    clock::Clock,
    config::HarvestConfig,
    error::{Error, Result},
    transport::{ApiResponse, Transport},
};

/// Unix time every test clock starts at.
pub(crate) const TEST_EPOCH: i64 = 1_700_000_000;

#[derive(Debug, Clone,)]
enum Scripted
{
    Response(ApiResponse,),
    Failure(String,),
}

type GraphqlHandler = Box<dyn FnMut(&str,) -> ApiResponse + Send,>;

/// Transport answering from per-route queues.
///
/// The last queued entry of a route is sticky, so a single scripted
/// response serves every later request. Unscripted routes answer 404.
#[derive(Default,)]
pub(crate) struct ScriptedTransport
{
    routes:    Mutex<HashMap<String, VecDeque<Scripted,>,>,>,
    graphql:   Mutex<Option<GraphqlHandler,>,>,
    requests:  Mutex<Vec<String,>,>,
    anonymous: bool,
}

impl ScriptedTransport
{
    pub(crate) fn new() -> Self
    {
        Self::default()
    }

    pub(crate) fn respond(self, route: &str, status: u16, body: impl Into<String,>,) -> Self
    {
        self.push(route, Scripted::Response(ApiResponse::new(status, body,),),);
        self
    }

    pub(crate) fn respond_json(self, route: &str, body: &Value,) -> Self
    {
        self.respond(route, 200, body.to_string(),)
    }

    pub(crate) fn fail(self, route: &str, message: &str,) -> Self
    {
        self.push(route, Scripted::Failure(message.to_owned(),),);
        self
    }

    /// Scripts `/rate_limit` with the given remaining quota for both classes.
    pub(crate) fn rate_limit(self, remaining: u64, reset: i64,) -> Self
    {
        self.respond_json("/rate_limit", &rate_limit_body(remaining, reset, remaining, reset,),)
    }

    pub(crate) fn on_graphql<F,>(self, handler: F,) -> Self
    where
        F: FnMut(&str,) -> ApiResponse + Send + 'static,
    {
        *self.graphql.lock().expect("graphql handler lock",) = Some(Box::new(handler,),);
        self
    }

    /// Reports the transport as sending no credentials.
    pub(crate) fn unauthenticated(mut self,) -> Self
    {
        self.anonymous = true;
        self
    }

    pub(crate) fn requests(&self,) -> Vec<String,>
    {
        self.requests.lock().expect("request log lock",).clone()
    }

    pub(crate) fn count(&self, route: &str,) -> usize
    {
        self.requests().iter().filter(|logged| logged.as_str() == route,).count()
    }

    fn push(&self, route: &str, entry: Scripted,)
    {
        self.routes
            .lock()
            .expect("route table lock",)
            .entry(route.to_owned(),)
            .or_default()
            .push_back(entry,);
    }

    fn next(&self, route: &str,) -> Option<Scripted,>
    {
        let mut routes = self.routes.lock().expect("route table lock",);
        let queue = routes.get_mut(route,)?;
        if queue.len() > 1 { queue.pop_front() } else { queue.front().cloned() }
    }
}

#[async_trait]
impl Transport for ScriptedTransport
{
    async fn get(&self, route: &str,) -> Result<ApiResponse,>
    {
        self.requests.lock().expect("request log lock",).push(route.to_owned(),);
        match self.next(route,) {
            Some(Scripted::Response(response,),) => Ok(response,),
            Some(Scripted::Failure(message,),) => Err(Error::transient(message,),),
            None => Ok(ApiResponse::new(404, r#"{"message":"Not Found"}"#,),),
        }
    }

    async fn post_json(&self, route: &str, body: &Value,) -> Result<ApiResponse,>
    {
        self.requests.lock().expect("request log lock",).push(format!("POST {route}"),);
        let query = body.get("query",).and_then(Value::as_str,).unwrap_or_default().to_owned();
        let mut handler = self.graphql.lock().expect("graphql handler lock",);
        match handler.as_mut() {
            Some(handler,) => Ok(handler(&query,),),
            None => Ok(ApiResponse::new(502, "",),),
        }
    }

    fn is_authenticated(&self,) -> bool
    {
        !self.anonymous
    }
}

pub(crate) fn rate_limit_body(
    core_remaining: u64,
    core_reset: i64,
    graphql_remaining: u64,
    graphql_reset: i64,
) -> Value
{
    json!({
        "resources": {
            "core": {"limit": 5000, "used": 5000 - core_remaining.min(5000), "remaining": core_remaining, "reset": core_reset},
            "graphql": {"limit": 5000, "used": 5000 - graphql_remaining.min(5000), "remaining": graphql_remaining, "reset": graphql_reset}
        }
    })
}

/// Client over a scripted transport with short, test-friendly waits.
pub(crate) fn test_client(transport: Arc<ScriptedTransport,>,) -> GitHubClient
{
    let mut config = HarvestConfig::default();
    config.retry.initial_wait_secs = 1;
    config.retry.max_retries = 2;
    config.retry.exhausted_wait_secs = 10;
    GitHubClient::new(transport, &config, Clock::starting_at(TEST_EPOCH,),)
}

/// Answers follower queries by echoing the login length as follower count.
///
/// Logins starting with `ghost` resolve to `null`, like deleted accounts.
pub(crate) fn echo_followers(query: &str,) -> ApiResponse
{
    let mut data = serde_json::Map::new();
    for (alias, login,) in parse_aliases(query,) {
        let value = if login.starts_with("ghost",) {
            Value::Null
        } else {
            json!({"followers": {"totalCount": login.len()}})
        };
        data.insert(alias, value,);
    }
    ApiResponse::new(200, json!({ "data": data }).to_string(),)
}

/// Extracts `(alias, login)` pairs from a synthesized follower query.
pub(crate) fn parse_aliases(query: &str,) -> Vec<(String, String,),>
{
    query
        .split("user(login: \"",)
        .skip(1,)
        .enumerate()
        .filter_map(|(index, rest,)| {
            let (login, _,) = rest.split_once('"',)?;
            Some((format!("user{}", index + 1), login.to_owned(),),)
        },)
        .collect()
}

pub(crate) fn page_of(count: usize, offset: usize,) -> String
{
    let items: Vec<Value,> = (offset..offset + count).map(|id| json!({ "id": id }),).collect();
    Value::Array(items,).to_string()
}
