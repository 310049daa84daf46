// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// Raw HTTP access to the GitHub REST and GraphQL endpoints.
///
/// The harvester needs every status code, including 403, 404 and 429, so the
/// transport never maps statuses to errors. Only failures to reach the server
/// at all surface as [`Error::TransientApi`].
use async_trait::async_trait;
use octocrab::Octocrab;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{Error, Result};

/// Status and body of a single API response.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub struct ApiResponse
{
    /// HTTP status code.
    pub status: u16,
    /// Response body decoded as UTF-8.
    pub body:   String,
}

impl ApiResponse
{
    /// Builds a response from its parts.
    pub fn new<B: Into<String,>,>(status: u16, body: B,) -> Self
    {
        Self {
            status, body: body.into(),
        }
    }

    /// `true` for HTTP 200.
    pub fn is_success(&self,) -> bool
    {
        self.status == 200
    }

    /// `true` for HTTP 404.
    pub fn is_not_found(&self,) -> bool
    {
        self.status == 404
    }

    /// `true` for HTTP 204, an empty collection such as the contributors of
    /// a repository without commits.
    pub fn is_no_content(&self,) -> bool
    {
        self.status == 204
    }

    /// `true` for HTTP 401, rejected or missing credentials.
    pub fn is_unauthorized(&self,) -> bool
    {
        self.status == 401
    }

    /// `true` for answers that another attempt cannot change.
    pub fn is_terminal(&self,) -> bool
    {
        self.is_success() || self.is_not_found() || self.is_no_content() || self.is_unauthorized()
    }

    /// `true` for the statuses GitHub uses to signal quota exhaustion.
    pub fn is_rate_limited(&self,) -> bool
    {
        matches!(self.status, 403 | 429)
    }

    /// Decodes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialize`] when the body does not match `T`.
    pub fn json<T: DeserializeOwned,>(&self,) -> Result<T,>
    {
        Ok(serde_json::from_str(&self.body,)?,)
    }
}

/// Minimal request surface used by every harvesting component.
#[async_trait]
pub trait Transport: Send + Sync
{
    /// Issues `GET {route}` relative to the API root.
    async fn get(&self, route: &str,) -> Result<ApiResponse,>;

    /// Issues `POST {route}` with a JSON body.
    async fn post_json(&self, route: &str, body: &serde_json::Value,) -> Result<ApiResponse,>;

    /// Whether requests carry credentials. GraphQL is unavailable without.
    fn is_authenticated(&self,) -> bool
    {
        true
    }
}

/// [`Transport`] backed by an [`Octocrab`] client.
#[derive(Debug, Clone,)]
pub struct OctocrabTransport
{
    client:        Octocrab,
    authenticated: bool,
}

impl OctocrabTransport
{
    /// Builds a transport, authenticated when a token is supplied.
    ///
    /// Without a token requests fall back to the unauthenticated quota.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when the underlying client cannot be
    /// constructed.
    pub fn new(token: Option<&str,>,) -> Result<Self,>
    {
        let builder = Octocrab::builder();
        let builder = match token {
            Some(token,) => builder.personal_token(token.to_owned(),),
            None => builder,
        };
        let client = builder
            .build()
            .map_err(|e| Error::validation(format!("failed to initialize GitHub client: {e}"),),)?;

        Ok(Self {
            client,
            authenticated: token.is_some(),
        },)
    }
}

#[async_trait]
impl Transport for OctocrabTransport
{
    async fn get(&self, route: &str,) -> Result<ApiResponse,>
    {
        debug!("GET {}", route);
        let response = self
            .client
            ._get(route,)
            .await
            .map_err(|e| Error::transient(format!("GET {route} failed: {e}"),),)?;
        let status = response.status().as_u16();
        let body = self
            .client
            .body_to_string(response,)
            .await
            .map_err(|e| Error::transient(format!("failed to read body of {route}: {e}"),),)?;

        Ok(ApiResponse::new(status, body,),)
    }

    async fn post_json(&self, route: &str, body: &serde_json::Value,) -> Result<ApiResponse,>
    {
        debug!("POST {}", route);
        let response = self
            .client
            ._post(route, Some(body,),)
            .await
            .map_err(|e| Error::transient(format!("POST {route} failed: {e}"),),)?;
        let status = response.status().as_u16();
        let body = self
            .client
            .body_to_string(response,)
            .await
            .map_err(|e| Error::transient(format!("failed to read body of {route}: {e}"),),)?;

        Ok(ApiResponse::new(status, body,),)
    }

    fn is_authenticated(&self,) -> bool
    {
        self.authenticated
    }
}

/// Percent-encodes the characters of a ref name that would break a path.
pub fn encode_ref(name: &str,) -> String
{
    let mut encoded = String::with_capacity(name.len(),);
    for ch in name.chars() {
        match ch {
            '%' => encoded.push_str("%25",),
            '#' => encoded.push_str("%23",),
            '?' => encoded.push_str("%3F",),
            ' ' => encoded.push_str("%20",),
            other => encoded.push(other,),
        }
    }
    encoded
}
