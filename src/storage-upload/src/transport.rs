// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The seam between upload sessions and the HTTP stack.
//!
//! Upload sessions describe each request as an [HttpRequest] and hand it to a
//! [RequestIssuer]. The default issuer, [HttpTransport], is based on
//! `reqwest`. Applications may provide their own issuer to add
//! authentication, retries, or to mock the service in tests.

use crate::{Error, Result};
use std::time::Duration;

/// A fully formatted request.
#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: http::Method,
    pub url: String,
    pub headers: http::HeaderMap,
    pub body: bytes::Bytes,
}

impl HttpRequest {
    pub fn new<U: Into<String>>(method: http::Method, url: U) -> Self {
        Self {
            method,
            url: url.into(),
            headers: http::HeaderMap::new(),
            body: bytes::Bytes::new(),
        }
    }

    pub fn with_header<V>(mut self, name: http::HeaderName, value: V) -> Self
    where
        V: Into<http::HeaderValue>,
    {
        self.headers.insert(name, value.into());
        self
    }

    pub fn with_body<B: Into<bytes::Bytes>>(mut self, body: B) -> Self {
        self.body = body.into();
        self
    }
}

/// The response to a [HttpRequest].
#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: http::StatusCode,
    pub headers: http::HeaderMap,
    pub body: bytes::Bytes,
}

impl HttpResponse {
    pub fn new(status: http::StatusCode) -> Self {
        Self {
            status,
            headers: http::HeaderMap::new(),
            body: bytes::Bytes::new(),
        }
    }

    /// Returns true if the status code is in the `2xx` range.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns the value of the `name` header.
    ///
    /// Returns `None` if the header is missing or is not valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Decodes the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(Error::deser)
    }
}

/// Issues HTTP requests on behalf of upload sessions.
///
/// Implementations own timeouts, authentication and any retry policy.
/// Upload sessions treat every error returned by the issuer as terminal, and
/// surface the error to the application unchanged.
pub trait RequestIssuer: std::fmt::Debug + Send + Sync + 'static {
    /// Sends `request` and waits for the full response.
    ///
    /// A response with a non-success status code is not an error at this
    /// level, the upload session interprets the status.
    fn issue(&self, request: HttpRequest) -> impl Future<Output = Result<HttpResponse>> + Send;
}

/// A [RequestIssuer] based on `reqwest`.
///
/// Holds a connection pool, create one and reuse it.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport, optionally with a timeout applied to each request.
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let builder = reqwest::Client::builder();
        let builder = match timeout {
            Some(t) => builder.timeout(t),
            None => builder,
        };
        let client = builder.build().map_err(Error::transport)?;
        Ok(Self { client })
    }

    /// Wraps an existing `reqwest` client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl RequestIssuer for HttpTransport {
    async fn issue(&self, request: HttpRequest) -> Result<HttpResponse> {
        let builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers)
            .body(request.body);
        let response = builder.send().await.map_err(Error::transport)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(Error::transport)?;
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
