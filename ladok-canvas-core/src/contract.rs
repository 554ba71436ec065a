//! # contract: the HTTP seam shared by the Canvas and Ladok clients
//!
//! This module defines a single trait ([`HttpTransport`]) and the plain request/response
//! types that cross it. Everything above the trait (handshake, pagination, report drivers)
//! is written against it, so the same code runs over the real reqwest transport and over
//! `mockall` mocks in tests.
//!
//! ## Interface
//! - A transport owns the cookie-bearing connection. Cookies set during the Ladok
//!   handshake are kept by the transport and replayed on later requests.
//! - [`HttpResponse::url`] is the final URL after redirects were followed. The handshake
//!   reads redirect targets from it.
//! - Non-success status codes are *not* errors at this layer; callers decide.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall`; enable the `test-export-mocks` feature
//!   (on by default) to get `MockHttpTransport` in integration tests.

use async_trait::async_trait;
use mockall::automock;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    /// `application/x-www-form-urlencoded` fields, in order.
    Form(Vec<(String, String)>),
    /// Serialized verbatim; the caller sets `Content-Type` through the headers.
    Json(serde_json::Value),
}

/// One outgoing request. Owned so that mocks can inspect and store it.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: Body::Empty,
        }
    }

    pub fn post_form(url: impl Into<String>, fields: Vec<(String, String)>) -> Self {
        Self {
            method: Method::Post,
            body: Body::Form(fields),
            ..Self::get(url)
        }
    }

    pub fn with_json(mut self, method: Method, value: serde_json::Value) -> Self {
        self.method = method;
        self.body = Body::Json(value);
        self
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn headers(mut self, headers: &[(String, String)]) -> Self {
        self.headers.extend_from_slice(headers);
        self
    }
}

/// A fully read response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// Final URL after redirects.
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header value with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body)
            .map_err(|e| Error::remote(&self.url, format!("unexpected response body: {e}")))
    }

    /// Like [`HttpResponse::json`], but a non-success status is an error first.
    pub fn success_json<T: DeserializeOwned>(&self) -> Result<T> {
        if !self.is_success() {
            return Err(Error::remote(&self.url, format!("HTTP status {}", self.status)));
        }
        self.json()
    }
}

/// A cookie-bearing HTTP connection to one or more hosts.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send one request, following redirects, and read the whole body.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;

    /// Value of a cookie the transport would send to `url`, if any.
    fn cookie(&self, url: &str, name: &str) -> Option<String>;
}
