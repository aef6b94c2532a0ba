//! HTTP transport types for the host-does-IO pattern.
//!
//! # Design
//! These types describe HTTP requests and responses as plain data. The core
//! builds `HttpRequest` values from a [`crate::Message`] and wraps
//! `HttpResponse` values in a [`crate::Response`] without ever touching the
//! network. Whatever implements [`Transport`] owns sockets, TLS, retries
//! and timeouts.
//!
//! Headers arrive already split: `HttpRequest::headers` go on the envelope,
//! `RequestBody::headers` go on the body. Transports must keep that
//! placement, since most HTTP stacks drop a content header set on the
//! envelope (or the reverse) without complaint.

use std::fmt;
use std::io::{Cursor, Read};

use crate::error::Result;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HTTP request described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// Absolute URL including the encoded query string.
    pub url: String,
    /// Envelope headers.
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

/// Request payload together with the headers that describe it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestBody {
    pub headers: Vec<(String, String)>,
    pub bytes: Vec<u8>,
}

impl RequestBody {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl HttpRequest {
    /// Envelope header lookup, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A completed exchange as handed back by a [`Transport`].
///
/// The body is an unread stream; [`crate::Response`] reads it at most once.
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub content_headers: Vec<(String, String)>,
    /// Body length announced by the transport, if known.
    pub content_length: Option<u64>,
    pub body: Box<dyn Read + Send>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Read + Send + 'static) -> Self {
        Self {
            status,
            status_text: String::new(),
            headers: Vec::new(),
            content_headers: Vec::new(),
            content_length: None,
            body: Box::new(body),
        }
    }

    /// A response whose body is already in memory.
    pub fn from_bytes(status: u16, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        let len = bytes.len() as u64;
        let mut response = Self::new(status, Cursor::new(bytes));
        response.content_length = Some(len);
        response
    }

    pub fn with_status_text(mut self, text: &str) -> Self {
        self.status_text = text.to_string();
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_content_header(mut self, name: &str, value: &str) -> Self {
        self.content_headers.push((name.to_string(), value.to_string()));
        self
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("status_text", &self.status_text)
            .field("headers", &self.headers)
            .field("content_headers", &self.content_headers)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Executes an [`HttpRequest`] against the network.
///
/// Implementations return `Ok` for every response that arrived, whatever
/// its status; `Err` is reserved for exchanges that produced no response.
pub trait Transport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

impl<F> Transport for F
where
    F: Fn(HttpRequest) -> Result<HttpResponse>,
{
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self(request)
    }
}
