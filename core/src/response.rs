//! Wrapper around a completed exchange.
//!
//! # Design
//! Status, reason and headers are fixed when the response is wrapped. The
//! body is read lazily: the first content accessor drains the stream under
//! a lock and caches the bytes (or the read error), and every later
//! accessor works from that cache. Accessors therefore always agree on
//! content, and the stream is never consumed twice.

use std::fmt;
use std::io::Read;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;

use crate::error::{RestError, Result};
use crate::headers::Headers;
use crate::http::HttpResponse;
use crate::json::{self, Attempt};
use crate::value::{Map, Value};

enum BodyState {
    Unread(Box<dyn Read + Send>),
    Cached(Vec<u8>),
    Failed(String),
}

/// A received response.
pub struct Response {
    url: String,
    status: u16,
    status_text: String,
    headers: Headers,
    content_length: Option<u64>,
    body: Mutex<BodyState>,
}

/// Everything needed to report a failed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetails {
    pub status: u16,
    pub status_text: String,
    pub body: String,
    pub url: String,
}

impl fmt::Display for ErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {} {} from {}", self.status, self.status_text, self.url)?;
        if !self.body.is_empty() {
            write!(f, ": {}", crate::error::snippet(&self.body))?;
        }
        Ok(())
    }
}

impl ErrorDetails {
    pub fn into_error(self) -> RestError {
        let body = if self.status_text.is_empty() {
            self.body
        } else if self.body.is_empty() {
            self.status_text
        } else {
            format!("{}: {}", self.status_text, self.body)
        };
        RestError::transport("send", Some(self.status), &self.url, body)
    }
}

impl Response {
    /// Wrap a transport response for the request sent to `url`. Transport
    /// and content headers are merged into one case-insensitive list;
    /// repeated headers keep every value (see [`Headers::append`]).
    pub fn new(url: &str, raw: HttpResponse) -> Self {
        let mut headers = Headers::new();
        for (name, value) in raw.headers.iter().chain(raw.content_headers.iter()) {
            headers.append(name, value);
        }
        let content_length = raw
            .content_length
            .or_else(|| headers.get("content-length").and_then(|v| v.trim().parse().ok()));
        Self {
            url: url.to_string(),
            status: raw.status,
            status_text: raw.status_text,
            headers,
            content_length,
            body: Mutex::new(BodyState::Unread(raw.body)),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type")
    }

    /// Length hint from the transport or the `Content-Length` header.
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Status in `[200, 300)`.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Run `f` over the cached body, reading it first if needed.
    fn with_body<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Result<R> {
        let mut state = self.body.lock();
        if let BodyState::Unread(reader) = &mut *state {
            let mut buf = Vec::new();
            *state = match reader.read_to_end(&mut buf) {
                Ok(_) => BodyState::Cached(buf),
                Err(e) => {
                    tracing::warn!(url = %self.url, error = %e, "failed to read response body");
                    BodyState::Failed(e.to_string())
                }
            };
        }
        match &*state {
            BodyState::Cached(bytes) => Ok(f(bytes)),
            BodyState::Failed(reason) => Err(RestError::transport(
                "read_body",
                Some(self.status),
                &self.url,
                reason.clone(),
            )),
            BodyState::Unread(_) => Err(RestError::transport(
                "read_body",
                Some(self.status),
                &self.url,
                "body was not read",
            )),
        }
    }

    pub fn bytes(&self) -> Result<Vec<u8>> {
        self.with_body(<[u8]>::to_vec)
    }

    /// Body as text. Invalid UTF-8 is replaced, not rejected.
    pub fn text(&self) -> Result<String> {
        self.with_body(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn as_value(&self) -> Result<Value> {
        json::parse(&self.text()?)
    }

    /// Body as a JSON object. Any other root is a `Format` error.
    pub fn as_map(&self) -> Result<Map> {
        let text = self.text()?;
        match json::parse(&text)? {
            Value::Object(map) => Ok(map),
            other => Err(RestError::json(
                "as_map",
                format!("expected an object, found {}", other.kind()),
                &text,
            )),
        }
    }

    /// Body as a JSON array. Any other root is a `Format` error.
    pub fn as_list(&self) -> Result<Vec<Value>> {
        let text = self.text()?;
        match json::parse(&text)? {
            Value::Array(items) => Ok(items),
            other => Err(RestError::json(
                "as_list",
                format!("expected an array, found {}", other.kind()),
                &text,
            )),
        }
    }

    pub fn try_as_map(&self) -> Attempt<Map> {
        self.as_map().into()
    }

    pub fn try_as_list(&self) -> Attempt<Vec<Value>> {
        self.as_list().into()
    }

    /// Decode the body into `T` through the engine chain.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        json::deserialize_smart(&self.text()?)
    }

    /// Pretty-printed body; the raw text when it is not JSON.
    pub fn formatted_text(&self) -> Result<String> {
        Ok(json::format(&self.text()?))
    }

    /// Details of a non-success response; `None` for 2xx.
    ///
    /// A body that cannot be read is reported as an empty body.
    pub fn error_details(&self) -> Option<ErrorDetails> {
        if self.is_success() {
            return None;
        }
        Some(ErrorDetails {
            status: self.status,
            status_text: self.status_text.clone(),
            body: self.text().unwrap_or_default(),
            url: self.url.clone(),
        })
    }

    /// `Ok(self)` for 2xx, otherwise a `Transport` error.
    pub fn error_for_status(&self) -> Result<&Self> {
        match self.error_details() {
            None => Ok(self),
            Some(details) => Err(details.into_error()),
        }
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("url", &self.url)
            .field("status", &self.status)
            .field("status_text", &self.status_text)
            .field("headers", &self.headers)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}
