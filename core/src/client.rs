//! Thin client joining a base URL, a [`Transport`] and the message/response
//! types.
//!
//! # Design
//! `RestClient` holds only a base URL and the transport; it carries no
//! mutable state between calls. `send` builds the request, hands it to the
//! transport and wraps whatever came back. There are no retries, no
//! default-header store and no timeouts here: those belong to the
//! transport or the caller.

use crate::error::Result;
use crate::http::Transport;
use crate::message::Message;
use crate::response::Response;

#[derive(Debug, Clone)]
pub struct RestClient<T> {
    base_url: Option<String>,
    transport: T,
}

impl<T: Transport> RestClient<T> {
    /// Relative message addresses resolve against `base_url`.
    pub fn new(base_url: &str, transport: T) -> Self {
        Self {
            base_url: Some(base_url.trim_end_matches('/').to_string()),
            transport,
        }
    }

    /// A client that only accepts absolute addresses.
    pub fn without_base(transport: T) -> Self {
        Self {
            base_url: None,
            transport,
        }
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send `message` and wrap the response, whatever its status.
    pub fn send(&self, message: &Message) -> Result<Response> {
        let request = message.build(self.base_url.as_deref())?;
        let url = request.url.clone();
        let method = request.method;
        let raw = self.transport.execute(request)?;
        tracing::debug!(%method, %url, status = raw.status, "exchange completed");
        Ok(Response::new(&url, raw))
    }

    /// Send `message`; a non-2xx status becomes a `Transport` error.
    pub fn send_checked(&self, message: &Message) -> Result<Response> {
        let response = self.send(message)?;
        response.error_for_status()?;
        Ok(response)
    }
}
