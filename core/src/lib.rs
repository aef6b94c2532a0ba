//! REST-call building blocks for node-based hosts.
//!
//! # Overview
//! Turns JSON text into a generic [`Value`] tree and back, builds outgoing
//! requests as plain data (host-does-IO pattern), wraps completed exchanges
//! with lazy single-read content access, and signs JWT bearer assertions.
//! The network round-trip itself is delegated to a [`Transport`].
//!
//! # Design
//! - `json` runs a strict and a lenient engine in a fixed order; every
//!   `try_*` operation folds failures into an [`Attempt`] instead of an error.
//! - `Message` decides per header whether it belongs on the envelope or on
//!   the body, and assembles multipart bodies from files at build time.
//! - `Response` reads its body at most once and derives every accessor
//!   from that cached read.
//! - `assertion` validates first, then decodes PKCS#1 or PKCS#8 key text and
//!   signs with RS256.
//! - All failures are [`RestError`] values naming the failing operation.

pub mod assertion;
pub mod client;
pub mod error;
pub mod headers;
pub mod http;
pub mod json;
pub mod message;
pub mod response;
pub mod value;

pub use assertion::{AssertionOptions, ClaimSet, ScopeFormat};
pub use client::RestClient;
pub use error::{FormatKind, RestError, Result};
pub use headers::Headers;
pub use http::{HttpMethod, HttpRequest, HttpResponse, RequestBody, Transport};
pub use json::{Attempt, Engine};
pub use message::{Attachment, Body, Message};
pub use response::{ErrorDetails, Response};
pub use value::{Map, Value};
