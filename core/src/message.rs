//! Outgoing request builder.
//!
//! # Design
//! A `Message` is mutable builder state: address, verb, headers, query
//! parameters and at most one body. Body setters replace whatever body was
//! set before. The JSON and text helpers write `Content-Type` as a normal
//! header, so an explicit `Content-Type` set afterwards overrides them and
//! one set before is overwritten.
//!
//! Nothing touches the filesystem or the network until [`Message::build`],
//! which resolves the address, encodes the query, reads attachments and
//! splits headers into envelope and content lists (see
//! [`crate::headers::CONTENT_HEADERS`]).

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;
use url::{form_urlencoded, Url};
use uuid::Uuid;

use crate::error::{RestError, Result};
use crate::headers::{is_content_header, Headers};
use crate::http::{HttpMethod, HttpRequest, RequestBody};
use crate::json;

pub const JSON_MEDIA_TYPE: &str = "application/json";
pub const OCTET_STREAM: &str = "application/octet-stream";

const CONTENT_TYPE: &str = "Content-Type";

/// Request body. Only one kind is ever set on a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Json(String),
    Text { content: String, media_type: String },
    Multipart(Vec<Attachment>),
}

/// A file sent as one part of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Form field name. Empty means the part is sent without a name.
    pub field_name: String,
    pub path: PathBuf,
    pub file_name: String,
    pub media_type: String,
}

impl Attachment {
    /// File name defaults to the last path component; media type is
    /// inferred from the extension.
    pub fn new(field_name: &str, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let media_type = media_type_for(&path).to_string();
        Self {
            field_name: field_name.to_string(),
            path,
            file_name,
            media_type,
        }
    }

    pub fn with_file_name(mut self, file_name: &str) -> Self {
        self.file_name = file_name.to_string();
        self
    }

    pub fn with_media_type(mut self, media_type: &str) -> Self {
        self.media_type = media_type.to_string();
        self
    }
}

/// Media type for a file, from its extension.
pub fn media_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "json" => JSON_MEDIA_TYPE,
        "txt" | "log" => "text/plain",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "xml" => "application/xml",
        "yaml" | "yml" => "application/yaml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        _ => OCTET_STREAM,
    }
}

/// Mutable builder for an outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    address: String,
    method: HttpMethod,
    headers: Headers,
    query: IndexMap<String, String>,
    body: Option<Body>,
}

impl Message {
    /// A GET message with no headers, parameters or body.
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            method: HttpMethod::Get,
            headers: Headers::new(),
            query: IndexMap::new(),
            body: None,
        }
    }

    pub fn get(address: &str) -> Self {
        Self::new(address)
    }

    pub fn post(address: &str) -> Self {
        Self::new(address).method(HttpMethod::Post)
    }

    pub fn put(address: &str) -> Self {
        Self::new(address).method(HttpMethod::Put)
    }

    pub fn patch(address: &str) -> Self {
        Self::new(address).method(HttpMethod::Patch)
    }

    pub fn delete(address: &str) -> Self {
        Self::new(address).method(HttpMethod::Delete)
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// Set a header. Names are case-insensitive; the last write wins.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn remove_header(mut self, name: &str) -> Self {
        self.headers.remove(name);
        self
    }

    pub fn bearer_token(self, token: &str) -> Self {
        self.header("Authorization", &format!("Bearer {token}"))
    }

    /// Add a query parameter. Re-adding a name replaces its value in place.
    pub fn query(mut self, name: &str, value: &str) -> Self {
        self.query.insert(name.to_string(), value.to_string());
        self
    }

    /// Serialize `value` and use it as a JSON body.
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Result<Self> {
        let text = json::serialize(value)?;
        Ok(self.json_text(&text))
    }

    /// Use pre-formed JSON text as the body, unvalidated.
    pub fn json_text(mut self, text: &str) -> Self {
        self.body = Some(Body::Json(text.to_string()));
        self.header(CONTENT_TYPE, JSON_MEDIA_TYPE)
    }

    pub fn text(mut self, content: &str, media_type: &str) -> Self {
        self.body = Some(Body::Text {
            content: content.to_string(),
            media_type: media_type.to_string(),
        });
        self.header(CONTENT_TYPE, media_type)
    }

    /// Add a file part. Replaces a JSON or text body; appends to an
    /// existing multipart body.
    pub fn attach(mut self, attachment: Attachment) -> Self {
        if let Some(Body::Multipart(parts)) = &mut self.body {
            parts.push(attachment);
            return self;
        }
        // The multipart media type is generated at build time.
        self.headers.remove(CONTENT_TYPE);
        self.body = Some(Body::Multipart(vec![attachment]));
        self
    }

    pub fn attach_file(self, field_name: &str, path: impl Into<PathBuf>) -> Self {
        self.attach(Attachment::new(field_name, path))
    }

    pub fn clear_body(mut self) -> Self {
        self.body = None;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn http_method(&self) -> HttpMethod {
        self.method
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn query_params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.query.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    /// Resolve the address against `base_url` and append the query string.
    ///
    /// Absolute addresses (`scheme://...`) ignore the base. Parameters are
    /// joined with `?` then `&` regardless of what the address already
    /// contains.
    pub fn url(&self, base_url: Option<&str>) -> Result<String> {
        let address = self.address.trim();
        if address.is_empty() && base_url.is_none() {
            return Err(RestError::validation("build", "address", "address is empty"));
        }
        let mut url = if is_absolute(address) {
            address.to_string()
        } else {
            match base_url {
                Some(base) => join_url(base, address),
                None => {
                    return Err(RestError::validation(
                        "build",
                        "address",
                        format!("relative address {address:?} needs a base URL"),
                    ))
                }
            }
        };
        for (i, (name, value)) in self.query.iter().enumerate() {
            url.push(if i == 0 { '?' } else { '&' });
            url.extend(form_urlencoded::byte_serialize(name.as_bytes()));
            url.push('=');
            url.extend(form_urlencoded::byte_serialize(value.as_bytes()));
        }
        Ok(url)
    }

    /// Assemble the plain-data request a [`crate::Transport`] executes.
    ///
    /// Reads attachments from disk; a missing file is a `Validation` error.
    pub fn build(&self, base_url: Option<&str>) -> Result<HttpRequest> {
        let url = self.url(base_url)?;
        let (headers, mut content_headers) = self.headers.split();

        let bytes = match &self.body {
            None => {
                if !content_headers.is_empty() {
                    tracing::warn!(
                        %url,
                        dropped = content_headers.len(),
                        "content headers set on a message without a body"
                    );
                }
                tracing::debug!(method = %self.method, %url, "built request without body");
                return Ok(HttpRequest {
                    method: self.method,
                    url,
                    headers,
                    body: None,
                });
            }
            Some(Body::Json(text)) => text.clone().into_bytes(),
            Some(Body::Text { content, .. }) => content.clone().into_bytes(),
            Some(Body::Multipart(parts)) => {
                let (bytes, media_type) = assemble_multipart(parts)?;
                if content_headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(CONTENT_TYPE)) {
                    tracing::warn!(%url, "ignoring Content-Type header on a multipart body");
                    content_headers.retain(|(n, _)| !n.eq_ignore_ascii_case(CONTENT_TYPE));
                }
                content_headers.insert(0, (CONTENT_TYPE.to_string(), media_type));
                bytes
            }
        };

        tracing::debug!(method = %self.method, %url, body_len = bytes.len(), "built request");
        Ok(HttpRequest {
            method: self.method,
            url,
            headers,
            body: Some(RequestBody {
                headers: content_headers,
                bytes,
            }),
        })
    }
}

/// Whether `address` starts with a scheme and authority. A `://` later in
/// the path or query does not count.
fn is_absolute(address: &str) -> bool {
    Url::parse(address).is_ok_and(|url| !url.cannot_be_a_base())
}

fn join_url(base: &str, address: &str) -> String {
    let base = base.trim_end_matches('/');
    let address = address.trim_start_matches('/');
    if address.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{address}")
    }
}

/// Encode `parts` as `multipart/form-data`. Returns the body and its media
/// type (including the boundary).
fn assemble_multipart(parts: &[Attachment]) -> Result<(Vec<u8>, String)> {
    let boundary = format!("restnodes-{}", Uuid::new_v4().simple());
    let mut body = Vec::new();
    for part in parts {
        check_part_header(part)?;
        let content = read_attachment(&part.path)?;
        let mut head = format!("--{boundary}\r\nContent-Disposition: form-data");
        if !part.field_name.is_empty() {
            head.push_str(&format!("; name=\"{}\"", quote(&part.field_name)));
        }
        head.push_str(&format!(
            "; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
            quote(&part.file_name),
            part.media_type
        ));
        body.extend_from_slice(head.as_bytes());
        body.extend_from_slice(&content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    Ok((body, format!("multipart/form-data; boundary={boundary}")))
}

/// Part names and media types are written into part headers verbatim, so
/// a line break in any of them would end the header block early.
fn check_part_header(part: &Attachment) -> Result<()> {
    let fields = [
        ("field name", &part.field_name),
        ("file name", &part.file_name),
        ("media type", &part.media_type),
    ];
    for (what, value) in fields {
        if value.contains(['\r', '\n']) {
            return Err(RestError::validation(
                "build",
                "attachment",
                format!("{what} {value:?} contains a line break"),
            ));
        }
    }
    Ok(())
}

fn read_attachment(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        let reason = match e.kind() {
            ErrorKind::NotFound => format!("file not found: {}", path.display()),
            _ => format!("cannot read {}: {e}", path.display()),
        };
        RestError::validation("build", "attachment", reason)
    })
}

fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const BASE: &str = "http://localhost:3000";

    fn temp_file(name: &str, content: &[u8]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        std::fs::File::create(&path).unwrap().write_all(content).unwrap();
        (dir, path)
    }

    #[test]
    fn new_message_defaults() {
        let msg = Message::new("/posts");
        assert_eq!(msg.http_method(), HttpMethod::Get);
        assert!(msg.headers().is_empty());
        assert_eq!(msg.query_params().count(), 0);
        assert!(msg.body().is_none());
    }

    #[test]
    fn relative_address_joins_base() {
        let req = Message::get("/posts/1").build(Some("http://localhost:3000/")).unwrap();
        assert_eq!(req.url, "http://localhost:3000/posts/1");
        assert!(req.body.is_none());
    }

    #[test]
    fn embedded_scheme_in_query_stays_relative() {
        let req = Message::get("/redirect?next=https://example.com/x")
            .build(Some("http://localhost:3000"))
            .unwrap();
        assert_eq!(req.url, "http://localhost:3000/redirect?next=https://example.com/x");

        let req = Message::get("proxy/http://inner.test").build(Some(BASE)).unwrap();
        assert_eq!(req.url, format!("{BASE}/proxy/http://inner.test"));
    }

    #[test]
    fn absolute_address_ignores_base() {
        let req = Message::get("https://api.example.com/v1").build(Some(BASE)).unwrap();
        assert_eq!(req.url, "https://api.example.com/v1");
    }

    #[test]
    fn relative_address_without_base_is_rejected() {
        let err = Message::get("/posts").build(None).unwrap_err();
        assert!(matches!(err, RestError::Validation { ref parameter, .. } if parameter == "address"));
    }

    #[test]
    fn query_parameters_are_encoded_in_order() {
        let req = Message::get("/search")
            .query("q", "rust & json")
            .query("page", "2")
            .query("q", "serde")
            .build(Some(BASE))
            .unwrap();
        assert_eq!(req.url, "http://localhost:3000/search?q=serde&page=2");

        let req = Message::get("/s").query("a b", "x/y?").build(Some(BASE)).unwrap();
        assert_eq!(req.url, "http://localhost:3000/s?a+b=x%2Fy%3F");
    }

    #[test]
    fn existing_question_mark_is_not_detected() {
        let req = Message::get("/s?x=1").query("y", "2").build(Some(BASE)).unwrap();
        assert_eq!(req.url, "http://localhost:3000/s?x=1?y=2");
    }

    #[test]
    fn headers_split_between_envelope_and_body() {
        let req = Message::post("/x")
            .header("Authorization", "Bearer abc")
            .header("Content-Language", "en")
            .json_text("{}")
            .header("X-Request-Id", "42")
            .build(Some(BASE))
            .unwrap();
        assert_eq!(req.header("authorization"), Some("Bearer abc"));
        assert_eq!(req.header("x-request-id"), Some("42"));
        assert_eq!(req.header("content-type"), None);
        let body = req.body.unwrap();
        assert_eq!(body.header("Content-Type"), Some(JSON_MEDIA_TYPE));
        assert_eq!(body.header("Content-Language"), Some("en"));
        assert_eq!(body.header("authorization"), None);
    }

    #[test]
    fn content_type_after_json_helper_overrides() {
        let req = Message::post("/x")
            .json_text(r#"{"a":1}"#)
            .header("content-type", "application/vnd.api+json")
            .build(Some(BASE))
            .unwrap();
        let body = req.body.unwrap();
        assert_eq!(body.header("Content-Type"), Some("application/vnd.api+json"));
        assert_eq!(body.bytes, br#"{"a":1}"#);
    }

    #[test]
    fn content_type_before_json_helper_is_overwritten() {
        let req = Message::post("/x")
            .header("Content-Type", "text/plain")
            .json(&vec![1, 2])
            .unwrap()
            .build(Some(BASE))
            .unwrap();
        let body = req.body.unwrap();
        assert_eq!(body.header("Content-Type"), Some(JSON_MEDIA_TYPE));
        assert_eq!(body.bytes, b"[1,2]");
    }

    #[test]
    fn text_body_sets_media_type() {
        let req = Message::put("/notes/1")
            .text("hello", "text/markdown")
            .build(Some(BASE))
            .unwrap();
        assert_eq!(req.method, HttpMethod::Put);
        let body = req.body.unwrap();
        assert_eq!(body.header("content-type"), Some("text/markdown"));
        assert_eq!(body.bytes, b"hello");
    }

    #[test]
    fn content_headers_without_body_are_dropped() {
        let req = Message::get("/x")
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .build(Some(BASE))
            .unwrap();
        assert!(req.body.is_none());
        assert_eq!(req.headers, vec![("Accept".to_string(), "application/json".to_string())]);
    }

    #[test]
    fn attachment_replaces_json_body() {
        let (_dir, path) = temp_file("report.csv", b"a,b\n1,2\n");
        let msg = Message::post("/x").json_text(r#"{"a":1}"#).attach_file("file", &path);
        match msg.body() {
            Some(Body::Multipart(parts)) => assert_eq!(parts.len(), 1),
            other => panic!("unexpected body {other:?}"),
        }
        assert!(msg.headers().get("content-type").is_none());

        let req = msg.build(Some(BASE)).unwrap();
        let body = req.body.unwrap();
        let content_type = body.header("Content-Type").unwrap();
        assert!(content_type.starts_with("multipart/form-data; boundary="));
        let text = String::from_utf8(body.bytes).unwrap();
        assert!(!text.contains(r#"{"a":1}"#));
        assert!(text.contains("Content-Disposition: form-data; name=\"file\"; filename=\"report.csv\""));
        assert!(text.contains("Content-Type: text/csv"));
        assert!(text.contains("a,b\n1,2\n"));
    }

    #[test]
    fn json_body_replaces_attachments() {
        let (_dir, path) = temp_file("a.txt", b"x");
        let msg = Message::post("/x").attach_file("f", &path).json_text("[]");
        assert_eq!(msg.body(), Some(&Body::Json("[]".to_string())));
    }

    #[test]
    fn unnamed_part_omits_name() {
        let (_dir, path) = temp_file("photo.png", b"\x89PNG");
        let req = Message::post("/upload")
            .attach(Attachment::new("", &path).with_file_name("me.png"))
            .build(Some(BASE))
            .unwrap();
        let body = req.body.unwrap();
        let text = String::from_utf8_lossy(&body.bytes);
        assert!(text.contains("Content-Disposition: form-data; filename=\"me.png\"\r\n"));
        assert!(text.contains("Content-Type: image/png"));
    }

    #[test]
    fn multipart_parts_and_terminator() {
        let (_dir, first) = temp_file("one.json", b"{}");
        let second = first.with_file_name("two.bin");
        std::fs::write(&second, b"\x00\x01").unwrap();
        let req = Message::post("/upload")
            .attach_file("a", &first)
            .attach(Attachment::new("b", &second).with_media_type("application/x-custom"))
            .build(Some(BASE))
            .unwrap();
        let body = req.body.unwrap();
        let boundary = body
            .header("content-type")
            .unwrap()
            .split("boundary=")
            .nth(1)
            .unwrap()
            .to_string();
        let text = String::from_utf8_lossy(&body.bytes).into_owned();
        assert_eq!(text.matches(&format!("--{boundary}\r\n")).count(), 2);
        assert!(text.ends_with(&format!("--{boundary}--\r\n")));
        assert!(text.contains("Content-Type: application/json"));
        assert!(text.contains("Content-Type: application/x-custom"));
    }

    #[test]
    fn missing_attachment_fails_at_build() {
        let msg = Message::post("/upload").attach_file("f", "/definitely/not/here.txt");
        let err = msg.build(Some(BASE)).unwrap_err();
        match err {
            RestError::Validation { parameter, reason, .. } => {
                assert_eq!(parameter, "attachment");
                assert!(reason.contains("not found"), "{reason}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn line_breaks_in_part_headers_are_rejected() {
        let (_dir, path) = temp_file("a.txt", b"x");
        let cases = [
            Attachment::new("f", &path).with_file_name("a.txt\r\nContent-Type: text/html"),
            Attachment::new("f\nx", &path),
            Attachment::new("f", &path).with_media_type("text/plain\r\n"),
        ];
        for attachment in cases {
            let err = Message::post("/upload").attach(attachment).build(Some(BASE)).unwrap_err();
            match err {
                RestError::Validation { parameter, reason, .. } => {
                    assert_eq!(parameter, "attachment");
                    assert!(reason.contains("line break"), "{reason}");
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn caller_content_type_on_multipart_is_replaced() {
        let (_dir, path) = temp_file("a.txt", b"x");
        let req = Message::post("/upload")
            .attach_file("f", &path)
            .header("Content-Type", "text/plain")
            .build(Some(BASE))
            .unwrap();
        let body = req.body.unwrap();
        assert_eq!(body.headers.len(), 1);
        assert!(body.header("content-type").unwrap().starts_with("multipart/form-data"));
    }

    #[test]
    fn media_type_inference() {
        assert_eq!(media_type_for(Path::new("a.JSON")), JSON_MEDIA_TYPE);
        assert_eq!(media_type_for(Path::new("a.jpeg")), "image/jpeg");
        assert_eq!(media_type_for(Path::new("noext")), OCTET_STREAM);
        assert_eq!(Attachment::new("f", "dir/file.pdf").file_name, "file.pdf");
    }

    #[test]
    fn bearer_token_header() {
        let msg = Message::get("/me").bearer_token("tok");
        assert_eq!(msg.headers().get("authorization"), Some("Bearer tok"));
        let msg = msg.remove_header("Authorization");
        assert!(msg.headers().is_empty());
    }
}
