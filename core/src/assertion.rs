//! Signed JWT bearer assertions (RFC 7523) for client-credential flows.
//!
//! # Design
//! `generate` validates every argument before touching the key, so a bad
//! lifetime or an empty scope list never reaches the crypto code. The key
//! text is reduced to its base64 payload and decoded as DER, trying the
//! encodings of [`KEY_ENCODING_ORDER`] in turn: legacy PKCS#1 first, then
//! PKCS#8. The claim set is signed with RS256.
//!
//! The scope claim defaults to the standard space-joined string. Services
//! that want an array can ask for one through [`AssertionOptions`].

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::DecodePrivateKey;
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{RestError, Result};
use crate::value::Value;

pub const MIN_LIFETIME_MINUTES: u32 = 1;
pub const MAX_LIFETIME_MINUTES: u32 = 60;
pub const DEFAULT_LIFETIME_MINUTES: u32 = 60;

/// Signature algorithm for every assertion.
pub const ALGORITHM: Algorithm = Algorithm::RS256;

/// How the scope list is written into the claim set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeFormat {
    #[default]
    SpaceDelimited,
    Array,
}

/// Assertion settings. Loadable from JSON; every field has a default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AssertionOptions {
    pub scope_format: ScopeFormat,
    /// Written to the `kid` header when set.
    pub key_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScopeClaim {
    Joined(String),
    List(Vec<String>),
}

/// Claims carried by an assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSet {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    pub scope: ScopeClaim,
}

impl ClaimSet {
    /// Issuer and subject are both `client_id`; `jti` is a fresh v4 UUID.
    pub fn new<S: AsRef<str>>(
        client_id: &str,
        audience: &str,
        scopes: &[S],
        lifetime_minutes: u32,
        issued_at: i64,
        format: ScopeFormat,
    ) -> Self {
        let scopes: Vec<String> = scopes.iter().map(|s| s.as_ref().to_string()).collect();
        let scope = match format {
            ScopeFormat::SpaceDelimited => ScopeClaim::Joined(scopes.join(" ")),
            ScopeFormat::Array => ScopeClaim::List(scopes),
        };
        Self {
            iss: client_id.to_string(),
            sub: client_id.to_string(),
            aud: audience.to_string(),
            iat: issued_at,
            exp: issued_at + i64::from(lifetime_minutes) * 60,
            jti: Uuid::new_v4().to_string(),
            scope,
        }
    }
}

/// Binary private-key encodings accepted inside the key text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEncoding {
    /// `RSAPrivateKey`, as written by OpenSSL's traditional format.
    Pkcs1,
    /// `PrivateKeyInfo`.
    Pkcs8,
}

/// Order in which key encodings are attempted.
pub const KEY_ENCODING_ORDER: [KeyEncoding; 2] = [KeyEncoding::Pkcs1, KeyEncoding::Pkcs8];

impl KeyEncoding {
    pub fn name(self) -> &'static str {
        match self {
            KeyEncoding::Pkcs1 => "PKCS#1",
            KeyEncoding::Pkcs8 => "PKCS#8",
        }
    }

    fn decode(self, der: &[u8]) -> Result<RsaPrivateKey, String> {
        match self {
            KeyEncoding::Pkcs1 => RsaPrivateKey::from_pkcs1_der(der).map_err(|e| e.to_string()),
            KeyEncoding::Pkcs8 => RsaPrivateKey::from_pkcs8_der(der).map_err(|e| e.to_string()),
        }
    }
}

/// Build and sign an assertion with default options.
pub fn generate<S: AsRef<str>>(
    private_key: &str,
    client_id: &str,
    audience: &str,
    scopes: &[S],
    lifetime_minutes: u32,
) -> Result<String> {
    generate_with_options(
        private_key,
        client_id,
        audience,
        scopes,
        lifetime_minutes,
        &AssertionOptions::default(),
    )
}

pub fn generate_with_options<S: AsRef<str>>(
    private_key: &str,
    client_id: &str,
    audience: &str,
    scopes: &[S],
    lifetime_minutes: u32,
    options: &AssertionOptions,
) -> Result<String> {
    validate(private_key, client_id, audience, scopes, lifetime_minutes)?;
    let key = decode_private_key(private_key)?;
    let claims = ClaimSet::new(
        client_id,
        audience,
        scopes,
        lifetime_minutes,
        Utc::now().timestamp(),
        options.scope_format,
    );
    sign(&claims, &key, options)
}

fn validate<S: AsRef<str>>(
    private_key: &str,
    client_id: &str,
    audience: &str,
    scopes: &[S],
    lifetime_minutes: u32,
) -> Result<()> {
    const OP: &str = "generate_assertion";
    if private_key.trim().is_empty() {
        return Err(RestError::validation(OP, "private_key", "must not be empty"));
    }
    if client_id.trim().is_empty() {
        return Err(RestError::validation(OP, "client_id", "must not be empty"));
    }
    if audience.trim().is_empty() {
        return Err(RestError::validation(OP, "audience", "must not be empty"));
    }
    if scopes.is_empty() {
        return Err(RestError::validation(OP, "scopes", "at least one scope is required"));
    }
    if scopes.iter().any(|s| s.as_ref().trim().is_empty()) {
        return Err(RestError::validation(OP, "scopes", "scopes must not be blank"));
    }
    if !(MIN_LIFETIME_MINUTES..=MAX_LIFETIME_MINUTES).contains(&lifetime_minutes) {
        return Err(RestError::validation(
            OP,
            "lifetime_minutes",
            format!("{lifetime_minutes} is outside [{MIN_LIFETIME_MINUTES}, {MAX_LIFETIME_MINUTES}]"),
        ));
    }
    Ok(())
}

/// Decode a PEM-style private key, or bare base64 DER.
pub fn decode_private_key(text: &str) -> Result<RsaPrivateKey> {
    const OP: &str = "decode_private_key";
    let payload = key_payload(text)?;
    let der = STANDARD.decode(payload.as_bytes()).map_err(|e| {
        RestError::crypto(OP, format!("key text is not valid base64, it may be corrupted or truncated ({e})"))
    })?;

    let mut failures = Vec::with_capacity(KEY_ENCODING_ORDER.len());
    for encoding in KEY_ENCODING_ORDER {
        match encoding.decode(&der) {
            Ok(key) => return Ok(key),
            Err(reason) => {
                tracing::debug!(encoding = encoding.name(), "private key did not decode");
                failures.push(format!("{}: {reason}", encoding.name()));
            }
        }
    }
    Err(RestError::crypto(
        OP,
        format!(
            "key is neither a PKCS#1 nor a PKCS#8 RSA private key ({})",
            failures.join("; ")
        ),
    ))
}

const BEGIN_MARKER: &str = "-----BEGIN ";
const END_MARKER: &str = "-----END ";
const MARKER_CLOSE: &str = "-----";
/// Longest label accepted between `-----BEGIN ` and `-----`.
const MAX_LABEL_LEN: usize = 40;

/// The base64 payload of `text` with envelope markers and whitespace
/// removed. Text without markers is taken as bare base64.
///
/// Markers are found anywhere in the text, so a key pasted onto one line
/// (or with literal `\n` escapes) decodes the same as a multi-line one.
/// Error messages carry at most a validated marker label, never payload.
fn key_payload(text: &str) -> Result<String> {
    const OP: &str = "decode_private_key";
    let text = text.replace("\\r", "").replace("\\n", "\n");

    let body = match text.find(BEGIN_MARKER) {
        Some(at) => {
            let (begin, rest) = marker(&text[at + BEGIN_MARKER.len()..], "BEGIN")?;
            if rest.contains(BEGIN_MARKER) {
                return Err(RestError::key(OP, "more than one BEGIN marker"));
            }
            let Some(at) = rest.find(END_MARKER) else {
                return Err(RestError::key(OP, format!("missing END {begin} marker")));
            };
            let (end, _) = marker(&rest[at + END_MARKER.len()..], "END")?;
            if begin != end {
                return Err(RestError::key(OP, format!("BEGIN {begin} does not match END {end}")));
            }
            if begin.starts_with("ENCRYPTED") {
                return Err(RestError::crypto(OP, "encrypted private keys are not supported"));
            }
            &rest[..at]
        }
        None => {
            if let Some(at) = text.find(END_MARKER) {
                let (end, _) = marker(&text[at + END_MARKER.len()..], "END")?;
                return Err(RestError::key(OP, format!("missing BEGIN {end} marker")));
            }
            text.as_str()
        }
    };

    // Proc-Type / DEK-Info headers only appear on encrypted keys.
    if body.contains(':') {
        return Err(RestError::crypto(OP, "encrypted private keys are not supported"));
    }
    let payload: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    if payload.is_empty() {
        return Err(RestError::key(OP, "no key data found"));
    }
    Ok(payload)
}

/// Split `after` (the text following a marker prefix) into the marker's
/// label and the text after its closing dashes. The label must be a short
/// run of uppercase words; anything else is reported without echoing it.
fn marker<'a>(after: &'a str, which: &str) -> Result<(&'a str, &'a str)> {
    let malformed = || RestError::key("decode_private_key", format!("malformed {which} marker"));
    let close = after.find(MARKER_CLOSE).ok_or_else(malformed)?;
    let label = &after[..close];
    let valid = !label.is_empty()
        && label.len() <= MAX_LABEL_LEN
        && label.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b' ');
    if !valid {
        return Err(malformed());
    }
    Ok((label, &after[close + MARKER_CLOSE.len()..]))
}

fn sign(claims: &ClaimSet, key: &RsaPrivateKey, options: &AssertionOptions) -> Result<String> {
    const OP: &str = "sign_assertion";
    let der = key
        .to_pkcs1_der()
        .map_err(|e| RestError::crypto(OP, format!("cannot re-encode key: {e}")))?;
    let encoding_key = EncodingKey::from_rsa_der(der.as_bytes());
    let mut header = Header::new(ALGORITHM);
    header.kid = options.key_id.clone();
    jsonwebtoken::encode(&header, claims, &encoding_key)
        .map_err(|e| RestError::crypto(OP, format!("signing failed: {e}")))
}

/// Scope list from a value: an array of strings, or one space-delimited
/// string.
pub fn scopes_from_value(value: &Value) -> Result<Vec<String>> {
    match value {
        Value::String(s) => Ok(s.split_whitespace().map(str::to_string).collect()),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(RestError::validation(
                    "scopes_from_value",
                    "scopes",
                    format!("scope entries must be strings, found {}", other.kind()),
                )),
            })
            .collect(),
        other => Err(RestError::validation(
            "scopes_from_value",
            "scopes",
            format!("expected an array or a string, found {}", other.kind()),
        )),
    }
}
