//! JSON text ⇄ value conversion with a strict and a lenient engine.
//!
//! # Design
//! Two engines are tried in the fixed order of [`ENGINE_ORDER`]:
//!
//! - `Strict` is `serde_json`: fast, and rejects anything outside RFC 8259.
//!   On the way out it refuses non-string map keys.
//! - `Lenient` is `serde_yaml`, whose flow syntax is a superset of JSON. It
//!   accepts unquoted keys, single-quoted strings and `#` comments, and on
//!   the way out it coerces non-string map keys to text before the result
//!   is emitted as JSON.
//!
//! The first engine that succeeds wins. Callers may rely on that ordering
//! for inputs both engines accept.
//!
//! Plain [`parse`] uses the strict engine only; the `*_smart` operations
//! walk the whole chain. The `try_*` operations never fail: they fold the
//! error into an [`Attempt`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{RestError, Result};
use crate::value::{Map, Value};

/// A JSON engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Engine {
    Strict,
    Lenient,
}

/// The order in which engines are attempted by every chained operation.
pub const ENGINE_ORDER: [Engine; 2] = [Engine::Strict, Engine::Lenient];

impl Engine {
    pub fn name(self) -> &'static str {
        match self {
            Engine::Strict => "strict",
            Engine::Lenient => "lenient",
        }
    }

    /// Serialize `value` to compact JSON text with this engine alone.
    pub fn serialize<T: Serialize + ?Sized>(self, value: &T) -> Result<String, String> {
        match self {
            Engine::Strict => serde_json::to_string(value).map_err(|e| e.to_string()),
            Engine::Lenient => {
                let tree = serde_yaml::to_value(value).map_err(|e| e.to_string())?;
                let value = value_from_yaml(tree)?;
                serde_json::to_string(&value).map_err(|e| e.to_string())
            }
        }
    }

    /// Deserialize `text` into `T` with this engine alone.
    pub fn deserialize<T: DeserializeOwned>(self, text: &str) -> Result<T, String> {
        match self {
            Engine::Strict => serde_json::from_str(text).map_err(|e| e.to_string()),
            Engine::Lenient => serde_yaml::from_str(text).map_err(|e| e.to_string()),
        }
    }
}

/// Run `attempt` against each engine in [`ENGINE_ORDER`] until one succeeds.
/// On total failure every engine's error is returned, in order.
fn run_chain<R>(mut attempt: impl FnMut(Engine) -> Result<R, String>) -> Result<R, Vec<(Engine, String)>> {
    let mut failures = Vec::with_capacity(ENGINE_ORDER.len());
    for engine in ENGINE_ORDER {
        match attempt(engine) {
            Ok(out) => {
                if !failures.is_empty() {
                    tracing::debug!(engine = engine.name(), "fallback engine succeeded");
                }
                return Ok(out);
            }
            Err(reason) => {
                tracing::debug!(engine = engine.name(), %reason, "engine rejected input");
                failures.push((engine, reason));
            }
        }
    }
    Err(failures)
}

fn combine(failures: &[(Engine, String)]) -> String {
    failures
        .iter()
        .map(|(engine, reason)| format!("{} engine: {reason}", engine.name()))
        .collect::<Vec<_>>()
        .join("; ")
}

fn last_reason(failures: Vec<(Engine, String)>) -> String {
    failures.into_iter().last().map(|(_, reason)| reason).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Parse / serialize
// ---------------------------------------------------------------------------

/// Parse strict JSON text into a [`Value`].
pub fn parse(text: &str) -> Result<Value> {
    Engine::Strict
        .deserialize(text)
        .map_err(|reason| RestError::json("parse", reason, text))
}

/// Parse text into a [`Value`], falling back to the lenient engine.
pub fn parse_smart(text: &str) -> Result<Value> {
    deserialize_smart(text)
}

/// Serialize `value` to compact JSON. When every engine fails, the last
/// engine's error is reported.
pub fn serialize<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    run_chain(|engine| engine.serialize(value))
        .map_err(|failures| RestError::json("serialize", last_reason(failures), std::any::type_name::<T>()))
}

/// Serialize `value` to compact JSON. When every engine fails, the error
/// names each engine and why it failed.
pub fn serialize_smart<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    run_chain(|engine| engine.serialize(value))
        .map_err(|failures| RestError::json("serialize_smart", combine(&failures), std::any::type_name::<T>()))
}

/// Deserialize `text` into `T` through the engine chain.
pub fn deserialize_smart<T: DeserializeOwned>(text: &str) -> Result<T> {
    run_chain(|engine| engine.deserialize(text))
        .map_err(|failures| RestError::json("deserialize_smart", combine(&failures), text))
}

/// Convert any serializable value into a [`Value`] tree.
pub fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
    let text = serialize(value)?;
    parse(&text)
}

/// Convert a [`Value`] tree into `T`.
pub fn from_value<T: DeserializeOwned>(value: &Value) -> Result<T> {
    let text = serialize(value)?;
    deserialize_smart(&text)
}

// ---------------------------------------------------------------------------
// Safe variants
// ---------------------------------------------------------------------------

/// Outcome of a safe operation: never an error, always a value.
///
/// On failure `value` is `T::default()` and `error` holds the message; on
/// success `error` is empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt<T> {
    pub success: bool,
    pub value: T,
    pub error: String,
}

impl<T> Attempt<T> {
    pub fn into_result(self) -> Result<T, String> {
        if self.success {
            Ok(self.value)
        } else {
            Err(self.error)
        }
    }
}

impl<T: Default> From<Result<T>> for Attempt<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => Attempt {
                success: true,
                value,
                error: String::new(),
            },
            Err(e) => Attempt {
                success: false,
                value: T::default(),
                error: e.to_string(),
            },
        }
    }
}

pub fn try_parse(text: &str) -> Attempt<Value> {
    parse(text).into()
}

pub fn try_serialize<T: Serialize + ?Sized>(value: &T) -> Attempt<String> {
    serialize(value).into()
}

pub fn try_deserialize<T: DeserializeOwned + Default>(text: &str) -> Attempt<T> {
    deserialize_smart(text).into()
}

// ---------------------------------------------------------------------------
// Utilities
// ---------------------------------------------------------------------------

pub fn is_valid_json(text: &str) -> bool {
    parse(text).is_ok()
}

/// Pretty-print JSON text. Invalid input is returned unchanged.
pub fn format(text: &str) -> String {
    parse(text)
        .ok()
        .and_then(|value| serde_json::to_string_pretty(&value).ok())
        .unwrap_or_else(|| text.to_string())
}

/// Strip insignificant whitespace from JSON text. Invalid input is
/// returned unchanged.
pub fn minify(text: &str) -> String {
    parse(text)
        .ok()
        .and_then(|value| serde_json::to_string(&value).ok())
        .unwrap_or_else(|| text.to_string())
}

// ---------------------------------------------------------------------------
// YAML tree -> Value
// ---------------------------------------------------------------------------

fn value_from_yaml(tree: serde_yaml::Value) -> Result<Value, String> {
    use serde_yaml::Value as Yaml;

    Ok(match tree {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(value_from_yaml)
                .collect::<Result<_, _>>()?,
        ),
        Yaml::Mapping(mapping) => {
            let mut map = Map::with_capacity(mapping.len());
            for (k, v) in mapping {
                map.insert(key_text(k)?, value_from_yaml(v)?);
            }
            Value::Object(map)
        }
        // Enum variants carrying data come back tagged; mirror serde_json's
        // externally tagged form.
        Yaml::Tagged(tagged) => {
            let tagged = *tagged;
            let tag = tagged.tag.to_string();
            let name = tag.trim_start_matches('!').to_string();
            let mut map = Map::with_capacity(1);
            map.insert(name, value_from_yaml(tagged.value)?);
            Value::Object(map)
        }
    })
}

/// Text form of a non-string map key: scalars print as themselves,
/// composite keys as their compact JSON text.
fn key_text(key: serde_yaml::Value) -> Result<String, String> {
    use serde_yaml::Value as Yaml;

    match key {
        Yaml::String(s) => Ok(s),
        Yaml::Null => Ok("null".to_string()),
        Yaml::Bool(b) => Ok(b.to_string()),
        Yaml::Number(n) => Ok(n.to_string()),
        composite => {
            let value = value_from_yaml(composite)?;
            serde_json::to_string(&value).map_err(|e| e.to_string())
        }
    }
}
