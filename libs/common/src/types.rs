//! Wire types for the opportunity detection service.
//!
//! The detector emits four strategy shapes (traditional, combinatorial,
//! probability, short-term) plus a legacy buy/sell shape, and no field is
//! guaranteed to be present or well-typed. These types therefore wrap the raw
//! JSON and expose lenient accessors instead of a strict serde schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::time::{parse_timestamp, timestamp_from_millis};
use crate::Error;

// ── Lenient field access ──────────────────────────────────────────────

/// Read-only, never-failing access to fields of a raw JSON object.
///
/// Every accessor returns `None` when the field is missing, `null`, or of a
/// type that cannot be coerced.
pub trait RawFields {
    /// The raw value stored under `key`, if this is an object that has it.
    fn field(&self, key: &str) -> Option<&Value>;

    /// A non-empty string field.
    fn text(&self, key: &str) -> Option<&str> {
        match self.field(key)? {
            Value::String(s) if !s.is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    /// A finite number. Numeric strings are accepted.
    fn number(&self, key: &str) -> Option<f64> {
        let n = match self.field(key)? {
            Value::Number(n) => n.as_f64()?,
            Value::String(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        n.is_finite().then_some(n)
    }

    /// A finite, non-zero number (zero behaves like an absent value in
    /// fallback chains).
    fn nonzero(&self, key: &str) -> Option<f64> {
        self.number(key).filter(|n| *n != 0.0)
    }

    /// An identifier given either as a string or as a number.
    fn ident(&self, key: &str) -> Option<String> {
        match self.field(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// A timestamp given as a string or as epoch milliseconds. Unparseable
    /// values are absent.
    fn timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        match self.field(key)? {
            Value::String(s) => parse_timestamp(s),
            Value::Number(n) => n.as_f64().and_then(timestamp_from_millis),
            _ => None,
        }
    }

    /// The string elements of an array field; other elements are skipped.
    fn strings(&self, key: &str) -> Vec<String> {
        match self.field(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}

// ── Raw records ───────────────────────────────────────────────────────

/// One opportunity as emitted by the detector. Never mutated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawOpportunity(Value);

impl RawOpportunity {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// The `markets` array, or an empty slice.
    pub fn markets(&self) -> &[Value] {
        match self.0.get("markets") {
            Some(Value::Array(items)) => items,
            _ => &[],
        }
    }

    /// The market at position `idx` in `markets`, if it is an object.
    pub fn market(&self, idx: usize) -> Option<RawMarket<'_>> {
        self.markets().get(idx).and_then(RawMarket::from_value)
    }

    /// A nested leg object (the legacy `buy` / `sell` shape).
    pub fn leg_object(&self, key: &str) -> Option<RawMarket<'_>> {
        self.0.get(key).and_then(RawMarket::from_value)
    }

    /// Whether the record uses the legacy `buy` / `sell` leg objects.
    pub fn is_legacy_pair(&self) -> bool {
        self.leg_object("buy").is_some() || self.leg_object("sell").is_some()
    }
}

impl RawFields for RawOpportunity {
    fn field(&self, key: &str) -> Option<&Value> {
        self.0.as_object()?.get(key).filter(|v| !v.is_null())
    }
}

/// Borrowed view of one market leg inside a raw opportunity.
#[derive(Debug, Clone, Copy)]
pub struct RawMarket<'a>(&'a Value);

impl<'a> RawMarket<'a> {
    /// Wrap a value if it is a JSON object.
    pub fn from_value(value: &'a Value) -> Option<Self> {
        value.is_object().then_some(Self(value))
    }

    /// The nested `full_data` block some serializers attach to a leg.
    pub fn full_data(&self) -> Option<RawMarket<'a>> {
        self.0.get("full_data").and_then(RawMarket::from_value)
    }

    /// The leg's stable identifier (`market_id`, then `id`, then
    /// `full_data.market_id`).
    pub fn market_id(&self) -> Option<String> {
        self.ident("market_id")
            .or_else(|| self.ident("id"))
            .or_else(|| self.full_data().and_then(|d| d.ident("market_id")))
    }
}

impl RawFields for RawMarket<'_> {
    fn field(&self, key: &str) -> Option<&Value> {
        self.0.as_object()?.get(key).filter(|v| !v.is_null())
    }
}

// ── Feed payload ──────────────────────────────────────────────────────

/// Body of the detector's `/opportunities` endpoint.
#[derive(Debug, Clone, Default)]
pub struct OpportunitiesPayload {
    pub opportunities: Vec<RawOpportunity>,
    pub last_update: Option<DateTime<Utc>>,
}

impl OpportunitiesPayload {
    /// Interpret a decoded JSON body.
    ///
    /// `opportunities` may be an array, a single object, or absent; a bare
    /// top-level array is accepted as the list itself.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Array(items) => Self {
                opportunities: items.into_iter().map(RawOpportunity::new).collect(),
                last_update: None,
            },
            Value::Object(mut map) => {
                let last_update = match map.get("last_update") {
                    Some(Value::String(s)) => parse_timestamp(s),
                    _ => None,
                };
                let opportunities = match map.remove("opportunities") {
                    Some(Value::Array(items)) => {
                        items.into_iter().map(RawOpportunity::new).collect()
                    }
                    Some(Value::Null) | None => Vec::new(),
                    Some(single) => vec![RawOpportunity::new(single)],
                };
                Self {
                    opportunities,
                    last_update,
                }
            }
            other => {
                debug!("unexpected payload shape ({}), treating as empty", json_kind(&other));
                Self::default()
            }
        }
    }

    /// Decode a JSON body. Only invalid JSON is an error; any shape of valid
    /// JSON yields a (possibly empty) payload.
    pub fn from_json(body: &str) -> Result<Self, Error> {
        let value: Value = serde_json::from_str(body)?;
        Ok(Self::from_value(value))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
