//! Nested settlement-amount maps from the upstream panel
//!
//! The panel reports payout amounts as a per-currency, per-actor-role map,
//! e.g. `{"643": {"trader": "500.00", "merchant": 495.5}}`. The shape is
//! dynamic (values arrive as strings or numbers), so it is parsed
//! defensively exactly once at the ingestion boundary into [`Money`].
//! Everything downstream reads typed `Decimal` values and never touches
//! JSON again.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::errors::ParseError;

/// ISO 4217 numeric code of the settlement currency (RUB).
///
/// All settlement amounts are read at this currency; other currencies in
/// the map are carried but not used for matching.
pub const SETTLEMENT_CURRENCY: &str = "643";

/// Numeric currency code as reported by the panel ("643", "840", ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The fixed settlement currency used for matching
    pub fn settlement() -> Self {
        Self(SETTLEMENT_CURRENCY.to_string())
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Actor role under which an amount is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    /// The trader side of the payout — the fixed sub-key used for matching
    Trader,
    /// The merchant side
    Merchant,
}

/// Typed per-currency, per-role amount map
///
/// Invariant: every stored value parsed successfully as a `Decimal`.
/// Unknown roles in the source JSON are dropped, unknown currencies kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(BTreeMap<CurrencyCode, BTreeMap<ActorRole, Decimal>>);

impl Money {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Insert an amount for (currency, role)
    pub fn insert(&mut self, currency: CurrencyCode, role: ActorRole, amount: Decimal) {
        self.0.entry(currency).or_default().insert(role, amount);
    }

    /// Amount at (currency, role), if present
    pub fn amount(&self, currency: &CurrencyCode, role: ActorRole) -> Option<Decimal> {
        self.0.get(currency).and_then(|roles| roles.get(&role)).copied()
    }

    /// Amount at the fixed settlement sub-key (settlement currency, trader)
    pub fn settlement_amount(&self) -> Option<Decimal> {
        self.amount(&CurrencyCode::settlement(), ActorRole::Trader)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse the dynamic upstream shape into a typed map.
    ///
    /// Tolerates amounts as JSON strings or numbers. A non-object top
    /// level, or an amount that is neither, fails the whole record —
    /// callers skip that single record, never the batch.
    pub fn parse(value: &serde_json::Value) -> Result<Self, ParseError> {
        let top = value.as_object().ok_or_else(|| ParseError::MalformedMoney {
            detail: format!("expected object, got {}", type_name(value)),
        })?;

        let mut money = Money::new();
        for (currency, roles) in top {
            let roles = roles.as_object().ok_or_else(|| ParseError::MalformedMoney {
                detail: format!("currency {currency}: expected role map, got {}", type_name(roles)),
            })?;

            for (role, amount) in roles {
                let role = match role.as_str() {
                    "trader" => ActorRole::Trader,
                    "merchant" => ActorRole::Merchant,
                    // Panels add bookkeeping keys here; ignore them
                    _ => continue,
                };
                money.insert(CurrencyCode::new(currency.clone()), role, parse_decimal(amount, currency)?);
            }
        }
        Ok(money)
    }
}

fn parse_decimal(value: &serde_json::Value, currency: &str) -> Result<Decimal, ParseError> {
    match value {
        serde_json::Value::String(s) => Decimal::from_str(s).map_err(|e| ParseError::MalformedMoney {
            detail: format!("currency {currency}: bad decimal string {s:?}: {e}"),
        }),
        serde_json::Value::Number(n) => Decimal::from_str(&n.to_string()).map_err(|e| {
            ParseError::MalformedMoney {
                detail: format!("currency {currency}: bad decimal number {n}: {e}"),
            }
        }),
        other => Err(ParseError::MalformedMoney {
            detail: format!("currency {currency}: expected string or number, got {}", type_name(other)),
        }),
    }
}

fn type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
