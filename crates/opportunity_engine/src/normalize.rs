//! Opportunity normalizer: maps any raw detector record onto
//! `CanonicalOpportunity`.
//!
//! Leg fields are read from `markets[0]` / `markets[1]` first, then the legacy
//! `buy` / `sell` objects, then flat top-level fields (`market1_price`,
//! `exchange1`, ...). Missing numbers become `0`, missing references become
//! `None` or `"N/A"`. Normalization cannot fail.

use common::{RawFields, RawMarket, RawOpportunity};
use tracing::debug;
use uuid::Uuid;

use crate::model::{ArbType, CanonicalOpportunity, MarketLeg, Profit};

/// Fallback for missing exchange names and questions.
pub const NOT_AVAILABLE: &str = "N/A";

const DEFAULT_LEVEL: &str = "medium";
const DEFAULT_STRATEGY: &str = "unknown";

/// Which side of the opportunity a leg is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LegSlot {
    First,
    Second,
}

impl LegSlot {
    fn index(self) -> usize {
        match self {
            LegSlot::First => 0,
            LegSlot::Second => 1,
        }
    }

    fn legacy_object(self) -> &'static str {
        match self {
            LegSlot::First => "buy",
            LegSlot::Second => "sell",
        }
    }

    /// Flat top-level key for this leg, e.g. `market1_price`.
    fn flat_key(self, field: &str) -> String {
        format!("market{}_{}", self.index() + 1, field)
    }

    fn flat_exchange_key(self) -> &'static str {
        match self {
            LegSlot::First => "exchange1",
            LegSlot::Second => "exchange2",
        }
    }

    fn default_outcome(self) -> &'static str {
        match self {
            LegSlot::First => "YES",
            LegSlot::Second => "NO",
        }
    }
}

/// Normalize a whole snapshot, preserving input order.
pub fn normalize_all(raw: &[RawOpportunity]) -> Vec<CanonicalOpportunity> {
    raw.iter().map(normalize).collect()
}

/// Normalize one raw record.
pub fn normalize(raw: &RawOpportunity) -> CanonicalOpportunity {
    let explanation = raw.text("explanation").unwrap_or_default().to_string();

    let market1 = build_leg(raw, LegSlot::First, None, &explanation);
    let market2 = if raw_leg(raw, LegSlot::Second).is_none() && raw_leg(raw, LegSlot::First).is_some() {
        // Same-exchange combinatorial records carry a single leg.
        market1.clone()
    } else {
        build_leg(raw, LegSlot::Second, Some(&market1), &explanation)
    };

    let id = raw.ident("id").unwrap_or_else(|| {
        let generated = Uuid::new_v4().to_string();
        debug!("record without id, assigned {}", generated);
        generated
    });

    let arb_type = match raw.text("type") {
        Some(label) => ArbType::from_label(label),
        None if raw.is_legacy_pair() => ArbType::Traditional,
        None => ArbType::Unknown,
    };

    let profit_fraction = raw
        .nonzero("profit_pct")
        .or_else(|| raw.nonzero("net_profit_pct"))
        .unwrap_or(0.0);

    let probability_low = raw.nonzero("probability_low").unwrap_or(market1.price);
    let probability_high = raw.nonzero("probability_high").unwrap_or(market2.price);

    let expires_at = market1
        .expires_at
        .or(market2.expires_at)
        .or_else(|| raw.timestamp("expires_at"));

    CanonicalOpportunity {
        id,
        arb_type,
        strategy: raw.text("strategy").unwrap_or(DEFAULT_STRATEGY).to_string(),

        profit: Profit::from_fraction(profit_fraction),
        gross_profit_fraction: number(raw, "gross_profit_pct"),
        total_investment: number(raw, "total_investment"),
        expected_return: number(raw, "expected_return"),
        net_profit: number(raw, "net_profit"),
        spread_percent: number(raw, "spread_pct") * 100.0,
        probability_low,
        probability_high,

        quality_score: number(raw, "quality_score"),
        risk_score: number(raw, "risk_score"),
        confidence: number(raw, "confidence"),
        liquidity_score: number(raw, "liquidity_score"),

        time_to_expiry_hours: number(raw, "time_to_expiry_hours"),
        volatility_score: number(raw, "volatility_score"),
        execution_speed: raw.text("execution_speed").unwrap_or(DEFAULT_LEVEL).to_string(),
        risk_level: raw.text("risk_level").unwrap_or(DEFAULT_LEVEL).to_string(),

        market1,
        market2,
        expires_at,

        title: None,
        explanation,
        warnings: raw.strings("warnings"),
        execution_steps: raw.strings("execution_steps"),
        detected_at: raw.timestamp("detected_at"),

        raw_markets: raw.markets().to_vec(),
    }
}

fn number(raw: &impl RawFields, key: &str) -> f64 {
    raw.number(key).unwrap_or(0.0)
}

/// The structured leg object for a slot, if the record has one.
fn raw_leg(raw: &RawOpportunity, slot: LegSlot) -> Option<RawMarket<'_>> {
    raw.market(slot.index())
        .or_else(|| raw.leg_object(slot.legacy_object()))
}

fn build_leg(
    raw: &RawOpportunity,
    slot: LegSlot,
    first: Option<&MarketLeg>,
    explanation: &str,
) -> MarketLeg {
    let leg = raw_leg(raw, slot);

    let text = |field: &str| -> Option<String> {
        leg.and_then(|m| m.text(field).map(str::to_string))
            .or_else(|| raw.text(&slot.flat_key(field)).map(str::to_string))
    };
    let amount = |field: &str| -> f64 {
        leg.and_then(|m| m.nonzero(field))
            .or_else(|| raw.nonzero(&slot.flat_key(field)))
            .unwrap_or(0.0)
    };

    let exchange = leg
        .and_then(|m| m.text("exchange").map(str::to_string))
        .or_else(|| raw.text(slot.flat_exchange_key()).map(str::to_string))
        .or_else(|| {
            first
                .map(|m| m.exchange.clone())
                .filter(|e| e != NOT_AVAILABLE)
        })
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());

    let question = text("question")
        .or_else(|| (!explanation.is_empty()).then(|| explanation.to_string()))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());

    let expires_at = leg
        .and_then(|m| m.timestamp("expires_at"))
        .or_else(|| raw.timestamp(&slot.flat_key("expires_at")));

    if leg.is_none() {
        debug!(
            "record {} has no structured leg {}, using flat fields",
            raw.ident("id").unwrap_or_default(),
            slot.index() + 1
        );
    }

    MarketLeg {
        exchange,
        question,
        price: amount("price"),
        liquidity: amount("liquidity"),
        outcome: text("outcome").unwrap_or_else(|| slot.default_outcome().to_string()),
        url: text("url"),
        expires_at,
        market_id: leg.and_then(|m| m.market_id()),
    }
}
