//! Canonical opportunity model.
//!
//! Every downstream stage (dedup, filter/sort, stats, execution plans)
//! operates on `CanonicalOpportunity`. Instances are value objects: a pipeline
//! run builds a fresh set and never edits one it has already emitted.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Classification ────────────────────────────────────────────────────

/// Arbitrage strategy family reported by the detector.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ArbType {
    /// Cross-exchange buy low / sell high.
    Traditional,
    /// Complementary outcomes inside one market.
    Combinatorial,
    /// Probability spread between two equivalent markets.
    Probability,
    /// Spread on markets close to expiry.
    ShortTerm,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ArbType {
    /// Parse a detector label. `classic` is the legacy name for `traditional`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "traditional" | "classic" => Self::Traditional,
            "combinatorial" => Self::Combinatorial,
            "probability" => Self::Probability,
            "short_term" | "short-term" => Self::ShortTerm,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Traditional => "traditional",
            Self::Combinatorial => "combinatorial",
            Self::Probability => "probability",
            Self::ShortTerm => "short_term",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ArbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Profit ────────────────────────────────────────────────────────────

/// Profit as a fraction, with the percent view derived from it.
///
/// The percent is never stored independently, so the two can't drift apart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "ProfitRepr", into = "ProfitRepr")]
pub struct Profit {
    fraction: f64,
}

impl Profit {
    /// Non-finite input collapses to zero.
    pub fn from_fraction(fraction: f64) -> Self {
        Self {
            fraction: if fraction.is_finite() { fraction } else { 0.0 },
        }
    }

    /// Profit on a 0–1 scale.
    pub fn fraction(&self) -> f64 {
        self.fraction
    }

    /// Profit on a 0–100 scale.
    pub fn percent(&self) -> f64 {
        self.fraction * 100.0
    }
}

#[derive(Serialize, Deserialize)]
struct ProfitRepr {
    fraction: f64,
    #[serde(default)]
    percent: f64,
}

impl From<ProfitRepr> for Profit {
    fn from(repr: ProfitRepr) -> Self {
        // The stored percent is informational; the fraction is authoritative.
        Profit::from_fraction(repr.fraction)
    }
}

impl From<Profit> for ProfitRepr {
    fn from(profit: Profit) -> Self {
        ProfitRepr {
            fraction: profit.fraction(),
            percent: profit.percent(),
        }
    }
}

// ── Legs ──────────────────────────────────────────────────────────────

/// One side of a two-sided opportunity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketLeg {
    pub exchange: String,
    /// Raw market question as published by the exchange.
    pub question: String,
    pub price: f64,
    pub liquidity: f64,
    /// `YES`, `NO`, or a free-text outcome label.
    pub outcome: String,
    pub url: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Stable exchange identifier, when the detector supplied one.
    pub market_id: Option<String>,
}

// ── Opportunity ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalOpportunity {
    pub id: String,
    #[serde(rename = "type")]
    pub arb_type: ArbType,
    /// Free-form sub-classification, e.g. `complementary_buy`.
    pub strategy: String,

    pub profit: Profit,
    pub gross_profit_fraction: f64,
    pub total_investment: f64,
    pub expected_return: f64,
    pub net_profit: f64,
    pub spread_percent: f64,
    pub probability_low: f64,
    pub probability_high: f64,

    /// 0–100.
    pub quality_score: f64,
    /// 0–1, lower is better.
    pub risk_score: f64,
    /// 0–1.
    pub confidence: f64,
    /// 0–1.
    pub liquidity_score: f64,

    pub time_to_expiry_hours: f64,
    pub volatility_score: f64,
    pub execution_speed: String,
    pub risk_level: String,

    pub market1: MarketLeg,
    pub market2: MarketLeg,
    /// First known expiry across both legs and the record itself.
    pub expires_at: Option<DateTime<Utc>>,

    /// Short label, attached only to the survivor of deduplication.
    pub title: Option<String>,
    pub explanation: String,
    pub warnings: Vec<String>,
    /// Steps precomputed by the detector, if any.
    pub execution_steps: Vec<String>,
    pub detected_at: Option<DateTime<Utc>>,

    /// Original `markets` array, kept for traceability only.
    #[serde(default)]
    pub raw_markets: Vec<Value>,
}

impl CanonicalOpportunity {
    pub fn profit_percent(&self) -> f64 {
        self.profit.percent()
    }

    pub fn profit_fraction(&self) -> f64 {
        self.profit.fraction()
    }

    pub fn legs(&self) -> [&MarketLeg; 2] {
        [&self.market1, &self.market2]
    }

    /// Combined liquidity of both legs.
    pub fn total_liquidity(&self) -> f64 {
        self.market1.liquidity + self.market2.liquidity
    }

    /// A copy of this opportunity carrying `title`. The receiver is left
    /// untouched.
    pub fn with_title(&self, title: String) -> Self {
        Self {
            title: Some(title),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arb_type_labels() {
        assert_eq!(ArbType::from_label("classic"), ArbType::Traditional);
        assert_eq!(ArbType::from_label(" Probability "), ArbType::Probability);
        assert_eq!(ArbType::from_label("short_term"), ArbType::ShortTerm);
        assert_eq!(ArbType::from_label("mystery"), ArbType::Unknown);
        assert_eq!(ArbType::ShortTerm.to_string(), "short_term");
    }

    #[test]
    fn test_arb_type_unknown_label_deserializes() {
        let t: ArbType = serde_json::from_str("\"logical_inconsistency\"").unwrap();
        assert_eq!(t, ArbType::Unknown);
    }

    #[test]
    fn test_profit_views_agree() {
        let p = Profit::from_fraction(0.0734);
        assert!((p.percent() - 7.34).abs() < 1e-9);
        assert_eq!(Profit::from_fraction(f64::NAN).percent(), 0.0);
    }

    #[test]
    fn test_profit_deserialize_recomputes_percent() {
        let p: Profit = serde_json::from_str(r#"{"fraction": 0.05, "percent": 99.0}"#).unwrap();
        assert!((p.percent() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_with_title_leaves_source_untouched() {
        let source = CanonicalOpportunity {
            id: "x".into(),
            ..Default::default()
        };
        let titled = source.with_title("Election".into());
        assert_eq!(titled.title.as_deref(), Some("Election"));
        assert!(source.title.is_none());
    }
}
