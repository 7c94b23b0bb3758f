//! Filter/sort engine over a deduplicated opportunity set.
//!
//! `apply` is a pure function of its inputs plus the injected clock: the
//! four predicates run first, then a single stable sort on the chosen key.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::model::{ArbType, CanonicalOpportunity};

/// Value that disables the type and exchange filters.
pub const ALL: &str = "all";

// ── Filter State ──────────────────────────────────────────────────────

/// Ordering applied after filtering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Profit percent, highest first.
    #[default]
    Profit,
    /// First leg's expiry, latest first; undated last.
    Date,
    /// Time to expiry, soonest first; undated or expired last.
    Expiry,
    /// Combined leg liquidity, highest first.
    Liquidity,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "profit" => Ok(Self::Profit),
            "date" => Ok(Self::Date),
            "expiry" => Ok(Self::Expiry),
            "liquidity" => Ok(Self::Liquidity),
            other => Err(format!(
                "unknown sort key '{}' (expected profit, date, expiry or liquidity)",
                other
            )),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Profit => "profit",
            Self::Date => "date",
            Self::Expiry => "expiry",
            Self::Liquidity => "liquidity",
        })
    }
}

/// User-selected filters. Every field has a disabled/neutral default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSet {
    /// `all` or an arbitrage type label (`classic` selects `traditional`).
    pub arbitrage_type: String,
    /// Inclusive lower bound on profit percent.
    pub min_profit: f64,
    /// Inclusive upper bound on profit percent.
    pub max_profit: f64,
    /// Case-insensitive substring of either leg's question. Empty disables.
    pub search: String,
    /// `all` or an exact exchange name.
    pub exchange: String,
    pub sort_by: SortKey,
}

impl Default for FilterSet {
    fn default() -> Self {
        Self {
            arbitrage_type: ALL.to_string(),
            min_profit: 0.0,
            max_profit: 100.0,
            search: String::new(),
            exchange: ALL.to_string(),
            sort_by: SortKey::Profit,
        }
    }
}

impl FilterSet {
    /// The type to keep, or `None` when the type filter is off.
    ///
    /// Unrecognized labels disable the filter rather than hiding everything.
    pub fn type_filter(&self) -> Option<ArbType> {
        let label = self.arbitrage_type.trim();
        if label.is_empty() || label.eq_ignore_ascii_case(ALL) {
            return None;
        }
        match ArbType::from_label(label) {
            ArbType::Unknown if !label.eq_ignore_ascii_case("unknown") => None,
            kind => Some(kind),
        }
    }

    fn exchange_filter(&self) -> Option<&str> {
        let exchange = self.exchange.as_str();
        (!exchange.is_empty() && exchange != ALL).then_some(exchange)
    }

    /// Whether `opp` passes every enabled predicate.
    pub fn matches(&self, opp: &CanonicalOpportunity) -> bool {
        if let Some(kind) = self.type_filter() {
            if opp.arb_type != kind {
                return false;
            }
        }

        let profit = opp.profit_percent();
        if profit < self.min_profit || profit > self.max_profit {
            return false;
        }

        if !self.search.is_empty() {
            let needle = self.search.to_lowercase();
            let hit = opp
                .legs()
                .iter()
                .any(|leg| leg.question.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }

        if let Some(exchange) = self.exchange_filter() {
            if !opp.legs().iter().any(|leg| leg.exchange == exchange) {
                return false;
            }
        }

        true
    }
}

// ── Engine ────────────────────────────────────────────────────────────

/// Filter then sort. The input is left untouched.
pub fn apply(
    opportunities: &[CanonicalOpportunity],
    filters: &FilterSet,
    clock: &dyn Clock,
) -> Vec<CanonicalOpportunity> {
    let mut visible: Vec<CanonicalOpportunity> = opportunities
        .iter()
        .filter(|opp| filters.matches(opp))
        .cloned()
        .collect();

    sort(&mut visible, filters.sort_by, clock.now());
    visible
}

/// Stable sort on one key, anchored at `now` for the expiry key.
pub fn sort(opportunities: &mut [CanonicalOpportunity], key: SortKey, now: DateTime<Utc>) {
    match key {
        SortKey::Profit => {
            opportunities.sort_by(|a, b| b.profit_percent().total_cmp(&a.profit_percent()))
        }
        SortKey::Date => {
            opportunities.sort_by(|a, b| b.market1.expires_at.cmp(&a.market1.expires_at))
        }
        SortKey::Expiry => opportunities.sort_by(|a, b| {
            time_to_expiry_hours(a, now).total_cmp(&time_to_expiry_hours(b, now))
        }),
        SortKey::Liquidity => {
            opportunities.sort_by(|a, b| b.total_liquidity().total_cmp(&a.total_liquidity()))
        }
    }
}

/// Hours until the opportunity expires.
///
/// Short-term records report this directly; others are measured from their
/// expiry timestamp. Missing or already-passed expiries are `f64::INFINITY`.
pub fn time_to_expiry_hours(opp: &CanonicalOpportunity, now: DateTime<Utc>) -> f64 {
    if opp.arb_type == ArbType::ShortTerm && opp.time_to_expiry_hours > 0.0 {
        return opp.time_to_expiry_hours;
    }

    let Some(expires_at) = opp
        .market1
        .expires_at
        .or(opp.market2.expires_at)
        .or(opp.expires_at)
    else {
        return f64::INFINITY;
    };

    let hours = (expires_at - now).num_milliseconds() as f64 / 3_600_000.0;
    if hours > 0.0 {
        hours
    } else {
        f64::INFINITY
    }
}

/// Countdown label: `3d 4h`, `5h`, `42min`, `expired`, or `N/A`.
pub fn format_time_to_expiry(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(expires_at) = expires_at else {
        return "N/A".to_string();
    };

    let remaining = expires_at - now;
    if remaining < chrono::Duration::zero() {
        return "expired".to_string();
    }

    let days = remaining.num_days();
    let hours = remaining.num_hours() % 24;
    match (days, hours) {
        (d, h) if d > 0 => format!("{}d {}h", d, h),
        (_, h) if h > 0 => format!("{}h", h),
        _ => format!("{}min", remaining.num_minutes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::model::{MarketLeg, Profit};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn make_opp(id: &str, exchange: &str, profit_percent: f64) -> CanonicalOpportunity {
        CanonicalOpportunity {
            id: id.to_string(),
            arb_type: ArbType::Probability,
            profit: Profit::from_fraction(profit_percent / 100.0),
            market1: MarketLeg {
                exchange: exchange.to_string(),
                question: format!("Question {}?", id),
                ..Default::default()
            },
            market2: MarketLeg {
                exchange: "polymarket".to_string(),
                question: format!("Question {} mirror?", id),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn expiring(id: &str, in_hours: Option<i64>) -> CanonicalOpportunity {
        let mut opp = make_opp(id, "kalshi", 2.0);
        opp.market1.expires_at = in_hours.map(|h| now() + Duration::hours(h));
        opp
    }

    fn ids(opps: &[CanonicalOpportunity]) -> Vec<&str> {
        opps.iter().map(|o| o.id.as_str()).collect()
    }

    #[test]
    fn test_default_filters_pass_everything_in_range() {
        let opps = vec![make_opp("a", "kalshi", 0.0), make_opp("b", "predictit", 100.0)];
        let out = apply(&opps, &FilterSet::default(), &FixedClock(now()));
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_combined_filters_on_mixed_set() {
        let opps = vec![
            make_opp("k1", "kalshi", 0.5),
            make_opp("k2", "kalshi", 1.0),
            make_opp("k3", "kalshi", 2.5),
            make_opp("k4", "kalshi", 5.0),
            make_opp("k5", "kalshi", 5.01),
            make_opp("p1", "predictit", 3.0),
            make_opp("p2", "predictit", 1.5),
            make_opp("m1", "manifold", 4.0),
            make_opp("k6", "kalshi", 12.0),
            make_opp("k7", "kalshi", 4.2),
        ];
        let filters = FilterSet {
            min_profit: 1.0,
            max_profit: 5.0,
            exchange: "kalshi".into(),
            ..Default::default()
        };

        let mut got = ids(&apply(&opps, &filters, &FixedClock(now())))
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>();
        got.sort();
        assert_eq!(got, vec!["k2", "k3", "k4", "k7"]);

        for opp in &opps {
            let expected = opp.profit_percent() >= 1.0
                && opp.profit_percent() <= 5.0
                && opp.legs().iter().any(|l| l.exchange == "kalshi");
            assert_eq!(filters.matches(opp), expected, "{}", opp.id);
        }
    }

    #[test]
    fn test_exchange_matches_second_leg() {
        let opp = make_opp("a", "kalshi", 2.0);
        let filters = FilterSet {
            exchange: "polymarket".into(),
            ..Default::default()
        };
        assert!(filters.matches(&opp));
        let filters = FilterSet {
            exchange: "Polymarket".into(),
            ..Default::default()
        };
        assert!(!filters.matches(&opp));
    }

    #[test]
    fn test_type_filter() {
        let mut classic = make_opp("c", "kalshi", 2.0);
        classic.arb_type = ArbType::from_label("classic");
        let prob = make_opp("p", "kalshi", 2.0);

        let filters = FilterSet {
            arbitrage_type: "traditional".into(),
            ..Default::default()
        };
        assert!(filters.matches(&classic));
        assert!(!filters.matches(&prob));

        let filters = FilterSet {
            arbitrage_type: "something_new".into(),
            ..Default::default()
        };
        assert_eq!(filters.type_filter(), None);
        assert!(filters.matches(&prob));
    }

    #[test]
    fn test_search_is_case_insensitive_over_both_legs() {
        let mut opp = make_opp("a", "kalshi", 2.0);
        opp.market2.question = "Will the SENATE flip?".into();
        let filters = FilterSet {
            search: "senate".into(),
            ..Default::default()
        };
        assert!(filters.matches(&opp));
        let filters = FilterSet {
            search: "house".into(),
            ..Default::default()
        };
        assert!(!filters.matches(&opp));
    }

    #[test]
    fn test_sort_by_expiry_puts_undated_last() {
        let opps = vec![
            expiring("none1", None),
            expiring("late", Some(72)),
            expiring("past", Some(-3)),
            expiring("soon", Some(2)),
            expiring("none2", None),
        ];
        let filters = FilterSet {
            sort_by: SortKey::Expiry,
            ..Default::default()
        };
        let out = apply(&opps, &filters, &FixedClock(now()));
        assert_eq!(ids(&out), vec!["soon", "late", "none1", "past", "none2"]);
    }

    #[test]
    fn test_expiry_depends_on_injected_clock() {
        let opps = vec![expiring("a", Some(10)), expiring("b", Some(20))];
        let filters = FilterSet {
            sort_by: SortKey::Expiry,
            ..Default::default()
        };
        // Twelve hours later "a" has expired and drops behind "b".
        let later = FixedClock(now() + Duration::hours(12));
        assert_eq!(ids(&apply(&opps, &filters, &later)), vec!["b", "a"]);
    }

    #[test]
    fn test_short_term_uses_reported_hours() {
        let mut st = expiring("st", Some(100));
        st.arb_type = ArbType::ShortTerm;
        st.time_to_expiry_hours = 1.5;
        assert_eq!(time_to_expiry_hours(&st, now()), 1.5);

        st.time_to_expiry_hours = 0.0;
        assert!((time_to_expiry_hours(&st, now()) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_sort_by_date_and_liquidity() {
        let mut opps = vec![
            expiring("undated", None),
            expiring("early", Some(5)),
            expiring("late", Some(50)),
        ];
        sort(&mut opps, SortKey::Date, now());
        assert_eq!(ids(&opps), vec!["late", "early", "undated"]);

        opps[0].market1.liquidity = 10.0;
        opps[1].market1.liquidity = 500.0;
        opps[2].market2.liquidity = 200.0;
        sort(&mut opps, SortKey::Liquidity, now());
        assert_eq!(ids(&opps), vec!["early", "undated", "late"]);
    }

    #[test]
    fn test_sort_by_profit_desc() {
        let mut opps = vec![
            make_opp("a", "kalshi", 1.0),
            make_opp("b", "kalshi", 9.0),
            make_opp("c", "kalshi", 4.0),
        ];
        sort(&mut opps, SortKey::Profit, now());
        assert_eq!(ids(&opps), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_sort_key_parse() {
        assert_eq!("Expiry".parse::<SortKey>(), Ok(SortKey::Expiry));
        assert!("volume".parse::<SortKey>().is_err());
    }

    #[test]
    fn test_format_time_to_expiry() {
        let at = |mins: i64| Some(now() + Duration::minutes(mins));
        assert_eq!(format_time_to_expiry(None, now()), "N/A");
        assert_eq!(format_time_to_expiry(at(-1), now()), "expired");
        assert_eq!(format_time_to_expiry(at(42), now()), "42min");
        assert_eq!(format_time_to_expiry(at(5 * 60 + 10), now()), "5h");
        assert_eq!(format_time_to_expiry(at(3 * 24 * 60 + 4 * 60), now()), "3d 4h");
    }
}
