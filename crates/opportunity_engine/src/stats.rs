//! Summary statistics over the full canonical set.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::model::{ArbType, CanonicalOpportunity};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OpportunityStats {
    pub total_opportunities: usize,
    /// Mean profit percent.
    pub avg_profit: f64,
    /// Distinct leg identifiers. Legs without an identifier are not counted.
    pub total_markets: usize,
    /// Highest profit percent, never below zero.
    pub best_profit: f64,
    pub type_counts: BTreeMap<ArbType, usize>,
}

/// Aggregate over every opportunity, ignoring any active filters.
pub fn aggregate(opportunities: &[CanonicalOpportunity]) -> OpportunityStats {
    if opportunities.is_empty() {
        return OpportunityStats::default();
    }

    let mut markets: HashSet<&str> = HashSet::new();
    let mut type_counts: BTreeMap<ArbType, usize> = BTreeMap::new();
    let mut profit_sum = 0.0;
    let mut best_profit: f64 = 0.0;

    for opp in opportunities {
        let profit = opp.profit_percent();
        profit_sum += profit;
        best_profit = best_profit.max(profit);

        *type_counts.entry(opp.arb_type).or_default() += 1;

        markets.extend(opp.legs().into_iter().filter_map(|leg| leg.market_id.as_deref()));
    }

    OpportunityStats {
        total_opportunities: opportunities.len(),
        avg_profit: profit_sum / opportunities.len() as f64,
        total_markets: markets.len(),
        best_profit,
        type_counts,
    }
}
