//! Execution plans: step-by-step trading instructions for one opportunity.
//!
//! Plans are built on demand. Every call to [`ExecutionPlan::steps`] produces
//! the full sequence again from the opportunity, so a plan can be replayed as
//! often as needed.

use crate::contract::{ContractDetails, ContractQuery};
use crate::model::{ArbType, CanonicalOpportunity, MarketLeg};
use crate::normalize::NOT_AVAILABLE;

/// Strategy label for buying both complementary outcomes.
pub const COMPLEMENTARY_BUY: &str = "complementary_buy";

/// Lazily generated plan for one opportunity.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionPlan<'a> {
    opp: &'a CanonicalOpportunity,
}

impl<'a> ExecutionPlan<'a> {
    pub fn new(opp: &'a CanonicalOpportunity) -> Self {
        Self { opp }
    }

    /// Build the instruction lines.
    pub fn steps(&self) -> std::vec::IntoIter<String> {
        let mut w = PlanWriter::new(self.opp);
        match self.opp.arb_type {
            ArbType::Probability => w.probability(),
            ArbType::ShortTerm => w.short_term(),
            ArbType::Combinatorial => w.combinatorial(),
            ArbType::Traditional | ArbType::Unknown => w.traditional(),
        }
        w.checks();
        w.lines.into_iter()
    }
}

impl<'a> IntoIterator for &ExecutionPlan<'a> {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps()
    }
}

/// All steps for `opp`, in order.
pub fn generate(opp: &CanonicalOpportunity) -> Vec<String> {
    ExecutionPlan::new(opp).steps().collect()
}

// ── Writer ────────────────────────────────────────────────────────────

struct PlanWriter<'a> {
    opp: &'a CanonicalOpportunity,
    exchange1: String,
    exchange2: String,
    lines: Vec<String>,
}

impl<'a> PlanWriter<'a> {
    fn new(opp: &'a CanonicalOpportunity) -> Self {
        Self {
            opp,
            exchange1: display_exchange(&opp.market1.exchange, "Exchange 1"),
            exchange2: display_exchange(&opp.market2.exchange, "Exchange 2"),
            lines: Vec::new(),
        }
    }

    fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    fn blank(&mut self) {
        self.lines.push(String::new());
    }

    fn profit(&self) -> f64 {
        self.opp.profit_percent()
    }

    fn probability(&mut self) {
        self.push("STRATEGY: Probability spread arbitrage");
        self.push(format!(
            "   Spread: {:.2}% | Profit: {:.2}%",
            self.opp.spread_percent,
            self.profit()
        ));
        self.blank();
        self.spread_legs();
        self.blank();
        self.push(format!(
            "3. Hold to resolution for a locked-in profit of {:.2}%",
            self.profit()
        ));
    }

    fn short_term(&mut self) {
        self.push("STRATEGY: Short-term arbitrage");
        self.push(format!(
            "   Expires in {:.1}h | Risk: {} | Profit: {:.2}%",
            self.opp.time_to_expiry_hours,
            self.opp.risk_level,
            self.profit()
        ));
        self.blank();
        self.push("WARNING: execute quickly, this opportunity may disappear.");
        self.blank();
        self.spread_legs();
        self.blank();
        self.push("3. Close the position before expiry or hold to resolution");
    }

    /// Buy leg 1 / sell leg 2, pricing from the probability band when a leg
    /// has no price.
    fn spread_legs(&mut self) {
        let opp = self.opp;
        let price1 = nonzero_or(opp.market1.price, opp.probability_low);
        let price2 = nonzero_or(opp.market2.price, opp.probability_high);

        let header = format!("1. Buy on {}:", self.exchange1);
        self.trade_leg(header, &opp.market1, price1, ContractQuery::for_leg(&opp.market1));
        self.blank();
        let header = format!("2. Sell on {}:", self.exchange2);
        self.trade_leg(header, &opp.market2, price2, ContractQuery::for_leg(&opp.market2));
    }

    fn traditional(&mut self) {
        let opp = self.opp;
        self.push("STRATEGY: Cross-exchange arbitrage");
        self.push(format!(
            "   Price gap between {} and {} | Profit: {:.2}%",
            self.exchange1,
            self.exchange2,
            self.profit()
        ));
        self.blank();

        let header = format!("1. Buy on {} (lower price):", self.exchange1);
        self.trade_leg(
            header,
            &opp.market1,
            opp.market1.price,
            ContractQuery::for_leg(&opp.market1),
        );
        self.blank();
        let header = format!("2. Sell on {} (higher price):", self.exchange2);
        self.trade_leg(
            header,
            &opp.market2,
            opp.market2.price,
            ContractQuery::for_leg(&opp.market2),
        );
        self.blank();
        self.push(format!(
            "3. Guaranteed profit of {:.2}% after resolution",
            self.profit()
        ));
    }

    fn trade_leg(&mut self, header: String, leg: &MarketLeg, price: f64, query: ContractQuery<'_>) {
        let details = query.resolve();
        self.push(header);
        self.push(format!(
            "   - Link: {}",
            leg.url.as_deref().unwrap_or(NOT_AVAILABLE)
        ));
        self.push(format!("   - Contract: {}", option_label(&details)));
        self.push(format!("   - Price: ${:.2}", price));
        if let Some(name) = contract_to_select(&details) {
            self.push(format!("   - IMPORTANT: select the contract \"{}\"", name));
        }
    }

    fn combinatorial(&mut self) {
        let opp = self.opp;
        let buying = opp.strategy == COMPLEMENTARY_BUY;

        // Both legs sit on one market; the second may not name its exchange.
        let exchange2 = if opp.market2.exchange == NOT_AVAILABLE {
            opp.market1.exchange.as_str()
        } else {
            opp.market2.exchange.as_str()
        };
        let details1 = ContractQuery::for_leg(&opp.market1).resolve();
        let details2 = ContractQuery::new(&opp.market2.question, exchange2, &opp.market2.outcome)
            .with_market_id(opp.market2.market_id.as_deref())
            .resolve();

        self.push("STRATEGY: Combinatorial arbitrage");
        self.push(format!(
            "   Kind: {} | Profit: {:.2}%",
            if buying { "buy both" } else { "sell both" },
            self.profit()
        ));
        self.blank();
        self.push(format!("1. Open {}:", self.exchange1));
        self.push(format!(
            "   - Link: {}",
            opp.market1.url.as_deref().unwrap_or(NOT_AVAILABLE)
        ));
        self.push(format!("   - Market: \"{}\"", opp.market1.question));
        self.blank();

        self.push(if buying {
            "2. Buy BOTH outcomes in the same market:"
        } else {
            "2. Sell BOTH outcomes in the same market:"
        });
        for (n, (details, leg)) in [(&details1, &opp.market1), (&details2, &opp.market2)]
            .into_iter()
            .enumerate()
        {
            self.push(format!(
                "   - Option {}: {} @ ${:.2}",
                n + 1,
                option_label(details),
                leg.price
            ));
            if let Some(name) = contract_to_select(details) {
                self.push(format!("     Select: \"{}\"", name));
            }
        }

        let sum = (opp.market1.price + opp.market2.price) * 100.0;
        let relation = if buying { '<' } else { '>' };
        self.push(format!(
            "   - Sum: {:.1}% {} 100% -> guaranteed profit",
            sum, relation
        ));
    }

    /// Closing block shared by every strategy.
    fn checks(&mut self) {
        let opp = self.opp;
        self.blank();
        self.push("CHECKS BEFORE EXECUTING:");
        self.push(format!(
            "   - Minimum liquidity: ${:.0} ({}) and ${:.0} ({})",
            opp.market1.liquidity, self.exchange1, opp.market2.liquidity, self.exchange2
        ));
        self.push("   - Confirm the markets are equivalent (same event and question)");
        self.push(
            "   - Account for exchange fees (typically 2-5% per transaction, not deducted from the profit shown)",
        );
        self.push("   - Check that expiry dates are compatible");
        self.blank();
        self.push("RELIABILITY:");
        self.push(format!("   - Match confidence: {:.0}%", opp.confidence * 100.0));
        self.push(format!("   - Quality score: {:.0}/100", opp.quality_score));
    }
}

// ── Helpers ───────────────────────────────────────────────────────────

/// `kalshi` -> `Kalshi`; unknown exchanges get `fallback`.
fn display_exchange(exchange: &str, fallback: &str) -> String {
    if exchange.is_empty() || exchange == NOT_AVAILABLE {
        return fallback.to_string();
    }
    let mut chars = exchange.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => fallback.to_string(),
    }
}

fn option_label(details: &ContractDetails) -> &str {
    if details.display_option.is_empty() {
        &details.option
    } else {
        &details.display_option
    }
}

fn contract_to_select(details: &ContractDetails) -> Option<&str> {
    if details.has_multiple_options {
        details.contract_name.as_deref()
    } else {
        None
    }
}

fn nonzero_or(value: f64, fallback: f64) -> f64 {
    if value != 0.0 {
        value
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Profit;

    fn make_leg(exchange: &str, question: &str, outcome: &str, price: f64) -> MarketLeg {
        MarketLeg {
            exchange: exchange.into(),
            question: question.into(),
            outcome: outcome.into(),
            price,
            liquidity: 250.0,
            url: Some(format!("https://{}.example/m", exchange)),
            ..Default::default()
        }
    }

    fn make_opp(arb_type: ArbType) -> CanonicalOpportunity {
        CanonicalOpportunity {
            id: "opp-1".into(),
            arb_type,
            profit: Profit::from_fraction(0.045),
            spread_percent: 9.0,
            confidence: 0.87,
            quality_score: 64.4,
            market1: make_leg("predictit", "Who wins state X? - Candidate A YES", "YES", 0.41),
            market2: make_leg("polymarket", "Candidate A wins state X?", "NO", 0.52),
            ..Default::default()
        }
    }

    fn has_line(steps: &[String], needle: &str) -> bool {
        steps.iter().any(|s| s.contains(needle))
    }

    #[test]
    fn test_probability_plan() {
        let steps = generate(&make_opp(ArbType::Probability));
        assert_eq!(steps[0], "STRATEGY: Probability spread arbitrage");
        assert!(has_line(&steps, "Spread: 9.00% | Profit: 4.50%"));
        assert!(has_line(&steps, "1. Buy on Predictit:"));
        assert!(has_line(&steps, "2. Sell on Polymarket:"));
        assert!(has_line(&steps, "Contract: Candidate A (YES)"));
        assert!(has_line(&steps, "IMPORTANT: select the contract \"Candidate A\""));
        assert!(has_line(&steps, "Hold to resolution"));
    }

    #[test]
    fn test_probability_price_falls_back_to_band() {
        let mut opp = make_opp(ArbType::Probability);
        opp.market1.price = 0.0;
        opp.probability_low = 0.33;
        let steps = generate(&opp);
        assert!(has_line(&steps, "Price: $0.33"));
    }

    #[test]
    fn test_short_term_plan_has_urgency_and_close() {
        let mut opp = make_opp(ArbType::ShortTerm);
        opp.time_to_expiry_hours = 3.4;
        opp.risk_level = "high".into();
        let steps = generate(&opp);
        assert!(has_line(&steps, "Expires in 3.4h | Risk: high"));
        assert!(has_line(&steps, "WARNING: execute quickly"));
        assert!(has_line(&steps, "Close the position before expiry or hold to resolution"));
    }

    #[test]
    fn test_combinatorial_buy_and_sell() {
        let mut opp = make_opp(ArbType::Combinatorial);
        opp.market2 = make_leg("N/A", "Will BTC close above 100k?", "NO", 0.50);
        opp.market1 = make_leg("polymarket", "Will BTC close above 100k?", "YES", 0.45);
        opp.strategy = COMPLEMENTARY_BUY.into();
        let steps = generate(&opp);
        assert!(has_line(&steps, "Kind: buy both"));
        assert!(has_line(&steps, "Buy BOTH outcomes"));
        assert!(has_line(&steps, "Option 1: YES @ $0.45"));
        assert!(has_line(&steps, "Option 2: NO @ $0.50"));
        assert!(has_line(&steps, "Sum: 95.0% < 100%"));

        opp.strategy = "complementary_sell".into();
        opp.market1.price = 0.58;
        let steps = generate(&opp);
        assert!(has_line(&steps, "Sell BOTH outcomes"));
        assert!(has_line(&steps, "Sum: 108.0% > 100%"));
    }

    #[test]
    fn test_unknown_type_uses_traditional_framing() {
        let steps = generate(&make_opp(ArbType::Unknown));
        assert_eq!(steps[0], "STRATEGY: Cross-exchange arbitrage");
        assert!(has_line(&steps, "Price gap between Predictit and Polymarket"));
        assert!(has_line(&steps, "(lower price)"));
    }

    #[test]
    fn test_common_block_closes_every_plan() {
        for kind in [
            ArbType::Traditional,
            ArbType::Combinatorial,
            ArbType::Probability,
            ArbType::ShortTerm,
            ArbType::Unknown,
        ] {
            let steps = generate(&make_opp(kind));
            let n = steps.len();
            assert_eq!(steps[n - 2], "   - Match confidence: 87%");
            assert_eq!(steps[n - 1], "   - Quality score: 64/100");
            assert!(has_line(&steps, "Minimum liquidity: $250 (Predictit) and $250 (Polymarket)"));
            assert!(has_line(&steps, "2-5% per transaction"));
            assert!(has_line(&steps, "expiry dates are compatible"));
        }
    }

    #[test]
    fn test_missing_exchange_names() {
        let opp = CanonicalOpportunity {
            market1: MarketLeg {
                exchange: NOT_AVAILABLE.into(),
                ..Default::default()
            },
            market2: MarketLeg {
                exchange: NOT_AVAILABLE.into(),
                ..Default::default()
            },
            ..Default::default()
        };
        let steps = generate(&opp);
        assert!(has_line(&steps, "Buy on Exchange 1"));
        assert!(has_line(&steps, "Sell on Exchange 2"));
    }

    #[test]
    fn test_plan_is_restartable() {
        let opp = make_opp(ArbType::Traditional);
        let plan = ExecutionPlan::new(&opp);
        let first: Vec<String> = plan.steps().collect();
        let second: Vec<String> = (&plan).into_iter().collect();
        assert_eq!(first, second);
        assert!(plan.steps().take(1).next().is_some());
    }
}
