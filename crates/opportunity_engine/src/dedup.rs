//! Theme deduplication.
//!
//! Several detector records often describe the same real-world event (one per
//! exchange pair or per candidate). Records are bucketed by a normalized
//! theme key and only the first of each bucket survives. Input must already be
//! ordered by descending profit, which makes "first" mean "most profitable".

use std::collections::HashSet;

use tracing::debug;

use crate::model::CanonicalOpportunity;

/// Title used when nothing meaningful is left after extraction.
pub const FALLBACK_TITLE: &str = "Arbitrage opportunity";

const QUESTION_PREFIXES: &[&str] = &[
    "who will ",
    "what will ",
    "when will ",
    "how many ",
    "which ",
    "will ",
];

const SIDE_SUFFIXES: &[&str] = &["yes", "no", "republican", "democratic"];

/// Stable sort by descending profit. Equal profits keep input order.
pub fn sort_by_profit_desc(opportunities: &mut [CanonicalOpportunity]) {
    opportunities.sort_by(|a, b| b.profit_percent().total_cmp(&a.profit_percent()));
}

/// Keep the first opportunity per theme, titled. Later ones are dropped.
///
/// The input is not modified; survivors are returned as new records.
pub fn dedupe(opportunities: &[CanonicalOpportunity]) -> Vec<CanonicalOpportunity> {
    let mut seen: HashSet<String> = HashSet::with_capacity(opportunities.len());
    let mut kept = Vec::with_capacity(opportunities.len());

    for opp in opportunities {
        let key = theme_key(opp);
        if !seen.insert(key) {
            debug!("dropping {} as duplicate theme", opp.id);
            continue;
        }
        kept.push(opp.with_title(extract_title(&opp.market1.question)));
    }

    kept
}

/// Normalized dedup bucket for an opportunity.
///
/// Lower-cased first-leg question (the explanation when the question is
/// missing), whitespace collapsed, without a trailing `- yes|no|...` side
/// label and without anything from the first `?` on.
pub fn theme_key(opp: &CanonicalOpportunity) -> String {
    let source = match opp.market1.question.trim() {
        "" | "N/A" => opp.explanation.as_str(),
        q => q,
    };

    let lowered = source.to_lowercase();
    let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");

    let without_side = strip_side_suffix(&collapsed);
    let without_tail = match without_side.find('?') {
        Some(idx) => &without_side[..idx],
        None => without_side,
    };

    without_tail.trim().to_string()
}

/// Short human label for a market question.
///
/// `"Will the Fed cut rates in June? - YES"` becomes
/// `"The Fed cut rates in June"`. Only a missing question gets the fallback
/// title; a question that strips down to nothing yields `""`.
pub fn extract_title(question: &str) -> String {
    if question.is_empty() {
        return FALLBACK_TITLE.to_string();
    }
    let mut title = question.trim();

    let prefix = QUESTION_PREFIXES.iter().find(|p| {
        title
            .get(..p.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(p))
    });
    if let Some(prefix) = prefix {
        title = &title[prefix.len()..];
    }

    if let Some(idx) = title.find('?') {
        title = &title[..idx];
    }

    let title = strip_side_suffix(title).trim();
    let mut chars = title.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Strip one trailing `" - <side>"` label, ignoring case.
fn strip_side_suffix(text: &str) -> &str {
    let Some(idx) = text.rfind(" - ") else {
        return text;
    };
    let tail = text[idx + 3..].trim_end();

    if SIDE_SUFFIXES.iter().any(|side| tail.eq_ignore_ascii_case(side)) {
        &text[..idx]
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MarketLeg, Profit};

    fn make_opp(id: &str, question: &str, profit_fraction: f64) -> CanonicalOpportunity {
        CanonicalOpportunity {
            id: id.to_string(),
            profit: Profit::from_fraction(profit_fraction),
            market1: MarketLeg {
                exchange: "kalshi".into(),
                question: question.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn run(mut opps: Vec<CanonicalOpportunity>) -> Vec<CanonicalOpportunity> {
        sort_by_profit_desc(&mut opps);
        dedupe(&opps)
    }

    #[test]
    fn test_theme_key_normalization() {
        let a = make_opp("a", "Will  Trump win   Pennsylvania? (2024)", 0.0);
        let b = make_opp("b", "will trump win pennsylvania - YES", 0.0);
        assert_eq!(theme_key(&a), "will trump win pennsylvania");
        assert_eq!(theme_key(&b), "will trump win pennsylvania");
    }

    #[test]
    fn test_theme_key_uses_explanation_without_question() {
        let mut opp = make_opp("a", "", 0.0);
        opp.explanation = "Complementary BUY on Senate control".into();
        assert_eq!(theme_key(&opp), "complementary buy on senate control");
    }

    #[test]
    fn test_tie_break_keeps_most_profitable() {
        let kept = run(vec![
            make_opp("low", "Will it rain in Paris tomorrow?", 0.03),
            make_opp("high", "Will it rain in Paris tomorrow? - NO", 0.07),
        ]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "high");
        assert!((kept[0].profit_percent() - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_dedupe_is_idempotent() {
        let once = run(vec![
            make_opp("a", "Who will win the 2024 election? - Republican", 0.05),
            make_opp("b", "Who will win the 2024 election? - Democratic", 0.04),
            make_opp("c", "Will BTC hit 100k?", 0.02),
            make_opp("d", "Will ETH flip BTC?", 0.09),
        ]);
        let twice = dedupe(&once);
        assert_eq!(once, twice);
        assert_eq!(
            once.iter().map(|o| o.id.as_str()).collect::<Vec<_>>(),
            vec!["d", "a", "c"]
        );
    }

    #[test]
    fn test_title_only_on_survivor() {
        let input = vec![
            make_opp("a", "Will the Fed cut rates in June?", 0.05),
            make_opp("b", "Will the Fed cut rates in June?", 0.01),
        ];
        let kept = dedupe(&input);
        assert_eq!(kept[0].title.as_deref(), Some("The Fed cut rates in June"));
        assert!(input.iter().all(|o| o.title.is_none()));
    }

    #[test]
    fn test_profit_consistency_after_dedupe() {
        let kept = run(vec![make_opp("a", "Q1?", 0.031), make_opp("b", "Q2?", 0.12)]);
        for opp in kept {
            assert!((opp.profit_percent() - opp.profit_fraction() * 100.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_sort_is_stable_for_equal_profit() {
        let mut opps = vec![
            make_opp("first", "A?", 0.02),
            make_opp("second", "B?", 0.02),
            make_opp("top", "C?", 0.03),
        ];
        sort_by_profit_desc(&mut opps);
        let ids: Vec<&str> = opps.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["top", "first", "second"]);
    }

    #[test]
    fn test_extract_title() {
        assert_eq!(extract_title("Who will win the Senate? - Republican"), "Win the Senate");
        assert_eq!(extract_title("How many seats will Labour win?"), "Seats will Labour win");
        assert_eq!(extract_title("WHICH party controls the House"), "Party controls the House");
        assert_eq!(extract_title("Government shutdown - YES"), "Government shutdown");
        assert_eq!(extract_title("Government shutdown - yes"), "Government shutdown");
        assert_eq!(extract_title("Government shutdown - maybe"), "Government shutdown - maybe");
        assert_eq!(extract_title("Will ?"), "");
        assert_eq!(extract_title("Which ? - Yes"), "");
        assert_eq!(extract_title(""), FALLBACK_TITLE);
    }
}
