//! Exchange contract resolver: works out which specific contract a leg
//! refers to from the free-text market question.
//!
//! Exchanges encode multi-outcome markets differently:
//! 1. PredictIt: `"Question - Contract"`; the contract is the last segment.
//! 2. Polymarket / Manifold: always a plain YES/NO pair.
//! 3. Kalshi: subtitle segment, then ticker suffix, then a "who/which/what
//!    will" warning when the option can't be identified.
//! 4. Anything else: generic `" - "` split.
//!
//! Resolution never fails; it degrades to the least specific description.

use serde::Serialize;

use crate::model::MarketLeg;

/// Substitute for an empty question.
pub const PLACEHOLDER_QUESTION: &str = "N/A";

/// Appended to the outcome when a Kalshi market clearly has several options
/// but none could be identified.
pub const UNRESOLVED_OPTIONS_NOTE: &str = "multiple options available - check market link";

const SEGMENT_SEPARATOR: &str = " - ";

// ── Public Types ──────────────────────────────────────────────────────

/// Human-meaningful description of the contract a leg trades.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractDetails {
    /// Specific contract inside a multi-outcome market, if one was found.
    pub contract_name: Option<String>,
    pub base_question: String,
    pub option: String,
    pub has_multiple_options: bool,
    pub display_option: String,
}

impl ContractDetails {
    /// No contract identified: the option is just the outcome.
    fn plain(question: &str, option: &str) -> Self {
        Self {
            contract_name: None,
            base_question: question.to_string(),
            option: option.to_string(),
            has_multiple_options: false,
            display_option: option.to_string(),
        }
    }

    /// A named contract inside a multi-outcome market.
    fn named(base_question: &str, name: &str, outcome: &str) -> Self {
        Self {
            contract_name: Some(name.to_string()),
            base_question: base_question.to_string(),
            option: name.to_string(),
            has_multiple_options: true,
            display_option: format!("{} ({})", name, outcome),
        }
    }
}

/// Exchange family, detected from the free-text exchange name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeKind {
    PredictIt,
    Polymarket,
    Kalshi,
    Manifold,
    Other,
}

/// Inputs for one resolution.
#[derive(Debug, Clone, Copy)]
pub struct ContractQuery<'a> {
    pub question: &'a str,
    pub exchange: &'a str,
    pub outcome: &'a str,
    /// Exchange market identifier (Kalshi ticker), when known.
    pub market_id: Option<&'a str>,
}

// ── Dispatch table ────────────────────────────────────────────────────

type ResolveFn = fn(&ContractQuery<'_>) -> ContractDetails;

struct ExchangeEntry {
    /// Case-insensitive substring of the exchange name.
    marker: &'static str,
    kind: ExchangeKind,
    resolve: ResolveFn,
}

/// Checked top to bottom; the first marker contained in the exchange name
/// wins. Names matching nothing use `resolve_generic`.
const EXCHANGES: &[ExchangeEntry] = &[
    ExchangeEntry {
        marker: "predictit",
        kind: ExchangeKind::PredictIt,
        resolve: resolve_predictit,
    },
    ExchangeEntry {
        marker: "polymarket",
        kind: ExchangeKind::Polymarket,
        resolve: resolve_binary,
    },
    ExchangeEntry {
        marker: "kalshi",
        kind: ExchangeKind::Kalshi,
        resolve: resolve_kalshi,
    },
    ExchangeEntry {
        marker: "manifold",
        kind: ExchangeKind::Manifold,
        resolve: resolve_binary,
    },
];

impl ExchangeKind {
    pub fn detect(exchange: &str) -> Self {
        let lower = exchange.to_lowercase();
        EXCHANGES
            .iter()
            .find(|entry| lower.contains(entry.marker))
            .map(|entry| entry.kind)
            .unwrap_or(ExchangeKind::Other)
    }

    fn resolver(self) -> ResolveFn {
        EXCHANGES
            .iter()
            .find(|entry| entry.kind == self)
            .map(|entry| entry.resolve)
            .unwrap_or(resolve_generic)
    }
}

impl<'a> ContractQuery<'a> {
    pub fn new(question: &'a str, exchange: &'a str, outcome: &'a str) -> Self {
        Self {
            question,
            exchange,
            outcome,
            market_id: None,
        }
    }

    pub fn with_market_id(mut self, market_id: Option<&'a str>) -> Self {
        self.market_id = market_id;
        self
    }

    /// Query describing one leg of an opportunity.
    pub fn for_leg(leg: &'a MarketLeg) -> Self {
        Self::new(&leg.question, &leg.exchange, &leg.outcome)
            .with_market_id(leg.market_id.as_deref())
    }

    pub fn resolve(&self) -> ContractDetails {
        let query = if self.question.trim().is_empty() {
            ContractQuery {
                question: PLACEHOLDER_QUESTION,
                ..*self
            }
        } else {
            *self
        };
        (ExchangeKind::detect(query.exchange).resolver())(&query)
    }
}

/// Resolve the contract for a question on `exchange` with `outcome`.
pub fn resolve(question: &str, exchange: &str, outcome: &str) -> ContractDetails {
    ContractQuery::new(question, exchange, outcome).resolve()
}

/// Resolve the contract for one leg, using its market identifier if present.
pub fn resolve_leg(leg: &MarketLeg) -> ContractDetails {
    ContractQuery::for_leg(leg).resolve()
}

// ── Per-exchange strategies ───────────────────────────────────────────

fn resolve_predictit(q: &ContractQuery<'_>) -> ContractDetails {
    if let Some((base, last)) = split_last_segment(q.question) {
        let name = strip_outcome_suffix(last);
        if !name.is_empty() {
            return ContractDetails::named(base, name, q.outcome);
        }
    }
    ContractDetails::plain(q.question, q.outcome)
}

/// Polymarket and Manifold list every market as a single YES/NO pair, even
/// when the underlying event has many candidates.
fn resolve_binary(q: &ContractQuery<'_>) -> ContractDetails {
    let option = if q.outcome == "YES" { "YES" } else { "NO" };
    ContractDetails::plain(q.question, option)
}

fn resolve_kalshi(q: &ContractQuery<'_>) -> ContractDetails {
    // (a) Subtitle segment, as on PredictIt.
    let mut base = q.question;
    if let Some((head, last)) = split_last_segment(q.question) {
        base = head;
        let name = strip_outcome_suffix(last);
        if !name.is_empty() {
            return ContractDetails::named(head, name, q.outcome);
        }
    }

    // (b) Ticker suffix. Best effort only; tickers follow no documented schema.
    if let Some(name) = q.market_id.and_then(ticker_option) {
        let side = if q.outcome == "YES" { "YES" } else { "NO" };
        return ContractDetails {
            contract_name: Some(name.clone()),
            base_question: base.to_string(),
            display_option: format!("{} ({})", name, side),
            option: name,
            has_multiple_options: true,
        };
    }

    // (c) Clearly multi-option, but we can't tell which one.
    if asks_for_one_of_many(q.question) && !q.question.contains(SEGMENT_SEPARATOR) {
        return ContractDetails {
            contract_name: None,
            base_question: q.question.to_string(),
            option: q.outcome.to_string(),
            has_multiple_options: true,
            display_option: format!("{} ({})", q.outcome, UNRESOLVED_OPTIONS_NOTE),
        };
    }

    // (d)
    ContractDetails::plain(q.question, q.outcome)
}

fn resolve_generic(q: &ContractQuery<'_>) -> ContractDetails {
    if let Some((base, last)) = split_last_segment(q.question) {
        let is_bare_outcome = last.eq_ignore_ascii_case("yes") || last.eq_ignore_ascii_case("no");
        if !last.is_empty() && !is_bare_outcome {
            return ContractDetails::named(base, last, q.outcome);
        }
    }
    let option = if q.outcome.is_empty() { "YES" } else { q.outcome };
    ContractDetails::plain(q.question, option)
}

// ── String heuristics ─────────────────────────────────────────────────

/// Split `"A - B - C"` into `("A - B", "C")`; the last segment is trimmed.
fn split_last_segment(question: &str) -> Option<(&str, &str)> {
    let idx = question.rfind(SEGMENT_SEPARATOR)?;
    let last = &question[idx + SEGMENT_SEPARATOR.len()..];
    Some((&question[..idx], last.trim()))
}

/// Drop a trailing whitespace-separated `YES` / `NO` token (any case).
/// A bare `YES` with nothing before it is kept.
fn strip_outcome_suffix(segment: &str) -> &str {
    for token in ["yes", "no"] {
        if segment.len() <= token.len() {
            continue;
        }
        let split = segment.len() - token.len();
        if !segment.is_char_boundary(split) || !segment[split..].eq_ignore_ascii_case(token) {
            continue;
        }
        let head = &segment[..split];
        if head.ends_with(char::is_whitespace) {
            return head.trim();
        }
    }
    segment.trim()
}

/// Option name from a ticker like `KXNEWPOPE-70-PPIZ_YES` (→ `Ppiz`).
fn ticker_option(market_id: &str) -> Option<String> {
    let mut parts = market_id.split('_');
    let ticker = parts.next()?;
    parts.next()?;

    let segments: Vec<&str> = ticker.split('-').collect();
    let name = match segments.as_slice() {
        [.., _, _, last] => {
            if is_all_caps(last) {
                title_case(last)
            } else {
                last.to_string()
            }
        }
        [_, last] if is_all_caps(last) => title_case(last),
        _ => return None,
    };

    (!name.is_empty()).then_some(name)
}

fn is_all_caps(s: &str) -> bool {
    s.chars().count() > 2 && s.to_uppercase() == s
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// `who will …`, `which will …`, `what will …` (any case).
fn asks_for_one_of_many(question: &str) -> bool {
    let lower = question.to_lowercase();
    ["who", "which", "what"].iter().any(|word| {
        lower.strip_prefix(word).is_some_and(|rest| {
            let trimmed = rest.trim_start();
            trimmed.len() < rest.len() && trimmed.starts_with("will")
        })
    })
}
