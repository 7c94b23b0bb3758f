//! Opportunity engine crate.
//!
//! Turns raw detector records into a canonical, deduplicated, filtered view
//! of prediction-market arbitrage opportunities, with summary statistics and
//! per-opportunity execution plans.

pub mod board;
pub mod cache;
pub mod clock;
pub mod config;
pub mod contract;
pub mod dedup;
pub mod filter;
pub mod model;
pub mod normalize;
pub mod plan;
pub mod stats;

pub use board::{BoardUpdate, BoardView, OpportunityBoard, Pipeline, ViewSource};
pub use cache::{CachedSnapshot, JsonFileCache, MemoryCache, SnapshotCache};
pub use clock::{Clock, FixedClock, SystemClock};
pub use contract::{resolve, resolve_leg, ContractDetails, ContractQuery, ExchangeKind};
pub use dedup::{dedupe, extract_title, theme_key};
pub use filter::{format_time_to_expiry, FilterSet, SortKey};
pub use model::{ArbType, CanonicalOpportunity, MarketLeg, Profit};
pub use normalize::{normalize, normalize_all};
pub use plan::{generate, ExecutionPlan};
pub use stats::{aggregate, OpportunityStats};
