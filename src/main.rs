//! Arbitrage Dashboard Entry Point.
//!
//! Orchestrates the tasks:
//! 1. Snapshot cache warm start (once)
//! 2. Opportunity feed poller (periodic, live mode)
//! 3. Board reporter (logs or prints every published view)

mod config;
mod feed;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::Parser;
use common::{Error, OpportunitiesPayload};
use opportunity_engine::config::TimingConfig;
use opportunity_engine::{
    format_time_to_expiry, BoardUpdate, BoardView, Clock, ExecutionPlan, FilterSet,
    JsonFileCache, OpportunityBoard, Pipeline, SnapshotCache, SortKey, SystemClock,
};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::load_config;
use crate::feed::FeedClient;

#[derive(Parser)]
#[command(about = "Normalize, deduplicate and rank prediction-market arbitrage opportunities")]
struct Cli {
    /// Run the pipeline once over a saved `/opportunities` payload.
    #[arg(long, value_name = "FILE")]
    snapshot: Option<PathBuf>,

    /// Exit after the first published view.
    #[arg(long)]
    once: bool,

    /// Print views as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Print the execution plan for one opportunity id and exit.
    #[arg(long, value_name = "ID")]
    plan: Option<String>,

    /// Rows to log per view.
    #[arg(long, default_value_t = 10)]
    limit: usize,

    #[arg(long)]
    min_profit: Option<f64>,

    #[arg(long)]
    max_profit: Option<f64>,

    #[arg(long)]
    search: Option<String>,

    #[arg(long)]
    exchange: Option<String>,

    /// Arbitrage type: all, traditional, combinatorial, probability, short_term.
    #[arg(long = "type", value_name = "TYPE")]
    arb_type: Option<String>,

    /// profit, date, expiry or liquidity.
    #[arg(long)]
    sort: Option<SortKey>,
}

impl Cli {
    fn apply_filters(&self, filters: &mut FilterSet) {
        if let Some(v) = self.min_profit {
            filters.min_profit = v;
        }
        if let Some(v) = self.max_profit {
            filters.max_profit = v;
        }
        if let Some(v) = &self.search {
            filters.search = v.clone();
        }
        if let Some(v) = &self.exchange {
            filters.exchange = v.clone();
        }
        if let Some(v) = &self.arb_type {
            filters.arbitrage_type = v.clone();
        }
        if let Some(v) = self.sort {
            filters.sort_by = v;
        }
    }

    /// Stop after the first real view.
    fn single_shot(&self) -> bool {
        self.once || self.plan.is_some()
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "arb_dashboard=info,opportunity_engine=info".into()),
        )
        .init();

    info!("Arbitrage dashboard starting...");

    let cli = Cli::parse();
    let mut cfg = match load_config() {
        Ok(c) => c,
        Err(e) => {
            error!("Config error: {}", e);
            return;
        }
    };
    cli.apply_filters(&mut cfg.filters);
    if cfg.filters.min_profit > cfg.filters.max_profit {
        error!(
            "Config error: min profit {} exceeds max profit {}",
            cfg.filters.min_profit, cfg.filters.max_profit
        );
        return;
    }
    info!(
        "Filters: type={} profit=[{}, {}] exchange={} search='{}' sort={}",
        cfg.filters.arbitrage_type,
        cfg.filters.min_profit,
        cfg.filters.max_profit,
        cfg.filters.exchange,
        cfg.filters.search,
        cfg.filters.sort_by
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Offline mode.
    if let Some(path) = &cli.snapshot {
        if let Err(e) = run_snapshot(&cli, path, cfg.filters.clone(), clock) {
            error!("Snapshot run failed: {}", e);
        }
        return;
    }

    let feed = match FeedClient::new(&cfg.feed_url, cfg.timing.request_timeout_secs) {
        Ok(f) => f,
        Err(e) => {
            error!("Feed client init failed: {}", e);
            return;
        }
    };
    info!(
        "Feed: {} (poll every {}s, live_mode={})",
        feed.url(),
        cfg.timing.poll_interval_secs,
        cfg.timing.live_mode
    );

    let cache: Arc<dyn SnapshotCache> = Arc::new(JsonFileCache::new(&cfg.cache.path));
    info!("Snapshot cache path: {}", cfg.cache.path);

    let board = OpportunityBoard::spawn(
        Pipeline::new(cfg.filters.clone(), clock.clone()),
        Some(cache.clone()),
    );

    // Task 1: warm start from a fresh cached snapshot.
    if let Some(update) = warm_start_update(cache.as_ref(), cfg.cache.max_age_secs, clock.now()) {
        if let Err(e) = board.submit(update).await {
            warn!("Could not publish cached snapshot: {}", e);
        }
    }

    // Task 2: feed poller.
    let fetch = move || {
        let feed = feed.clone();
        async move { feed.fetch().await }
    };
    let poller = tokio::spawn(poll_feed(fetch, board.sender(), cache.clone(), cfg.timing.clone()));

    // Task 3: report views until interrupted.
    let mut views = board.subscribe();
    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    warn!("Board stopped publishing");
                    break;
                }
                let view = views.borrow_and_update().clone();
                if let Some(id) = &cli.plan {
                    print_plan(&view, id);
                } else {
                    report_view(&cli, &view);
                }
                if cli.single_shot() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
        }
    }

    poller.abort();
    board.shutdown().await;
}

/// Cached snapshot to show before the first fetch, when it is young enough.
fn warm_start_update(
    cache: &dyn SnapshotCache,
    max_age_secs: u64,
    now: DateTime<Utc>,
) -> Option<BoardUpdate> {
    match cache.load() {
        Ok(Some(snapshot)) if snapshot.is_fresh(max_age_secs, now) => {
            info!(
                "Loaded {} cached opportunities from {}",
                snapshot.opportunities.len(),
                snapshot.cached_at
            );
            Some(BoardUpdate::Cached(snapshot))
        }
        Ok(Some(snapshot)) => {
            info!("Cached snapshot from {} is stale, waiting for feed", snapshot.cached_at);
            None
        }
        Ok(None) => None,
        Err(e) => {
            warn!("Snapshot cache read failed: {}", e);
            None
        }
    }
}

/// Board update for one poll. A failed fetch falls back to the last cached
/// snapshot, whatever its age.
fn fetch_update(
    result: common::Result<OpportunitiesPayload>,
    cache: &dyn SnapshotCache,
    cycle: u64,
) -> Option<BoardUpdate> {
    match result {
        Ok(payload) => {
            info!("Poll #{}: {} raw opportunities", cycle, payload.opportunities.len());
            Some(BoardUpdate::Raw(payload))
        }
        Err(e) => {
            warn!("Poll #{} failed: {}", cycle, e);
            match cache.load() {
                Ok(Some(snapshot)) => {
                    info!(
                        "Serving cached snapshot from {} ({} opportunities)",
                        snapshot.cached_at,
                        snapshot.opportunities.len()
                    );
                    Some(BoardUpdate::Cached(snapshot))
                }
                Ok(None) => None,
                Err(e) => {
                    warn!("Snapshot cache read failed: {}", e);
                    None
                }
            }
        }
    }
}

/// Fetch on an interval and feed the board.
async fn poll_feed<F, Fut>(
    mut fetch: F,
    tx: mpsc::Sender<BoardUpdate>,
    cache: Arc<dyn SnapshotCache>,
    timing: TimingConfig,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = common::Result<OpportunitiesPayload>>,
{
    let mut cycles: u64 = 0;
    loop {
        cycles += 1;
        let result = fetch().await;
        if let Some(update) = fetch_update(result, cache.as_ref(), cycles) {
            if tx.send(update).await.is_err() {
                break;
            }
        }

        if !timing.live_mode {
            info!("Live mode off, stopping after first fetch");
            break;
        }
        sleep(Duration::from_secs(timing.poll_interval_secs)).await;
    }
}

fn run_snapshot(
    cli: &Cli,
    path: &Path,
    filters: FilterSet,
    clock: Arc<dyn Clock>,
) -> Result<(), Error> {
    let body = std::fs::read_to_string(path)?;
    let payload = OpportunitiesPayload::from_json(&body)?;
    info!(
        "Loaded {} raw opportunities from {}",
        payload.opportunities.len(),
        path.display()
    );

    let view = Pipeline::new(filters, clock).run(&payload);
    match &cli.plan {
        Some(id) => print_plan(&view, id),
        None => report_view(cli, &view),
    }
    Ok(())
}

fn report_view(cli: &Cli, view: &BoardView) {
    if cli.json {
        match serde_json::to_string_pretty(view) {
            Ok(body) => println!("{}", body),
            Err(e) => error!("Could not serialize view: {}", e),
        }
        return;
    }

    info!(
        "View #{} ({:?}, updated {}): total={} shown={} avg={:.2}% best={:.2}% markets={}",
        view.generation,
        view.source,
        view.last_update,
        view.stats.total_opportunities,
        view.visible.len(),
        view.stats.avg_profit,
        view.stats.best_profit,
        view.stats.total_markets
    );
    for (kind, count) in &view.stats.type_counts {
        info!("  {:<14} {}", kind.as_str(), count);
    }
    for opp in view.visible.iter().take(cli.limit) {
        info!(
            "  {:>6.2}% {:<13} {} | {} vs {} | expires {} | id={}",
            opp.profit_percent(),
            opp.arb_type.as_str(),
            opp.title.as_deref().unwrap_or(&opp.market1.question),
            opp.market1.exchange,
            opp.market2.exchange,
            format_time_to_expiry(opp.expires_at, view.generated_at),
            opp.id
        );
    }
}

fn print_plan(view: &BoardView, id: &str) {
    let Some(opp) = view
        .visible
        .iter()
        .find(|o| o.id == id)
        .or_else(|| view.find(id))
    else {
        error!("No opportunity with id {} in the current view", id);
        return;
    };

    println!(
        "{} [{}]",
        opp.title.as_deref().unwrap_or(&opp.market1.question),
        opp.arb_type
    );
    for line in &ExecutionPlan::new(opp) {
        println!("{}", line);
    }
    if !opp.execution_steps.is_empty() {
        println!();
        println!("Detector steps:");
        for step in &opp.execution_steps {
            println!("   {}", step);
        }
    }
    for warning in &opp.warnings {
        println!("WARNING: {}", warning);
    }
}
