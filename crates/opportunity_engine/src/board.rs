//! Opportunity board: serializes pipeline runs and publishes complete views.
//!
//! Producers (feed poller, push channel, cache loader, filter changes) send
//! `BoardUpdate`s over one mpsc channel. A single consumer task runs the whole
//! pipeline for each update and only then swaps the published view, so a
//! reader never sees a half-built view or a mix of two payloads.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{Error, OpportunitiesPayload};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::{self, JoinHandle};
use tracing::{debug, info, warn};

use crate::cache::{CachedSnapshot, SnapshotCache};
use crate::clock::Clock;
use crate::dedup::{dedupe, sort_by_profit_desc};
use crate::filter::{self, FilterSet};
use crate::model::CanonicalOpportunity;
use crate::normalize::normalize_all;
use crate::stats::{aggregate, OpportunityStats};

const UPDATE_QUEUE_DEPTH: usize = 32;

// ── Pipeline ──────────────────────────────────────────────────────────

/// Where the canonical set of a view came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewSource {
    Empty,
    Feed,
    Cache,
}

/// One complete pipeline result.
#[derive(Debug, Clone, Serialize)]
pub struct BoardView {
    /// Every normalized opportunity, in feed order. Stats are computed here.
    pub canonical: Vec<CanonicalOpportunity>,
    /// Deduplicated, filtered and sorted for display.
    pub visible: Vec<CanonicalOpportunity>,
    pub stats: OpportunityStats,
    pub filters: FilterSet,
    pub source: ViewSource,
    /// Payload timestamp, or the time the view was built.
    pub last_update: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    /// Number of views published before this one.
    pub generation: u64,
}

impl BoardView {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            canonical: Vec::new(),
            visible: Vec::new(),
            stats: OpportunityStats::default(),
            filters: FilterSet::default(),
            source: ViewSource::Empty,
            last_update: now,
            generated_at: now,
            generation: 0,
        }
    }

    pub fn find(&self, id: &str) -> Option<&CanonicalOpportunity> {
        self.canonical.iter().find(|o| o.id == id)
    }
}

/// Synchronous pipeline: normalize, dedupe, filter/sort, aggregate.
pub struct Pipeline {
    filters: FilterSet,
    clock: Arc<dyn Clock>,
}

impl Pipeline {
    pub fn new(filters: FilterSet, clock: Arc<dyn Clock>) -> Self {
        Self { filters, clock }
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn set_filters(&mut self, filters: FilterSet) {
        self.filters = filters;
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Full run over a fresh payload.
    pub fn run(&self, payload: &OpportunitiesPayload) -> BoardView {
        let canonical = normalize_all(&payload.opportunities);
        self.present(canonical, payload.last_update, ViewSource::Feed)
    }

    /// Everything after normalization.
    pub fn present(
        &self,
        canonical: Vec<CanonicalOpportunity>,
        last_update: Option<DateTime<Utc>>,
        source: ViewSource,
    ) -> BoardView {
        let now = self.clock.now();

        // One profit sort before dedup; nothing re-sorts a subset afterwards.
        let mut ranked = canonical.clone();
        sort_by_profit_desc(&mut ranked);
        let unique = dedupe(&ranked);
        let visible = filter::apply(&unique, &self.filters, self.clock.as_ref());

        debug!(
            "pipeline: {} canonical, {} unique, {} visible",
            canonical.len(),
            unique.len(),
            visible.len()
        );

        BoardView {
            stats: aggregate(&canonical),
            canonical,
            visible,
            filters: self.filters.clone(),
            source,
            last_update: last_update.unwrap_or(now),
            generated_at: now,
            generation: 0,
        }
    }
}

// ── Board ─────────────────────────────────────────────────────────────

/// Input to the board.
#[derive(Debug, Clone)]
pub enum BoardUpdate {
    /// A fresh payload from a poll or a push. Replaces the current set.
    Raw(OpportunitiesPayload),
    /// A previously cached canonical set.
    Cached(CachedSnapshot),
    /// New filter state; re-runs filter/sort over the current set.
    Filters(FilterSet),
}

pub struct OpportunityBoard {
    tx: mpsc::Sender<BoardUpdate>,
    view_rx: watch::Receiver<Arc<BoardView>>,
    task: JoinHandle<()>,
}

impl OpportunityBoard {
    /// Start the consumer task. Fresh feed results are written to `cache`
    /// when one is given.
    pub fn spawn(pipeline: Pipeline, cache: Option<Arc<dyn SnapshotCache>>) -> Self {
        let (tx, rx) = mpsc::channel(UPDATE_QUEUE_DEPTH);
        let (view_tx, view_rx) = watch::channel(Arc::new(BoardView::empty(pipeline.now())));
        let task = tokio::spawn(run_consumer(pipeline, rx, view_tx, cache));
        Self { tx, view_rx, task }
    }

    /// A sender for producers running in their own tasks.
    pub fn sender(&self) -> mpsc::Sender<BoardUpdate> {
        self.tx.clone()
    }

    pub async fn submit(&self, update: BoardUpdate) -> common::Result<()> {
        self.tx
            .send(update)
            .await
            .map_err(|_| Error::Other("opportunity board has stopped".into()))
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<BoardView>> {
        self.view_rx.clone()
    }

    /// The latest published view.
    pub fn current(&self) -> Arc<BoardView> {
        self.view_rx.borrow().clone()
    }

    /// Stop accepting updates and wait for queued ones to finish.
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.task.await {
            warn!("Board task ended abnormally: {}", e);
        }
    }
}

async fn run_consumer(
    mut pipeline: Pipeline,
    mut rx: mpsc::Receiver<BoardUpdate>,
    view_tx: watch::Sender<Arc<BoardView>>,
    cache: Option<Arc<dyn SnapshotCache>>,
) {
    let mut generation: u64 = 0;

    while let Some(update) = rx.recv().await {
        let mut pending_store = None;
        let mut view = match update {
            BoardUpdate::Raw(payload) => {
                let view = pipeline.run(&payload);
                if cache.is_some() {
                    pending_store =
                        Some(CachedSnapshot::new(view.canonical.clone(), view.generated_at));
                }
                view
            }
            BoardUpdate::Cached(snapshot) => {
                pipeline.present(snapshot.opportunities, Some(snapshot.cached_at), ViewSource::Cache)
            }
            BoardUpdate::Filters(filters) => {
                pipeline.set_filters(filters);
                let current = view_tx.borrow().clone();
                pipeline.present(
                    current.canonical.clone(),
                    Some(current.last_update),
                    current.source,
                )
            }
        };

        generation += 1;
        view.generation = generation;
        info!(
            "Board view #{}: {} opportunities ({} shown), best {:.2}%, avg {:.2}%, {} markets [{:?}]",
            generation,
            view.stats.total_opportunities,
            view.visible.len(),
            view.stats.best_profit,
            view.stats.avg_profit,
            view.stats.total_markets,
            view.source
        );
        view_tx.send_replace(Arc::new(view));

        // Published before the write so a slow disk never delays readers.
        if let (Some(cache), Some(snapshot)) = (&cache, pending_store) {
            store_snapshot(cache.clone(), snapshot).await;
        }
    }

    debug!("board update channel closed");
}

/// Cache adapters do blocking I/O; keep it off the async workers.
async fn store_snapshot(cache: Arc<dyn SnapshotCache>, snapshot: CachedSnapshot) {
    match task::spawn_blocking(move || cache.store(&snapshot)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Snapshot cache write failed: {}", e),
        Err(e) => warn!("Snapshot cache write aborted: {}", e),
    }
}
