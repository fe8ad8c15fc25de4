//! One crawl run from trigger to commit, at most one at a time.

use crate::aggregate::aggregate;
use crate::error::{CrawlError, CrawlResult};
use crate::fetcher::PageFetcher;
use crate::model::{OrderedOutput, Query};
use crate::order::order;
use crate::paginator::{CrawlOptions, Paginator};
use crate::surface::ListingSurface;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{error, info, warn};

/// Supplies the ordered queries for a run; read once at the start of each run.
pub trait QuerySource: Send + Sync {
    fn queries(&self) -> CrawlResult<Vec<Query>>;
}

/// Receives the failure of a run. Not part of control flow.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, error: &CrawlError);
}

/// Logs failures as structured `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, error: &CrawlError) {
        error!(kind = error.kind(), error = %error, "crawl run failed");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Another run was in progress; nothing happened.
    Skipped,
    Committed { listings: usize },
    Failed,
}

pub struct RunController {
    fetcher: Box<dyn PageFetcher>,
    queries: Box<dyn QuerySource>,
    surface: Mutex<Box<dyn ListingSurface>>,
    sink: Box<dyn DiagnosticSink>,
    options: CrawlOptions,
    state: Mutex<RunState>,
}

// Puts the controller back to Idle however the run ends.
struct RunGuard<'a> {
    state: &'a Mutex<RunState>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        *lock(self.state) = RunState::Idle;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RunController {
    pub fn new(
        fetcher: Box<dyn PageFetcher>,
        queries: Box<dyn QuerySource>,
        surface: Box<dyn ListingSurface>,
        sink: Box<dyn DiagnosticSink>,
        options: CrawlOptions,
    ) -> Self {
        Self {
            fetcher,
            queries,
            surface: Mutex::new(surface),
            sink,
            options,
            state: Mutex::new(RunState::Idle),
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> RunState {
        *lock(&self.state)
    }

    fn try_begin(&self) -> Option<RunGuard<'_>> {
        let mut state = lock(&self.state);
        if *state == RunState::Running {
            return None;
        }
        *state = RunState::Running;
        Some(RunGuard { state: &self.state })
    }

    /// Run the whole pipeline once.
    ///
    /// A call made while another run is in progress returns
    /// [`RunOutcome::Skipped`] immediately. On failure the surface stays
    /// cleared and the error goes to the diagnostic sink.
    pub fn run_once(&self) -> RunOutcome {
        let Some(_guard) = self.try_begin() else {
            info!("crawl run already in progress, trigger ignored");
            return RunOutcome::Skipped;
        };

        let started = Instant::now();
        let mut surface = lock(&self.surface);
        let result = surface
            .clear_existing_listing()
            .and_then(|()| self.collect())
            .and_then(|output| {
                if output.is_empty() {
                    warn!("no listings found");
                }
                surface.commit_ordered_listing(&output).map(|()| output.len())
            });

        match result {
            Ok(listings) => {
                info!(listings, elapsed_ms = started.elapsed().as_millis() as u64, "crawl run committed");
                RunOutcome::Committed { listings }
            }
            Err(e) => {
                self.sink.report(&e);
                RunOutcome::Failed
            }
        }
    }

    /// Crawl every query in order and order the merged result.
    fn collect(&self) -> CrawlResult<OrderedOutput> {
        let queries = self.queries.queries()?;
        info!(searches = queries.len(), "crawl run started");

        let batches = queries
            .iter()
            .flat_map(|query| Paginator::new(self.fetcher.as_ref(), query, &self.options))
            .map(|page| page.map(|page| page.items));

        Ok(order(aggregate(batches)?))
    }
}
