//! Fakes shared by the unit tests.

use crate::controller::{DiagnosticSink, QuerySource};
use crate::error::{CrawlError, CrawlResult};
use crate::fetcher::PageFetcher;
use crate::model::{Listing, OrderedOutput, PageResult, Query, RawItem};
use crate::surface::ListingSurface;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type PageKey = (String, String, u32);

pub fn card(id: &str, date_text: &str) -> RawItem {
    RawItem {
        identity: Some(id.to_string()),
        date_text: Some(date_text.to_string()),
        is_active: true,
        structure_tag: vec!["m-jobsList__item".to_string()],
        payload: Listing { title: format!("Job {id}"), ..Listing::default() },
    }
}

/// Serves pre-recorded pages keyed by (region, term, page).
#[derive(Default)]
pub struct ScriptedFetcher {
    pages: HashMap<PageKey, PageResult>,
    failures: Mutex<HashMap<PageKey, CrawlError>>,
    requests: Mutex<Vec<PageKey>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(
        mut self,
        region: &str,
        term: &str,
        page_index: u32,
        items: Vec<RawItem>,
        total_pages: Option<u32>,
        is_last_page: bool,
    ) -> Self {
        self.pages.insert(
            (region.to_string(), term.to_string(), page_index),
            PageResult { items, is_last_page, total_pages },
        );
        self
    }

    /// The page fails once with `error`.
    pub fn failing(self, region: &str, term: &str, page_index: u32, error: CrawlError) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert((region.to_string(), term.to_string(), page_index), error);
        self
    }

    /// Every fetch issued so far, as (region, term, page).
    pub fn requests(&self) -> Vec<PageKey> {
        self.requests.lock().unwrap().clone()
    }
}

impl PageFetcher for ScriptedFetcher {
    fn fetch(&self, query: &Query, page_index: u32) -> CrawlResult<PageResult> {
        let key = (query.region.clone(), query.term.clone(), page_index);
        self.requests.lock().unwrap().push(key.clone());
        if let Some(error) = self.failures.lock().unwrap().remove(&key) {
            return Err(error);
        }
        self.pages
            .get(&key)
            .cloned()
            .ok_or_else(|| CrawlError::network(format!("{key:?}"), "unscripted page"))
    }
}

pub struct FixedQueries(pub Vec<Query>);

impl QuerySource for FixedQueries {
    fn queries(&self) -> CrawlResult<Vec<Query>> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    Cleared,
    Committed(OrderedOutput),
}

/// Records clear/commit calls; clones share the same log.
#[derive(Clone, Default)]
pub struct RecordingSurface {
    events: Arc<Mutex<Vec<SurfaceEvent>>>,
}

impl RecordingSurface {
    pub fn events(&self) -> Vec<SurfaceEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ListingSurface for RecordingSurface {
    fn clear_existing_listing(&mut self) -> CrawlResult<()> {
        self.events.lock().unwrap().push(SurfaceEvent::Cleared);
        Ok(())
    }

    fn commit_ordered_listing(&mut self, output: &OrderedOutput) -> CrawlResult<()> {
        self.events.lock().unwrap().push(SurfaceEvent::Committed(output.clone()));
        Ok(())
    }
}

/// Keeps the kind of every reported failure.
#[derive(Clone, Default)]
pub struct RecordingSink {
    reports: Arc<Mutex<Vec<&'static str>>>,
}

impl RecordingSink {
    pub fn reports(&self) -> Vec<&'static str> {
        self.reports.lock().unwrap().clone()
    }
}

impl DiagnosticSink for RecordingSink {
    fn report(&self, error: &CrawlError) {
        self.reports.lock().unwrap().push(error.kind());
    }
}
