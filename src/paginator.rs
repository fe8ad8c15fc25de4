//! Page-by-page traversal of one query.

use crate::error::CrawlResult;
use crate::fetcher::PageFetcher;
use crate::filter::FilterPolicy;
use crate::model::{PageResult, Query};
use clap::ValueEnum;
use std::iter::FusedIterator;
use tracing::{debug, warn};

/// When a crawl stops requesting further pages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Termination {
    /// Trust the page count declared on page 1 (one page when absent).
    #[default]
    IndexBound,
    /// Follow pages until one reports that "next" is disabled.
    Sentinel,
    /// Index-bound when page 1 declared a count, sentinel otherwise.
    Auto,
}

#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub filter: FilterPolicy,
    pub termination: Termination,
    /// Hard cap on pages requested per query.
    pub max_pages: u32,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self { filter: FilterPolicy::default(), termination: Termination::default(), max_pages: 50 }
    }
}

/// Lazily fetches the pages of one query, in order, one request at a time.
///
/// Yields each page with the item filter already applied. After the first
/// error the iterator is exhausted.
pub struct Paginator<'a> {
    fetcher: &'a dyn PageFetcher,
    query: &'a Query,
    options: &'a CrawlOptions,
    next_page: u32,
    declared_total: Option<u32>,
    finished: bool,
}

impl<'a> Paginator<'a> {
    pub fn new(fetcher: &'a dyn PageFetcher, query: &'a Query, options: &'a CrawlOptions) -> Self {
        Self { fetcher, query, options, next_page: 1, declared_total: None, finished: false }
    }

    fn has_more(&self, page_index: u32, page: &PageResult) -> bool {
        let index_bound = || page_index < self.declared_total.unwrap_or(1);
        match self.options.termination {
            Termination::IndexBound => index_bound(),
            Termination::Sentinel => !page.is_last_page,
            Termination::Auto if self.declared_total.is_some() => index_bound(),
            Termination::Auto => !page.is_last_page,
        }
    }
}

impl Iterator for Paginator<'_> {
    type Item = CrawlResult<PageResult>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let page_index = self.next_page;
        let mut page = match self.fetcher.fetch(self.query, page_index) {
            Ok(page) => page,
            Err(e) => {
                self.finished = true;
                return Some(Err(e));
            }
        };

        if page_index == 1 {
            self.declared_total = page.total_pages;
        }

        if !self.has_more(page_index, &page) {
            self.finished = true;
        } else if page_index >= self.options.max_pages {
            warn!(
                query = %self.query,
                max_pages = self.options.max_pages,
                "page cap reached, remaining pages are skipped"
            );
            self.finished = true;
        }
        self.next_page = page_index + 1;

        let fetched = page.items.len();
        let filter = self.options.filter;
        page.items.retain(|item| filter.is_genuine_item(item));
        if page.items.len() != fetched {
            debug!(
                query = %self.query,
                page = page_index,
                dropped = fetched - page.items.len(),
                "filtered non-listing entries"
            );
        }

        Some(Ok(page))
    }
}

impl FusedIterator for Paginator<'_> {}
