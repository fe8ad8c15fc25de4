//! Parsing of one job-search results page.
//!
//! Pure over the HTML body so it can be exercised without the network. The
//! fetcher hands every response body through [`ListingParser::parse_page`].

use crate::error::{CrawlError, CrawlResult};
use crate::model::{Listing, PageResult, RawItem};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use unicode_normalization::UnicodeNormalization;
use url::Url;

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// Class the first child of a card carries when the posting has expired.
pub const INACTIVE_CLASS: &str = "m-jobsListItem--inactive";

/// CSS selectors describing the results page layout.
#[derive(Debug, Clone)]
pub struct ListingSelectors {
    pub item: String,
    pub date: String,
    pub title_link: String,
    pub company: String,
    pub location: String,
    pub logo: String,
    pub pagination_meta: String,
    pub next_page: String,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            item: ".m-jobsList__item".to_string(),
            date: ".m-jobsListItem__date".to_string(),
            title_link: ".m-jobsListItem__titleLink".to_string(),
            company: ".m-jobsListItem__companyName".to_string(),
            location: ".m-jobsListItem__location".to_string(),
            logo: ".m-jobsListItem__logo".to_string(),
            pagination_meta: ".m-pagination__meta".to_string(),
            next_page: ".m-pagination__button--next".to_string(),
        }
    }
}

pub struct ListingParser {
    item: Selector,
    date: Selector,
    title_link: Selector,
    company: Selector,
    location: Selector,
    logo: Selector,
    pagination_meta: Selector,
    next_page: Selector,
}

impl ListingParser {
    pub fn new(selectors: &ListingSelectors) -> CrawlResult<Self> {
        Ok(Self {
            item: compile(&selectors.item)?,
            date: compile(&selectors.date)?,
            title_link: compile(&selectors.title_link)?,
            company: compile(&selectors.company)?,
            location: compile(&selectors.location)?,
            logo: compile(&selectors.logo)?,
            pagination_meta: compile(&selectors.pagination_meta)?,
            next_page: compile(&selectors.next_page)?,
        })
    }

    /// Turn a results page body into a [`PageResult`].
    ///
    /// Only page 1 reports `total_pages`, and only when it carries a
    /// pagination summary. Later pages and summary-less pages leave it `None`.
    pub fn parse_page(&self, body: &str, page_url: &Url, page_index: u32) -> CrawlResult<PageResult> {
        let document = Html::parse_document(body);

        let items = document
            .select(&self.item)
            .map(|card| self.extract_item(card, page_url))
            .collect();

        let total_pages = if page_index == 1 { self.total_pages(&document)? } else { None };

        Ok(PageResult { items, is_last_page: self.next_disabled(&document), total_pages })
    }

    fn extract_item(&self, card: ElementRef, page_url: &Url) -> RawItem {
        let structure_tag = card.value().classes().map(str::to_owned).collect();

        let first = card.children().find_map(ElementRef::wrap);
        let identity = first
            .and_then(|el| el.value().attr("data-id"))
            .map(str::to_owned);
        let is_active = first.map_or(true, |el| !el.value().classes().any(|c| c == INACTIVE_CLASS));

        let date_text = card.select(&self.date).next().map(|el| element_text(&el).trim().to_string());

        let title_el = card.select(&self.title_link).next();
        let title = title_el.map(|el| clean_text(&element_text(&el))).unwrap_or_default();
        let link = title_el
            .and_then(|el| el.value().attr("href"))
            .and_then(|href| resolve_url(page_url, href));

        let company = self.optional_text(card, &self.company);
        let location = self.optional_text(card, &self.location);

        // Logos are lazy-loaded; the real source sits in data-latesrc until scrolled into view.
        let logo = card.select(&self.logo).next().and_then(|img| {
            img.value()
                .attr("data-latesrc")
                .or_else(|| img.value().attr("src"))
                .and_then(|src| resolve_url(page_url, src))
        });

        RawItem {
            identity,
            date_text,
            is_active,
            structure_tag,
            payload: Listing { title, link, company, location, logo },
        }
    }

    fn optional_text(&self, card: ElementRef, selector: &Selector) -> Option<String> {
        card.select(selector)
            .next()
            .map(|el| clean_text(&element_text(&el)))
            .filter(|s| !s.is_empty())
    }

    /// Page count from a summary like `"1 von 12"`: the third token.
    fn total_pages(&self, document: &Html) -> CrawlResult<Option<u32>> {
        let Some(meta) = document.select(&self.pagination_meta).next() else {
            return Ok(None);
        };
        let text = element_text(&meta);
        let token = text.split_whitespace().nth(2).ok_or_else(|| {
            CrawlError::parse(format!("pagination summary has no page count: {:?}", text.trim()))
        })?;
        token
            .parse::<u32>()
            .map(Some)
            .map_err(|e| CrawlError::parse(format!("pagination page count {token:?}: {e}")))
    }

    fn next_disabled(&self, document: &Html) -> bool {
        match document.select(&self.next_page).next() {
            None => true,
            Some(next) => {
                let el = next.value();
                el.attr("disabled").is_some()
                    || el.attr("aria-disabled") == Some("true")
                    || el.classes().any(|c| c.ends_with("--disabled"))
            }
        }
    }
}

fn compile(selector: &str) -> CrawlResult<Selector> {
    Selector::parse(selector).map_err(|e| CrawlError::parse(format!("invalid selector '{selector}': {e}")))
}

fn element_text(el: &ElementRef) -> String {
    el.text().collect::<String>()
}

/// NFKC-normalize and collapse whitespace.
pub fn clean_text(s: &str) -> String {
    let out = s.nfkc().collect::<String>().replace('\u{00A0}', " ");
    RE_WHITESPACE.replace_all(&out, " ").trim().to_string()
}

// Resolve possibly relative hrefs against the page they were found on.
fn resolve_url(base: &Url, s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    base.join(s).ok().map(String::from)
}
