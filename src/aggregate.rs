//! Merging of page batches from every query into one deduplicated, dated set.

use crate::error::{CrawlError, CrawlResult};
use crate::model::{DatedItem, RawItem};
use chrono::NaiveDate;
use std::collections::HashSet;
use tracing::{debug, trace};

/// Length of the text in front of the date, e.g. `"am "`.
pub const DATE_PREFIX_LEN: usize = 3;

/// Collects listings across all queries of one run.
///
/// Batches must be pushed in query order and, within a query, in page order:
/// the first occurrence of an identity wins.
#[derive(Debug, Default)]
pub struct Aggregator {
    seen: HashSet<String>,
    items: Vec<DatedItem>,
    inactive: usize,
    duplicates: usize,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_batch(&mut self, batch: Vec<RawItem>) -> CrawlResult<()> {
        for item in batch {
            if !item.is_active {
                self.inactive += 1;
                trace!(identity = ?item.identity, "skipping inactive listing");
                continue;
            }

            let identity = item
                .identity
                .ok_or_else(|| CrawlError::parse(format!("listing {:?} has no identity", item.payload.title)))?;
            if self.seen.contains(&identity) {
                self.duplicates += 1;
                continue;
            }

            let date_text = item
                .date_text
                .ok_or_else(|| CrawlError::parse(format!("listing {identity} has no date")))?;
            let (date_key, sort_key) = parse_listing_date(&date_text).map_err(|e| match e {
                CrawlError::Parse(msg) => CrawlError::parse(format!("listing {identity}: {msg}")),
                other => other,
            })?;

            self.seen.insert(identity.clone());
            self.items.push(DatedItem { identity, sort_key, date_key, payload: item.payload });
        }
        Ok(())
    }

    /// Listings in encounter order.
    pub fn finish(self) -> Vec<DatedItem> {
        debug!(
            kept = self.items.len(),
            duplicates = self.duplicates,
            inactive = self.inactive,
            "aggregated listings"
        );
        self.items
    }
}

/// Drain `batches` into one deduplicated set, stopping at the first error.
///
/// Batches are consumed one at a time as they are produced.
pub fn aggregate<I>(batches: I) -> CrawlResult<Vec<DatedItem>>
where
    I: IntoIterator<Item = CrawlResult<Vec<RawItem>>>,
{
    let mut aggregator = Aggregator::new();
    for batch in batches {
        aggregator.push_batch(batch?)?;
    }
    Ok(aggregator.finish())
}

/// Parse `"am 01.02.2024"` into `("2024-02-01", epoch millis of that UTC midnight)`.
///
/// The first [`DATE_PREFIX_LEN`] characters are dropped unseen and the rest is
/// read as `day.month.year`; anything else is a parse error.
pub fn parse_listing_date(text: &str) -> CrawlResult<(String, i64)> {
    let rest = text
        .char_indices()
        .nth(DATE_PREFIX_LEN)
        .map_or("", |(idx, _)| &text[idx..]);

    let mut parts = rest.split('.');
    let (Some(day), Some(month), Some(year)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(CrawlError::parse(format!("date {text:?} is not day.month.year")));
    };

    let invalid = || CrawlError::parse(format!("date {text:?} is not a calendar date"));
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    let day: u32 = day.parse().map_err(|_| invalid())?;
    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)?;

    let sort_key = date.and_hms_opt(0, 0, 0).ok_or_else(invalid)?.and_utc().timestamp_millis();
    Ok((date.format("%Y-%m-%d").to_string(), sort_key))
}
