use serde::Serialize;
use std::fmt;

/// One search to run: a job term inside a region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub region: String,
    pub term: String,
}

impl Query {
    pub fn new(region: impl Into<String>, term: impl Into<String>) -> Self {
        Self { region: region.into(), term: term.into() }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}", self.term, self.region)
    }
}

/// The part of a listing card that is forwarded to the output untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Listing {
    pub title: String,
    pub link: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub logo: Option<String>,
}

/// A listing card as it came off a results page, before any filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawItem {
    /// `data-id` of the card; missing on separators and ads.
    pub identity: Option<String>,
    /// Date text including its three-character prefix, e.g. `"am 01.02.2024"`.
    pub date_text: Option<String>,
    pub is_active: bool,
    /// Class list of the card container.
    pub structure_tag: Vec<String>,
    pub payload: Listing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatedItem {
    pub identity: String,
    /// Midnight UTC of the listing date, in epoch milliseconds.
    pub sort_key: i64,
    /// `YYYY-MM-DD`.
    pub date_key: String,
    pub payload: Listing,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageResult {
    pub items: Vec<RawItem>,
    pub is_last_page: bool,
    /// Only reported by page 1.
    pub total_pages: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderedEntry {
    #[serde(rename = "id")]
    pub identity: String,
    #[serde(rename = "date")]
    pub date_key: String,
    #[serde(rename = "day_separator")]
    pub is_date_boundary: bool,
    #[serde(rename = "listing")]
    pub payload: Listing,
}

/// Final listing order of one run, newest date first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct OrderedOutput {
    pub entries: Vec<OrderedEntry>,
}

impl OrderedOutput {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
