use crate::model::RawItem;
use clap::ValueEnum;

/// How strictly result-page entries are screened before aggregation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum FilterPolicy {
    /// Keep every entry; only inactive listings are dropped (by the aggregator).
    Minimal,
    /// Keep only plain cards: exactly one class on the container. Ads and
    /// separators carry modifier classes.
    #[default]
    Structural,
}

impl FilterPolicy {
    pub fn is_genuine_item(self, candidate: &RawItem) -> bool {
        match self {
            Self::Minimal => true,
            Self::Structural => candidate.structure_tag.len() == 1,
        }
    }
}
