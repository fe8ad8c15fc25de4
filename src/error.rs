use thiserror::Error;

/// Everything that can abort a crawl run.
///
/// Duplicate listings are not errors; the aggregator drops them silently.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// Transport failure, timeout or non-2xx status while fetching a page.
    #[error("network error fetching {url}: {reason}")]
    Network { url: String, reason: String },

    /// The response or one of its listings does not have the expected shape.
    #[error("parse error: {0}")]
    Parse(String),

    /// The key-value store holding the search terms could not be read or written.
    #[error("settings error: {0}")]
    Settings(String),

    #[error("output error: {0}")]
    Output(#[from] std::io::Error),
}

impl CrawlError {
    pub fn network(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Network { url: url.into(), reason: reason.to_string() }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Stable name used in diagnostic reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network { .. } => "NetworkError",
            Self::Parse(_) => "ParseError",
            Self::Settings(_) => "SettingsError",
            Self::Output(_) => "OutputError",
        }
    }
}

pub type CrawlResult<T> = Result<T, CrawlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_match_report_names() {
        assert_eq!(CrawlError::network("https://x", "timeout").kind(), "NetworkError");
        assert_eq!(CrawlError::parse("bad date").kind(), "ParseError");
        assert_eq!(CrawlError::Settings("gone".into()).kind(), "SettingsError");
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        assert_eq!(CrawlError::from(io).kind(), "OutputError");
    }

    #[test]
    fn network_message_names_the_url() {
        let err = CrawlError::network("https://example.test/jobs", "HTTP 503");
        assert_eq!(err.to_string(), "network error fetching https://example.test/jobs: HTTP 503");
    }
}
