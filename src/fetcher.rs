use crate::error::{CrawlError, CrawlResult};
use crate::listing::{ListingParser, ListingSelectors};
use crate::model::{PageResult, Query};
use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONNECTION, CONTENT_TYPE, COOKIE, USER_AGENT};
use std::ops::RangeInclusive;
use std::thread::sleep;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Retrieves one results page for a query.
///
/// Implementations perform exactly one request per call. Callers never issue
/// two fetches at the same time.
pub trait PageFetcher: Send + Sync {
    fn fetch(&self, query: &Query, page_index: u32) -> CrawlResult<PageResult>;
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub base_url: Url,
    pub timeout: Duration,
    /// Randomized pause before every request, in milliseconds.
    pub delay_ms: RangeInclusive<u64>,
    /// Session cookie header sent with every request.
    pub cookie: Option<String>,
    pub selectors: ListingSelectors,
}

/// Fetches results pages over HTTP with browser-like headers.
pub struct HttpFetcher {
    client: Client,
    config: FetchConfig,
    parser: ListingParser,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> CrawlResult<Self> {
        if config.base_url.cannot_be_a_base() {
            return Err(CrawlError::parse(format!("base URL cannot carry a path: {}", config.base_url)));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .cookie_store(true)
            .build()
            .map_err(|e| CrawlError::network(config.base_url.as_str(), e))?;
        let parser = ListingParser::new(&config.selectors)?;
        Ok(Self { client, config, parser })
    }

    fn get_text_with_headers(&self, url: &Url) -> CrawlResult<String> {
        pace(&self.config.delay_ms);

        let mut request = self
            .client
            .get(url.as_str())
            .header(USER_AGENT, pick_user_agent())
            .header(ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header(ACCEPT_LANGUAGE, "de-AT,de;q=0.9,en-US;q=0.8,en;q=0.7")
            .header(CONNECTION, "keep-alive");
        if let Some(cookie) = &self.config.cookie {
            request = request.header(COOKIE, cookie.as_str());
        }

        let resp = request.send().map_err(|e| CrawlError::network(url.as_str(), e))?;
        if !resp.status().is_success() {
            return Err(CrawlError::network(url.as_str(), format!("HTTP error: {}", resp.status())));
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();
        if !content_type.is_empty() && !content_type.contains("html") {
            return Err(CrawlError::parse(format!("{url} returned {content_type}, expected HTML")));
        }

        resp.text()
            .map_err(|e| CrawlError::parse(format!("unreadable body from {url}: {e}")))
    }
}

impl PageFetcher for HttpFetcher {
    fn fetch(&self, query: &Query, page_index: u32) -> CrawlResult<PageResult> {
        let url = listing_url(&self.config.base_url, query, page_index)?;
        info!(job = %query.term, region = %query.region, page = page_index, "fetching listing page");

        let body = self.get_text_with_headers(&url)?;
        let page = self.parser.parse_page(&body, &url, page_index)?;
        debug!(
            %url,
            items = page.items.len(),
            total_pages = ?page.total_pages,
            last = page.is_last_page,
            "parsed listing page"
        );
        Ok(page)
    }
}

/// `{base}/jobs/{term}/{region}`, with `?page=i` from the second page on.
pub fn listing_url(base: &Url, query: &Query, page_index: u32) -> CrawlResult<Url> {
    let mut url = base.clone();
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|()| CrawlError::parse(format!("base URL cannot carry a path: {base}")))?;
        segments.pop_if_empty().extend(["jobs", query.term.as_str(), query.region.as_str()]);
    }
    if page_index > 1 {
        url.query_pairs_mut().append_pair("page", &page_index.to_string());
    }
    Ok(url)
}

// Pick a random common browser user-agent string
fn pick_user_agent() -> &'static str {
    const AGENTS: [&str; 5] = [
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/117.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_6) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.6 Safari/605.1.15",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0",
        "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1",
    ];
    AGENTS.choose(&mut thread_rng()).copied().unwrap_or(AGENTS[0])
}

// Sleep a randomized amount so consecutive page requests are spaced out
fn pace(delay_ms: &RangeInclusive<u64>) {
    if delay_ms.is_empty() {
        return;
    }
    let ms = thread_rng().gen_range(delay_ms.clone());
    if ms > 0 {
        sleep(Duration::from_millis(ms));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    fn base() -> Url {
        Url::parse("https://www.karriere.at").unwrap()
    }

    #[test]
    fn first_page_has_no_page_parameter() {
        let url = listing_url(&base(), &Query::new("wien", "rust"), 1).unwrap();
        assert_eq!(url.as_str(), "https://www.karriere.at/jobs/rust/wien");
    }

    #[test]
    fn later_pages_add_page_parameter() {
        let url = listing_url(&base(), &Query::new("wien", "rust"), 3).unwrap();
        assert_eq!(url.as_str(), "https://www.karriere.at/jobs/rust/wien?page=3");
    }

    #[test]
    fn terms_are_percent_encoded() {
        let url = listing_url(&base(), &Query::new("nieder österreich", "c++ dev"), 1).unwrap();
        assert_eq!(url.path(), "/jobs/c++%20dev/nieder%20%C3%B6sterreich");
    }

    #[test]
    fn base_path_is_kept() {
        let base = Url::parse("http://localhost:8080/mirror/").unwrap();
        let url = listing_url(&base, &Query::new("graz", "go"), 2).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/mirror/jobs/go/graz?page=2");
    }

    #[test]
    fn user_agent_is_one_of_the_known_agents() {
        assert!(pick_user_agent().starts_with("Mozilla/5.0"));
    }

    #[test]
    fn zero_delay_does_not_sleep() {
        let started = std::time::Instant::now();
        pace(&(0..=0));
        assert!(started.elapsed() < Duration::from_millis(50));
    }

    // Answers a single request with `response` and hands back the raw request.
    fn serve_once(response: String) -> (Url, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = Url::parse(&format!("http://{}", listener.local_addr().unwrap())).unwrap();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            stream.write_all(response.as_bytes()).unwrap();
            stream.flush().unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });
        (url, handle)
    }

    fn response(status: &str, content_type: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    fn fetcher(base_url: Url, cookie: Option<&str>) -> HttpFetcher {
        HttpFetcher::new(FetchConfig {
            base_url,
            timeout: Duration::from_secs(5),
            delay_ms: 0..=0,
            cookie: cookie.map(str::to_owned),
            selectors: ListingSelectors::default(),
        })
        .unwrap()
    }

    #[test]
    fn server_error_status_is_a_network_error() {
        let (url, server) = serve_once(response("503 Service Unavailable", "text/html", ""));
        let err = fetcher(url, None).fetch(&Query::new("wien", "rust"), 1).unwrap_err();
        server.join().unwrap();

        assert_eq!(err.kind(), "NetworkError");
        assert!(err.to_string().contains("503"), "{err}");
    }

    #[test]
    fn non_html_body_is_a_parse_error() {
        let (url, server) = serve_once(response("200 OK", "application/json", "{}"));
        let err = fetcher(url, None).fetch(&Query::new("wien", "rust"), 1).unwrap_err();
        server.join().unwrap();

        assert_eq!(err.kind(), "ParseError");
    }

    #[test]
    fn cookie_is_sent_and_page_is_parsed() {
        let body = r#"<ol><li class="m-jobsList__item"><div data-id="42"><span class="m-jobsListItem__date">am 01.02.2024</span></div></li></ol>"#;
        let (url, server) = serve_once(response("200 OK", "text/html; charset=utf-8", body));
        let page = fetcher(url, Some("session=abc123"))
            .fetch(&Query::new("wien", "rust"), 2)
            .unwrap();
        let request = server.join().unwrap();

        assert!(request.starts_with("GET /jobs/rust/wien?page=2 HTTP/1.1"), "{request}");
        assert!(request.to_ascii_lowercase().contains("cookie: session=abc123"), "{request}");
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].identity.as_deref(), Some("42"));
        assert!(page.is_last_page);
    }
}
