//! Where a run's ordered listing ends up.

use crate::error::CrawlResult;
use crate::model::{OrderedEntry, OrderedOutput};
use chrono::NaiveDate;
use clap::ValueEnum;
use html_escape::decode_html_entities;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::error::Error;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Presentation collaborator of the run controller.
pub trait ListingSurface: Send {
    /// Drop whatever the previous run showed.
    fn clear_existing_listing(&mut self) -> CrawlResult<()>;

    /// Show the complete ordered listing in one pass.
    fn commit_ordered_listing(&mut self, output: &OrderedOutput) -> CrawlResult<()>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Rss,
    Json,
}

/// Category attached to RSS items that start a new day.
pub const DAY_SEPARATOR: &str = "day-separator";

// Cap text elements to avoid enormous feed entries (truncate with ellipsis)
const MAX_TEXT_LEN: usize = 4096;

/// Renders the listing to stdout or a file.
#[derive(Debug, Clone)]
pub struct OutputSurface {
    format: OutputFormat,
    path: Option<PathBuf>,
    feed_link: String,
}

impl OutputSurface {
    /// `path == None` writes to stdout. `feed_link` becomes the RSS channel link.
    pub fn new(format: OutputFormat, path: Option<PathBuf>, feed_link: impl Into<String>) -> Self {
        Self { format, path, feed_link: feed_link.into() }
    }

    fn render(&self, output: &OrderedOutput) -> CrawlResult<Vec<u8>> {
        match self.format {
            OutputFormat::Text => Ok(render_text(output).into_bytes()),
            OutputFormat::Rss => render_rss(&self.feed_link, output).map_err(|e| io::Error::other(e.to_string()).into()),
            OutputFormat::Json => {
                let mut out = serde_json::to_vec_pretty(output).map_err(io::Error::from)?;
                out.push(b'\n');
                Ok(out)
            }
        }
    }
}

impl ListingSurface for OutputSurface {
    fn clear_existing_listing(&mut self) -> CrawlResult<()> {
        if let Some(path) = &self.path {
            File::create(path)?;
            debug!(path = %path.display(), "cleared previous listing");
        }
        Ok(())
    }

    fn commit_ordered_listing(&mut self, output: &OrderedOutput) -> CrawlResult<()> {
        let bytes = self.render(output)?;
        match &self.path {
            Some(path) => write_atomically(path, &bytes)?,
            None => {
                let mut stdout = io::stdout().lock();
                stdout.write_all(&bytes)?;
                stdout.flush()?;
            }
        }
        Ok(())
    }
}

// Write to a sibling temp file first so readers never see a partial listing.
fn write_atomically(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut temp_path = path.as_os_str().to_owned();
    temp_path.push(".tmp");
    let temp_path = PathBuf::from(temp_path);

    let mut file = File::create(&temp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    fs::rename(&temp_path, path)
}

fn render_text(output: &OrderedOutput) -> String {
    let mut out = String::new();
    for entry in &output.entries {
        if entry.is_date_boundary {
            out.push_str(&"-".repeat(72));
            out.push('\n');
        }
        out.push_str(&format!("{}  {}\n", entry.date_key, describe(entry)));
        if let Some(link) = &entry.payload.link {
            out.push_str(&format!("            {link}\n"));
        }
    }
    out
}

// "Title | Company | Location", skipping the parts a card did not have.
fn describe(entry: &OrderedEntry) -> String {
    let listing = &entry.payload;
    let title = if listing.title.is_empty() { entry.identity.as_str() } else { listing.title.as_str() };
    [Some(title), listing.company.as_deref(), listing.location.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" | ")
}

fn write_text_element<W: Write>(w: &mut Writer<W>, name: &str, text: &str) -> Result<(), Box<dyn Error>> {
    w.write_event(Event::Start(BytesStart::new(name)))?;
    let mut s = sanitize_text(text);
    if s.len() > MAX_TEXT_LEN {
        let mut cut = MAX_TEXT_LEN;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
        s.push_str("… (truncated)");
    }
    w.write_event(Event::Text(BytesText::new(&s)))?;
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

// Decode HTML entities once and strip disallowed XML control characters.
fn sanitize_text(input: &str) -> String {
    decode_html_entities(input)
        .chars()
        .filter(|&c| matches!(c, '\t' | '\n' | '\r') || c as u32 >= 0x20)
        .collect()
}

// RFC-2822 pubDate for a YYYY-MM-DD key; the raw key if it does not parse.
fn format_pub_date(date_key: &str) -> String {
    NaiveDate::parse_from_str(date_key, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().to_rfc2822())
        .unwrap_or_else(|| date_key.to_string())
}

fn render_rss(feed_link: &str, output: &OrderedOutput) -> Result<Vec<u8>, Box<dyn Error>> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut rss_start = BytesStart::new("rss");
    rss_start.push_attribute(("version", "2.0"));
    writer.write_event(Event::Start(rss_start))?;
    writer.write_event(Event::Start(BytesStart::new("channel")))?;
    write_text_element(&mut writer, "title", "Job listings")?;
    write_text_element(&mut writer, "link", feed_link)?;
    write_text_element(&mut writer, "description", "Generated by jobcrawl")?;

    for entry in &output.entries {
        writer.write_event(Event::Start(BytesStart::new("item")))?;
        write_text_element(&mut writer, "title", &describe(entry))?;
        if let Some(link) = &entry.payload.link {
            write_text_element(&mut writer, "link", link)?;
        }
        let mut guid = BytesStart::new("guid");
        guid.push_attribute(("isPermaLink", "false"));
        writer.write_event(Event::Start(guid))?;
        writer.write_event(Event::Text(BytesText::new(&sanitize_text(&entry.identity))))?;
        writer.write_event(Event::End(BytesEnd::new("guid")))?;
        write_text_element(&mut writer, "pubDate", &format_pub_date(&entry.date_key))?;
        if entry.is_date_boundary {
            write_text_element(&mut writer, "category", DAY_SEPARATOR)?;
        }
        if let Some(logo) = &entry.payload.logo {
            let mut enc = BytesStart::new("enclosure");
            enc.push_attribute(("url", logo.as_str()));
            writer.write_event(Event::Empty(enc))?;
        }
        writer.write_event(Event::End(BytesEnd::new("item")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("channel")))?;
    writer.write_event(Event::End(BytesEnd::new("rss")))?;

    let mut out = writer.into_inner();
    out.push(b'\n');
    Ok(out)
}
