mod aggregate;
mod controller;
mod error;
mod fetcher;
mod filter;
mod listing;
mod model;
mod order;
mod paginator;
mod settings;
mod surface;
#[cfg(test)]
mod testing;

use anyhow::{bail, Context};
use clap::{Args as ClapArgs, Parser, Subcommand};
use controller::{QuerySource, RunController, RunOutcome, TracingSink};
use fetcher::{FetchConfig, HttpFetcher};
use filter::FilterPolicy;
use listing::ListingSelectors;
use paginator::{CrawlOptions, Termination};
use settings::{SettingsStore, JOBS_KEY, REGION_KEY};
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use surface::{OutputFormat, OutputSurface};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

/// jobcrawl - collect job listings for several searches into one date-ordered list
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON file holding the configured job terms and regions
    #[arg(long, env = "JOBCRAWL_STORE", default_value = "jobcrawl.json", global = true)]
    store: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Change jobs to search (comma-separated list)
    SetJobs { jobs: String },
    /// Change region to search jobs in (comma-separated for several regions)
    SetRegion { region: String },
    /// Show the stored settings and the searches they produce
    Show,
    /// Search for jobs once
    Search(SearchArgs),
    /// Search periodically; every line on stdin triggers an extra search
    Watch {
        #[command(flatten)]
        search: SearchArgs,

        /// Seconds between scheduled searches
        #[arg(long = "interval-secs", default_value_t = 900)]
        interval_secs: u64,
    },
}

#[derive(ClapArgs, Debug, Clone)]
struct SearchArgs {
    /// Site the listing pages are fetched from
    #[arg(long = "base-url", default_value = "https://www.karriere.at")]
    base_url: String,

    /// Maximum number of pages to crawl per search (default: 50)
    #[arg(short = 'n', long = "max-pages", default_value_t = 50)]
    max_pages: u32,

    /// Timeout in milliseconds for network requests (default: 10000)
    #[arg(short = 't', long = "timeout-ms", default_value_t = 10000)]
    timeout_ms: u64,

    /// Which result entries count as listings
    #[arg(long, value_enum, default_value_t = FilterPolicy::Structural)]
    filter: FilterPolicy,

    /// When to stop requesting further pages of a search
    #[arg(long, value_enum, default_value_t = Termination::IndexBound)]
    termination: Termination,

    /// Lower bound of the pause before each request, in milliseconds
    #[arg(long = "min-delay-ms", default_value_t = 200)]
    min_delay_ms: u64,

    /// Upper bound of the pause before each request, in milliseconds
    #[arg(long = "max-delay-ms", default_value_t = 600)]
    max_delay_ms: u64,

    /// Cookie header sent with every request (logged-in session)
    #[arg(long, env = "JOBCRAWL_COOKIE", hide_env_values = true)]
    cookie: Option<String>,

    /// Output format of the listing
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Write the listing to this file instead of stdout
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,
}

fn main() {
    init_tracing();
    let args = Args::parse();

    match run(&args) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(4);
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(args: &Args) -> anyhow::Result<()> {
    let store = SettingsStore::open(&args.store);

    match &args.command {
        Command::SetJobs { jobs } => store.set(JOBS_KEY, jobs)?,
        Command::SetRegion { region } => store.set(REGION_KEY, region)?,
        Command::Show => show(&store)?,
        Command::Search(search) => {
            let controller = build_controller(store, search)?;
            match controller.run_once() {
                RunOutcome::Committed { .. } | RunOutcome::Skipped => {}
                RunOutcome::Failed => bail!("search failed, check the log above"),
            }
        }
        Command::Watch { search, interval_secs } => {
            let controller = Arc::new(build_controller(store, search)?);
            watch(controller, Duration::from_secs(*interval_secs));
        }
    }
    Ok(())
}

fn show(store: &SettingsStore) -> anyhow::Result<()> {
    println!("store:  {}", store.path().display());
    println!("jobs:   {}", store.get(JOBS_KEY)?);
    println!("region: {}", store.get(REGION_KEY)?);
    for (i, query) in store.queries()?.iter().enumerate() {
        println!("{:>3}. {query}", i + 1);
    }
    Ok(())
}

fn build_controller(store: SettingsStore, search: &SearchArgs) -> anyhow::Result<RunController> {
    if search.min_delay_ms > search.max_delay_ms {
        bail!("--min-delay-ms must not exceed --max-delay-ms");
    }
    if search.max_pages == 0 {
        bail!("--max-pages must be at least 1");
    }
    let base_url = Url::parse(&search.base_url).with_context(|| format!("invalid --base-url {}", search.base_url))?;

    if store.queries()?.is_empty() {
        warn!("no searches configured; use set-jobs and set-region first");
    }

    let fetcher = HttpFetcher::new(FetchConfig {
        base_url: base_url.clone(),
        timeout: Duration::from_millis(search.timeout_ms),
        delay_ms: search.min_delay_ms..=search.max_delay_ms,
        cookie: search.cookie.clone(),
        selectors: ListingSelectors::default(),
    })?;
    let surface = OutputSurface::new(search.format, search.output.clone(), base_url.as_str());
    let options = CrawlOptions { filter: search.filter, termination: search.termination, max_pages: search.max_pages };

    Ok(RunController::new(Box::new(fetcher), Box::new(store), Box::new(surface), Box::new(TracingSink), options))
}

// Scheduled runs on this thread, manual runs from stdin on another; overlaps are dropped.
fn watch(controller: Arc<RunController>, interval: Duration) {
    let manual = Arc::clone(&controller);
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            if line.is_err() {
                break;
            }
            info!("manual search triggered");
            manual.run_once();
        }
    });

    loop {
        controller.run_once();
        info!(next_in_secs = interval.as_secs(), "waiting for next scheduled search");
        thread::sleep(interval);
    }
}
