//! Pagination over one (league, version) listing.
//!
//! The listing exposes no page count, so a job walks pages from 0 upward and
//! stops after a fixed number of consecutive empty pages. Throttled pages are
//! retried in place and never count as empty.

pub mod dedup;
pub mod validate;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::config::CrawlConfig;
use crate::dataset::{dataset_path, write_dataset};
use crate::error::{CrawlError, FetchError, Result};
use crate::model::{League, PlayerRecord};
use crate::scraper::{parse_players, Fetch, FetchRequest, PageContext};

pub use dedup::{Deduplicator, JobDeduplicator, MergeDeduplicator};
pub use validate::validate_job;

/// Where a job stands in its pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    /// Counting consecutive empty pages.
    Draining { empty_pages: u32 },
    Done,
}

/// Cursor and accumulator of one (league, version) crawl.
#[derive(Debug)]
pub struct CrawlJob {
    league: String,
    version: u16,
    page: u32,
    state: JobState,
    empty_page_threshold: u32,
    pages_fetched: u32,
    records: JobDeduplicator,
}

impl CrawlJob {
    pub fn new(league: &str, version: u16, empty_page_threshold: u32) -> Self {
        Self {
            league: league.to_string(),
            version,
            page: 0,
            state: JobState::Running,
            empty_page_threshold: empty_page_threshold.max(1),
            pages_fetched: 0,
            records: JobDeduplicator::new(),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == JobState::Done
    }

    /// Apply the outcome of the current page and move to the next one.
    pub fn record_page(&mut self, records: Vec<PlayerRecord>) {
        if self.is_done() {
            return;
        }
        self.pages_fetched += 1;
        self.page += 1;

        if records.is_empty() {
            let empty_pages = match self.state {
                JobState::Draining { empty_pages } => empty_pages + 1,
                _ => 1,
            };
            self.state = if empty_pages >= self.empty_page_threshold {
                JobState::Done
            } else {
                JobState::Draining { empty_pages }
            };
        } else {
            let added = self.records.extend(records);
            debug!(
                league = %self.league,
                version = self.version,
                added,
                total = self.records.len(),
                "accumulated page"
            );
            self.state = JobState::Running;
        }
    }

    pub fn finish(self) -> JobOutput {
        JobOutput {
            pages_fetched: self.pages_fetched,
            records: self.records.into_records(),
        }
    }
}

/// Unique records gathered by a finished job.
#[derive(Debug, Clone)]
pub struct JobOutput {
    pub pages_fetched: u32,
    pub records: Vec<PlayerRecord>,
}

/// A job that passed validation and was written to disk.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub league: String,
    pub version: u16,
    pub pages_fetched: u32,
    pub records: Vec<PlayerRecord>,
    pub path: PathBuf,
}

/// Drives fetch and parse across the pages of a job.
#[derive(Clone)]
pub struct Crawler {
    fetcher: Arc<dyn Fetch>,
    config: Arc<CrawlConfig>,
}

impl Crawler {
    pub fn new(fetcher: Arc<dyn Fetch>, config: Arc<CrawlConfig>) -> Self {
        Self { fetcher, config }
    }

    /// Walk the listing until the empty-page threshold is reached.
    #[instrument(skip(self, league), fields(league = %league.code))]
    pub async fn crawl(&self, league: &League, version: u16) -> Result<JobOutput> {
        let competitions = league.labels();
        let ctx = PageContext {
            league: &league.code,
            version,
            adapter: self.config.adapter.select(version),
            competitions: &competitions,
            asset_origin: &self.config.source.asset_origin,
        };
        let max_retries = self.config.crawl.max_rate_limit_retries;

        let mut job = CrawlJob::new(&league.code, version, self.config.crawl.empty_page_threshold);
        let mut throttled = 0;

        while !job.is_done() {
            let page = job.page();
            let request = FetchRequest::new(self.config.source.listing_url(version))
                .with_query(self.config.source.listing_query(page, league));

            let records = match self.fetcher.fetch_text(&request).await {
                Ok(body) => parse_players(&body, &ctx)?,
                Err(FetchError::RateLimited { .. }) => {
                    throttled += 1;
                    if throttled > max_retries {
                        return Err(CrawlError::RateLimitExhausted {
                            league: league.code.clone(),
                            version,
                            page,
                            retries: max_retries,
                        });
                    }
                    warn!(page, attempt = throttled, "page throttled, retrying");
                    continue;
                }
                Err(e) => {
                    warn!(page, error = %e, "page fetch failed, counting it as empty");
                    Vec::new()
                }
            };
            throttled = 0;

            debug!(page, count = records.len(), "parsed listing page");
            job.record_page(records);
        }

        let output = job.finish();
        info!(
            version,
            adapter = %ctx.adapter,
            pages = output.pages_fetched,
            players = output.records.len(),
            "crawl finished"
        );
        Ok(output)
    }

    /// Crawl, validate and persist one job. Nothing is written unless the
    /// records pass validation.
    #[instrument(skip(self, league), fields(league = %league.code))]
    pub async fn run_job(&self, league: &League, version: u16) -> Result<JobReport> {
        let output = self.crawl(league, version).await?;
        validate_job(league, version, &output.records)?;

        let path = dataset_path(&self.config.output.data_dir, league, version);
        write_dataset(&path, &output.records)?;
        info!(path = %path.display(), players = output.records.len(), "dataset written");

        Ok(JobReport {
            league: league.code.clone(),
            version,
            pages_fetched: output.pages_fetched,
            records: output.records,
            path,
        })
    }
}
