use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::assets::{AssetFetcher, AssetReport, DownloadManifest};
use crate::config::CrawlConfig;
use crate::crawl::{Crawler, JobReport};
use crate::dataset::{dataset_path, load_dataset, load_league, merge_into, MergeOutcome};
use crate::error::{CrawlError, Result};
use crate::model::{AssetKind, League, PlayerRecord};
use crate::scraper::{pause, Fetch, HttpFetcher};

/// The main entry point for crawling player rosters.
///
/// `RosterClient` owns the outbound [`Fetch`] implementation, the loaded
/// [`CrawlConfig`] and the run's [`DownloadManifest`], and exposes the
/// crawl, image backfill and historical merge operations.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> roster_crawler::Result<()> {
/// use roster_crawler::{CrawlConfig, RosterClient};
///
/// let client = RosterClient::new(CrawlConfig::default())?;
/// let job = client.crawl_job("eng1", 23).await?;
/// println!("Found {} players", job.records.len());
/// # Ok(())
/// # }
/// ```
pub struct RosterClient {
    fetcher: Arc<dyn Fetch>,
    config: Arc<CrawlConfig>,
    manifest: Arc<DownloadManifest>,
}

impl RosterClient {
    /// Create a client that fetches over HTTP with the config's policy.
    pub fn new(config: CrawlConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new(config.fetch.clone())?;
        Ok(Self::with_fetcher(Arc::new(fetcher), config))
    }

    /// Create a client over any [`Fetch`] implementation.
    pub fn with_fetcher(fetcher: Arc<dyn Fetch>, config: CrawlConfig) -> Self {
        Self {
            fetcher,
            config: Arc::new(config),
            manifest: Arc::new(DownloadManifest::new()),
        }
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    pub fn manifest(&self) -> &DownloadManifest {
        &self.manifest
    }

    fn crawler(&self) -> Crawler {
        Crawler::new(self.fetcher.clone(), self.config.clone())
    }

    fn asset_fetcher(&self) -> AssetFetcher {
        AssetFetcher::new(
            self.fetcher.clone(),
            self.manifest.clone(),
            self.config.crawl.asset_workers,
        )
    }

    /// Leagues named by `codes`, or every configured league when empty.
    fn select_leagues(&self, codes: &[String]) -> Result<Vec<League>> {
        if codes.is_empty() {
            return Ok(self.config.leagues.clone());
        }
        codes
            .iter()
            .map(|code| self.config.league(code).cloned())
            .collect()
    }

    /// Crawl, validate and persist a single (league, version) job.
    #[instrument(skip(self))]
    pub async fn crawl_job(&self, league: &str, version: u16) -> Result<JobReport> {
        let league = self.config.league(league)?;
        self.crawler().run_job(league, version).await
    }

    /// Download the photos and flags referenced by `records` into the
    /// configured image directories.
    #[instrument(skip_all, fields(records = records.len()))]
    pub async fn fetch_assets(&self, records: &[PlayerRecord]) -> AssetReport {
        let images = &self.config.output.images_dir;
        let assets = self.asset_fetcher();

        let mut report = assets
            .fetch_all(
                records.iter().map(|r| r.photo_ref.as_str()),
                &images.join(AssetKind::Players.to_string()),
            )
            .await;
        report.absorb(
            assets
                .fetch_all(
                    records.iter().map(|r| r.nation_flag_ref.as_str()),
                    &images.join(AssetKind::Flags.to_string()),
                )
                .await,
        );
        report
    }

    /// Flag ids in `records` the nations table cannot name. Empty when the
    /// table itself is empty.
    pub fn unknown_flag_ids(&self, records: &[PlayerRecord]) -> BTreeSet<String> {
        if self.config.nations.is_empty() {
            return BTreeSet::new();
        }
        records
            .iter()
            .filter_map(PlayerRecord::flag_id)
            .filter(|id| self.config.nationality(id).is_none())
            .map(str::to_owned)
            .collect()
    }

    /// Crawl every configured version of each league, newest first.
    ///
    /// A validation failure halts the rest of that league. Any other job
    /// failure is recorded and the run moves on to the next version.
    #[instrument(skip(self))]
    pub async fn run(&self, leagues: &[String], fetch_assets: bool) -> Result<RunReport> {
        let leagues = self.select_leagues(leagues)?;
        let settings = &self.config.crawl;
        let crawler = self.crawler();
        let mut report = RunReport::start();

        for (i, league) in leagues.iter().enumerate() {
            if i > 0 {
                pause(settings.league_pause_ms).await;
            }
            info!(league = %league.code, name = %league.name, "crawling league");

            for (j, version) in settings.versions().enumerate() {
                if j > 0 {
                    pause(settings.version_pause_ms).await;
                }

                let job = match crawler.run_job(league, version).await {
                    Ok(job) => job,
                    Err(CrawlError::Validation(failure)) => {
                        error!(
                            league = %league.code,
                            version,
                            "validation failed, skipping remaining versions of this league"
                        );
                        report.failures.push(JobFailure {
                            league: league.code.clone(),
                            version,
                            error: failure.to_string(),
                            halted_league: true,
                        });
                        break;
                    }
                    Err(e) => {
                        warn!(league = %league.code, version, error = %e, "job failed");
                        report.failures.push(JobFailure {
                            league: league.code.clone(),
                            version,
                            error: e.to_string(),
                            halted_league: false,
                        });
                        continue;
                    }
                };

                let unknown = self.unknown_flag_ids(&job.records);
                if !unknown.is_empty() {
                    warn!(version, flags = ?unknown, "flag ids missing from nations table");
                }
                if fetch_assets {
                    report.assets.absorb(self.fetch_assets(&job.records).await);
                }
                report.jobs.push(JobSummary::from(&job));
            }
        }

        report.finished_at = Utc::now();
        info!(
            jobs = report.jobs.len(),
            failures = report.failures.len(),
            assets_fetched = report.assets.fetched,
            "run finished"
        );
        Ok(report)
    }

    /// Fetch the images of every persisted dataset of `leagues`, skipping
    /// whatever is already on disk.
    #[instrument(skip(self))]
    pub async fn download(&self, leagues: &[String]) -> Result<AssetReport> {
        let leagues = self.select_leagues(leagues)?;
        let mut report = AssetReport::default();

        for league in &leagues {
            let datasets = load_league(
                &self.config.output.data_dir,
                league,
                self.config.crawl.versions(),
            )?;
            let records: Vec<PlayerRecord> = datasets
                .into_iter()
                .flat_map(|(_, records)| records)
                .collect();
            info!(league = %league.code, records = records.len(), "backfilling images");
            report.absorb(self.fetch_assets(&records).await);
        }

        Ok(report)
    }

    /// Fold the dataset at `source` into `target`, by default the league's
    /// `all_players.json`.
    #[instrument(skip(self))]
    pub fn merge(
        &self,
        league: &str,
        source: &Path,
        target: Option<&Path>,
    ) -> Result<MergeOutcome> {
        let league = self.config.league(league)?;
        let target = target
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.merged_dataset_path(league));
        let incoming = load_dataset(source, &league.code)?;
        merge_into(&target, &league.code, incoming)
    }

    fn merged_dataset_path(&self, league: &League) -> PathBuf {
        self.config
            .output
            .data_dir
            .join(&league.folder)
            .join("all_players.json")
    }

    /// Where the dataset for `(league, version)` is written.
    pub fn dataset_path(&self, league: &str, version: u16) -> Result<PathBuf> {
        let league = self.config.league(league)?;
        Ok(dataset_path(&self.config.output.data_dir, league, version))
    }
}

/// Outcome of a persisted job, without its records.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub league: String,
    pub version: u16,
    pub pages_fetched: u32,
    pub players: usize,
    pub path: PathBuf,
}

impl From<&JobReport> for JobSummary {
    fn from(job: &JobReport) -> Self {
        Self {
            league: job.league.clone(),
            version: job.version,
            pages_fetched: job.pages_fetched,
            players: job.records.len(),
            path: job.path.clone(),
        }
    }
}

/// A job that produced no dataset.
#[derive(Debug, Clone, Serialize)]
pub struct JobFailure {
    pub league: String,
    pub version: u16,
    pub error: String,
    /// Set for validation failures, which stop the league's remaining versions.
    pub halted_league: bool,
}

/// Everything a crawl run did.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub jobs: Vec<JobSummary>,
    pub failures: Vec<JobFailure>,
    pub assets: AssetReport,
}

impl RunReport {
    fn start() -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            jobs: Vec::new(),
            failures: Vec::new(),
            assets: AssetReport::default(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn validation_failures(&self) -> impl Iterator<Item = &JobFailure> {
        self.failures.iter().filter(|f| f.halted_league)
    }
}
