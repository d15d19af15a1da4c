//! Crawl configuration.
//!
//! Everything the crawler needs from the outside world is loaded once into a
//! [`CrawlConfig`] and handed to the client explicitly. Every field has a
//! default, so an absent or partial TOML file still yields a usable config.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CrawlError, Result};
use crate::model::League;
use crate::scraper::adapter::VersionAdapter;

/// Root of the TOML configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    pub source: SourceConfig,
    pub fetch: FetchPolicy,
    pub crawl: CrawlSettings,
    pub adapter: AdapterBounds,
    pub output: OutputConfig,
    pub leagues: Vec<League>,
    /// Flag id to country name, shared with the serving layer.
    pub nations: BTreeMap<String, String>,
}

impl CrawlConfig {
    /// Load a config file, falling back to the built-in tables for any
    /// section the file leaves out.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| CrawlError::io(path, e))?;
        toml::from_str(&raw).map_err(|e| CrawlError::Config {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn league(&self, code: &str) -> Result<&League> {
        self.leagues
            .iter()
            .find(|l| l.code == code)
            .ok_or_else(|| CrawlError::UnknownLeague(code.to_owned()))
    }

    pub fn nationality(&self, flag_id: &str) -> Option<&str> {
        self.nations.get(flag_id).map(String::as_str)
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            fetch: FetchPolicy::default(),
            crawl: CrawlSettings::default(),
            adapter: AdapterBounds::default(),
            output: OutputConfig::default(),
            leagues: League::defaults(),
            nations: default_nations(),
        }
    }
}

/// Where the listing lives and how asset references are qualified.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Listing URL with a `{version}` placeholder.
    pub listing_url: String,
    pub release: String,
    /// Origin prepended to absolute-path asset references.
    pub asset_origin: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            listing_url: "https://www.futwiz.com/en/fifa{version}/players".to_string(),
            release: "nifgold".to_string(),
            asset_origin: "https://cdn.futwiz.com".to_string(),
        }
    }
}

impl SourceConfig {
    pub fn listing_url(&self, version: u16) -> String {
        self.listing_url.replace("{version}", &version.to_string())
    }

    pub fn listing_query(&self, page: u32, league: &League) -> Vec<(String, String)> {
        vec![
            ("page".to_string(), page.to_string()),
            ("release".to_string(), self.release.clone()),
            ("leagues[]".to_string(), league.listing_id.clone()),
        ]
    }
}

/// Timing and header policy of the rate-limited fetcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchPolicy {
    pub timeout_secs: u64,
    /// Sleep after an upstream 429 before handing control back.
    pub cooldown_secs: u64,
    /// Random pause after every successful fetch, in milliseconds.
    pub jitter_ms: (u64, u64),
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            cooldown_secs: 30,
            jitter_ms: (500, 1000),
            user_agent: concat!(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 ",
                "(KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36"
            )
            .to_string(),
            accept: "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"
                .to_string(),
            accept_language: "en-US,en;q=0.5".to_string(),
        }
    }
}

impl FetchPolicy {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

/// Pagination and scheduling knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlSettings {
    /// Consecutive empty pages that end a job.
    pub empty_page_threshold: u32,
    /// Consecutive 429s on one page before the job is abandoned.
    pub max_rate_limit_retries: u32,
    /// Newest version crawled first.
    pub newest_version: u16,
    pub oldest_version: u16,
    pub version_pause_ms: (u64, u64),
    pub league_pause_ms: (u64, u64),
    pub asset_workers: usize,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            empty_page_threshold: 2,
            max_rate_limit_retries: 10,
            newest_version: 23,
            oldest_version: 10,
            version_pause_ms: (1000, 2000),
            league_pause_ms: (2000, 3000),
            asset_workers: 5,
        }
    }
}

impl CrawlSettings {
    /// Versions in crawl order, newest first.
    pub fn versions(&self) -> impl Iterator<Item = u16> {
        let (lo, hi) = if self.oldest_version <= self.newest_version {
            (self.oldest_version, self.newest_version)
        } else {
            (self.newest_version, self.oldest_version)
        };
        RangeInclusive::new(lo, hi).rev()
    }
}

/// Last version handled by each older strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterBounds {
    pub legacy_through: u16,
    pub mid_through: u16,
}

impl Default for AdapterBounds {
    fn default() -> Self {
        Self {
            legacy_through: 16,
            mid_through: 20,
        }
    }
}

impl AdapterBounds {
    pub fn select(&self, version: u16) -> VersionAdapter {
        if version <= self.legacy_through {
            VersionAdapter::Legacy
        } else if version <= self.mid_through {
            VersionAdapter::Mid
        } else {
            VersionAdapter::Current
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub data_dir: PathBuf,
    pub images_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            images_dir: PathBuf::from("static/images"),
        }
    }
}

fn default_nations() -> BTreeMap<String, String> {
    [
        ("7", "Belgium"),
        ("12", "Czech Republic"),
        ("13", "Denmark"),
        ("14", "England"),
        ("18", "France"),
        ("21", "Germany"),
        ("27", "Italy"),
        ("34", "Netherlands"),
        ("36", "Norway"),
        ("38", "Portugal"),
        ("40", "Russia"),
        ("43", "Slovakia"),
        ("45", "Spain"),
        ("50", "Wales"),
        ("51", "Serbia"),
        ("52", "Argentina"),
        ("54", "Brazil"),
        ("95", "United States"),
        ("108", "Ivory Coast"),
        ("117", "Ghana"),
    ]
    .into_iter()
    .map(|(id, name)| (id.to_string(), name.to_string()))
    .collect()
}
