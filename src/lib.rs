//! Crawl football player card listings into per-version roster datasets.
//!
//! Start with [`RosterClient`]: it walks each league's listing for every
//! configured game version, keeps the unique and valid player records, writes
//! them as JSON datasets and downloads the referenced photos and flags.

pub use client::{JobFailure, JobSummary, RosterClient, RunReport};
pub use config::CrawlConfig;
pub use error::{CrawlError, FetchError, Result, ValidationFailure};
pub use model::*;

pub mod assets;
pub mod client;
pub mod config;
pub mod crawl;
pub mod dataset;
pub mod error;
pub mod model;
pub mod scraper;
