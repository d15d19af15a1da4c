//! Concurrent, de-duplicated image downloads.
//!
//! One [`DownloadManifest`] is shared by every batch in a run, so a photo or
//! flag referenced by many players, versions or leagues is fetched once. The
//! files already on disk double as the manifest of previous runs.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use itertools::Itertools;
use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, instrument, warn};

use crate::model::asset_basename;
use crate::scraper::Fetch;

#[derive(Debug, Default)]
struct ManifestState {
    present: HashSet<String>,
    present_paths: HashSet<PathBuf>,
    in_flight: HashSet<String>,
    in_flight_paths: HashSet<PathBuf>,
}

/// Answer to [`DownloadManifest::claim`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// The caller now owns the reference and its destination file.
    Granted,
    /// The reference, or another reference stored at the same path, is done.
    Present,
    /// Another worker is downloading the reference or writing that path.
    InFlight,
}

/// References and destination files downloaded or found on disk during
/// this run.
///
/// Entries are only ever added. A claim reserves both the reference and the
/// file it is written to, so two references sharing a basename never have
/// two writers on one path. If the download fails the reservation is dropped
/// and the reference may be tried again.
#[derive(Debug, Default)]
pub struct DownloadManifest {
    state: Mutex<ManifestState>,
}

impl DownloadManifest {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManifestState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserve `reference` and its destination `path` for the caller. Check
    /// and insert happen under one lock.
    pub fn claim(&self, reference: &str, path: &Path) -> Claim {
        let mut state = self.lock();
        if state.present.contains(reference) || state.present_paths.contains(path) {
            return Claim::Present;
        }
        if state.in_flight.contains(reference) || state.in_flight_paths.contains(path) {
            return Claim::InFlight;
        }
        state.in_flight.insert(reference.to_string());
        state.in_flight_paths.insert(path.to_path_buf());
        Claim::Granted
    }

    /// Record a claimed reference and its file as present.
    pub fn complete(&self, reference: &str, path: &Path) {
        let mut state = self.lock();
        state.in_flight.remove(reference);
        state.in_flight_paths.remove(path);
        state.present.insert(reference.to_string());
        state.present_paths.insert(path.to_path_buf());
    }

    /// Give up a claim after a failed download.
    pub fn release(&self, reference: &str, path: &Path) {
        let mut state = self.lock();
        state.in_flight.remove(reference);
        state.in_flight_paths.remove(path);
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.lock().present.contains(reference)
    }

    pub fn len(&self) -> usize {
        self.lock().present.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A reference that could not be stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetFailure {
    pub reference: String,
    pub reason: String,
}

/// Tally of one or more asset batches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssetReport {
    pub fetched: usize,
    pub already_present: usize,
    /// Left to a download another worker had already started.
    pub in_flight: usize,
    pub failures: Vec<AssetFailure>,
}

impl AssetReport {
    pub fn absorb(&mut self, other: AssetReport) {
        self.fetched += other.fetched;
        self.already_present += other.already_present;
        self.in_flight += other.in_flight;
        self.failures.extend(other.failures);
    }
}

enum Outcome {
    Fetched,
    AlreadyPresent,
    InFlight,
}

/// Downloads references into a directory with a fixed number of workers.
#[derive(Clone)]
pub struct AssetFetcher {
    fetcher: Arc<dyn Fetch>,
    manifest: Arc<DownloadManifest>,
    workers: usize,
}

impl AssetFetcher {
    pub fn new(fetcher: Arc<dyn Fetch>, manifest: Arc<DownloadManifest>, workers: usize) -> Self {
        Self {
            fetcher,
            manifest,
            workers: workers.max(1),
        }
    }

    pub fn manifest(&self) -> &Arc<DownloadManifest> {
        &self.manifest
    }

    /// Store every reference as `dest/<basename>`. Failures are collected,
    /// never raised.
    #[instrument(skip_all, fields(dest = %dest.display()))]
    pub async fn fetch_all<I, S>(&self, refs: I, dest: &Path) -> AssetReport
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut queue: Vec<String> = refs.into_iter().map(Into::into).unique().collect();
        if queue.is_empty() {
            return AssetReport::default();
        }

        if let Err(e) = tokio::fs::create_dir_all(dest).await {
            warn!(error = %e, "cannot create asset directory");
            return AssetReport {
                failures: queue
                    .into_iter()
                    .map(|reference| AssetFailure {
                        reference,
                        reason: format!("cannot create {}: {e}", dest.display()),
                    })
                    .collect(),
                ..Default::default()
            };
        }

        // Workers pop from the back; keep the caller's order.
        queue.reverse();
        let total = queue.len();
        let queue = Arc::new(AsyncMutex::new(queue));
        let workers = self.workers.min(total);

        let handles: Vec<_> = (0..workers)
            .map(|worker_id| {
                let queue = queue.clone();
                let fetcher = self.fetcher.clone();
                let manifest = self.manifest.clone();
                let dest = dest.to_path_buf();
                tokio::spawn(async move {
                    let mut report = AssetReport::default();
                    loop {
                        let next = queue.lock().await.pop();
                        let Some(reference) = next else {
                            break;
                        };
                        match fetch_one(fetcher.as_ref(), &manifest, &reference, &dest).await {
                            Ok(Outcome::Fetched) => report.fetched += 1,
                            Ok(Outcome::AlreadyPresent) => report.already_present += 1,
                            Ok(Outcome::InFlight) => report.in_flight += 1,
                            Err(failure) => {
                                warn!(
                                    worker_id,
                                    reference = %failure.reference,
                                    reason = %failure.reason,
                                    "asset download failed"
                                );
                                report.failures.push(failure);
                            }
                        }
                    }
                    report
                })
            })
            .collect();

        let mut report = AssetReport::default();
        for handle in handles {
            match handle.await {
                Ok(worker_report) => report.absorb(worker_report),
                Err(e) => warn!(error = %e, "asset worker stopped unexpectedly"),
            }
        }

        debug!(
            total,
            fetched = report.fetched,
            already_present = report.already_present,
            in_flight = report.in_flight,
            failed = report.failures.len(),
            "asset batch finished"
        );
        report
    }
}

async fn fetch_one(
    fetcher: &dyn Fetch,
    manifest: &DownloadManifest,
    reference: &str,
    dest: &Path,
) -> Result<Outcome, AssetFailure> {
    let failure = |reason: String| AssetFailure {
        reference: reference.to_string(),
        reason,
    };

    let Some(name) = asset_basename(reference) else {
        return Err(failure("reference has no file name".to_string()));
    };
    let path = dest.join(name);

    match manifest.claim(reference, &path) {
        Claim::Granted => {}
        Claim::Present => return Ok(Outcome::AlreadyPresent),
        Claim::InFlight => return Ok(Outcome::InFlight),
    }

    if tokio::fs::try_exists(&path).await.unwrap_or(false) {
        manifest.complete(reference, &path);
        return Ok(Outcome::AlreadyPresent);
    }

    let bytes = match fetcher.fetch_bytes(reference).await {
        Ok(bytes) => bytes,
        Err(e) => {
            manifest.release(reference, &path);
            return Err(failure(e.to_string()));
        }
    };

    if let Err(e) = write_atomically(&path, &bytes).await {
        manifest.release(reference, &path);
        return Err(failure(format!("cannot write {}: {e}", path.display())));
    }

    manifest.complete(reference, &path);
    debug!(file = name, bytes = bytes.len(), "downloaded asset");
    Ok(Outcome::Fetched)
}

/// Write next to `path` first so an interrupted run never leaves a truncated
/// file that the existence check would later accept.
async fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut partial = path.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);
    tokio::fs::write(&partial, bytes).await?;
    tokio::fs::rename(&partial, path).await
}
