//! Per-(league, version) JSON datasets on disk.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use itertools::Itertools;
use tracing::{debug, info, instrument};

use crate::crawl::MergeDeduplicator;
use crate::error::{CrawlError, Result};
use crate::model::{League, PlayerRecord};

/// `<data_dir>/<league folder>/fifa<version>_players.json`
pub fn dataset_path(data_dir: &Path, league: &League, version: u16) -> PathBuf {
    data_dir
        .join(&league.folder)
        .join(format!("fifa{version}_players.json"))
}

/// Write records as a pretty JSON array. The file is replaced atomically, so
/// readers see either the previous dataset or the complete new one.
pub fn write_dataset(path: &Path, records: &[PlayerRecord]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| CrawlError::io(dir, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| CrawlError::io(dir, e))?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, records).map_err(|e| CrawlError::Json {
            path: path.to_path_buf(),
            source: e,
        })?;
        writer.flush().map_err(|e| CrawlError::io(path, e))?;
    }
    tmp.persist(path)
        .map_err(|e| CrawlError::io(path, e.error))?;

    debug!(path = %path.display(), count = records.len(), "wrote dataset");
    Ok(())
}

/// Read a dataset, tagging every record with `league`.
pub fn load_dataset(path: &Path, league: &str) -> Result<Vec<PlayerRecord>> {
    let file = File::open(path).map_err(|e| CrawlError::io(path, e))?;
    let mut records: Vec<PlayerRecord> =
        serde_json::from_reader(BufReader::new(file)).map_err(|e| CrawlError::Json {
            path: path.to_path_buf(),
            source: e,
        })?;
    for record in &mut records {
        record.league = league.to_string();
    }
    Ok(records)
}

/// Like [`load_dataset`], but a missing file is an empty dataset.
pub fn load_or_empty(path: &Path, league: &str) -> Result<Vec<PlayerRecord>> {
    if path.exists() {
        load_dataset(path, league)
    } else {
        Ok(Vec::new())
    }
}

/// Every persisted dataset of `league` among `versions`, in the given order.
pub fn load_league(
    data_dir: &Path,
    league: &League,
    versions: impl IntoIterator<Item = u16>,
) -> Result<Vec<(u16, Vec<PlayerRecord>)>> {
    versions
        .into_iter()
        .map(|version| (version, dataset_path(data_dir, league, version)))
        .filter(|(_, path)| path.exists())
        .map(|(version, path)| Ok((version, load_dataset(&path, &league.code)?)))
        .collect()
}

/// Result of folding one dataset into another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    pub added: usize,
    pub total: usize,
}

/// Fold `incoming` into the dataset at `target` by (name, team, version),
/// keeping existing records on collision, then sort by version and name.
#[instrument(skip(target, incoming), fields(target = %target.display()))]
pub fn merge_into(
    target: &Path,
    league: &str,
    incoming: Vec<PlayerRecord>,
) -> Result<MergeOutcome> {
    let existing = load_or_empty(target, league)?;
    let before = existing.len();

    let mut merged = MergeDeduplicator::seeded(existing);
    let added = merged.extend(incoming);
    let records = merged
        .into_records()
        .into_iter()
        .sorted_by(|a, b| a.version.cmp(&b.version).then_with(|| a.name.cmp(&b.name)))
        .collect_vec();

    write_dataset(target, &records)?;
    info!(before, added, total = records.len(), "merged dataset");

    Ok(MergeOutcome {
        added,
        total: records.len(),
    })
}
