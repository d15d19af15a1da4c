use serde::{Deserialize, Serialize};

use crate::model::asset_id;

/// One player's appearance in one source version.
///
/// Field names on the wire match the datasets consumed by the quiz front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub name: String,
    pub team: String,
    /// Overall rating, always within `1..=99`.
    pub rating: u8,
    #[serde(rename = "photo_url")]
    pub photo_ref: String,
    #[serde(rename = "nationality_flag")]
    pub nation_flag_ref: String,
    #[serde(rename = "fifa_version")]
    pub version: u16,
    /// Not persisted: the dataset's directory already names the league.
    #[serde(skip_serializing, default)]
    pub league: String,
}

impl PlayerRecord {
    /// Flag id as understood by the nations table, e.g. `14` for `.../14.png`.
    pub fn flag_id(&self) -> Option<&str> {
        asset_id(&self.nation_flag_ref)
    }

    pub fn photo_id(&self) -> Option<&str> {
        asset_id(&self.photo_ref)
    }
}

/// Dataset key within a single crawl job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobKey {
    pub name: String,
    pub team: String,
    pub photo_ref: String,
    pub nation_flag_ref: String,
}

impl From<&PlayerRecord> for JobKey {
    fn from(record: &PlayerRecord) -> Self {
        Self {
            name: record.name.clone(),
            team: record.team.clone(),
            photo_ref: record.photo_ref.clone(),
            nation_flag_ref: record.nation_flag_ref.clone(),
        }
    }
}

/// Dataset key across historical merges; photo and flag references are
/// allowed to drift between scrapes of the same roster.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MergeKey {
    pub name: String,
    pub team: String,
    pub version: u16,
}

impl From<&PlayerRecord> for MergeKey {
    fn from(record: &PlayerRecord) -> Self {
        Self {
            name: record.name.clone(),
            team: record.team.clone(),
            version: record.version,
        }
    }
}
