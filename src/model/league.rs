use std::collections::BTreeMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// A competition crawled from the listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct League {
    /// Short code such as `eng1`.
    pub code: String,
    /// Identifier the listing filters on.
    pub listing_id: String,
    /// Output directory under the data dir.
    pub folder: String,
    pub name: String,
    /// Display names the source shows for the competition itself. A team
    /// cell holding one of these means extraction grabbed the wrong link.
    #[serde(default)]
    pub competitions: Vec<String>,
    /// Extra display names used only by particular versions, keyed by the
    /// version number as a string.
    #[serde(default)]
    pub by_version: BTreeMap<String, Vec<String>>,
}

impl League {
    /// Labels every version shows for this competition. Team extraction
    /// skips these.
    pub fn labels(&self) -> Vec<String> {
        std::iter::once(&self.name)
            .chain(&self.competitions)
            .cloned()
            .unique()
            .collect()
    }

    /// The full blocklist for one version, used to validate finished jobs.
    pub fn competition_names(&self, version: u16) -> Vec<String> {
        let extra = self
            .by_version
            .get(&version.to_string())
            .into_iter()
            .flatten()
            .cloned();
        self.labels().into_iter().chain(extra).unique().collect()
    }

    pub fn defaults() -> Vec<League> {
        vec![
            League::new(
                "eng1",
                "13",
                "premier_league",
                "Premier League",
                &["ENG 1", "EPL", "Barclays PL"],
            ),
            League::new("ger1", "19", "bundesliga", "Bundesliga", &["GER 1"]),
            League::new(
                "esp1",
                "53",
                "laliga",
                "La Liga",
                &["ESP 1", "LaLiga Santander", "Liga BBVA"],
            ),
            League::new("fra1", "16", "ligue1", "Ligue 1", &["FRA 1", "Ligue 1 Conforama"]),
            League::new("ita1", "31", "serie_a", "Serie A", &["ITA 1", "Serie A TIM"]),
        ]
    }

    fn new(code: &str, listing_id: &str, folder: &str, name: &str, competitions: &[&str]) -> Self {
        Self {
            code: code.to_string(),
            listing_id: listing_id.to_string(),
            folder: folder.to_string(),
            name: name.to_string(),
            competitions: competitions.iter().map(|c| c.to_string()).collect(),
            by_version: BTreeMap::new(),
        }
    }
}

/// Case-insensitive, whitespace-insensitive membership in a name list.
pub fn is_competition_name(text: &str, names: &[String]) -> bool {
    let text = text.split_whitespace().join(" ");
    names
        .iter()
        .any(|n| n.split_whitespace().join(" ").eq_ignore_ascii_case(&text))
}
