//! Per-generation extraction of team and rating cells.
//!
//! The listing's row markup changed several times across game versions. Each
//! [`VersionAdapter`] carries an ordered list of places to look for the team
//! and the rating; the first usable candidate wins. Nothing here fails: a row
//! the adapter cannot read simply yields `None`.

use ::scraper::{ElementRef, Selector};
use tracing::trace;

use crate::model::is_competition_name;
use crate::scraper::{clean, element_text, first_digits, probe_selector};

/// A markup generation of the listing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display, strum_macros::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum VersionAdapter {
    /// Oldest tables: team as a plain link next to the league link.
    Legacy,
    /// Club crest links with the name in the crest's alt text.
    Mid,
    /// Current cards with a dedicated rating badge.
    Current,
}

/// Where a team name may live inside a row.
enum TeamProbe {
    /// Text of each link that does not wrap an image.
    Links(&'static str),
    Text(&'static str),
    Attr(&'static str, &'static str),
}

/// Where a rating may live inside a row.
enum RatingProbe {
    Text(&'static str),
    Attr(&'static str, &'static str),
}

const LEGACY_TEAM: &[TeamProbe] = &[
    TeamProbe::Links("td.player p.team a"),
    TeamProbe::Text("td.player span.team"),
    TeamProbe::Attr("td.player img.club", "alt"),
];

const MID_TEAM: &[TeamProbe] = &[
    TeamProbe::Links("td.player p.team a"),
    TeamProbe::Attr("td.player p.team a img.club", "alt"),
    TeamProbe::Text("td.player div.team"),
    TeamProbe::Attr("td.club img", "title"),
];

const CURRENT_TEAM: &[TeamProbe] = &[
    TeamProbe::Links("td.player p.team a"),
    TeamProbe::Attr("td.player p.team a", "title"),
    TeamProbe::Text("td.club"),
];

const LEGACY_RATING: &[RatingProbe] = &[
    RatingProbe::Text("td.ovr"),
    RatingProbe::Text("td.player div.rating"),
    RatingProbe::Text("td.rating"),
];

const MID_RATING: &[RatingProbe] = &[
    RatingProbe::Text("td.ovr span.rating"),
    RatingProbe::Text("td.ovr"),
    RatingProbe::Attr("td.ovr", "data-rating"),
];

const CURRENT_RATING: &[RatingProbe] = &[
    RatingProbe::Text("td.ovr div.otherversion-rating"),
    RatingProbe::Text("td.ovr span"),
    RatingProbe::Text("td.ovr"),
];

impl VersionAdapter {
    fn team_probes(self) -> &'static [TeamProbe] {
        match self {
            VersionAdapter::Legacy => LEGACY_TEAM,
            VersionAdapter::Mid => MID_TEAM,
            VersionAdapter::Current => CURRENT_TEAM,
        }
    }

    fn rating_probes(self) -> &'static [RatingProbe] {
        match self {
            VersionAdapter::Legacy => LEGACY_RATING,
            VersionAdapter::Mid => MID_RATING,
            VersionAdapter::Current => CURRENT_RATING,
        }
    }

    /// First non-empty team candidate that is not one of `competitions`.
    pub fn extract_team(self, row: &ElementRef, competitions: &[String]) -> Option<String> {
        self.team_probes()
            .iter()
            .flat_map(|probe| team_candidates(row, probe))
            .find(|team| {
                let blocked = is_competition_name(team, competitions);
                if blocked {
                    trace!(%team, "skipping competition label");
                }
                !blocked
            })
    }

    /// First rating within `1..=99` among the probe locations.
    pub fn extract_rating(self, row: &ElementRef) -> Option<u8> {
        self.rating_probes()
            .iter()
            .flat_map(|probe| rating_candidates(row, probe))
            .filter_map(|text| first_digits(&text))
            .find(|rating| (1..=99).contains(rating))
            .and_then(|rating| u8::try_from(rating).ok())
    }
}

fn matches<'a>(row: &ElementRef<'a>, selector: &Selector) -> Vec<ElementRef<'a>> {
    row.select(selector).collect()
}

fn team_candidates(row: &ElementRef, probe: &TeamProbe) -> Vec<String> {
    let css = match probe {
        TeamProbe::Links(css) | TeamProbe::Text(css) | TeamProbe::Attr(css, _) => css,
    };
    let Some(selector) = probe_selector(css) else {
        return Vec::new();
    };
    let Some(img) = probe_selector("img") else {
        return Vec::new();
    };

    matches(row, &selector)
        .into_iter()
        .filter_map(|element| match probe {
            TeamProbe::Links(_) => {
                if element.select(&img).next().is_some() {
                    None
                } else {
                    element_text(&element)
                }
            }
            TeamProbe::Text(_) => element_text(&element),
            TeamProbe::Attr(_, attr) => element.value().attr(attr).and_then(clean),
        })
        .collect()
}

fn rating_candidates(row: &ElementRef, probe: &RatingProbe) -> Vec<String> {
    let css = match probe {
        RatingProbe::Text(css) | RatingProbe::Attr(css, _) => css,
    };
    let Some(selector) = probe_selector(css) else {
        return Vec::new();
    };

    matches(row, &selector)
        .into_iter()
        .filter_map(|element| match probe {
            RatingProbe::Text(_) => element_text(&element),
            RatingProbe::Attr(_, attr) => element.value().attr(attr).map(str::to_string),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use ::scraper::Html;

    use super::*;

    fn with_row<T>(cells: &str, f: impl FnOnce(&ElementRef) -> T) -> T {
        let html = format!(r#"<table><tr class="table-row">{cells}</tr></table>"#);
        let document = Html::parse_document(&html);
        let selector = Selector::parse("tr.table-row").unwrap();
        let row = document.select(&selector).next().unwrap();
        f(&row)
    }

    fn competitions() -> Vec<String> {
        vec!["Premier League".to_string(), "ENG 1".to_string()]
    }

    #[test]
    fn test_team_skips_image_links_and_competition_labels() {
        let cells = r#"<td class="player"><p class="team">
            <a href="/nation/14"><img class="nation" src="/flags/14.png"></a>
            <a href="/league/13">ENG 1</a>
            <a href="/club/1">  Manchester
               City </a>
        </p></td>"#;
        let team = with_row(cells, |row| {
            VersionAdapter::Legacy.extract_team(row, &competitions())
        });
        assert_eq!(team.as_deref(), Some("Manchester City"));
    }

    #[test]
    fn test_team_falls_back_to_later_probe() {
        let cells = r#"<td class="player"><p class="team">
            <a href="/league/13">Premier League</a>
            <a href="/club/1"><img class="club" alt="Arsenal" src="/c/1.png"></a>
        </p></td>"#;
        let team = with_row(cells, |row| VersionAdapter::Mid.extract_team(row, &competitions()));
        assert_eq!(team.as_deref(), Some("Arsenal"));

        let cells =
            r#"<td class="player"><p class="team"></p></td><td class="club"> Chelsea </td>"#;
        let team = with_row(cells, |row| {
            VersionAdapter::Current.extract_team(row, &competitions())
        });
        assert_eq!(team.as_deref(), Some("Chelsea"));
    }

    #[test]
    fn test_team_absent_when_only_competition_found() {
        let cells = r#"<td class="player"><p class="team"><a href="/l">ENG 1</a></p></td>"#;
        let team = with_row(cells, |row| {
            VersionAdapter::Current.extract_team(row, &competitions())
        });
        assert_eq!(team, None);
    }

    #[test]
    fn test_rating_out_of_range_falls_through() {
        let cells = r#"<td class="ovr"><span class="rating">104</span><b>88</b></td>"#;
        let rating = with_row(cells, |row| VersionAdapter::Mid.extract_rating(row));
        assert_eq!(rating, None);

        let cells = r#"<td class="ovr" data-rating="77"><span class="rating">104</span></td>"#;
        let rating = with_row(cells, |row| VersionAdapter::Mid.extract_rating(row));
        assert_eq!(rating, Some(77));
    }

    #[test]
    fn test_rating_per_generation() {
        let cells = r#"<td class="ovr"><div class="otherversion-rating">91</div></td>"#;
        let rating = with_row(cells, |row| VersionAdapter::Current.extract_rating(row));
        assert_eq!(rating, Some(91));

        let cells = r#"<td class="rating">OVR 65</td>"#;
        let rating = with_row(cells, |row| VersionAdapter::Legacy.extract_rating(row));
        assert_eq!(rating, Some(65));

        let cells = r#"<td class="ovr">0</td>"#;
        let rating = with_row(cells, |row| VersionAdapter::Legacy.extract_rating(row));
        assert_eq!(rating, None);
    }

    #[test]
    fn test_rating_bounds_are_inclusive() {
        for (text, expected) in [("1", Some(1)), ("99", Some(99)), ("100", None)] {
            let cells = format!(r#"<td class="ovr">{text}</td>"#);
            for adapter in [
                VersionAdapter::Legacy,
                VersionAdapter::Mid,
                VersionAdapter::Current,
            ] {
                let rating = with_row(&cells, |row| adapter.extract_rating(row));
                assert_eq!(rating, expected, "{adapter} rating {text}");
            }
        }
    }

    #[test]
    fn test_adapter_names() {
        assert_eq!(VersionAdapter::Mid.to_string(), "mid");
        assert_eq!(
            VersionAdapter::from_str("current").unwrap(),
            VersionAdapter::Current
        );
    }
}
