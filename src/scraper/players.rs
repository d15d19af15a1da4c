use ::scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::error::Result;
use crate::model::PlayerRecord;
use crate::scraper::{normalize_img_url, select_text, VersionAdapter};

/// What the parser needs to know about the page it is reading.
#[derive(Debug, Clone)]
pub struct PageContext<'a> {
    pub league: &'a str,
    pub version: u16,
    pub adapter: VersionAdapter,
    /// Labels that must never be taken for a team.
    pub competitions: &'a [String],
    /// Origin for absolute-path image references.
    pub asset_origin: &'a str,
}

/// Parse one listing page into complete player records.
///
/// A page without the player table yields an empty list; that is how the
/// listing signals the end. Rows missing any field are dropped.
pub fn parse_players(body: &str, ctx: &PageContext) -> Result<Vec<PlayerRecord>> {
    let document = Html::parse_document(body);

    let table_selector = Selector::parse("div.table-container table")?;
    let Some(table) = document.select(&table_selector).next() else {
        debug!(version = ctx.version, "no player table on page");
        return Ok(Vec::new());
    };

    let row_selector = Selector::parse("tr.table-row")?;
    let selectors = RowSelectors::new()?;

    let players = table
        .select(&row_selector)
        .enumerate()
        .filter_map(|(index, row)| match parse_row(&row, &selectors, ctx) {
            Ok(record) => Some(record),
            Err(missing) => {
                debug!(index, missing, "skipping incomplete row");
                None
            }
        })
        .collect();
    Ok(players)
}

struct RowSelectors {
    name: Selector,
    name_fallback: Selector,
    photo: Selector,
    flag: Selector,
}

impl RowSelectors {
    fn new() -> Result<Self> {
        Ok(Self {
            name: Selector::parse("td.player p.name a b")?,
            name_fallback: Selector::parse("td.player p.name a")?,
            photo: Selector::parse("td.face img.player-img")?,
            flag: Selector::parse("img.nation")?,
        })
    }
}

/// Build a record from one row, or name the first field that was missing.
fn parse_row(
    row: &ElementRef,
    selectors: &RowSelectors,
    ctx: &PageContext,
) -> std::result::Result<PlayerRecord, &'static str> {
    let name = select_text(row, &selectors.name)
        .or_else(|| select_text(row, &selectors.name_fallback))
        .ok_or("name")?;

    // Lazy-loaded portraits keep the real source in `data-src`.
    let photo_ref = image_ref(row, &selectors.photo, &["data-src", "src"], ctx.asset_origin)
        .ok_or("photo")?;
    let nation_flag_ref =
        image_ref(row, &selectors.flag, &["src"], ctx.asset_origin).ok_or("nation flag")?;

    let team = ctx
        .adapter
        .extract_team(row, ctx.competitions)
        .ok_or("team")?;
    let rating = ctx.adapter.extract_rating(row).ok_or("rating")?;

    Ok(PlayerRecord {
        name,
        team,
        rating,
        photo_ref,
        nation_flag_ref,
        version: ctx.version,
        league: ctx.league.to_string(),
    })
}

fn image_ref(
    row: &ElementRef,
    selector: &Selector,
    attrs: &[&str],
    origin: &str,
) -> Option<String> {
    let element = row.select(selector).next()?;
    attrs
        .iter()
        .filter_map(|attr| element.value().attr(attr))
        .find_map(|src| normalize_img_url(src, origin))
}
