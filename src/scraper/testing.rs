//! Scripted [`Fetch`] and synthetic listing markup for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::error::FetchError;
use crate::scraper::{Fetch, FetchRequest};

pub(crate) const ASSET_ORIGIN: &str = "https://cdn.futwiz.com";

/// A page with no player table, as served past the last page.
pub(crate) const EMPTY_PAGE: &str =
    r#"<html><body><div class="no-results">No players found</div></body></html>"#;

/// One synthetic listing row.
#[derive(Debug, Clone)]
pub(crate) struct Row {
    pub name: String,
    pub team: String,
    pub rating: String,
    pub photo: Option<String>,
    pub flag: Option<String>,
}

impl Row {
    pub fn new(name: &str, team: &str, rating: &str, photo_id: u32, flag_id: u32) -> Self {
        Self {
            name: name.to_string(),
            team: team.to_string(),
            rating: rating.to_string(),
            photo: Some(format!("{ASSET_ORIGIN}/assets/img/fifa/faces/{photo_id}.png")),
            flag: Some(format!("/assets/img/flags/{flag_id}.png")),
        }
    }
}

/// Listing markup in the shape every adapter's first probes understand.
pub(crate) fn listing_page(rows: &[Row]) -> String {
    let rows: String = rows
        .iter()
        .map(|row| {
            let photo = row
                .photo
                .as_ref()
                .map(|src| format!(r#"<img class="player-img" src="{src}">"#))
                .unwrap_or_default();
            let flag = row
                .flag
                .as_ref()
                .map(|src| format!(r#"<a href="/nation"><img class="nation" src="{src}"></a>"#))
                .unwrap_or_default();
            format!(
                r#"<tr class="table-row">
                  <td class="face">{photo}</td>
                  <td class="player">
                    <p class="name"><a href="/player"><b>{name}</b></a></p>
                    <p class="team">{flag}<a href="/league">ENG 1</a> <a href="/club">{team}</a></p>
                  </td>
                  <td class="ovr"><div class="otherversion-rating">{rating}</div></td>
                </tr>"#,
                name = row.name,
                team = row.team,
                rating = row.rating,
            )
        })
        .collect();
    format!(
        r#"<html><body><div class="table-container"><table>
        <thead><tr><th>Player</th></tr></thead><tbody>{rows}</tbody>
        </table></div></body></html>"#
    )
}

/// A scripted reply to one request.
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Page(String),
    RateLimited,
    Timeout,
    Status(u16),
}

/// In-memory [`Fetch`] keyed by `(url, page)` for listings and by URL for
/// assets. Pages without a script answer [`EMPTY_PAGE`]; a script's last
/// reply repeats once the queue is down to it.
#[derive(Default)]
pub(crate) struct ScriptedSource {
    pages: Mutex<HashMap<(String, u32), VecDeque<Reply>>>,
    assets: HashMap<String, Vec<u8>>,
    asset_delay: Option<Duration>,
    page_log: Mutex<Vec<(String, u32)>>,
    asset_log: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, url: &str, page: u32, body: String) -> Self {
        self.reply(url, page, Reply::Page(body))
    }

    pub fn reply(self, url: &str, page: u32, reply: Reply) -> Self {
        self.pages
            .lock()
            .unwrap()
            .entry((url.to_string(), page))
            .or_default()
            .push_back(reply);
        self
    }

    pub fn asset(mut self, url: &str, bytes: &[u8]) -> Self {
        self.assets.insert(url.to_string(), bytes.to_vec());
        self
    }

    /// Hold every asset reply for `delay`, keeping downloads in flight.
    pub fn asset_delay(mut self, delay: Duration) -> Self {
        self.asset_delay = Some(delay);
        self
    }

    pub fn page_requests(&self) -> Vec<(String, u32)> {
        self.page_log.lock().unwrap().clone()
    }

    pub fn asset_requests(&self) -> Vec<String> {
        self.asset_log.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetch for ScriptedSource {
    async fn fetch_text(&self, request: &FetchRequest) -> Result<String, FetchError> {
        let page = request
            .param("page")
            .and_then(|p| p.parse().ok())
            .unwrap_or_default();
        self.page_log
            .lock()
            .unwrap()
            .push((request.url.clone(), page));

        let reply = {
            let mut pages = self.pages.lock().unwrap();
            match pages.get_mut(&(request.url.clone(), page)) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        let url = request.url.clone();
        match reply.unwrap_or_else(|| Reply::Page(EMPTY_PAGE.to_string())) {
            Reply::Page(body) => Ok(body),
            Reply::RateLimited => Err(FetchError::RateLimited { url }),
            Reply::Timeout => Err(FetchError::Timeout { url }),
            Reply::Status(code) => Err(FetchError::Status {
                url,
                status: StatusCode::from_u16(code).unwrap(),
            }),
        }
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.asset_log.lock().unwrap().push(url.to_string());
        if let Some(delay) = self.asset_delay {
            tokio::time::sleep(delay).await;
        }
        self.assets
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: StatusCode::NOT_FOUND,
            })
    }
}
