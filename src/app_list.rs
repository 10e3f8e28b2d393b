use std::cmp::Ordering;
use std::collections::BinaryHeap;

use reqwest::blocking::get;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use strsim::jaro_winkler;
use tracing::{info, warn};

use crate::error::{Error, Result};

pub const APP_LIST_URL: &str = "https://api.steampowered.com/ISteamApps/GetAppList/v2/";

const CLOSE_MATCH_CUTOFF: f64 = 0.75;
const MAX_SUGGESTIONS: usize = 5;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct App {
    pub appid: u32,
    pub name: String,
}

#[derive(Deserialize, Debug)]
struct AppListResponse {
    applist: AppListBody,
}

#[derive(Deserialize, Debug)]
struct AppListBody {
    apps: Vec<App>,
}

#[derive(Debug, Clone, Default)]
pub struct AppList {
    apps: Vec<App>,
}

#[derive(PartialEq)]
struct ScoredApp<'a> {
    score: f64,
    app: &'a App,
}

impl Eq for ScoredApp<'_> {}

impl Ord for ScoredApp<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        other.score.total_cmp(&self.score)
    }
}

impl PartialOrd for ScoredApp<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl AppList {
    pub fn new(apps: Vec<App>) -> Self {
        AppList { apps }
    }

    pub fn from_json(body: &str) -> Result<Self> {
        let response: AppListResponse = serde_json::from_str(body)?;
        Ok(AppList::new(response.applist.apps))
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    /// Best first.
    fn close_matches(&self, name: &str) -> Vec<&App> {
        let mut heap = BinaryHeap::new();
        for app in &self.apps {
            let score = jaro_winkler(name, &app.name.to_lowercase());
            if score >= CLOSE_MATCH_CUTOFF {
                heap.push(ScoredApp { score, app });
            }
        }

        heap.into_sorted_vec()
            .into_iter()
            .map(|scored| scored.app)
            .collect()
    }

    /// Case-insensitive exact match, else the single close match if there
    /// is exactly one.
    pub fn find_app_id(&self, game_name: &str) -> Option<u32> {
        if game_name.is_empty() {
            return None;
        }
        let query = game_name.to_lowercase();

        if let Some(app) = self.apps.iter().find(|app| app.name.to_lowercase() == query) {
            info!("Found app ID for game '{}': {}", game_name, app.appid);
            return Some(app.appid);
        }

        let matches = self.close_matches(&query);
        match matches.len() {
            0 => warn!("App ID not found for game '{}'.", game_name),
            1 => {
                info!(
                    "Close match for '{}': {} ({})",
                    game_name, matches[0].name, matches[0].appid
                );
                return Some(matches[0].appid);
            }
            _ => {
                let suggestions: Vec<&str> = matches
                    .iter()
                    .take(MAX_SUGGESTIONS)
                    .map(|app| app.name.as_str())
                    .collect();
                warn!(
                    "No exact match found for '{}'. Did you mean one of: {}?",
                    game_name,
                    suggestions.join(", ")
                );
            }
        }

        None
    }
}

/// Steam Web API client; the app list is fetched once and cached.
pub struct SteamApi {
    url: String,
    api_key: Option<String>,
    cache: Option<AppList>,
}

impl SteamApi {
    pub fn new(url: impl Into<String>) -> Self {
        SteamApi {
            url: url.into(),
            api_key: None,
            cache: None,
        }
    }

    /// Sends `key` with every request when set.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    fn request_url(&self) -> Result<Url> {
        let url = match &self.api_key {
            Some(key) => Url::parse_with_params(&self.url, &[("key", key)]),
            None => Url::parse(&self.url),
        };
        url.map_err(|e| Error::InvalidInput(format!("app list URL {}: {}", self.url, e)))
    }

    pub fn app_list(&mut self) -> Result<&AppList> {
        if self.cache.is_none() {
            let response: AppListResponse =
                get(self.request_url()?)?.error_for_status()?.json()?;
            info!("Retrieved Steam app list ({} apps).", response.applist.apps.len());
            self.cache = Some(AppList::new(response.applist.apps));
        }
        Ok(self.cache.get_or_insert_with(AppList::default))
    }

    pub fn find_app_id(&mut self, game_name: &str) -> Result<Option<u32>> {
        Ok(self.app_list()?.find_app_id(game_name))
    }
}

/// A SteamID64 is a 17-digit decimal number.
pub fn validate_steam_id(steam_id: &str) -> bool {
    let valid = steam_id.len() == 17 && steam_id.bytes().all(|b| b.is_ascii_digit());
    if !valid {
        warn!("Invalid Steam ID format: {}", steam_id);
    }
    valid
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apps() -> AppList {
        AppList::from_json(
            r#"{"applist":{"apps":[
                {"appid":220,"name":"Half-Life 2"},
                {"appid":400,"name":"Portal"},
                {"appid":620,"name":"Portal 2"},
                {"appid":70,"name":"Half-Life"}
            ]}}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_parse_app_list() {
        let list = apps();
        assert_eq!(list.len(), 4);
        assert!(!list.is_empty());
        assert!(AppList::from_json(r#"{"apps":[]}"#).is_err());
    }

    #[test]
    fn test_api_key_is_sent_as_query() {
        let api = SteamApi::new(APP_LIST_URL);
        assert_eq!(api.request_url().unwrap().as_str(), APP_LIST_URL);

        let api = SteamApi::new(APP_LIST_URL).with_api_key(Some("abc".to_string()));
        let url = api.request_url().unwrap();
        assert_eq!(url.query(), Some("key=abc"));
        assert!(url.as_str().starts_with(APP_LIST_URL));

        assert!(matches!(
            SteamApi::new("not a url").request_url(),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_exact_match_ignores_case() {
        let list = apps();
        assert_eq!(list.find_app_id("half-life 2"), Some(220));
        assert_eq!(list.find_app_id("PORTAL"), Some(400));
        assert_eq!(list.find_app_id(""), None);
    }

    #[test]
    fn test_single_close_match_is_accepted() {
        let list = AppList::new(vec![
            App {
                appid: 620,
                name: "Portal 2".to_string(),
            },
            App {
                appid: 10,
                name: "Counter-Strike".to_string(),
            },
        ]);
        assert_eq!(list.find_app_id("Portal 2 "), Some(620));
        assert_eq!(list.find_app_id("Zzzzzz"), None);
    }

    #[test]
    fn test_ambiguous_close_matches_are_rejected() {
        assert_eq!(apps().find_app_id("Half-Life 3"), None);
    }

    #[test]
    fn test_close_matches_are_ordered_best_first() {
        let list = apps();
        let matches = list.close_matches("portal 2");
        assert_eq!(matches[0].appid, 620);
    }

    #[test]
    fn test_validate_steam_id() {
        assert!(validate_steam_id("76561197960287930"));
        assert!(!validate_steam_id("7656119796028793"));
        assert!(!validate_steam_id("7656119796028793a"));
        assert!(!validate_steam_id(""));
    }
}
