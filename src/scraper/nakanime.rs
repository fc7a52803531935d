use regex::Regex;
use reqwest::Client;
use serde_json::Value;
use std::sync::OnceLock;
use tracing::debug;

use crate::error::{Result, ScrapeError};
use crate::scraper::{capability_fn, send_json, ParameterBag, ScrapeModule};

const BASE_URL: &str = "https://anime.nakanime.my.id/api/anime";
const USER_AGENT: &str = "okhttp/4.9.2";
const ORDERS: [&str; 6] = ["title", "latest", "popular", "rating", "update", "titlereverse"];

/// Anime name from a detail page url.
pub fn detail_name(url: &str) -> Option<String> {
    static DETAIL_URL: OnceLock<Regex> = OnceLock::new();
    let re = DETAIL_URL.get_or_init(|| {
        Regex::new(r"^https://api\.nakanime\.my\.id/anime/([^/]+)/?$").expect("Invalid detail url regex")
    });
    re.captures(url).map(|caps| caps[1].to_string())
}

/// Episode slug from an episode page url.
pub fn episode_slug(url: &str) -> Option<String> {
    static EPISODE_URL: OnceLock<Regex> = OnceLock::new();
    let re = EPISODE_URL.get_or_init(|| {
        Regex::new(r"^https://api\.nakanime\.my\.id/([^/]+episode-[^/]+)/?$").expect("Invalid episode url regex")
    });
    re.captures(url).map(|caps| caps[1].to_string())
}

pub fn check_order(order: &str) -> std::result::Result<(), ScrapeError> {
    if ORDERS.contains(&order) {
        Ok(())
    } else {
        Err(ScrapeError::validation(format!("Available orders: {}", ORDERS.join(", "))))
    }
}

/// Slugs listed by the `/genre` endpoint.
pub fn genre_slugs(listing: &Value) -> Vec<String> {
    listing
        .get("data")
        .and_then(Value::as_array)
        .map(|genres| {
            genres
                .iter()
                .filter_map(|genre| genre.get("slug").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Clone)]
pub struct Nakanime {
    client: Client,
}

impl Nakanime {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn fetch(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        debug!("Nakanime request {}{} {:?}", BASE_URL, path, query);
        send_json(
            self.client
                .get(format!("{}{}", BASE_URL, path))
                .header("accept", "application/json, text/plain, */*")
                .header("user-agent", USER_AGENT)
                .query(query),
        )
        .await
    }

    pub async fn list(&self, params: ParameterBag) -> Result<Value> {
        let order = params.text_or("order", "latest");
        let page = params.text_or("page", "1");
        check_order(&order)?;

        self.fetch("/all/", &[("order", order.as_str()), ("page", page.as_str())]).await
    }

    pub async fn by_genre(&self, params: ParameterBag) -> Result<Value> {
        let genre = params.text_or("genre", "action");
        let page = params.text_or("page", "1");

        let listing = self.fetch("/genre", &[]).await?;
        let genres = genre_slugs(&listing);
        if !genres.contains(&genre) {
            return Err(ScrapeError::validation(format!("Available genres: {}", genres.join(", "))).into());
        }

        self.fetch("/bygenres/", &[("genre", genre.as_str()), ("page", page.as_str())]).await
    }

    pub async fn search(&self, params: ParameterBag) -> Result<Value> {
        let query = params.required_text("query", "Query is required")?;
        self.fetch("/search/", &[("keyword", query.as_str())]).await
    }

    pub async fn detail(&self, params: ParameterBag) -> Result<Value> {
        let url = params.required_text("url", "Url is required")?;
        let name = detail_name(&url).ok_or_else(|| ScrapeError::validation("Invalid url"))?;
        self.fetch("", &[("name", name.as_str())]).await
    }

    pub async fn episode(&self, params: ParameterBag) -> Result<Value> {
        let url = params.required_text("url", "Url is required")?;
        let slug = episode_slug(&url).ok_or_else(|| ScrapeError::validation("Invalid url"))?;
        self.fetch("/data/", &[("slug", slug.as_str())]).await
    }
}

pub fn module(client: Client) -> ScrapeModule {
    let nakanime = Nakanime::new(client);

    let list = nakanime.clone();
    let by_genre = nakanime.clone();
    let search = nakanime.clone();
    let detail = nakanime.clone();
    let episode = nakanime;

    ScrapeModule::new("nakanime")
        .export(capability_fn("getAnime", move |params| {
            let n = list.clone();
            async move { n.list(params).await }
        }))
        .export(capability_fn("getAnimeByGenre", move |params| {
            let n = by_genre.clone();
            async move { n.by_genre(params).await }
        }))
        .export(capability_fn("searchAnime", move |params| {
            let n = search.clone();
            async move { n.search(params).await }
        }))
        .export(capability_fn("getAnimeDetail", move |params| {
            let n = detail.clone();
            async move { n.detail(params).await }
        }))
        .export(capability_fn("getAnimeData", move |params| {
            let n = episode.clone();
            async move { n.episode(params).await }
        }))
}
