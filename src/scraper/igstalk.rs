use reqwest::Client;
use serde_json::{json, Value};
use tracing::info;

use crate::error::Result;
use crate::scraper::{capability_fn, send_json, ParameterBag, ScrapeModule};

const BASE_URL: &str = "https://free-tools-api.vercel.app/api";

#[derive(Clone)]
pub struct InstagramStalker {
    client: Client,
}

impl InstagramStalker {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Profile, current stories and latest posts, fetched concurrently.
    pub async fn stalk(&self, params: ParameterBag) -> Result<Value> {
        let username = params.required_text("username", "Username is required")?;
        info!("Stalking Instagram profile {}", username);

        let profile = send_json(
            self.client
                .post(format!("{}/instagram-profile", BASE_URL))
                .json(&json!({ "username": username })),
        );
        let stories = self.viewer(&username, "stories");
        let posts = self.viewer(&username, "photo");

        let (profile, stories, posts) = futures::try_join!(profile, stories, posts)?;

        Ok(json!({
            "profile_info": profile,
            "stories": field(&stories, "stories"),
            "latest_posts": field(&posts, "posts"),
        }))
    }

    async fn viewer(&self, username: &str, kind: &str) -> Result<Value> {
        send_json(
            self.client
                .post(format!("{}/instagram-viewer", BASE_URL))
                .json(&json!({ "username": username, "type": kind })),
        )
        .await
    }
}

fn field(body: &Value, key: &str) -> Value {
    body.get(key).cloned().unwrap_or(Value::Null)
}

pub fn module(client: Client) -> ScrapeModule {
    let stalker = InstagramStalker::new(client);
    ScrapeModule::new("igstalk").export(capability_fn("stalkInstagram", move |params| {
        let stalker = stalker.clone();
        async move { stalker.stalk(params).await }
    }))
}
