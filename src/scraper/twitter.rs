use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::error;

use crate::error::{Result, ScrapeError};
use crate::scraper::{capability_fn, send_json, ParameterBag, ScrapeModule};

const VIEWER_URL: &str = "https://twittermedia.b-cdn.net/viewer/";
const SITE_ORIGIN: &str = "https://snaplytics.io";

/// Field of a loose upstream object. Absent or null values take `default`;
/// anything else passes through untouched.
fn pick(node: &Value, key: &str, default: Value) -> Value {
    match node.get(key) {
        None | Some(Value::Null) => default,
        Some(value) => value.clone(),
    }
}

fn text(node: &Value, key: &str) -> Value {
    pick(node, key, Value::String(String::new()))
}

fn count(node: &Value, key: &str) -> Value {
    pick(node, key, Value::from(0))
}

// Reshaped output. Scalars stay `Value` so unexpected upstream types survive.

#[derive(Debug, Serialize, PartialEq)]
pub struct TwitterProfile {
    pub profile: Profile,
    pub tweets: Vec<Tweet>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Profile {
    pub name: Value,
    pub username: Value,
    pub bio: Value,
    pub avatar: Value,
    pub banner: Value,
    pub stats: ProfileStats,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ProfileStats {
    pub tweets: Value,
    pub following: Value,
    pub followers: Value,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Tweet {
    pub id: Value,
    pub text: Value,
    pub date: Value,
    pub stats: TweetStats,
    pub media: Vec<Media>,
    pub quoted: Option<QuotedTweet>,
    pub is_pinned: Value,
    pub is_retweet: Value,
    pub retweeter: Value,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct TweetStats {
    pub replies: Value,
    pub retweets: Value,
    pub likes: Value,
    pub views: Value,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Media {
    #[serde(rename = "type")]
    pub kind: Value,
    pub url: Value,
    pub poster: Value,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct QuotedTweet {
    pub id: Value,
    pub text: Value,
    pub date: Value,
    pub author: Author,
    pub media: Vec<Media>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Author {
    pub name: Value,
    pub username: Value,
    pub avatar: Value,
}

/// Non-array media fields become an empty list; null entries become empty media.
fn media_list(media: Option<&Value>) -> Vec<Media> {
    let Some(Value::Array(items)) = media else {
        return Vec::new();
    };

    items
        .iter()
        .map(|item| Media {
            kind: text(item, "type"),
            url: text(item, "url"),
            poster: text(item, "poster"),
        })
        .collect()
}

fn reshape_quoted(quoted: &Value) -> QuotedTweet {
    let author = quoted.get("author").unwrap_or(&Value::Null);
    QuotedTweet {
        id: text(quoted, "id"),
        text: text(quoted, "text"),
        date: text(quoted, "created_at"),
        author: Author {
            name: text(author, "name"),
            username: text(author, "username"),
            avatar: text(author, "avatar_url"),
        },
        media: media_list(quoted.get("media")),
    }
}

fn reshape_tweet(raw: &Value) -> Tweet {
    let stats = raw.get("stats").unwrap_or(&Value::Null);

    Tweet {
        id: text(raw, "id"),
        text: text(raw, "text"),
        date: text(raw, "created_at"),
        stats: TweetStats {
            replies: count(stats, "replies"),
            retweets: count(stats, "retweets"),
            likes: count(stats, "likes"),
            views: count(stats, "views"),
        },
        media: media_list(raw.get("media")),
        quoted: raw
            .get("quoted_tweet")
            .filter(|quoted| !quoted.is_null())
            .map(reshape_quoted),
        is_pinned: pick(raw, "is_pinned", Value::Bool(false)),
        is_retweet: pick(raw, "is_retweet", Value::Bool(false)),
        retweeter: pick(raw, "retweeter", Value::Null),
    }
}

pub fn reshape(body: Value) -> Result<TwitterProfile> {
    let profile = match body.get("profile") {
        None | Some(Value::Null) => {
            return Err(ScrapeError::Parse("Profile not found".to_string()).into());
        }
        Some(profile) => profile,
    };
    let stats = profile.get("stats").unwrap_or(&Value::Null);

    let tweets = match body.get("tweets") {
        Some(Value::Array(tweets)) => tweets.iter().map(reshape_tweet).collect(),
        _ => Vec::new(),
    };

    Ok(TwitterProfile {
        profile: Profile {
            name: text(profile, "name"),
            username: text(profile, "username"),
            bio: text(profile, "bio"),
            avatar: text(profile, "avatar_url"),
            banner: text(profile, "banner_url"),
            stats: ProfileStats {
                tweets: count(stats, "tweets"),
                following: count(stats, "following"),
                followers: count(stats, "followers"),
            },
        },
        tweets,
    })
}

#[derive(Clone)]
pub struct TwitterStalker {
    client: Client,
}

impl TwitterStalker {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn stalk(&self, params: ParameterBag) -> Result<Value> {
        let username = params.required_text("username", "Parameter username is required!")?;

        match self.fetch(&username).await {
            Ok(profile) => Ok(profile),
            Err(e) => {
                error!("Twitter lookup for {} failed: {}", username, e);
                Err(ScrapeError::Network("Failed to fetch Twitter data".to_string()).into())
            }
        }
    }

    async fn fetch(&self, username: &str) -> Result<Value> {
        let request = self
            .client
            .get(VIEWER_URL)
            .query(&[("data", username), ("type", "profile")])
            .header("User-Agent", "Mozilla/5.0")
            .header("Accept", "*/*")
            .header("Origin", SITE_ORIGIN)
            .header("Referer", format!("{}/", SITE_ORIGIN));

        let body = send_json(request).await?;
        let profile = reshape(body)?;
        Ok(serde_json::to_value(profile)?)
    }
}

pub fn module(client: Client) -> ScrapeModule {
    let stalker = TwitterStalker::new(client);
    ScrapeModule::new("twitter").export(capability_fn("stalkTwit", move |params| {
        let stalker = stalker.clone();
        async move { stalker.stalk(params).await }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reshape_full_payload() {
        let body = json!({
            "profile": {
                "name": "Kuro",
                "username": "kuroxel",
                "bio": "hello",
                "avatar_url": "https://img/avatar.jpg",
                "banner_url": "https://img/banner.jpg",
                "stats": { "tweets": 10, "following": 2, "followers": 300 }
            },
            "tweets": [{
                "id": "1",
                "text": "first",
                "created_at": "2024-01-01",
                "stats": { "replies": 1, "retweets": 2, "likes": 3, "views": 4 },
                "media": [{ "type": "photo", "url": "https://img/1.jpg" }],
                "quoted_tweet": {
                    "id": "0",
                    "text": "quoted",
                    "author": { "name": "Other", "username": "other" },
                    "media": "not-a-list"
                },
                "is_pinned": true,
                "retweeter": { "username": "someone" }
            }]
        });

        let profile = reshape(body).unwrap();

        assert_eq!(profile.profile.avatar, "https://img/avatar.jpg");
        assert_eq!(profile.profile.stats.followers, 300);
        assert_eq!(profile.tweets.len(), 1);

        let tweet = &profile.tweets[0];
        assert_eq!(tweet.date, "2024-01-01");
        assert_eq!(tweet.stats.views, 4);
        assert_eq!(tweet.media, vec![Media {
            kind: json!("photo"),
            url: json!("https://img/1.jpg"),
            poster: json!(""),
        }]);
        assert_eq!(tweet.is_pinned, json!(true));
        assert_eq!(tweet.is_retweet, json!(false));
        assert_eq!(tweet.retweeter, json!({ "username": "someone" }));

        let quoted = tweet.quoted.as_ref().unwrap();
        assert_eq!(quoted.author.username, "other");
        assert_eq!(quoted.author.avatar, "");
        assert!(quoted.media.is_empty());
        assert_eq!(quoted.date, "");
    }

    #[test]
    fn test_reshape_fills_defaults() {
        let profile = reshape(json!({ "profile": {}, "tweets": [{}] })).unwrap();
        let value = serde_json::to_value(&profile).unwrap();

        assert_eq!(value["profile"]["name"], json!(""));
        assert_eq!(value["profile"]["stats"]["tweets"], json!(0));
        assert_eq!(value["tweets"][0]["media"], json!([]));
        assert_eq!(value["tweets"][0]["quoted"], Value::Null);
        assert_eq!(value["tweets"][0]["retweeter"], Value::Null);
        assert_eq!(value["tweets"][0]["is_pinned"], json!(false));
    }

    #[test]
    fn test_reshape_passes_unexpected_types_through() {
        let body = json!({
            "profile": { "name": "a", "stats": { "followers": "1.2K", "tweets": null } },
            "tweets": [
                { "id": 1234567890_u64 },
                { "stats": { "views": 12.0, "likes": "9" } },
                { "stats": "hidden", "quoted_tweet": { "id": 7, "author": "anon" } }
            ]
        });

        let value = serde_json::to_value(reshape(body).unwrap()).unwrap();

        assert_eq!(value["profile"]["stats"]["followers"], json!("1.2K"));
        assert_eq!(value["profile"]["stats"]["tweets"], json!(0));
        assert_eq!(value["tweets"][0]["id"], json!(1234567890_u64));
        assert_eq!(value["tweets"][0]["text"], json!(""));
        assert_eq!(value["tweets"][1]["stats"]["views"], json!(12.0));
        assert_eq!(value["tweets"][1]["stats"]["likes"], json!("9"));
        assert_eq!(value["tweets"][2]["stats"]["views"], json!(0));
        assert_eq!(value["tweets"][2]["quoted"]["id"], json!(7));
        assert_eq!(value["tweets"][2]["quoted"]["author"]["name"], json!(""));
    }

    #[test]
    fn test_reshape_without_profile_fails() {
        let err = reshape(json!({ "tweets": [] })).unwrap_err();
        assert!(err.to_string().contains("Profile not found"));
    }

    #[tokio::test]
    async fn test_username_required() {
        let stalker = TwitterStalker::new(Client::new());
        let err = stalker.stalk(ParameterBag::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "Parameter username is required!");
    }
}
