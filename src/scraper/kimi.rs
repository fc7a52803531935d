use chrono::Utc;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, SET_COOKIE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::{Result, ScrapeError};
use crate::scraper::{capability_fn, send_json, ParameterBag, ScrapeModule};

const BASE_URL: &str = "https://www.kimi.com/api";
const MODELS: [&str; 2] = ["k1.5", "k2"];

#[derive(Debug, Clone, PartialEq)]
pub struct ChatOptions {
    pub model: String,
    pub search: bool,
    pub deep_research: bool,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            model: "k2".to_string(),
            search: true,
            deep_research: false,
        }
    }
}

#[derive(Debug, Default, Serialize, PartialEq)]
pub struct ChatReply {
    pub text: String,
    pub search_by: Value,
    pub sources: Vec<Value>,
    pub citations: Vec<Value>,
}

/// Bearer token and cookie handed out by the device registration endpoint.
#[derive(Debug, Clone)]
struct DeviceSession {
    authorization: String,
    cookie: String,
}

#[derive(Debug, Deserialize)]
struct RegisterReply {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct CreatedChat {
    id: String,
}

/// `<millis><0..999>`, the shape the web client uses for device and session ids.
fn client_id() -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1000);
    format!("{}{}", Utc::now().timestamp_millis(), suffix)
}

pub fn parse_chat_params(params: &ParameterBag) -> std::result::Result<(String, ChatOptions), ScrapeError> {
    let question = params.required_text("question", "Question is required")?;

    let mut options = ChatOptions::default();
    match params.get("model") {
        None | Some(Value::Null) => {}
        Some(Value::String(model)) if MODELS.contains(&model.as_str()) => {
            options.model = model.clone();
        }
        // present but unknown, empty strings included
        Some(_) => {
            return Err(ScrapeError::validation(format!(
                "Available models: {}",
                MODELS.join(", ")
            )));
        }
    }
    if let Some(search) = params.flag("search", "Search must be boolean")? {
        options.search = search;
    }
    if let Some(deep) = params.flag("deep_research", "Deep Research must be boolean")? {
        options.deep_research = deep;
    }

    Ok((question, options))
}

/// Folds the `data:` records of a completion event stream into one reply.
pub fn fold_completion_stream(body: &str) -> ChatReply {
    let mut reply = ChatReply {
        search_by: json!([]),
        ..ChatReply::default()
    };

    for record in body.split("\n\n") {
        let Some(payload) = record.strip_prefix("data:") else {
            continue;
        };
        let event: Value = match serde_json::from_str(payload.trim()) {
            Ok(event) => event,
            Err(e) => {
                warn!("Skipping undecodable completion record: {}", e);
                continue;
            }
        };

        match event.get("event").and_then(Value::as_str) {
            Some("cmpl") => {
                if let Some(text) = event.get("text").and_then(Value::as_str) {
                    reply.text.push_str(text);
                }
            }
            Some("search_plus") => {
                if event.pointer("/msg/type").and_then(Value::as_str) == Some("target") {
                    reply.search_by = event.pointer("/msg/targets").cloned().unwrap_or(Value::Null);
                }
                if event.get("type").and_then(Value::as_str) == Some("get_res") {
                    reply.sources.push(event.get("msg").cloned().unwrap_or(Value::Null));
                }
            }
            Some("search_citation") => {
                if let Some(values) = event.get("values").and_then(Value::as_object) {
                    reply.citations = values.values().cloned().collect();
                }
            }
            _ => {}
        }
    }

    reply
}

/// One conversation with fresh device identifiers.
pub struct KimiChat {
    client: Client,
    headers: HeaderMap,
}

impl KimiChat {
    pub fn new(client: Client) -> Self {
        let device_id = client_id();
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        headers.insert("x-language", HeaderValue::from_static("zh-CN"));
        headers.insert("x-msh-platform", HeaderValue::from_static("web"));
        // ids are ASCII digits
        if let Ok(value) = HeaderValue::from_str(&device_id) {
            headers.insert("x-msh-device-id", value.clone());
            headers.insert("x-traffic-id", value);
        }
        if let Ok(value) = HeaderValue::from_str(&client_id()) {
            headers.insert("x-msh-session-id", value);
        }

        Self { client, headers }
    }

    async fn register(&self) -> Result<DeviceSession> {
        let response = self
            .client
            .post(format!("{}/device/register", BASE_URL))
            .headers(self.headers.clone())
            .json(&json!({}))
            .send()
            .await
            .map_err(ScrapeError::from)?;

        if !response.status().is_success() {
            return Err(ScrapeError::UpstreamStatus(response.status().as_u16()).into());
        }

        let cookie = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect::<Vec<_>>()
            .join("; ");
        let reply: RegisterReply = response.json().await.map_err(ScrapeError::from)?;

        Ok(DeviceSession {
            authorization: format!("Bearer {}", reply.access_token),
            cookie,
        })
    }

    fn session_headers(&self, session: &DeviceSession) -> Result<HeaderMap> {
        let mut headers = self.headers.clone();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&session.authorization)
                .map_err(|e| ScrapeError::Parse(format!("Invalid access token: {}", e)))?,
        );
        headers.insert(
            "cookie",
            HeaderValue::from_str(&session.cookie)
                .map_err(|e| ScrapeError::Parse(format!("Invalid session cookie: {}", e)))?,
        );
        Ok(headers)
    }

    pub async fn ask(&self, question: &str, options: &ChatOptions) -> Result<ChatReply> {
        let session = match self.register().await {
            Ok(session) => session,
            Err(e) => {
                warn!("Kimi device registration failed: {}", e);
                return Err(ScrapeError::Network("Failed to get token".to_string()).into());
            }
        };
        let headers = self.session_headers(&session)?;

        let chat = send_json(
            self.client
                .post(format!("{}/chat", BASE_URL))
                .headers(headers.clone())
                .json(&json!({
                    "name": "未命名会话",
                    "born_from": "home",
                    "kimiplus_id": "kimi",
                    "is_example": false,
                    "source": "web",
                    "tags": []
                })),
        )
        .await?;
        let chat: CreatedChat = serde_json::from_value(chat).map_err(ScrapeError::from)?;
        debug!("Created Kimi chat {}", chat.id);

        let response = self
            .client
            .post(format!("{}/chat/{}/completion/stream", BASE_URL, chat.id))
            .headers(headers)
            .json(&json!({
                "kimiplus_id": "kimi",
                "extend": { "sidebar": true },
                "model": options.model,
                "use_search": options.search,
                "messages": [{ "role": "user", "content": question }],
                "refs": [],
                "history": [],
                "scene_labels": [],
                "use_semantic_memory": false,
                "use_deep_research": options.deep_research
            }))
            .send()
            .await
            .map_err(ScrapeError::from)?;

        if !response.status().is_success() {
            return Err(ScrapeError::UpstreamStatus(response.status().as_u16()).into());
        }

        let body = response.text().await.map_err(ScrapeError::from)?;
        Ok(fold_completion_stream(&body))
    }
}

pub async fn chat(client: Client, params: ParameterBag) -> Result<Value> {
    let (question, options) = parse_chat_params(&params)?;
    info!("Asking Kimi ({}), search={}", options.model, options.search);

    let reply = KimiChat::new(client).ask(&question, &options).await?;
    Ok(serde_json::to_value(reply)?)
}

pub fn module(client: Client) -> ScrapeModule {
    ScrapeModule::new("kimi").export(capability_fn("chatKimi", move |params| {
        chat(client.clone(), params)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bag(pairs: &[(&str, Value)]) -> ParameterBag {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_parse_defaults() {
        let (question, options) = parse_chat_params(&bag(&[("question", json!("hi"))])).unwrap();
        assert_eq!(question, "hi");
        assert_eq!(options, ChatOptions::default());
    }

    #[test]
    fn test_parse_validation_order() {
        let err = parse_chat_params(&bag(&[("model", json!("gpt"))])).unwrap_err();
        assert_eq!(err.to_string(), "Question is required");

        let err = parse_chat_params(&bag(&[("question", json!("hi")), ("model", json!("gpt"))])).unwrap_err();
        assert_eq!(err.to_string(), "Available models: k1.5, k2");

        let err = parse_chat_params(&bag(&[("question", json!("hi")), ("model", json!(""))])).unwrap_err();
        assert_eq!(err.to_string(), "Available models: k1.5, k2");

        let err = parse_chat_params(&bag(&[("question", json!("hi")), ("model", json!(2))])).unwrap_err();
        assert_eq!(err.to_string(), "Available models: k1.5, k2");

        let err = parse_chat_params(&bag(&[("question", json!("hi")), ("search", json!("maybe"))])).unwrap_err();
        assert_eq!(err.to_string(), "Search must be boolean");

        let err = parse_chat_params(&bag(&[("question", json!("hi")), ("deep_research", json!(1))])).unwrap_err();
        assert_eq!(err.to_string(), "Deep Research must be boolean");
    }

    #[test]
    fn test_parse_accepts_query_string_flags() {
        let params = bag(&[
            ("question", json!("hi")),
            ("model", json!("k1.5")),
            ("search", json!("false")),
            ("deep_research", json!(true)),
        ]);
        let (_, options) = parse_chat_params(&params).unwrap();
        assert_eq!(options.model, "k1.5");
        assert!(!options.search);
        assert!(options.deep_research);
    }

    #[test]
    fn test_fold_completion_stream() {
        let body = concat!(
            "data: {\"event\":\"cmpl\",\"text\":\"Hel\"}\n\n",
            "data: {\"event\":\"search_plus\",\"msg\":{\"type\":\"target\",\"targets\":[\"rust\"]}}\n\n",
            "data: {\"event\":\"search_plus\",\"type\":\"get_res\",\"msg\":{\"url\":\"https://a\"}}\n\n",
            "data: not json\n\n",
            "event: ping\n\n",
            "data: {\"event\":\"cmpl\",\"text\":\"lo\"}\n\n",
            "data: {\"event\":\"search_citation\",\"values\":{\"1\":{\"n\":1},\"2\":{\"n\":2}}}\n\n",
            "data: {\"event\":\"all_done\"}\n\n",
        );

        let reply = fold_completion_stream(body);

        assert_eq!(reply.text, "Hello");
        assert_eq!(reply.search_by, json!(["rust"]));
        assert_eq!(reply.sources, vec![json!({"url": "https://a"})]);
        assert_eq!(reply.citations, vec![json!({"n": 1}), json!({"n": 2})]);
    }

    #[test]
    fn test_fold_empty_stream() {
        let reply = fold_completion_stream("");
        let value = serde_json::to_value(reply).unwrap();
        assert_eq!(value, json!({ "text": "", "search_by": [], "sources": [], "citations": [] }));
    }

    #[test]
    fn test_client_ids_are_numeric() {
        let id = client_id();
        assert!(id.len() >= 13);
        assert!(id.chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn test_chat_validates_before_network() {
        let err = chat(Client::new(), ParameterBag::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "Question is required");
    }
}
