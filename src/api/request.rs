use axum::extract::Request;
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderMap;
use serde_json::{Map, Value};
use tracing::debug;
use url::form_urlencoded;

use crate::error::ScrapeError;
use crate::scraper::ParameterBag;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Json,
    Form,
}

fn body_kind(headers: &HeaderMap) -> Option<BodyKind> {
    let content_type = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if essence == "application/json" || essence.ends_with("+json") {
        Some(BodyKind::Json)
    } else if essence == "application/x-www-form-urlencoded" {
        Some(BodyKind::Form)
    } else {
        None
    }
}

/// `a[b][c]` splits into `["a", "b", "c"]`. Keys without a well-formed
/// bracket suffix stay whole.
fn key_path(key: &str) -> Vec<&str> {
    let Some(open) = key.find('[') else {
        return vec![key];
    };
    if open == 0 {
        return vec![key];
    }

    let mut path = vec![&key[..open]];
    let mut rest = &key[open..];
    while !rest.is_empty() {
        let Some(inner) = rest.strip_prefix('[') else {
            return vec![key];
        };
        let Some(close) = inner.find(']') else {
            return vec![key];
        };
        path.push(&inner[..close]);
        rest = &inner[close + 1..];
    }
    path
}

/// Stores `value` under `key`. A repeated key collects its values into an array.
fn push_value(map: &mut Map<String, Value>, key: &str, value: Value) {
    match map.get_mut(key) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            map.insert(key.to_string(), value);
        }
    }
}

/// Returns false when the path runs into an existing non-object value.
fn insert_path(map: &mut Map<String, Value>, path: &[&str], value: Value) -> bool {
    match path {
        [] => false,
        [key] => {
            push_value(map, key, value);
            true
        }
        // `a[]` appends
        [key, ""] => match map.get_mut(*key) {
            None => {
                map.insert(key.to_string(), Value::Array(vec![value]));
                true
            }
            Some(Value::Object(_)) => false,
            Some(_) => {
                push_value(map, key, value);
                true
            }
        },
        [key, rest @ ..] => {
            let child = map
                .entry(key.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            match child {
                Value::Object(nested) => insert_path(nested, rest, value),
                _ => false,
            }
        }
    }
}

/// Decodes `key=value` pairs. A repeated key collects its values into an
/// array, `a[b]=1` nests into `{"a": {"b": "1"}}` and `a[]=1` appends to `a`.
pub fn parse_pairs(input: &[u8]) -> ParameterBag {
    let mut values: Map<String, Value> = Map::new();
    for (key, value) in form_urlencoded::parse(input) {
        let value = Value::String(value.into_owned());
        let path = key_path(&key);
        if path.len() == 1 || !insert_path(&mut values, &path, value.clone()) {
            if path.len() > 1 {
                debug!("Keeping {} as a flat key", key);
            }
            push_value(&mut values, &key, value);
        }
    }
    values.into()
}

/// Query parameters, overlaid with body parameters.
pub async fn collect_params(request: Request, max_body_size: usize) -> Result<ParameterBag, ScrapeError> {
    let (parts, body) = request.into_parts();
    let mut params = parse_pairs(parts.uri.query().unwrap_or_default().as_bytes());

    let Some(kind) = body_kind(&parts.headers) else {
        return Ok(params);
    };

    let bytes = axum::body::to_bytes(body, max_body_size)
        .await
        .map_err(|e| ScrapeError::InvalidBody(e.to_string()))?;
    if bytes.is_empty() {
        return Ok(params);
    }

    match kind {
        BodyKind::Json => {
            let value: Value = serde_json::from_slice(&bytes)
                .map_err(|e| ScrapeError::InvalidBody(e.to_string()))?;
            // only objects carry named parameters
            if let Value::Object(map) = value {
                params.merge(map.into());
            }
        }
        BodyKind::Form => params.merge(parse_pairs(&bytes)),
    }

    Ok(params)
}
