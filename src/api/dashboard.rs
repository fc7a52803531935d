use axum::{
    extract::State,
    response::{Html, IntoResponse},
    Json,
};
use serde_json::json;
use std::fmt::Write;
use std::sync::Arc;

use crate::api::CREATOR;
use crate::registry::{CapabilityRegistry, HttpMethod, RouteDescriptor};

const FEATURES: [&str; 3] = [
    "Auto-load scrape modules",
    "Auto-detect HTTP methods",
    "Clean API response format",
];

pub async fn index(State(registry): State<Arc<CapabilityRegistry>>) -> impl IntoResponse {
    Html(render_index(&registry.descriptors()))
}

pub async fn api_info(State(registry): State<Arc<CapabilityRegistry>>) -> impl IntoResponse {
    let endpoints = registry.descriptors();
    Json(json!({
        "success": true,
        "message": "Carlotta - Simple & Clean API System",
        "creator": CREATOR,
        "version": env!("CARGO_PKG_VERSION"),
        "features": FEATURES,
        "total": endpoints.len(),
        "endpoints": endpoints,
    }))
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn endpoint_card(out: &mut String, endpoint: &RouteDescriptor) {
    let route = escape_html(&endpoint.route);
    let test_button = if endpoint.method == HttpMethod::Get {
        format!(r#"<a href="{}?param=value" class="test-btn">Test</a>"#, route)
    } else {
        r#"<button class="test-btn disabled" disabled>Test</button>"#.to_string()
    };

    // writing into a String cannot fail
    let _ = write!(
        out,
        r#"        <div class="endpoint-card">
            <div class="method-badge {}">{}</div>
            <div class="endpoint-details">
                <div class="route">{}</div>
                <div class="meta">
                    <span class="function">{}()</span>
                    <span class="module">{}</span>
                </div>
                {}
            </div>
        </div>
"#,
        endpoint.method.as_str(),
        endpoint.method,
        route,
        escape_html(&endpoint.function),
        escape_html(&endpoint.module),
        test_button,
    );
}

pub fn render_index(endpoints: &[RouteDescriptor]) -> String {
    let mut cards = String::new();
    if endpoints.is_empty() {
        cards.push_str(
            r#"        <div class="no-endpoints">
            <p>No endpoints found</p>
            <p>Add module manifests to the scrape directory to get started!</p>
        </div>
"#,
        );
    }
    for endpoint in endpoints {
        endpoint_card(&mut cards, endpoint);
    }

    include_str!("../static/index.html")
        .replace("{{TOTAL}}", &endpoints.len().to_string())
        .replace("{{ENDPOINTS}}", &cards)
}
