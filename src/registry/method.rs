use axum::routing::MethodFilter;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

/// Keyword groups checked top to bottom; the first group with a keyword
/// contained in the lower-cased name decides the method.
const METHOD_RULES: &[(&[&str], HttpMethod)] = &[
    (&["get", "fetch", "stalk", "search", "check"], HttpMethod::Get),
    (&["post", "create", "add", "submit"], HttpMethod::Post),
    (&["put", "update", "edit", "modify"], HttpMethod::Put),
    (&["delete", "remove", "destroy"], HttpMethod::Delete),
    (&["patch"], HttpMethod::Patch),
];

impl HttpMethod {
    /// Infers the method for an exported function name. Falls back to GET.
    pub fn classify(function_name: &str) -> Self {
        let name = function_name.to_lowercase();
        METHOD_RULES
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|keyword| name.contains(keyword)))
            .map(|(_, method)| *method)
            .unwrap_or(HttpMethod::Get)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Delete => "delete",
            HttpMethod::Patch => "patch",
        }
    }

    pub fn method_filter(&self) -> MethodFilter {
        match self {
            HttpMethod::Get => MethodFilter::GET,
            HttpMethod::Post => MethodFilter::POST,
            HttpMethod::Put => MethodFilter::PUT,
            HttpMethod::Delete => MethodFilter::DELETE,
            HttpMethod::Patch => MethodFilter::PATCH,
        }
    }
}

impl From<HttpMethod> for http::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => http::Method::GET,
            HttpMethod::Post => http::Method::POST,
            HttpMethod::Put => http::Method::PUT,
            HttpMethod::Delete => http::Method::DELETE,
            HttpMethod::Patch => http::Method::PATCH,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}
