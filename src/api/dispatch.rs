use axum::{
    extract::Request,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{on, MethodRouter},
    Json,
};
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::api::request::collect_params;
use crate::api::ApiResponse;
use crate::registry::HttpMethod;
use crate::scraper::Capability;

/// Binds a capability to its inferred method.
pub fn bind<S>(capability: Arc<dyn Capability>, method: HttpMethod, max_body_size: usize) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    on(method.method_filter(), move |request: Request| {
        let capability = capability.clone();
        async move { dispatch(capability, request, max_body_size).await }
    })
}

pub fn failure(status: StatusCode, message: String) -> Response {
    (status, Json(ApiResponse::<Value>::error(message))).into_response()
}

async fn dispatch(capability: Arc<dyn Capability>, request: Request, max_body_size: usize) -> Response {
    let params = match collect_params(request, max_body_size).await {
        Ok(params) => params,
        Err(e) => {
            warn!("Rejected request for {}: {}", capability.name(), e);
            return failure(StatusCode::BAD_REQUEST, e.to_string());
        }
    };

    debug!("Invoking {} with {} parameters", capability.name(), params.len());
    match capability.invoke(params).await {
        Ok(data) => (StatusCode::OK, Json(ApiResponse::success(data))).into_response(),
        Err(e) => {
            warn!("{} failed: {}", capability.name(), e);
            failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Turns a panicking capability into the usual failure envelope.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Capability panicked".to_string()
    };

    error!("Capability panicked: {}", message);
    failure(StatusCode::INTERNAL_SERVER_ERROR, message)
}
