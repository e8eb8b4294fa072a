use axum::{
    body::Body,
    http::{header::CONTENT_LENGTH, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Instant;
use uuid::Uuid;

const MAX_BODY_LOG_SIZE: usize = 1024; // 1KB limit for body logging
pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub async fn request_logger_middleware(mut req: Request<Body>, next: Next<Body>) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let header_value = HeaderValue::from_str(&request_id).ok();
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();

    // Insert request ID into headers for downstream handlers
    if let Some(value) = header_value.clone() {
        req.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    let log_body = std::env::var("LOG_REQUEST_BODY")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    if log_body {
        let declared_len = req
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());

        match declared_len {
            Some(len) if len > MAX_BODY_LOG_SIZE => {
                tracing::warn!(
                    request_id = %request_id,
                    method = %method,
                    uri = %uri,
                    body_size = len,
                    "Request body too large to log"
                );
                return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
            }
            Some(_) => {
                let (parts, body) = req.into_parts();
                let bytes = match hyper::body::to_bytes(body).await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        tracing::warn!(request_id = %request_id, error = %e, "Failed to read request body");
                        return (StatusCode::BAD_REQUEST, "Failed to read request body").into_response();
                    }
                };

                let sanitized_body = match serde_json::from_slice::<serde_json::Value>(&bytes) {
                    Ok(json) => {
                        let sanitized = crate::utils::sanitize::sanitize_json(&json);
                        serde_json::to_string(&sanitized).unwrap_or_else(|_| "[invalid json]".to_string())
                    }
                    Err(_) => format!("[non-json, {} bytes]", bytes.len()),
                };

                tracing::info!(
                    request_id = %request_id,
                    method = %method,
                    uri = %uri,
                    body_size = bytes.len(),
                    body = %sanitized_body,
                    "Incoming request"
                );

                req = Request::from_parts(parts, Body::from(bytes));
            }
            None => {
                tracing::info!(
                    request_id = %request_id,
                    method = %method,
                    uri = %uri,
                    "Incoming request"
                );
            }
        }
    } else {
        tracing::info!(
            request_id = %request_id,
            method = %method,
            uri = %uri,
            "Incoming request"
        );
    }

    let response = next.run(req).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        status = %status.as_u16(),
        latency_ms = latency.as_millis(),
        "Outgoing response"
    );

    let (mut parts, body) = response.into_parts();
    if let Some(value) = header_value {
        parts.headers.insert(REQUEST_ID_HEADER, value);
    }

    Response::from_parts(parts, body)
}
