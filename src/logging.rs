//! Middleware for logging requests and responses.

use std::time::Instant;

use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{StatusCode, header::CONTENT_TYPE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;

/// The number of characters of a body to include in the `info` level summary.
pub const LOG_BODY_LENGTH_LIMIT: usize = 80;

const REDACTED: &str = "********";

/// Log a one line summary of each request that reaches the API.
///
/// The summary has the form `METHOD path status in Xms :: body`, where body
/// is the JSON response body truncated to [LOG_BODY_LENGTH_LIMIT] characters.
/// Only paths under `/api` are summarised. The full request and response
/// bodies are logged at the `debug` level, with any `password` fields in JSON
/// request bodies redacted.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_owned();

    let (parts, body) = request.into_parts();
    let body_bytes = match read_body(body).await {
        Ok(bytes) => bytes,
        Err(response) => return response,
    };
    tracing::debug!(
        "Received request: {method} {path}\nbody: {}",
        redact_password(&String::from_utf8_lossy(&body_bytes))
    );

    let request = Request::from_parts(parts, Body::from(body_bytes));
    let response = next.run(request).await;

    let (parts, body) = response.into_parts();
    let body_bytes = match read_body(body).await {
        Ok(bytes) => bytes,
        Err(response) => return response,
    };
    let body_text = String::from_utf8_lossy(&body_bytes);
    let is_json = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"));

    if path.starts_with(crate::endpoints::API_PREFIX) {
        let mut line = format!(
            "{method} {path} {} in {}ms",
            parts.status.as_u16(),
            start.elapsed().as_millis()
        );

        if is_json && !body_text.is_empty() {
            line = format!("{line} :: {body_text}");
        }

        tracing::info!("{}", truncate(&line, LOG_BODY_LENGTH_LIMIT));
    }

    tracing::debug!("Sending response: {:?}\nbody: {body_text}", parts.status);

    Response::from_parts(parts, Body::from(body_bytes))
}

async fn read_body(body: Body) -> Result<Bytes, Response> {
    axum::body::to_bytes(body, usize::MAX).await.map_err(|error| {
        tracing::error!("Could not read body for logging: {error}");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    })
}

/// Shorten `text` to at most `limit` characters, marking cut text with an ellipsis.
fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit.saturating_sub(1)) {
        Some((end, _)) if text[end..].chars().count() > 1 => format!("{}…", &text[..end]),
        _ => text.to_owned(),
    }
}

/// Replace the value of any `password` field in a JSON object with a placeholder.
///
/// Text that is not a JSON object is returned unchanged.
fn redact_password(body_text: &str) -> String {
    let Ok(mut value) = serde_json::from_str::<Value>(body_text) else {
        return body_text.to_owned();
    };

    match value.as_object_mut() {
        Some(object) if object.contains_key("password") => {
            object.insert("password".to_owned(), Value::String(REDACTED.to_owned()));
            value.to_string()
        }
        _ => body_text.to_owned(),
    }
}

#[cfg(test)]
mod logging_tests {
    use axum::{Json, Router, middleware, routing::post};
    use axum_test::TestServer;
    use serde_json::{Value, json};

    use super::{LOG_BODY_LENGTH_LIMIT, logging_middleware, redact_password, truncate};

    #[test]
    fn redacts_password_field() {
        let body = r#"{"username":"alice","password":"hunter2"}"#;

        let redacted = redact_password(body);

        assert!(!redacted.contains("hunter2"), "{redacted}");
        assert!(redacted.contains("alice"), "{redacted}");
    }

    #[test]
    fn leaves_text_without_password_unchanged() {
        assert_eq!(redact_password("not json"), "not json");
        assert_eq!(redact_password(r#"{"amount":5}"#), r#"{"amount":5}"#);
    }

    #[test]
    fn truncates_long_text_with_ellipsis() {
        let text = "a".repeat(LOG_BODY_LENGTH_LIMIT * 2);

        let got = truncate(&text, LOG_BODY_LENGTH_LIMIT);

        assert_eq!(got.chars().count(), LOG_BODY_LENGTH_LIMIT);
        assert!(got.ends_with('…'));
    }

    #[test]
    fn keeps_short_text() {
        assert_eq!(truncate("GET /api/transactions 200", 80), "GET /api/transactions 200");
        assert_eq!(truncate("abc", 3), "abc");
    }

    #[test]
    fn truncates_on_character_boundaries() {
        let got = truncate("€€€€€", 3);

        assert_eq!(got, "€€…");
    }

    #[tokio::test]
    async fn passes_bodies_through_unchanged() {
        async fn echo(Json(body): Json<Value>) -> Json<Value> {
            Json(body)
        }

        let app = Router::new()
            .route("/api/echo", post(echo))
            .layer(middleware::from_fn(logging_middleware));
        let server = TestServer::try_new(app).expect("Could not create test server.");
        let body = json!({"username": "alice", "password": "hunter2"});

        let response = server.post("/api/echo").json(&body).await;

        response.assert_status_ok();
        assert_eq!(response.json::<Value>(), body);
    }
}
