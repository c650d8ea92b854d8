use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Error body shape shared by every endpoint: `{"error": "<message>"}`.
#[derive(Serialize)]
struct ErrorResponse<'a> {
    error: &'a str,
}

pub const HEADER_X_CHAT_ERROR_CODE: &str = "X-Chat-Error-Code";

pub fn internal_error(code: impl Into<String>, message: impl Into<String>) -> Response {
    create_error(StatusCode::INTERNAL_SERVER_ERROR, code, message)
}

pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Response {
    create_error(StatusCode::BAD_REQUEST, code, message)
}

pub fn request_timeout(code: impl Into<String>, message: impl Into<String>) -> Response {
    create_error(StatusCode::REQUEST_TIMEOUT, code, message)
}

pub fn bad_gateway(code: impl Into<String>, message: impl Into<String>) -> Response {
    create_error(StatusCode::BAD_GATEWAY, code, message)
}

pub fn create_error(
    status: StatusCode,
    code: impl Into<String>,
    message: impl Into<String>,
) -> Response {
    let code_str = code.into();
    let message_str = message.into();

    let mut headers = HeaderMap::with_capacity(1);
    if let Ok(val) = HeaderValue::from_str(&code_str) {
        headers.insert(HEADER_X_CHAT_ERROR_CODE, val);
    }

    (
        status,
        headers,
        Json(ErrorResponse {
            error: &message_str,
        }),
    )
        .into_response()
}

pub fn extract_error_code_from_response<B>(response: &Response<B>) -> &str {
    response
        .headers()
        .get(HEADER_X_CHAT_ERROR_CODE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}
