//! Request body encoding and response body decoding.

use serde_json::Value;

use crate::error::ApiError;
use crate::http::HttpResponse;

pub const JSON: &str = "application/json";
pub const FORM: &str = "application/x-www-form-urlencoded";

/// Expand a content-type shorthand (`json`, `form`, ...) to a MIME type.
/// Anything else is taken as written.
pub fn resolve_content_type(content_type: &str) -> &str {
    match content_type {
        "json" => JSON,
        "form" | "form-data" | "urlencoded" => FORM,
        "html" => "text/html",
        "xml" => "text/xml",
        "text" => "text/plain",
        other => other,
    }
}

/// Encode `data` for the wire, returning the content type and the body.
///
/// Strings go out untouched. Objects are URL-encoded for form bodies and
/// JSON-serialized for everything else.
pub fn encode(data: &Value, content_type: Option<&str>) -> Result<(String, String), ApiError> {
    let content_type = match content_type {
        Some(ct) => resolve_content_type(ct),
        None if data.is_string() => FORM,
        None => JSON,
    };
    let body = match data {
        Value::String(raw) => raw.clone(),
        _ if is_form(content_type) => {
            serde_urlencoded::to_string(data).map_err(|e| ApiError::Encode(e.to_string()))?
        }
        _ => serde_json::to_string(data).map_err(|e| ApiError::Encode(e.to_string()))?,
    };
    Ok((content_type.to_string(), body))
}

/// Parse a response body. Empty bodies are `None`; JSON (or untyped) bodies
/// are parsed; any other text is kept as a JSON string.
pub fn decode(response: &HttpResponse) -> Result<Option<Value>, ApiError> {
    if response.body.trim().is_empty() {
        return Ok(None);
    }
    let is_json = response
        .header("content-type")
        .map_or(true, |ct| ct.to_ascii_lowercase().contains("json"));
    if !is_json {
        return Ok(Some(Value::String(response.body.clone())));
    }
    serde_json::from_str(&response.body)
        .map(Some)
        .map_err(|e| ApiError::Decode(e.to_string()))
}

fn is_form(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().starts_with(FORM)
}
