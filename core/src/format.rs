//! URL formatting for both execution targets.

use std::collections::BTreeMap;

use crate::config::Settings;
use crate::context::Target;
use crate::error::ApiError;

/// Resolve `path` to the URL a request should go to.
///
/// The server talks to the backend's internal address directly; the browser
/// stays origin-relative. Apart from forcing a leading `/`, the path is not
/// validated.
pub fn format_url(path: &str, target: Target, settings: &Settings) -> String {
    let path = normalize_path(path);
    match target {
        Target::Server => format!(
            "http://{}:{}{path}",
            settings.internal_api_host, settings.internal_api_port
        ),
        Target::Client => path,
    }
}

pub fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// Append URL-encoded query parameters, keeping any query already present.
pub fn append_query(url: &str, params: &BTreeMap<String, String>) -> Result<String, ApiError> {
    if params.is_empty() {
        return Ok(url.to_string());
    }
    let query = serde_urlencoded::to_string(params).map_err(|e| ApiError::Encode(e.to_string()))?;
    let separator = if url.contains('?') { '&' } else { '?' };
    Ok(format!("{url}{separator}{query}"))
}
