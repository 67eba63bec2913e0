//! Execution target and the inbound request a server-side client acts for.

use http::HeaderMap;
use serde::Deserialize;

/// Where the client is running. Decides how URLs are formed and whether
/// session forwarding happens at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    /// Rendering pages ahead of the browser; talks to the internal backend address.
    Server,
    /// Running in the browser; talks to the page's own origin.
    Client,
}

impl Target {
    /// The target this build runs as: `wasm32` builds run in the browser.
    pub const fn current() -> Self {
        if cfg!(target_arch = "wasm32") {
            Target::Client
        } else {
            Target::Server
        }
    }

    pub fn is_server(&self) -> bool {
        matches!(self, Target::Server)
    }
}

/// Read access to the headers of the inbound request being rendered.
pub trait RequestContext: Send + Sync {
    /// The named header, ignoring case, with repeated fields joined.
    fn header(&self, name: &str) -> Option<String>;
}

impl RequestContext for HeaderMap {
    fn header(&self, name: &str) -> Option<String> {
        let values: Vec<&str> = self
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        if values.is_empty() {
            return None;
        }
        let separator = if name.eq_ignore_ascii_case("cookie") { "; " } else { ", " };
        Some(values.join(separator))
    }
}

impl<B: Send + Sync> RequestContext for http::Request<B> {
    fn header(&self, name: &str) -> Option<String> {
        self.headers().header(name)
    }
}
