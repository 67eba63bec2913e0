//! The network round trip, behind a trait so the dispatcher stays
//! deterministic under test.

use std::fmt::Debug;

use url::Url;

use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// `Send + Sync` on native targets. Browser futures are `!Send`, so wasm32
/// drops the bound.
#[cfg(not(target_arch = "wasm32"))]
pub trait MaybeSendSync: Send + Sync {}
#[cfg(not(target_arch = "wasm32"))]
impl<T: Send + Sync + ?Sized> MaybeSendSync for T {}

#[cfg(target_arch = "wasm32")]
pub trait MaybeSendSync {}
#[cfg(target_arch = "wasm32")]
impl<T: ?Sized> MaybeSendSync for T {}

/// Executes one request. Error statuses come back as responses; only a
/// round trip that produced no response is an error.
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait Transport: MaybeSendSync + Debug {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// `reqwest`-backed transport.
///
/// Origin-relative URLs need an origin to resolve against; a server-side
/// transport has none and rejects them.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    origin: Option<Url>,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve origin-relative URLs against `origin`, the way a page's
    /// requests resolve against the page's own location.
    pub fn with_origin(origin: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            origin: Some(origin),
        }
    }

    pub fn from_reqwest(client: reqwest::Client) -> Self {
        Self {
            client,
            origin: None,
        }
    }

    fn resolve(&self, url: &str) -> Result<Url, TransportError> {
        if url.starts_with('/') {
            let origin = self
                .origin
                .as_ref()
                .ok_or_else(|| TransportError::InvalidUrl(format!("{url} has no origin to resolve against")))?;
            return origin
                .join(url)
                .map_err(|e| TransportError::InvalidUrl(format!("{url}: {e}")));
        }
        Url::parse(url).map_err(|e| TransportError::InvalidUrl(format!("{url}: {e}")))
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = self.resolve(&request.url)?;
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.text().await?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
