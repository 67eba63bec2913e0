//! Context-aware API client for the web frontend.
//!
//! # Overview
//! One calling convention for backend calls whether the code renders on the
//! server or runs in the browser. On the server, requests go straight to the
//! backend's internal address and carry the session cookie of the browser
//! request being rendered; in the browser they stay origin-relative.
//!
//! # Design
//! - `ApiClient` exposes `get`, `post`, `put`, `patch` and `delete`, all
//!   sharing one `request` path.
//! - The execution `Target` is injected, never looked up globally.
//! - Request building and response settling are pure; the `Transport`
//!   trait owns the only I/O, with `ReqwestTransport` as the real one.
//! - Payloads and response bodies are `serde_json::Value`; the backend's
//!   schema is not this crate's concern.

pub mod body;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod format;
pub mod http;
pub mod transport;

pub use client::{settle, ApiClient, RequestOptions};
pub use config::{ProcessEnv, Settings, SettingsSource};
pub use context::{RequestContext, Target};
pub use error::{ApiError, ConfigError, TransportError};
pub use format::format_url;
pub use crate::http::{HttpMethod, HttpRequest, HttpResponse};
pub use transport::{ReqwestTransport, Transport};
