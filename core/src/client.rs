//! The request dispatcher shared by every page and container.
//!
//! # Design
//! `ApiClient` exposes one method per HTTP verb with the same calling
//! convention on the server and in the browser. Each call is split into
//! `build_request` (URL, query, forwarded headers, body) and `settle`
//! (response body or rejection), with the transport round trip in between,
//! so both halves stay free of I/O and are tested without a network.
//!
//! On the server the client talks to the backend's internal address and
//! acts on behalf of the browser whose request is being rendered: that
//! request's session cookie is forwarded, and `APP_HOST` replaces the
//! internal host name so the backend's redirect-host check passes.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace};

use crate::body;
use crate::config::{Settings, SettingsSource};
use crate::context::{RequestContext, Target};
use crate::error::{ApiError, TransportError};
use crate::format::{append_query, format_url};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::transport::Transport;

/// Query parameters and payload for one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub params: Option<BTreeMap<String, String>>,
    pub data: Option<Value>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.params
            .get_or_insert_with(BTreeMap::new)
            .insert(name.to_string(), value.into());
        self
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Use any serializable value as the payload.
    pub fn json<T: Serialize + ?Sized>(self, data: &T) -> Result<Self, ApiError> {
        let data = serde_json::to_value(data).map_err(|e| ApiError::Encode(e.to_string()))?;
        Ok(self.data(data))
    }
}

/// Context-aware API client.
///
/// Cheap to clone; clones share the transport and settings source. Build
/// one per application with [`ApiClient::new`] and derive a per-request
/// instance on the server with [`ApiClient::for_request`].
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    target: Target,
    settings: Arc<dyn SettingsSource>,
    request: Option<Arc<dyn RequestContext>>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("transport", &self.transport)
            .field("target", &self.target)
            .field("has_request", &self.request.is_some())
            .finish()
    }
}

impl ApiClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        target: Target,
        settings: Arc<dyn SettingsSource>,
    ) -> Self {
        Self {
            transport,
            target,
            settings,
            request: None,
        }
    }

    /// A client acting for one inbound request. The browser never has one,
    /// so client-target instances ignore it.
    pub fn for_request(&self, request: Arc<dyn RequestContext>) -> Self {
        Self {
            request: Some(request),
            ..self.clone()
        }
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub async fn get(
        &self,
        path: &str,
        options: RequestOptions,
        content_type: Option<&str>,
    ) -> Result<Option<Value>, ApiError> {
        self.request(HttpMethod::Get, path, options, content_type).await
    }

    pub async fn post(
        &self,
        path: &str,
        options: RequestOptions,
        content_type: Option<&str>,
    ) -> Result<Option<Value>, ApiError> {
        self.request(HttpMethod::Post, path, options, content_type).await
    }

    pub async fn put(
        &self,
        path: &str,
        options: RequestOptions,
        content_type: Option<&str>,
    ) -> Result<Option<Value>, ApiError> {
        self.request(HttpMethod::Put, path, options, content_type).await
    }

    pub async fn patch(
        &self,
        path: &str,
        options: RequestOptions,
        content_type: Option<&str>,
    ) -> Result<Option<Value>, ApiError> {
        self.request(HttpMethod::Patch, path, options, content_type).await
    }

    pub async fn delete(
        &self,
        path: &str,
        options: RequestOptions,
        content_type: Option<&str>,
    ) -> Result<Option<Value>, ApiError> {
        self.request(HttpMethod::Delete, path, options, content_type).await
    }

    /// Build, send once and settle. Every verb method lands here.
    pub async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        options: RequestOptions,
        content_type: Option<&str>,
    ) -> Result<Option<Value>, ApiError> {
        let request = self.build_request(method, path, &options, content_type)?;
        let result = self.transport.send(request).await;
        settle(result).inspect_err(|err| debug!(%method, path, error = %err, "request rejected"))
    }

    /// Everything up to the network: URL, query, forwarded headers, body.
    pub fn build_request(
        &self,
        method: HttpMethod,
        path: &str,
        options: &RequestOptions,
        content_type: Option<&str>,
    ) -> Result<HttpRequest, ApiError> {
        let settings = match self.target {
            Target::Server => self.settings.settings()?,
            // Origin-relative URLs never read the backend address.
            Target::Client => Settings::default(),
        };

        let mut url = format_url(path, self.target, &settings);
        if let Some(params) = &options.params {
            url = append_query(&url, params)?;
        }
        debug!(%method, %url, "requesting");

        let mut request = HttpRequest::new(method, url);

        if self.target.is_server() {
            let cookie = self
                .request
                .as_ref()
                .and_then(|r| r.header("cookie"))
                .filter(|c| !c.is_empty());
            if let Some(cookie) = cookie {
                request.set_header("cookie", cookie);
            }
            if let Some(host) = settings.app_host {
                request.set_header("host", host);
            }
        }

        if let Some(data) = options.data.as_ref().filter(|d| is_present(d)) {
            trace!(?data, "sending data");
            let (content_type, body) = body::encode(data, content_type)?;
            request.set_header("content-type", content_type);
            request.body = Some(body);
        }

        Ok(request)
    }
}

/// `null`, `false`, `0` and `""` carry no payload and send no body.
fn is_present(data: &Value) -> bool {
    match data {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Turn the outcome of a round trip into the call's result.
///
/// Error statuses reject with the decoded body when there is one, and with
/// the bare status otherwise.
pub fn settle(result: Result<HttpResponse, TransportError>) -> Result<Option<Value>, ApiError> {
    let response = result?;
    if response.is_success() {
        return body::decode(&response);
    }
    match body::decode(&response) {
        Ok(Some(body)) => Err(ApiError::Response {
            status: response.status,
            body,
        }),
        _ => Err(ApiError::Status {
            status: response.status,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use http::header::COOKIE;
    use http::{HeaderMap, HeaderValue};
    use serde_json::json;

    use super::*;
    use crate::config::ProcessEnv;

    /// Records every request and answers with a canned outcome.
    #[derive(Debug)]
    struct RecordingTransport {
        sent: Mutex<Vec<HttpRequest>>,
        reply: fn() -> Result<HttpResponse, TransportError>,
    }

    impl RecordingTransport {
        fn new(reply: fn() -> Result<HttpResponse, TransportError>) -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                reply,
            })
        }

        fn sent(&self) -> Vec<HttpRequest> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
    #[cfg_attr(not(target_arch = "wasm32"), async_trait)]
    impl Transport for RecordingTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.sent.lock().unwrap().push(request);
            (self.reply)()
        }
    }

    fn json_response(status: u16, body: &str) -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse {
            status,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: body.to_string(),
        })
    }

    fn ok_user() -> Result<HttpResponse, TransportError> {
        json_response(200, r#"{"id":1}"#)
    }

    fn settings() -> Arc<Settings> {
        Arc::new(Settings::new("internalhost", 8089).with_app_host("example.com"))
    }

    fn client(target: Target, transport: &Arc<RecordingTransport>) -> ApiClient {
        ApiClient::new(transport.clone(), target, settings())
    }

    fn inbound(cookie: &str) -> Arc<dyn RequestContext> {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(cookie).unwrap());
        Arc::new(headers)
    }

    #[tokio::test]
    async fn client_get_is_origin_relative() {
        let transport = RecordingTransport::new(ok_user);
        let body = client(Target::Client, &transport)
            .get("users/5", RequestOptions::new(), None)
            .await
            .unwrap();

        assert_eq!(body, Some(json!({"id": 1})));
        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method, HttpMethod::Get);
        assert_eq!(sent[0].url, "/users/5");
        assert!(sent[0].headers.is_empty());
        assert!(sent[0].body.is_none());
    }

    #[tokio::test]
    async fn every_verb_sends_one_bare_request() {
        let transport = RecordingTransport::new(ok_user);
        let api = client(Target::Client, &transport);

        api.get("x", RequestOptions::new(), None).await.unwrap();
        api.post("x", RequestOptions::new(), None).await.unwrap();
        api.put("x", RequestOptions::new(), None).await.unwrap();
        api.patch("x", RequestOptions::new(), None).await.unwrap();
        api.delete("x", RequestOptions::new(), None).await.unwrap();

        let sent = transport.sent();
        let methods: Vec<HttpMethod> = sent.iter().map(|r| r.method).collect();
        assert_eq!(methods, HttpMethod::ALL);
        for req in &sent {
            assert_eq!(req.url, "/x");
            assert!(req.body.is_none());
            assert!(req.headers.is_empty());
        }
    }

    #[test]
    fn params_become_query_string() {
        let transport = RecordingTransport::new(ok_user);
        let options = RequestOptions::new().param("a", "1").param("b", "2");
        let req = client(Target::Client, &transport)
            .build_request(HttpMethod::Get, "/search", &options, None)
            .unwrap();
        let (path, query) = req.url.split_once('?').unwrap();
        assert_eq!(path, "/search");
        let mut pairs: Vec<&str> = query.split('&').collect();
        pairs.sort_unstable();
        assert_eq!(pairs, ["a=1", "b=2"]);
    }

    #[tokio::test]
    async fn server_post_forwards_session_and_host() {
        let transport = RecordingTransport::new(ok_user);
        let api = client(Target::Server, &transport).for_request(inbound("sid=xyz"));
        let options = RequestOptions::new().data(json!({"user": "a", "pass": "b"}));

        api.post("login", options, None).await.unwrap();

        let sent = transport.sent();
        assert_eq!(sent[0].url, "http://internalhost:8089/login");
        assert_eq!(sent[0].header("cookie"), Some("sid=xyz"));
        assert_eq!(sent[0].header("host"), Some("example.com"));
        assert_eq!(sent[0].header("content-type"), Some("application/json"));
        let payload: Value = serde_json::from_str(sent[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(payload, json!({"user": "a", "pass": "b"}));
    }

    #[test]
    fn server_without_inbound_cookie_sets_none() {
        let transport = RecordingTransport::new(ok_user);
        let api = client(Target::Server, &transport).for_request(Arc::new(HeaderMap::new()));
        let req = api
            .build_request(HttpMethod::Get, "load_auth", &RequestOptions::new(), None)
            .unwrap();
        assert!(req.header("cookie").is_none());
    }

    #[test]
    fn server_skips_empty_inbound_cookie() {
        let transport = RecordingTransport::new(ok_user);
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static(""));
        let api = client(Target::Server, &transport).for_request(Arc::new(headers));
        let req = api
            .build_request(HttpMethod::Get, "load_auth", &RequestOptions::new(), None)
            .unwrap();
        assert!(req.header("cookie").is_none());
        assert_eq!(req.header("host"), Some("example.com"));
    }

    #[test]
    fn process_env_app_host_is_read_per_call() {
        // The only test in this crate that touches APP_HOST.
        let transport = RecordingTransport::new(ok_user);
        let api = ApiClient::new(transport, Target::Server, Arc::new(ProcessEnv));
        let build = || {
            api.build_request(HttpMethod::Get, "load_auth", &RequestOptions::new(), None)
                .unwrap()
        };

        std::env::set_var("APP_HOST", "first.example.com");
        assert_eq!(build().header("host"), Some("first.example.com"));

        std::env::set_var("APP_HOST", "second.example.com");
        assert_eq!(build().header("host"), Some("second.example.com"));

        std::env::remove_var("APP_HOST");
        assert!(build().header("host").is_none());
    }

    #[test]
    fn server_without_app_host_sets_no_host() {
        let transport = RecordingTransport::new(ok_user);
        let api = ApiClient::new(transport, Target::Server, Arc::new(Settings::new("internalhost", 8089)));
        let req = api
            .build_request(HttpMethod::Get, "load_auth", &RequestOptions::new(), None)
            .unwrap();
        assert!(req.header("host").is_none());
    }

    #[test]
    fn client_never_forwards_cookie_or_host() {
        let transport = RecordingTransport::new(ok_user);
        let api = client(Target::Client, &transport).for_request(inbound("sid=abc"));
        let req = api
            .build_request(HttpMethod::Get, "load_auth", &RequestOptions::new(), None)
            .unwrap();
        assert!(req.header("cookie").is_none());
        assert!(req.header("host").is_none());
    }

    #[test]
    fn content_type_override_applies_to_body() {
        let transport = RecordingTransport::new(ok_user);
        let options = RequestOptions::new().data(json!({"currPass": "a", "newPass": "b"}));
        let req = client(Target::Client, &transport)
            .build_request(HttpMethod::Post, "updatepassword", &options, Some("form"))
            .unwrap();
        assert_eq!(req.header("content-type"), Some("application/x-www-form-urlencoded"));
        assert_eq!(req.body.as_deref(), Some("currPass=a&newPass=b"));
    }

    #[test]
    fn content_type_without_data_is_ignored() {
        let transport = RecordingTransport::new(ok_user);
        let req = client(Target::Client, &transport)
            .build_request(HttpMethod::Post, "x", &RequestOptions::new(), Some("json"))
            .unwrap();
        assert!(req.header("content-type").is_none());
        assert!(req.body.is_none());
    }

    #[test]
    fn null_data_sends_no_body() {
        let transport = RecordingTransport::new(ok_user);
        let options = RequestOptions::new().data(Value::Null);
        let req = client(Target::Client, &transport)
            .build_request(HttpMethod::Put, "x", &options, None)
            .unwrap();
        assert!(req.body.is_none());
    }

    #[test]
    fn falsy_data_sends_no_body() {
        let transport = RecordingTransport::new(ok_user);
        let api = client(Target::Client, &transport);
        for data in [json!(""), json!(false), json!(0), json!(0.0)] {
            let options = RequestOptions::new().data(data.clone());
            let req = api
                .build_request(HttpMethod::Post, "x", &options, Some("json"))
                .unwrap();
            assert!(req.body.is_none(), "{data}");
            assert!(req.header("content-type").is_none(), "{data}");
        }
    }

    #[test]
    fn truthy_scalars_and_empty_containers_are_sent() {
        let transport = RecordingTransport::new(ok_user);
        let api = client(Target::Client, &transport);
        for (data, sent) in [
            (json!(true), "true"),
            (json!(1), "1"),
            (json!({}), "{}"),
            (json!([]), "[]"),
        ] {
            let options = RequestOptions::new().data(data);
            let req = api
                .build_request(HttpMethod::Post, "x", &options, None)
                .unwrap();
            assert_eq!(req.body.as_deref(), Some(sent));
        }
    }

    #[test]
    fn json_options_serialize_structs() {
        #[derive(Serialize)]
        struct Login<'a> {
            username: &'a str,
            remember_me: bool,
        }
        let options = RequestOptions::new()
            .json(&Login {
                username: "a",
                remember_me: true,
            })
            .unwrap();
        assert_eq!(options.data, Some(json!({"username": "a", "remember_me": true})));
    }

    #[tokio::test]
    async fn error_status_rejects_with_body() {
        let transport = RecordingTransport::new(|| json_response(400, r#"{"error":"bad_request"}"#));
        let err = client(Target::Client, &transport)
            .get("x", RequestOptions::new(), None)
            .await
            .unwrap_err();
        assert_eq!(err.body(), Some(&json!({"error": "bad_request"})));
        assert_eq!(err.status(), Some(400));
    }

    #[tokio::test]
    async fn error_status_without_body_rejects_with_status() {
        let transport = RecordingTransport::new(|| json_response(401, ""));
        let err = client(Target::Client, &transport)
            .post("login", RequestOptions::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 401 }));
    }

    #[tokio::test]
    async fn transport_failure_rejects_with_transport_error() {
        let transport = RecordingTransport::new(|| Err(TransportError::Connection("refused".to_string())));
        let err = client(Target::Server, &transport)
            .get("x", RequestOptions::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Transport(TransportError::Connection(_))));
    }

    #[tokio::test]
    async fn empty_success_resolves_to_none() {
        let transport = RecordingTransport::new(|| json_response(204, ""));
        let body = client(Target::Client, &transport)
            .delete("collections/1", RequestOptions::new(), None)
            .await
            .unwrap();
        assert!(body.is_none());
    }

    #[test]
    fn unparseable_error_body_falls_back_to_status() {
        let err = settle(json_response(500, "{not json")).unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 500 }));
    }
}
