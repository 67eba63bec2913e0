//! In-memory stand-in for the application backend's auth API.
//!
//! Covers the endpoints the frontend client talks to, a request echo for
//! inspecting what actually went over the wire, and the redirect-host check
//! that makes forwarding `Host` necessary.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Query, Request, State},
    http::{
        header::{CONTENT_TYPE, COOKIE, HOST, SET_COOKIE},
        HeaderMap, HeaderName, Method, StatusCode,
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "sid";

/// Names that can never be registered.
pub const RESTRICTED_NAMES: &[&str] = &["admin", "api", "login", "logout", "_new"];

#[derive(Clone, Debug)]
pub struct User {
    pub password: String,
    pub role: String,
    pub coll_count: u32,
}

#[derive(Clone, Debug)]
pub struct BackendConfig {
    /// Host every request must name; `None` disables the check.
    pub expected_host: Option<String>,
    pub users: HashMap<String, User>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        let users = HashMap::from([(
            "demo".to_string(),
            User {
                password: "demo-pass".to_string(),
                role: "archivist".to_string(),
                coll_count: 2,
            },
        )]);
        Self {
            expected_host: None,
            users,
        }
    }
}

/// Auth state as returned by `load_auth` and `login`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthState {
    pub username: Option<String>,
    pub role: Option<String>,
    pub anon: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coll_count: Option<u32>,
}

#[derive(Deserialize)]
pub struct Login {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub remember_me: Option<String>,
}

#[derive(Deserialize)]
pub struct UsernameCheck {
    #[serde(default)]
    pub username: String,
}

#[derive(Deserialize)]
pub struct UpdatePassword {
    #[serde(rename = "currPass")]
    pub curr_pass: String,
    #[serde(rename = "newPass")]
    pub new_pass: String,
    #[serde(rename = "newPass2")]
    pub new_pass2: String,
}

/// What the echo endpoint saw.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub query: Vec<(String, String)>,
    pub cookie: Option<String>,
    pub host: Option<String>,
    pub content_type: Option<String>,
    pub body: String,
}

struct Backend {
    config: BackendConfig,
    users: RwLock<HashMap<String, User>>,
    sessions: RwLock<HashMap<String, String>>,
}

type Db = Arc<Backend>;

pub fn app() -> Router {
    app_with(BackendConfig::default())
}

pub fn app_with(config: BackendConfig) -> Router {
    let db: Db = Arc::new(Backend {
        users: RwLock::new(config.users.clone()),
        sessions: RwLock::new(HashMap::new()),
        config,
    });
    Router::new()
        .route("/api/v1/load_auth", get(load_auth))
        .route("/api/v1/login", post(login))
        .route("/api/v1/username_check", get(username_check))
        .route("/api/v1/updatepassword", post(update_password))
        .route("/api/v1/echo", any(echo))
        .layer(middleware::from_fn_with_state(db.clone(), check_host))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with(listener, BackendConfig::default()).await
}

pub async fn run_with(listener: TcpListener, config: BackendConfig) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(config)).await
}

async fn check_host(State(db): State<Db>, request: Request, next: Next) -> Response {
    if let Some(expected) = &db.config.expected_host {
        let host = request.headers().get(HOST).and_then(|v| v.to_str().ok());
        if host != Some(expected.as_str()) {
            tracing::warn!(?host, expected = %expected, "rejecting request for wrong host");
            return (
                StatusCode::MISDIRECTED_REQUEST,
                Json(json!({"error": "invalid_host"})),
            )
                .into_response();
        }
    }
    next.run(request).await
}

fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}

async fn current_user(db: &Db, headers: &HeaderMap) -> Option<String> {
    let sid = session_id(headers)?;
    db.sessions.read().await.get(&sid).cloned()
}

async fn load_auth(State(db): State<Db>, headers: HeaderMap) -> Json<AuthState> {
    let Some(username) = current_user(&db, &headers).await else {
        return Json(AuthState {
            username: None,
            role: None,
            anon: None,
            coll_count: None,
        });
    };
    let users = db.users.read().await;
    let user = users.get(&username);
    Json(AuthState {
        role: user.map(|u| u.role.clone()),
        anon: Some(false),
        coll_count: user.map(|u| u.coll_count),
        username: Some(username),
    })
}

async fn login(State(db): State<Db>, Json(input): Json<Login>) -> Response {
    let user = {
        let users = db.users.read().await;
        match users.get(&input.username) {
            Some(user) if user.password == input.password => user.clone(),
            _ => return StatusCode::UNAUTHORIZED.into_response(),
        }
    };

    let sid = Uuid::new_v4().to_string();
    db.sessions
        .write()
        .await
        .insert(sid.clone(), input.username.clone());

    let remember = matches!(input.remember_me.as_deref(), Some("1" | "on"));
    let cookie = if remember {
        format!("{SESSION_COOKIE}={sid}; Path=/; HttpOnly; Max-Age=2592000")
    } else {
        format!("{SESSION_COOKIE}={sid}; Path=/; HttpOnly")
    };

    (
        [(SET_COOKIE, cookie)],
        Json(AuthState {
            username: Some(input.username),
            role: Some(user.role),
            anon: Some(false),
            coll_count: Some(user.coll_count),
        }),
    )
        .into_response()
}

async fn username_check(State(db): State<Db>, Query(input): Query<UsernameCheck>) -> Json<Value> {
    let available = !input.username.is_empty()
        && !RESTRICTED_NAMES.contains(&input.username.as_str())
        && !db.users.read().await.contains_key(&input.username);
    Json(json!({ "available": available }))
}

async fn update_password(
    State(db): State<Db>,
    headers: HeaderMap,
    Form(input): Form<UpdatePassword>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let username = current_user(&db, &headers)
        .await
        .ok_or_else(|| (StatusCode::UNAUTHORIZED, Json(json!({"error": "not_logged_in"}))))?;

    let forbidden = |msg: &str| (StatusCode::FORBIDDEN, Json(json!({ "error": msg })));

    let mut users = db.users.write().await;
    let user = users
        .get_mut(&username)
        .ok_or_else(|| forbidden("Unknown user"))?;
    if user.password != input.curr_pass {
        return Err(forbidden("Current password is incorrect"));
    }
    if input.new_pass != input.new_pass2 {
        return Err(forbidden("Passwords do not match"));
    }
    if input.new_pass.len() < 8 {
        return Err(forbidden("Password must be at least 8 characters"));
    }
    user.password = input.new_pass;
    Ok(Json(json!({})))
}

async fn echo(
    method: Method,
    headers: HeaderMap,
    Query(query): Query<Vec<(String, String)>>,
    body: String,
) -> Json<Echo> {
    let header = |name: HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    Json(Echo {
        method: method.to_string(),
        query,
        cookie: header(COOKIE),
        host: header(HOST),
        content_type: header(CONTENT_TYPE),
        body,
    })
}
