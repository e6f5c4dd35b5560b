//! End-to-end account flows through the full router

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use warden::core::config::{AppEnvironment, Config};
use warden::{ApiServer, AppState, DatabaseManager};

const BROWSER_UA: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

fn app_with(configure: impl FnOnce(&mut Config)) -> Router {
    let mut config = Config::for_environment(AppEnvironment::Test).unwrap();
    config.security.bcrypt_cost = 4;
    // Flow tests make many guest requests; the gate is covered separately
    config.shield.guest_limit = 1_000;
    configure(&mut config);

    let db = Arc::new(DatabaseManager::new_in_memory().unwrap());
    let state = AppState::new(config, db).unwrap();
    ApiServer::from_state(state).router().clone()
}

fn app() -> Router {
    app_with(|_| {})
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

impl Reply {
    /// `token=...` pair from the Set-Cookie header, ready to send back
    fn session_cookie(&self) -> String {
        self.set_cookie()
            .split(';')
            .next()
            .unwrap()
            .trim()
            .to_string()
    }

    fn set_cookie(&self) -> &str {
        self.headers
            .get(header::SET_COOKIE)
            .expect("Set-Cookie header")
            .to_str()
            .unwrap()
    }
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<&str>, cookie: Option<&str>) -> Reply {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::USER_AGENT, BROWSER_UA);
    if body.is_some() {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
    }
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }

    let request = builder
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    Reply {
        status,
        headers,
        body,
    }
}

async fn post_json(app: &Router, uri: &str, body: Value) -> Reply {
    send(app, Method::POST, uri, Some(&body.to_string()), None).await
}

async fn signup(app: &Router, name: &str, email: &str, password: &str) -> Reply {
    post_json(
        app,
        "/auth/signup",
        json!({"name": name, "email": email, "password": password}),
    )
    .await
}

async fn signin(app: &Router, email: &str, password: &str) -> Reply {
    post_json(app, "/auth/signin", json!({"email": email, "password": password})).await
}

fn assert_no_secret_fields(value: &Value) {
    let text = value.to_string();
    assert!(!text.contains("password"), "leaked field in {}", text);
}

#[tokio::test]
async fn signup_signin_and_wrong_password() {
    let app = app();

    let created = signup(&app, "A", "a@x.com", "p1").await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["name"], "A");
    assert_eq!(created.body["email"], "a@x.com");
    assert_eq!(created.body["role"], "user");
    assert!(created.body["id"].as_str().is_some());
    assert!(created.body["created_at"].as_str().is_some());
    assert_no_secret_fields(&created.body);

    let signed_in = signin(&app, "a@x.com", "p1").await;
    assert_eq!(signed_in.status, StatusCode::OK);
    assert_eq!(signed_in.body["id"], created.body["id"]);
    assert_eq!(signed_in.body["role"], "user");
    assert_no_secret_fields(&signed_in.body);

    let cookie = signed_in.set_cookie();
    assert!(cookie.starts_with("token="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Strict"));
    assert!(cookie.contains("Max-Age=900"));
    assert!(!cookie.contains("Secure"));

    let wrong = signin(&app, "a@x.com", "wrong").await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert!(wrong.headers.get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn password_extended_past_bcrypt_limit_is_rejected() {
    let app = app();
    let password = "a".repeat(72);
    assert_eq!(
        signup(&app, "A", "long@x.com", &password).await.status,
        StatusCode::CREATED
    );

    let extended = signin(&app, "long@x.com", &format!("{}DIFFERENT", password)).await;
    assert_eq!(extended.status, StatusCode::UNAUTHORIZED);
    assert_eq!(extended.body["error"], "InvalidCredentialsError");
    assert!(extended.headers.get(header::SET_COOKIE).is_none());

    assert_eq!(signin(&app, "long@x.com", &password).await.status, StatusCode::OK);
}

#[tokio::test]
async fn unknown_email_and_wrong_password_are_indistinguishable() {
    let app = app();
    signup(&app, "A", "a@x.com", "p1").await;

    let wrong_password = signin(&app, "a@x.com", "nope").await;
    let unknown_email = signin(&app, "ghost@x.com", "p1").await;

    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.body["error"], unknown_email.body["error"]);
    assert_eq!(wrong_password.body["message"], unknown_email.body["message"]);
}

#[tokio::test]
async fn duplicate_email_is_conflict_without_new_row() {
    let app = app();
    assert_eq!(signup(&app, "A", "a@x.com", "p1").await.status, StatusCode::CREATED);

    let again = signup(&app, "B", "a@x.com", "p2").await;
    assert_eq!(again.status, StatusCode::CONFLICT);
    assert_eq!(again.body["error"], "DuplicateUserError");

    let users = send(&app, Method::GET, "/users", None, None).await;
    assert_eq!(users.status, StatusCode::OK);
    assert_eq!(users.body.as_array().unwrap().len(), 1);
    assert_eq!(users.body[0]["name"], "A");
}

#[tokio::test]
async fn invalid_payloads_are_rejected_with_field_details() {
    let app = app();

    let bad = post_json(
        &app,
        "/auth/signup",
        json!({"name": "", "email": "nope", "password": "p1", "role": "root"}),
    )
    .await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad.body["error"], "ValidationError");
    let paths: Vec<_> = bad.body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["path"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(paths, vec!["name", "email", "role"]);

    let malformed = send(&app, Method::POST, "/auth/signin", Some("{oops"), None).await;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);
    assert_eq!(malformed.body["details"][0]["path"], "");

    let not_object = send(&app, Method::POST, "/auth/signin", Some("[1,2]"), None).await;
    assert_eq!(not_object.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn users_listing_is_newest_first_and_hides_hashes() {
    let app = app();
    signup(&app, "First", "first@x.com", "p1").await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    post_json(
        &app,
        "/auth/signup",
        json!({"name": "Second", "email": "second@x.com", "password": "p2", "role": "admin"}),
    )
    .await;

    let users = send(&app, Method::GET, "/users", None, None).await;
    assert_eq!(users.status, StatusCode::OK);
    let list = users.body.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["email"], "second@x.com");
    assert_eq!(list[0]["role"], "admin");
    assert_eq!(list[1]["email"], "first@x.com");
    for user in list {
        assert!(user["updated_at"].as_str().is_some());
    }
    assert_no_secret_fields(&users.body);
}

#[tokio::test]
async fn session_cookie_authenticates_me_until_signout() {
    let app = app();
    signup(&app, "A", "a@x.com", "p1").await;
    let cookie = signin(&app, "a@x.com", "p1").await.session_cookie();

    let me = send(&app, Method::GET, "/auth/me", None, Some(&cookie)).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["email"], "a@x.com");
    assert_no_secret_fields(&me.body);

    let anonymous = send(&app, Method::GET, "/auth/me", None, None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let forged = send(&app, Method::GET, "/auth/me", None, Some("token=not.a.jwt")).await;
    assert_eq!(forged.status, StatusCode::UNAUTHORIZED);
    assert_eq!(forged.body["message"], "Invalid or expired session");

    let signout = send(&app, Method::POST, "/auth/signout", None, Some(&cookie)).await;
    assert_eq!(signout.status, StatusCode::OK);
    assert!(signout.body["message"].as_str().is_some());
    let cleared = signout.set_cookie();
    assert!(cleared.starts_with("token=;"));
    assert!(cleared.contains("Max-Age=0"));
}

#[tokio::test]
async fn production_cookie_is_secure() {
    let app = app_with(|config| {
        config.environment = AppEnvironment::Production;
        config.security.jwt_secret = "a-production-secret-of-at-least-32-bytes".to_string();
    });
    signup(&app, "A", "a@x.com", "p1").await;

    let signed_in = signin(&app, "a@x.com", "p1").await;
    assert_eq!(signed_in.status, StatusCode::OK);
    assert!(signed_in.set_cookie().contains("; Secure"));
    assert!(signed_in
        .headers
        .get("Strict-Transport-Security")
        .is_some());
}

#[tokio::test]
async fn sixth_guest_request_in_a_window_is_rate_limited() {
    let app = app_with(|config| config.shield.guest_limit = 5);

    for _ in 0..5 {
        let reply = send(&app, Method::GET, "/users", None, None).await;
        assert_eq!(reply.status, StatusCode::OK);
    }

    let limited = send(&app, Method::GET, "/users", None, None).await;
    assert_eq!(limited.status, StatusCode::FORBIDDEN);
    assert_eq!(limited.body["error"], "Forbidden");
    assert_eq!(limited.body["reason"], "rate-limit");
    assert!(limited.headers.get(header::RETRY_AFTER).is_some());
}

#[tokio::test]
async fn signed_in_users_get_their_own_budget() {
    let app = app_with(|config| config.shield.guest_limit = 5);

    // Two guest requests: signup and signin
    signup(&app, "A", "a@x.com", "p1").await;
    let cookie = signin(&app, "a@x.com", "p1").await.session_cookie();

    // Three more guest requests exhaust the guest budget
    for _ in 0..3 {
        send(&app, Method::GET, "/users", None, None).await;
    }
    let guest = send(&app, Method::GET, "/users", None, None).await;
    assert_eq!(guest.status, StatusCode::FORBIDDEN);

    // The user tier allows ten per window
    for _ in 0..10 {
        let reply = send(&app, Method::GET, "/users", None, Some(&cookie)).await;
        assert_eq!(reply.status, StatusCode::OK);
    }
    let user = send(&app, Method::GET, "/users", None, Some(&cookie)).await;
    assert_eq!(user.status, StatusCode::FORBIDDEN);
    assert_eq!(user.body["reason"], "rate-limit");
}
