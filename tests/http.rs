mod common;

use axum::body::Body;
use axum::Router;
use http::{Request, Response, StatusCode};
use tower::ServiceExt;

async fn get(app: &Router, uri: &str, cookie: Option<&str>) -> Response<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    app.clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn body_text(response: Response<Body>) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get("location")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}

/// Runs `/login` and returns the session cookie and the issued state.
async fn begin_login(app: &Router, channel: &str) -> (String, String) {
    let response = get(app, &format!("/login?name={channel}"), None).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let cookie = common::session_cookie(response.headers());
    let state = common::query_param(&location(&response), "state").unwrap();
    (cookie, state)
}

#[tokio::test]
async fn test_health_endpoint() {
    let response = get(&common::test_app(), "/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "ok");
}

#[tokio::test]
async fn test_index_has_login_form() {
    let response = get(&common::test_app(), "/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains(r#"action="/login""#));
    assert!(html.contains(r#"name="name""#));
}

#[tokio::test]
async fn test_not_found() {
    let response = get(&common::test_app(), "/nonexistent", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_login_requires_channel() {
    let response = get(&common::test_app(), "/login", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "invalid_request");
    assert_eq!(json["error"]["message"], "Empty streamer name!");
}

#[tokio::test]
async fn test_login_redirects_to_provider_with_state() {
    let app = common::test_app();
    let response = get(&app, "/login?name=somestreamer", None).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let url = location(&response);
    assert!(url.starts_with("http://127.0.0.1:9/oauth2/authorize?"));
    assert_eq!(
        common::query_param(&url, "client_id").as_deref(),
        Some("client-id")
    );
    assert_eq!(
        common::query_param(&url, "redirect_uri").as_deref(),
        Some("http://localhost/redirect")
    );
    let state = common::query_param(&url, "state").unwrap();
    assert_eq!(state.len(), 64);

    let set_cookie = response.headers().get("set-cookie").unwrap().to_str().unwrap();
    assert!(set_cookie.starts_with("chatrelay_session="));
    assert!(set_cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn test_each_login_issues_a_new_state() {
    let app = common::test_app();
    let (_, first) = begin_login(&app, "a").await;
    let (_, second) = begin_login(&app, "a").await;
    assert_ne!(first, second);
}

#[tokio::test]
async fn test_corrupted_cookie_degrades_to_new_session() {
    let app = common::test_app();
    let response = get(
        &app,
        "/login?name=somestreamer",
        Some("chatrelay_session=garbage.garbage"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
}

#[tokio::test]
async fn test_callback_without_challenge_is_csrf_error() {
    let response = get(&common::test_app(), "/redirect?state=abc&code=x", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().get("set-cookie").is_some());
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "csrf_failed");
    assert_eq!(
        json["error"]["message"],
        "Couldn't verify your confirmation, please try again."
    );
}

#[tokio::test]
async fn test_callback_with_wrong_state_consumes_challenge() {
    let app = common::test_app();
    let (cookie, state) = begin_login(&app, "somestreamer").await;

    let response = get(&app, "/redirect?state=wrong&code=x", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let cookie = common::session_cookie(response.headers());

    let response = get(
        &app,
        &format!("/redirect?state={state}&code=x"),
        Some(&cookie),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "csrf_failed");
}

#[tokio::test]
async fn test_full_login_then_stream_page() {
    let provider = common::spawn_provider().await;
    let app = common::app_with(&provider, "ws://127.0.0.1:9");
    let (cookie, state) = begin_login(&app, "somestreamer").await;

    let response = get(
        &app,
        &format!("/redirect?state={state}&code={}", common::GOOD_CODE),
        Some(&cookie),
    )
    .await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/stream");
    let cookie = common::session_cookie(response.headers());

    let response = get(&app, "/stream", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("channel=somestreamer"));
    assert!(html.contains("/events"));
}

#[tokio::test]
async fn test_state_cannot_be_replayed_after_success() {
    let provider = common::spawn_provider().await;
    let app = common::app_with(&provider, "ws://127.0.0.1:9");
    let (cookie, state) = begin_login(&app, "somestreamer").await;

    let uri = format!("/redirect?state={state}&code={}", common::GOOD_CODE);
    let response = get(&app, &uri, Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let cookie = common::session_cookie(response.headers());

    let response = get(&app, &uri, Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], "csrf_failed");
}

#[tokio::test]
async fn test_rejected_code_is_exchange_error() {
    let provider = common::spawn_provider().await;
    let app = common::app_with(&provider, "ws://127.0.0.1:9");
    let (cookie, state) = begin_login(&app, "somestreamer").await;

    let response = get(
        &app,
        &format!("/redirect?state={state}&code=bogus"),
        Some(&cookie),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "exchange_failed");
    let message = json["error"]["message"].as_str().unwrap();
    assert!(!message.contains("Invalid authorization code"));
}

#[tokio::test]
async fn test_provider_denial_is_exchange_error() {
    let app = common::test_app();
    let (cookie, state) = begin_login(&app, "somestreamer").await;

    let response = get(
        &app,
        &format!("/redirect?state={state}&error=access_denied"),
        Some(&cookie),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["error"]["code"], "exchange_failed");
}

#[tokio::test]
async fn test_stream_page_requires_channel() {
    let response = get(&common::test_app(), "/stream", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_events_requires_login() {
    let app = common::test_app();
    let (cookie, _) = begin_login(&app, "somestreamer").await;

    let response = get(&app, "/events", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"]["code"], "unauthorized");
}

#[tokio::test]
async fn test_repeated_logins_keep_cookie_small() {
    let app = common::test_app();
    let mut cookie: Option<String> = None;
    let mut state = String::new();

    for _ in 0..70 {
        let response = get(&app, "/login?name=somestreamer", cookie.as_deref()).await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        let set_cookie = response.headers().get("set-cookie").unwrap();
        assert!(set_cookie.len() < 4096, "cookie grew to {}", set_cookie.len());
        state = common::query_param(&location(&response), "state").unwrap();
        cookie = Some(common::session_cookie(response.headers()));
    }

    // The newest state still passes the CSRF check and reaches the
    // (unreachable) provider.
    let response = get(
        &app,
        &format!("/redirect?state={state}&code=x"),
        cookie.as_deref(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["error"]["code"], "exchange_failed");
}
