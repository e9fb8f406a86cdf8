//! Web handlers served through the dispatch handler.

mod common;

use axum::http::{header, Method, StatusCode};
use common::{body_string, get, handler_with_logger, send};
use rulegate::http::DispatchConfig;
use rulegate::routing::matcher::{AndMatcher, ExactPathMatcher, PathPrefixMatcher};
use rulegate::routing::HandlerRule;
use rulegate::web::{compose, decorator_fn, handler_fn, BoxedWebHandler, HttpResponse};
use serde::Serialize;
use std::sync::{Arc, Mutex};

#[derive(Serialize)]
struct Item {
    id: u32,
    name: &'static str,
}

fn require_token() -> Box<dyn rulegate::web::Decorator> {
    decorator_fn(|next: BoxedWebHandler| {
        handler_fn(move |ctx| {
            if ctx.request.query("token").as_deref() != Some("s3cret") {
                return ctx.redirect("/login", StatusCode::FOUND).reply();
            }
            next.handle(ctx)
        })
    })
}

fn tag_header(log: Arc<Mutex<Vec<&'static str>>>) -> Box<dyn rulegate::web::Decorator> {
    decorator_fn(move |next: BoxedWebHandler| {
        let log = log.clone();
        handler_fn(move |ctx| {
            log.lock().unwrap().push("tag");
            ctx.response
                .header(header::CACHE_CONTROL, "no-store".parse().unwrap());
            next.handle(ctx)
        })
    })
}

fn api_config(log: Arc<Mutex<Vec<&'static str>>>) -> DispatchConfig {
    let item = handler_fn(|ctx| {
        ctx.new_api_response("OK", "success", Item { id: 1, name: "widget" })
            .reply()
    });
    let page = handler_fn(|ctx| {
        let body = format!("<p>{}</p>", ctx.request.path());
        ctx.new_html_response(body).reply()
    });

    DispatchConfig::default()
        .with_rule(HandlerRule::new(
            "item",
            ExactPathMatcher::new("/api/item"),
            compose(item, vec![tag_header(log.clone()), require_token()]),
        ))
        .with_rule(HandlerRule::new(
            "pages",
            PathPrefixMatcher::new("/pages/"),
            compose(page, Vec::new()),
        ))
}

#[tokio::test]
async fn test_api_response_through_decorators() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (handler, logger) = handler_with_logger(api_config(log.clone()));

    let response = send(&handler, get("/api/item?token=s3cret")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json; charset=utf-8"
    );
    assert_eq!(
        body_string(response).await,
        r#"{"code":"OK","message":"success","data":{"id":1,"name":"widget"}}"#
    );
    assert_eq!(*log.lock().unwrap(), vec!["tag"]);
    assert!(logger.failures.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_decorator_redirects_without_token() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (handler, _logger) = handler_with_logger(api_config(log.clone()));

    let response = send(&handler, get("/api/item")).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[header::LOCATION], "/login");
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
    assert_eq!(body_string(response).await, "<a href=\"/login\">Found</a>.\n");
}

#[tokio::test]
async fn test_html_handler() {
    let (handler, _logger) = handler_with_logger(api_config(Arc::default()));

    let response = send(&handler, get("/pages/about")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html; charset=utf-8");
    assert_eq!(body_string(response).await, "<p>/pages/about</p>");
}

#[tokio::test]
async fn test_double_finalize_is_a_dispatch_failure() {
    let twice = handler_fn(|ctx| {
        let first = ctx.new_html_response("first");
        if first.create_response(&mut ctx.response).is_err() {
            return None;
        }
        ctx.new_html_response("second").reply()
    });
    let mut matcher = AndMatcher::default();
    matcher.push(ExactPathMatcher::new("/twice"));
    let config = DispatchConfig::default().with_rule(HandlerRule::new("twice", matcher, twice));
    let (handler, logger) = handler_with_logger(config);

    let response = send(&handler, get("/twice")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "first");

    let failures = logger.failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, 200);
    assert!(failures[0].1.ends_with("response already finalized"));
}

#[tokio::test]
async fn test_method_visible_to_handler() {
    let seen = Arc::new(Mutex::new(None));
    let sink = seen.clone();
    let echo = handler_fn(move |ctx| {
        *sink.lock().unwrap() = Some(ctx.request.method().clone());
        ctx.new_json_response(&serde_json::json!({"ok": true})).reply()
    });
    let config = DispatchConfig::default().with_rule(HandlerRule::new(
        "echo",
        PathPrefixMatcher::new("/"),
        echo,
    ));
    let (handler, _logger) = handler_with_logger(config);

    let request = axum::http::Request::builder()
        .method(Method::PUT)
        .uri("/anything")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = send(&handler, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(*seen.lock().unwrap(), Some(Method::PUT));
}
