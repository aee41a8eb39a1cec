//! End-to-end tests: client → sidecar → mock backend.

use std::net::SocketAddr;

use redirect_ipv6::config::{AppConfig, RewriteConfig};

mod common;

fn config_for(backend: SocketAddr) -> AppConfig {
    let mut config = AppConfig::default();
    config.upstream.url = format!("http://{}", backend);
    config
}

fn with_new_example_rule(mut config: AppConfig) -> AppConfig {
    config.redirect.rewrites.push(RewriteConfig::new(
        r"^http://127\.0\.0\.1:\d+/(.*)$",
        "http://new.example/$1",
    ));
    config
}

#[tokio::test]
async fn test_ipv6_client_receives_rewritten_location() {
    let backend = common::start_redirect_backend(302, Some("/foo/")).await;
    let proxy = common::start_proxy(with_new_example_rule(config_for(backend))).await;

    let res = common::client()
        .get(format!("http://{}/foo", proxy))
        .header("X-Forwarded-For", "2001:db8::1")
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), 301);
    assert_eq!(res.headers()["location"], "http://new.example/foo");
}

#[tokio::test]
async fn test_ipv4_client_passes_through() {
    let backend = common::start_redirect_backend(302, Some("/foo/")).await;
    let proxy = common::start_proxy(with_new_example_rule(config_for(backend))).await;

    let res = common::client()
        .get(format!("http://{}/foo", proxy))
        .header("X-Forwarded-For", "203.0.113.5")
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), 302);
    assert_eq!(res.headers()["location"], "/foo/");
    assert_eq!(res.text().await.unwrap(), "backend");
}

#[tokio::test]
async fn test_forwarded_prefix_is_restored() {
    let backend = common::start_redirect_backend(303, Some("/login?next=%2F")).await;
    let mut config = config_for(backend);
    config.redirect.default = true;
    let proxy = common::start_proxy(config).await;

    let res = common::client()
        .post(format!("http://{}/submit", proxy))
        .header("X-Forwarded-Prefix", "/app")
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), 303);
    assert_eq!(res.headers()["location"], "/app/login?next=%2F");
}

#[tokio::test]
async fn test_malformed_location_is_server_error() {
    let backend = common::start_redirect_backend(302, Some("http://[::1/broken")).await;
    let mut config = config_for(backend);
    config.redirect.default = true;
    let proxy = common::start_proxy(config).await;

    let res = common::client()
        .get(format!("http://{}/", proxy))
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), 500);
    assert!(res.headers().get("location").is_none());
}

#[tokio::test]
async fn test_non_redirect_response_is_untouched_for_ipv4() {
    let backend = common::start_redirect_backend(200, None).await;
    let proxy = common::start_proxy(with_new_example_rule(config_for(backend))).await;

    let res = common::client()
        .get(format!("http://{}/page", proxy))
        .header("X-Real-Ip", "198.51.100.2")
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), 200);
    assert!(res.headers().get("location").is_none());
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    let closed = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let proxy = common::start_proxy(config_for(closed)).await;

    let res = common::client()
        .get(format!("http://{}/", proxy))
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), 502);
}
