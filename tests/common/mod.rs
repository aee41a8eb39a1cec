//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use redirect_ipv6::config::AppConfig;
use redirect_ipv6::http::HttpServer;

/// Start a mock backend answering every request with a redirect.
///
/// `location` of `None` sends a plain `200 OK` instead.
pub async fn start_redirect_backend(status: u16, location: Option<&'static str>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        read_request_head(&mut socket).await;

                        let status_text = match status {
                            200 => "200 OK",
                            301 => "301 Moved Permanently",
                            302 => "302 Found",
                            303 => "303 See Other",
                            307 => "307 Temporary Redirect",
                            _ => "200 OK",
                        };
                        let location_line = location
                            .map(|l| format!("Location: {}\r\n", l))
                            .unwrap_or_default();
                        let body = "backend";

                        let response_str = format!(
                            "HTTP/1.1 {}\r\n{}Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            location_line,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start the sidecar with `config` on an ephemeral port.
pub async fn start_proxy(config: AppConfig) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config).unwrap();

    tokio::spawn(async move {
        let _ = server.run_with_shutdown(listener, std::future::pending()).await;
    });

    addr
}

/// HTTP client that reports redirects instead of following them.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

async fn read_request_head(socket: &mut tokio::net::TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}
