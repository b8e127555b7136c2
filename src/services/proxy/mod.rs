//! Loopback HTTP proxy for framing third-party pages. Opt-in through
//! `proxy.enabled` in the settings.
//!
//! `GET /proxy?url=<target>` fetches the target, drops frame-blocking headers
//! and rewrites HTML links so navigation stays inside the proxy.

pub mod rewrite;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE,
};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::net::TcpListener;
use url::Url;

use crate::error::ProxyError;
use rewrite::{filter_request_headers, rewrite_html, rewrite_response_headers};

pub const HOST: &str = "127.0.0.1";

const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

static SERVER_STARTED: AtomicBool = AtomicBool::new(false);

#[derive(Clone)]
struct ProxyState {
    client: reqwest::Client,
    origin: String,
}

pub struct ProxyServer {
    listener: TcpListener,
    state: ProxyState,
}

impl ProxyServer {
    pub async fn bind(port: u16) -> Result<Self, ProxyError> {
        let addr = format!("{}:{}", HOST, port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ProxyError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local = listener
            .local_addr()
            .map_err(|source| ProxyError::Bind { addr, source })?;

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            listener,
            state: ProxyState {
                client,
                origin: format!("http://{}", local),
            },
        })
    }

    pub fn origin(&self) -> &str {
        &self.state.origin
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }

    pub async fn serve(self) -> std::io::Result<()> {
        let app = Router::new()
            .fallback(handle_proxy_request)
            .with_state(self.state);
        axum::serve(self.listener, app).await
    }
}

/// Start the proxy in the background. Later calls are no-ops and return `None`.
pub async fn start_proxy_server(port: u16) -> Result<Option<SocketAddr>, ProxyError> {
    if SERVER_STARTED.swap(true, Ordering::SeqCst) {
        return Ok(None);
    }

    let server = match ProxyServer::bind(port).await {
        Ok(server) => server,
        Err(e) => {
            SERVER_STARTED.store(false, Ordering::SeqCst);
            return Err(e);
        }
    };

    let addr = server.local_addr();
    log::info!("[Proxy] running at {}", server.origin());

    tokio::spawn(async move {
        if let Err(e) = server.serve().await {
            log::error!("[Proxy] server error: {}", e);
        }
    });

    Ok(addr)
}

fn plain(status: StatusCode, message: &'static str) -> Response {
    (status, [(CONTENT_TYPE, "text/plain")], message).into_response()
}

async fn handle_proxy_request(State(state): State<ProxyState>, request: Request) -> Response {
    if request.method() == Method::OPTIONS {
        return (
            StatusCode::NO_CONTENT,
            [
                (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
                (ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type, Authorization, X-Requested-With"),
                (ACCESS_CONTROL_ALLOW_METHODS, "GET,POST,PUT,PATCH,DELETE,OPTIONS"),
            ],
        )
            .into_response();
    }

    if request.uri().path() != "/proxy" {
        return plain(StatusCode::NOT_FOUND, "Proxy endpoint not found");
    }

    let target = request.uri().query().and_then(|query| {
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "url")
            .map(|(_, value)| value.into_owned())
    });
    let Some(target) = target.filter(|t| !t.is_empty()) else {
        return plain(StatusCode::BAD_REQUEST, "Missing url parameter");
    };

    let upstream = match Url::parse(&target) {
        Ok(url) => url,
        Err(_) => return plain(StatusCode::BAD_REQUEST, "Invalid url parameter"),
    };
    if !matches!(upstream.scheme(), "http" | "https") {
        return plain(StatusCode::BAD_REQUEST, "Only http(s) protocols are supported");
    }

    match forward(&state, request, upstream).await {
        Ok(response) => response,
        Err(e) => {
            log::error!("[Proxy] request failed: {:#}", e);
            (
                StatusCode::BAD_GATEWAY,
                [
                    (CONTENT_TYPE, "text/plain"),
                    (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
                    (CACHE_CONTROL, "no-store"),
                ],
                "Proxy request failed",
            )
                .into_response()
        }
    }
}

async fn forward(state: &ProxyState, request: Request, upstream: Url) -> anyhow::Result<Response> {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .context("reading request body")?;
    let use_body = !body.is_empty() && parts.method != Method::GET && parts.method != Method::HEAD;

    let mut builder = state
        .client
        .request(parts.method.clone(), upstream.clone())
        .headers(filter_request_headers(&parts.headers, &upstream));
    if use_body {
        builder = builder.body(body);
    }

    let upstream_response = builder
        .send()
        .await
        .with_context(|| format!("fetching {}", upstream))?;

    let status = upstream_response.status();
    let mut headers =
        rewrite_response_headers(upstream_response.headers(), &upstream, &state.origin);
    let is_html = upstream_response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/html"))
        .unwrap_or(false);

    let bytes = if is_html {
        let text = upstream_response.text().await.context("reading upstream html")?;
        rewrite_html(&text, &upstream, &state.origin).into_bytes()
    } else {
        upstream_response
            .bytes()
            .await
            .context("reading upstream body")?
            .to_vec()
    };

    headers.insert(CONTENT_LENGTH, HeaderValue::from(bytes.len()));

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;

    async fn spawn_proxy() -> String {
        let server = ProxyServer::bind(0).await.unwrap();
        let origin = server.origin().to_string();
        tokio::spawn(server.serve());
        origin
    }

    async fn spawn_upstream() -> String {
        let app = Router::new()
            .route(
                "/page",
                get(|| async {
                    (
                        [
                            (CONTENT_TYPE, "text/html; charset=utf-8"),
                            (axum::http::header::X_FRAME_OPTIONS, "DENY"),
                        ],
                        "<html><head><title>t</title></head><body><a href=\"/next\">n</a></body></html>",
                    )
                }),
            )
            .route(
                "/moved",
                get(|| async {
                    (
                        StatusCode::FOUND,
                        [(axum::http::header::LOCATION, "/page")],
                    )
                }),
            );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client() -> reqwest::Client {
        reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_rejects_bad_requests() {
        let proxy = spawn_proxy().await;
        let client = client();

        let res = client.get(format!("{}/other", proxy)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(res.text().await.unwrap(), "Proxy endpoint not found");

        let res = client.get(format!("{}/proxy", proxy)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(res.text().await.unwrap(), "Missing url parameter");

        let res = client
            .get(format!("{}/proxy?url=not%20a%20url", proxy))
            .send()
            .await
            .unwrap();
        assert_eq!(res.text().await.unwrap(), "Invalid url parameter");

        let res = client
            .get(format!("{}/proxy?url=ftp%3A%2F%2Fexample.com%2F", proxy))
            .send()
            .await
            .unwrap();
        assert_eq!(res.text().await.unwrap(), "Only http(s) protocols are supported");
    }

    #[tokio::test]
    async fn test_preflight_allows_any_origin() {
        let proxy = spawn_proxy().await;
        let res = client()
            .request(Method::OPTIONS, format!("{}/proxy", proxy))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert_eq!(res.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn test_proxies_and_rewrites_html() {
        let proxy = spawn_proxy().await;
        let upstream = spawn_upstream().await;
        let target = Url::parse(&format!("{}/page", upstream)).unwrap();

        let res = client()
            .get(rewrite::proxy_link(&target, &proxy))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().get(axum::http::header::X_FRAME_OPTIONS).is_none());
        assert_eq!(res.headers()[CACHE_CONTROL], "no-store");

        let body = res.text().await.unwrap();
        let next = Url::parse(&format!("{}/next", upstream)).unwrap();
        assert!(body.contains(&format!("href=\"{}\"", rewrite::proxy_link(&next, &proxy))));
        assert!(body.contains("<base href="));
    }

    #[tokio::test]
    async fn test_redirects_stay_inside_proxy() {
        let proxy = spawn_proxy().await;
        let upstream = spawn_upstream().await;
        let target = Url::parse(&format!("{}/moved", upstream)).unwrap();

        let res = client()
            .get(rewrite::proxy_link(&target, &proxy))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FOUND);

        let page = Url::parse(&format!("{}/page", upstream)).unwrap();
        assert_eq!(
            res.headers()[axum::http::header::LOCATION],
            rewrite::proxy_link(&page, &proxy).as_str()
        );
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_bad_gateway() {
        let proxy = spawn_proxy().await;
        // Bind and drop to get a port with nothing listening.
        let closed = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();
        let target = Url::parse(&format!("http://{}/", closed)).unwrap();

        let res = client()
            .get(rewrite::proxy_link(&target, &proxy))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(res.text().await.unwrap(), "Proxy request failed");
    }

    #[tokio::test]
    async fn test_second_start_is_a_noop() {
        let addr = start_proxy_server(0).await.unwrap().expect("first start binds");
        assert_eq!(start_proxy_server(0).await.unwrap(), None);

        let res = client()
            .get(format!("http://{}/other", addr))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
