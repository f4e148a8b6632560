//! An in-process HTTP server standing in for the Yandex Disk API and its download hosts.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::api::{api_client, Disk};
use crate::config::Token;

pub(crate) const TEST_TOKEN: &str = "test-token";

/// Replaced by the server's base URL in JSON bodies, for hrefs pointing back at the server.
pub(crate) const BASE_PLACEHOLDER: &str = "$BASE";

/// A canned response for requests matching `method` and `path`,
/// optionally only when the `path` query parameter equals `resource`.
#[derive(Clone)]
pub(crate) struct Route {
    method: &'static str,
    path: String,
    resource: Option<String>,
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
    delay: Option<Duration>,
}

impl Route {
    fn new(method: &'static str, path: &str) -> Self {
        Self {
            method,
            path: path.to_owned(),
            resource: None,
            status: 200,
            content_type: "application/json",
            body: b"{}".to_vec(),
            delay: None,
        }
    }

    pub(crate) fn get(path: &str) -> Self {
        Self::new("GET", path)
    }

    pub(crate) fn put(path: &str) -> Self {
        Self::new("PUT", path)
    }

    pub(crate) fn for_resource(mut self, resource: &str) -> Self {
        self.resource = Some(resource.to_owned());
        self
    }

    pub(crate) fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub(crate) fn json(mut self, body: &str) -> Self {
        self.content_type = "application/json";
        self.body = body.as_bytes().to_vec();
        self
    }

    pub(crate) fn bytes(mut self, body: &[u8]) -> Self {
        self.content_type = "application/octet-stream";
        self.body = body.to_vec();
        self
    }

    /// Hold the response back for `delay` after the request is read.
    pub(crate) fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// A request the server received.
#[derive(Debug, Clone)]
pub(crate) struct Hit {
    pub(crate) method: String,
    pub(crate) path: String,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) authorization: Option<String>,
}

impl Hit {
    pub(crate) fn query(&self, key: &str) -> Option<String> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }
}

pub(crate) struct MockServer {
    addr: SocketAddr,
    hits: Arc<Mutex<Vec<Hit>>>,
    task: JoinHandle<()>,
}

impl MockServer {
    pub(crate) async fn start(routes: Vec<Route>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let base = format!("http://{addr}");
        let routes: Vec<Route> = routes
            .into_iter()
            .map(|mut route| {
                if route.content_type == "application/json" {
                    let body = String::from_utf8_lossy(&route.body).replace(BASE_PLACEHOLDER, &base);
                    route.body = body.into_bytes();
                }
                route
            })
            .collect();
        let routes = Arc::new(routes);
        let hits = Arc::new(Mutex::new(Vec::new()));

        let task = tokio::spawn({
            let hits = hits.clone();
            async move {
                while let Ok((stream, _)) = listener.accept().await {
                    tokio::spawn(handle(stream, routes.clone(), hits.clone()));
                }
            }
        });

        Self { addr, hits, task }
    }

    /// Base URL to hand to [`Disk::new`].
    pub(crate) fn base(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Absolute URL of `path` on this server.
    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base())
    }

    pub(crate) fn hits(&self) -> Vec<Hit> {
        self.hits.lock().unwrap().clone()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn handle(mut stream: TcpStream, routes: Arc<Vec<Route>>, hits: Arc<Mutex<Vec<Hit>>>) {
    let mut head = Vec::new();
    let mut buf = [0u8; 4096];
    while !head.windows(4).any(|window| window == b"\r\n\r\n") {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
    let head = String::from_utf8_lossy(&head).into_owned();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap_or_default().split(' ');
    let method = request_line.next().unwrap_or_default().to_owned();
    let target = request_line.next().unwrap_or_default();
    let authorization = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.eq_ignore_ascii_case("authorization"))
        .map(|(_, value)| value.trim().to_owned());

    let url = Url::parse(&format!("http://mock{target}")).unwrap();
    let hit = Hit {
        method,
        path: url.path().to_owned(),
        query: url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect(),
        authorization,
    };

    let route = routes.iter().find(|route| {
        route.method == hit.method
            && route.path == hit.path
            && route
                .resource
                .as_ref()
                .map_or(true, |resource| hit.query("path").as_ref() == Some(resource))
    });
    hits.lock().unwrap().push(hit);

    if let Some(delay) = route.and_then(|route| route.delay) {
        tokio::time::sleep(delay).await;
    }
    let (status, content_type, body) = match route {
        Some(route) => (route.status, route.content_type, route.body.clone()),
        None => (404, "text/plain", b"no route".to_vec()),
    };
    let reason = StatusCode::from_u16(status)
        .ok()
        .and_then(|status| status.canonical_reason())
        .unwrap_or("");
    let response_head = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );

    let _ = stream.write_all(response_head.as_bytes()).await;
    let _ = stream.write_all(&body).await;
    let _ = stream.shutdown().await;
}

/// An authorized API client bypassing any system proxy.
pub(crate) fn test_api_client() -> Client {
    api_client(Client::builder().no_proxy(), &Token::from(TEST_TOKEN), 5).unwrap()
}

/// An authorized [`Disk`] talking to `server`.
pub(crate) fn mock_disk(server: &MockServer) -> Disk {
    Disk::new(test_api_client(), &server.base()).unwrap()
}

/// A plain client for byte fetches, bypassing any system proxy.
pub(crate) fn fetch_client() -> Client {
    Client::builder().no_proxy().build().unwrap()
}
