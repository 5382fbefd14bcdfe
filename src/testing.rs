//! Test support: a local HTTP server that answers every request with a
//! canned response and records everything it receives.

use std::{convert::Infallible, net::SocketAddr, sync::{Arc, Mutex}};

use bytes::Bytes;
use http_body_util::{BodyExt as _, Full};
use hyper::{Request, StatusCode, body::Incoming, server::conn::http1, service::service_fn};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use crate::config::{AuthConfig, TargetHost};


#[derive(Debug, Clone)]
pub(crate) struct Recorded {
    pub(crate) method: String,
    pub(crate) path_and_query: String,
    pub(crate) authorization: Option<String>,
    pub(crate) content_type: Option<String>,
    pub(crate) body: String,
}

pub(crate) struct TestServer {
    pub(crate) host: TargetHost,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl TestServer {
    pub(crate) fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn url(&self) -> reqwest::Url {
        reqwest::Url::parse(self.host.as_str()).unwrap()
    }
}

/// Spawns a local HTTP server answering every request with the given status
/// and body, recording everything it receives in arrival order.
pub(crate) async fn spawn_server(status: StatusCode, response_body: &'static str) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));

    let recorded = Arc::clone(&requests);
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let io = TokioIo::new(stream);
            let recorded = Arc::clone(&recorded);
            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let recorded = Arc::clone(&recorded);
                    async move {
                        let (parts, body) = req.into_parts();
                        let body = body.collect().await.unwrap().to_bytes();
                        let header = |name: &str| parts.headers
                            .get(name)
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_owned);
                        recorded.lock().unwrap().push(Recorded {
                            method: parts.method.to_string(),
                            path_and_query: parts.uri
                                .path_and_query()
                                .map(|pq| pq.to_string())
                                .unwrap_or_default(),
                            authorization: header("authorization"),
                            content_type: header("content-type"),
                            body: String::from_utf8_lossy(&body).into_owned(),
                        });

                        let response = hyper::Response::builder()
                            .status(status)
                            .header("content-type", "application/json")
                            .body(Full::new(Bytes::from_static(response_body.as_bytes())))
                            .unwrap();
                        Ok::<_, Infallible>(response)
                    }
                });
                let _ = http1::Builder::new().serve_connection(io, service).await;
            });
        }
    });

    TestServer {
        host: TargetHost::try_from(format!("http://{addr}")).unwrap(),
        requests,
    }
}

/// Credentials matching what `spawn_server` pretends to accept.
pub(crate) fn test_auth() -> AuthConfig {
    AuthConfig {
        token_path: "/auth/token".into(),
        username: "admin".into(),
        password: "p".into(),
    }
}
