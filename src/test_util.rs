//! Shared test fixtures: a one-shot HTTP server and offline collaborators.

use crate::functions::remote::{Fetch, FetchError};
use parking_lot::Mutex;
use std::{
    net::SocketAddr,
    thread::{self, JoinHandle},
    time::Duration,
};
use tiny_http::{Header, Response, Server, StatusCode};
use url::Url;

/// What the [`TestServer`] saw.
#[derive(Debug, Default)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Loopback server that answers exactly one request with a canned response.
pub struct TestServer {
    addr: SocketAddr,
    handle: JoinHandle<Option<RecordedRequest>>,
}

impl TestServer {
    pub fn respond(status: u16, body: &str) -> Self {
        Self::respond_with(status, "text/plain; charset=utf-8", body)
    }

    pub fn respond_with(status: u16, content_type: &str, body: &str) -> Self {
        Self::respond_after(Duration::ZERO, status, content_type, body)
    }

    /// Hold the response back for `delay` after the request arrives.
    pub fn respond_after(delay: Duration, status: u16, content_type: &str, body: &str) -> Self {
        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        let content_type = content_type.to_string();
        let body = body.to_string();

        let handle = thread::spawn(move || {
            let mut request = server.recv_timeout(Duration::from_secs(10)).ok()??;

            let mut received = String::new();
            request.as_reader().read_to_string(&mut received).ok();
            let recorded = RecordedRequest {
                method: request.method().to_string(),
                path: request.url().to_string(),
                headers: request
                    .headers()
                    .iter()
                    .map(|h| (h.field.to_string(), h.value.to_string()))
                    .collect(),
                body: received,
            };

            thread::sleep(delay);
            let response = Response::from_string(body)
                .with_status_code(StatusCode(status))
                .with_header(Header::from_bytes("Content-Type", content_type).unwrap());
            request.respond(response).ok();

            Some(recorded)
        });

        Self { addr, handle }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Wait for the served request and return it.
    pub fn finish(self) -> RecordedRequest {
        self.handle
            .join()
            .unwrap()
            .expect("test server received no request")
    }
}

/// Offline fetcher recording every call.
#[derive(Default)]
pub struct StubFetcher {
    body: String,
    requests: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl StubFetcher {
    pub fn with_body(body: &str) -> Self {
        Self {
            body: body.to_string(),
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<(String, Vec<(String, String)>)> {
        self.requests.lock().clone()
    }
}

impl Fetch for StubFetcher {
    fn fetch(&self, uri: &Url, headers: &[(String, String)]) -> Result<String, FetchError> {
        self.requests
            .lock()
            .push((uri.to_string(), headers.to_vec()));
        Ok(self.body.clone())
    }
}
