//! In-memory network for tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{StatusCode, Url};
use swcache_core::Error;
use tokio::sync::Semaphore;

use crate::fetch::{Fetcher, Request, Response, ResponseSource};

pub const ORIGIN: &str = "http://localhost:8000/";

pub fn origin() -> Url {
    Url::parse(ORIGIN).unwrap()
}

pub fn url(path: &str) -> Url {
    origin().join(path).unwrap()
}

pub fn get(path: &str) -> Request {
    Request::get(url(path))
}

#[derive(Clone)]
enum Reply {
    Ok { status: u16, body: String },
    Fail,
}

/// Fake network. URLs without a registered reply fail with a network error.
#[derive(Default)]
pub struct MockFetcher {
    replies: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<String>>,
    total: AtomicUsize,
    gate: Option<Semaphore>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every fetch waits for a permit added with [`MockFetcher::release`].
    pub fn gated() -> Self {
        Self { gate: Some(Semaphore::new(0)), ..Self::default() }
    }

    pub fn respond(&self, path: &str, status: u16, body: &str) -> &Self {
        self.replies
            .lock()
            .unwrap()
            .insert(url(path).to_string(), Reply::Ok { status, body: body.to_string() });
        self
    }

    pub fn fail(&self, path: &str) -> &Self {
        self.replies.lock().unwrap().insert(url(path).to_string(), Reply::Fail);
        self
    }

    pub fn release(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    pub fn calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, path: &str) -> usize {
        let target = url(path).to_string();
        self.calls.lock().unwrap().iter().filter(|u| **u == target).count()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.total.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(request.url.to_string());

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        let reply = self.replies.lock().unwrap().get(request.url.as_str()).cloned();
        match reply {
            Some(Reply::Ok { status, body }) => {
                let mut headers = HeaderMap::new();
                headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
                Ok(Response {
                    url: request.url.clone(),
                    status: StatusCode::from_u16(status).unwrap(),
                    headers,
                    body: Bytes::from(body),
                    source: ResponseSource::Network,
                    stored_at: None,
                    fetch_ms: Some(1),
                })
            }
            Some(Reply::Fail) | None => Err(Error::Network(format!("{}: connection refused", request.url))),
        }
    }
}
