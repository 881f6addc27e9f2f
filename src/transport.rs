use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

use crate::error::AttemptError;

pub type Headers = Vec<(String, String)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One outbound HTTP call. Built per attempt and consumed by the transport.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: String,
    pub headers: Headers,
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
}

impl OutboundRequest {
    pub fn get(url: impl Into<String>, headers: &[(String, String)], timeout: Duration) -> Self {
        Self { method: Method::Get, url: url.into(), headers: headers.to_vec(), body: None, timeout }
    }

    pub fn post_json(url: impl Into<String>, headers: &[(String, String)], body: &serde_json::Value, timeout: Duration) -> Self {
        let mut headers = headers.to_vec();
        headers.push(("Content-Type".to_string(), "application/json".to_string()));
        Self { method: Method::Post, url: url.into(), headers, body: Some(body.to_string().into_bytes()), timeout }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl RawResponse {
    pub fn is_success(&self) -> bool { (200..=299).contains(&self.status) }
}

/// HTTP client boundary. Implementations perform exactly one request per call;
/// timeouts are applied by [`send_bounded`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, req: OutboundRequest) -> Result<RawResponse, AttemptError>;
}

/// Send through `transport`, abandoning the attempt once `req.timeout` elapses.
pub async fn send_bounded<T: Transport + ?Sized>(transport: &T, req: OutboundRequest) -> Result<RawResponse, AttemptError> {
    let timeout = req.timeout;
    match tokio::time::timeout(timeout, transport.send(req)).await {
        Ok(res) => res,
        Err(_) => Err(AttemptError::Timeout(timeout)),
    }
}

/// Production transport backed by a shared `reqwest::Client`.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, req: OutboundRequest) -> Result<RawResponse, AttemptError> {
        let mut builder = match req.method {
            Method::Get => self.client.get(&req.url),
            Method::Post => self.client.post(&req.url),
        };
        for (k, v) in &req.headers {
            builder = builder.header(k.as_str(), v.as_str());
        }
        if let Some(body) = req.body {
            builder = builder.body(body);
        }

        let resp = builder.send().await.map_err(|e| AttemptError::Transport(e.to_string()))?;
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp.bytes().await.map_err(|e| AttemptError::Transport(e.to_string()))?;
        Ok(RawResponse { status, content_type, body })
    }
}
