pub mod config;
pub mod error;
pub mod innertube;
pub mod logging;
pub mod mirror;
pub mod scrape;
pub mod server;
pub mod transport;
pub mod types;

// --- Library API for embedding ---

/// Convenience re-exports for embedders.
pub mod prelude {
    pub use crate::config::{Config, PlayerClient};
    pub use crate::error::{AttemptError, CandidateError, FetchError, PlayerError, ScrapeError, ServiceError};
    pub use crate::mirror::{MirrorFetcher, MirrorRequest, MirrorResponse};
    pub use crate::scrape::{ScrapeExtractor, ScrapeProfile, Step};
    pub use crate::transport::{HttpTransport, RawResponse, Transport};
    pub use crate::types::{AudioStream, ScrapeRecord};
    pub use crate::Oblivion;
}

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{AttemptError, PlayerError, ServiceError, ServiceResult};
use crate::mirror::{join_url, MirrorFetcher, MirrorRequest, MirrorResponse};
use crate::scrape::ScrapeExtractor;
use crate::transport::{send_bounded, Headers, HttpTransport, OutboundRequest, RawResponse, Transport};
use crate::types::{AudioStream, ScrapeRecord};

lazy_static! {
    static ref VIDEO_ID: Regex = Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap();
}

pub fn is_valid_video_id(id: &str) -> bool { VIDEO_ID.is_match(id) }

fn encode(q: &str) -> String { url::form_urlencoded::byte_serialize(q.as_bytes()).collect() }

/// Library entry point. Owns the configuration and the outbound transport.
pub struct Oblivion<T: Transport = HttpTransport> {
    config: Config,
    transport: T,
    extractor: ScrapeExtractor,
}

impl Oblivion<HttpTransport> {
    /// Build with the production `reqwest` transport.
    pub fn connect(config: Config) -> anyhow::Result<Self> {
        let transport = HttpTransport::new(&config.user_agent)?;
        Ok(Self::with_transport(config, transport))
    }
}

impl<T: Transport> Oblivion<T> {
    pub fn with_transport(config: Config, transport: T) -> Self {
        Self { config, transport, extractor: ScrapeExtractor::default() }
    }

    pub fn config(&self) -> &Config { &self.config }

    fn headers(&self, accept_json: bool) -> Headers {
        let mut h = vec![("User-Agent".to_string(), self.config.user_agent.clone())];
        if accept_json {
            h.push(("Accept".to_string(), "application/json".to_string()));
        }
        h
    }

    async fn invidious(&self, suffix: &str) -> ServiceResult<MirrorResponse> {
        let headers = self.headers(true);
        let req = MirrorRequest {
            candidates: &self.config.invidious_instances,
            suffix,
            headers: &headers,
            timeout: self.config.timeout(),
        };
        let resp = MirrorFetcher::new(&self.transport).fetch(&req).await?;
        info!(mirror = %resp.candidate, "invidious answered");
        Ok(resp)
    }

    /// Video search across the Invidious mirrors; the upstream JSON is returned untouched.
    pub async fn invidious_search(&self, query: &str) -> ServiceResult<MirrorResponse> {
        let suffix = format!(
            "/api/v1/search?q={}&type=video&fields=videoId,title,author,lengthSeconds,videoThumbnails",
            encode(query)
        );
        self.invidious(&suffix).await
    }

    /// Stream listing for one video across the Invidious mirrors.
    pub async fn invidious_streams(&self, video_id: &str) -> ServiceResult<MirrorResponse> {
        if !is_valid_video_id(video_id) {
            return Err(ServiceError::InvalidVideoId(video_id.to_string()));
        }
        self.invidious(&format!("/api/v1/videos/{video_id}?fields=adaptiveFormats,formatStreams")).await
    }

    /// Single-upstream iTunes search. The upstream status is relayed as is.
    pub async fn itunes_search(&self, raw_query: &str) -> ServiceResult<RawResponse> {
        let url = format!("{}?{}", join_url(&self.config.itunes_base, "/search"), raw_query);
        let req = OutboundRequest::get(url, &self.headers(false), self.config.timeout());
        Ok(send_bounded(&self.transport, req).await?)
    }

    /// Fetch `https://<path>`. Non-2xx answers come back with an empty body.
    pub async fn image(&self, path: &str) -> ServiceResult<RawResponse> {
        let req = OutboundRequest::get(format!("https://{path}"), &self.headers(false), self.config.timeout());
        let mut resp = send_bounded(&self.transport, req).await?;
        if !resp.is_success() {
            resp.body = bytes::Bytes::new();
            return Ok(resp);
        }
        resp.content_type.get_or_insert_with(|| "image/jpeg".to_string());
        Ok(resp)
    }

    /// Scrape the platform's search results page into validated records.
    pub async fn youtube_search(&self, query: &str) -> ServiceResult<Vec<ScrapeRecord>> {
        let mut headers = self.headers(false);
        headers.push(("Accept-Language".to_string(), "en-US,en;q=0.9".to_string()));
        let candidates = [self.config.youtube_base.clone()];
        let suffix = format!("/results?search_query={}&hl=en", encode(query));
        let req = MirrorRequest { candidates: &candidates, suffix: &suffix, headers: &headers, timeout: self.config.timeout() };
        let page = MirrorFetcher::new(&self.transport).fetch(&req).await?;
        let html = String::from_utf8_lossy(&page.body);
        let records = self.extractor.extract(&html, self.config.duration_ceiling_secs)?;
        debug!(query, count = records.len(), "scraped search results");
        Ok(records)
    }

    /// Audio stream URLs from the internal player endpoint.
    pub async fn youtube_audio(&self, video_id: &str) -> ServiceResult<Vec<AudioStream>> {
        if !is_valid_video_id(video_id) {
            return Err(ServiceError::InvalidVideoId(video_id.to_string()));
        }
        let body = innertube::player_request_body(video_id, &self.config.player_client);
        let url = join_url(&self.config.youtube_base, innertube::PLAYER_PATH);
        let req = OutboundRequest::post_json(url, &self.headers(true), &body, self.config.timeout());
        let resp = send_bounded(&self.transport, req).await?;
        if !resp.is_success() {
            return Err(AttemptError::Status(resp.status).into());
        }
        let json: serde_json::Value = serde_json::from_slice(&resp.body).map_err(|e| PlayerError::Malformed(e.to_string()))?;
        let streams = innertube::extract_audio_streams(&json)?;
        debug!(video_id, count = streams.len(), "extracted audio streams");
        Ok(streams)
    }
}
