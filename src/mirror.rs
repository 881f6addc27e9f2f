//! Ordered fallback across functionally equivalent upstream mirrors.
//!
//! Candidates are tried one at a time in the order given. The first 2xx answer
//! wins; every other outcome is recorded against its candidate and the next one
//! is tried. Each candidate gets exactly one attempt per call.

use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::{AttemptError, CandidateError, FetchError};
use crate::transport::{send_bounded, OutboundRequest, Transport};

/// A single logical lookup against a list of mirrors.
#[derive(Debug, Clone, Copy)]
pub struct MirrorRequest<'a> {
    pub candidates: &'a [String],
    pub suffix: &'a str,
    pub headers: &'a [(String, String)],
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorResponse {
    /// Base URL of the mirror that answered.
    pub candidate: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

pub struct MirrorFetcher<'t, T: Transport + ?Sized> {
    transport: &'t T,
}

impl<'t, T: Transport + ?Sized> MirrorFetcher<'t, T> {
    pub fn new(transport: &'t T) -> Self { Self { transport } }

    pub async fn fetch(&self, req: &MirrorRequest<'_>) -> Result<MirrorResponse, FetchError> {
        if req.candidates.is_empty() {
            return Err(FetchError::NoCandidates);
        }

        let mut errors = Vec::with_capacity(req.candidates.len());
        for base in req.candidates {
            let url = join_url(base, req.suffix);
            debug!(%url, "trying mirror");
            let start = Instant::now();
            let outbound = OutboundRequest::get(url, req.headers, req.timeout);
            match send_bounded(self.transport, outbound).await {
                Ok(resp) if resp.is_success() => {
                    debug!(mirror = %base, status = resp.status, elapsed_ms = start.elapsed().as_millis() as u64, "mirror answered");
                    return Ok(MirrorResponse {
                        candidate: base.clone(),
                        status: resp.status,
                        content_type: resp.content_type,
                        body: resp.body,
                    });
                }
                Ok(resp) => {
                    warn!(mirror = %base, status = resp.status, "mirror returned non-success status");
                    errors.push(CandidateError { candidate: base.clone(), kind: AttemptError::Status(resp.status) });
                }
                Err(kind) => {
                    warn!(mirror = %base, error = %kind, "mirror attempt failed");
                    errors.push(CandidateError { candidate: base.clone(), kind });
                }
            }
        }
        Err(FetchError::AllCandidatesFailed(errors))
    }
}

/// Convenience wrapper for a one-off fetch.
pub async fn fetch<T: Transport + ?Sized>(
    transport: &T,
    candidates: &[String],
    suffix: &str,
    headers: &[(String, String)],
    timeout: Duration,
) -> Result<MirrorResponse, FetchError> {
    MirrorFetcher::new(transport)
        .fetch(&MirrorRequest { candidates, suffix, headers, timeout })
        .await
}

pub(crate) fn join_url(base: &str, suffix: &str) -> String {
    match (base.ends_with('/'), suffix.starts_with('/')) {
        (true, true) => format!("{}{}", base, &suffix[1..]),
        _ => format!("{base}{suffix}"),
    }
}
