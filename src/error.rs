use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Why a single outbound attempt did not produce a usable response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("upstream answered {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),
}

/// A failed attempt tagged with the mirror that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateError {
    pub candidate: String,
    pub kind: AttemptError,
}

impl fmt::Display for CandidateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.candidate, self.kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("no candidates to try")]
    NoCandidates,

    #[error("all {} candidates failed: {}", .0.len(), join_errors(.0))]
    AllCandidatesFailed(Vec<CandidateError>),
}

fn join_errors(errors: &[CandidateError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScrapeError {
    #[error("no embedded data found in document")]
    NoEmbeddedData,

    #[error("embedded data is malformed: {0}")]
    MalformedEmbeddedData(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlayerError {
    #[error("video is not playable ({status}): {reason}")]
    Unplayable { status: String, reason: String },

    #[error("player response is malformed: {0}")]
    Malformed(String),
}

/// Errors surfaced by the catalog operations and mapped to HTTP statuses by the server.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid videoId")]
    InvalidVideoId(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Scrape(#[from] ScrapeError),

    #[error(transparent)]
    Player(#[from] PlayerError),

    #[error(transparent)]
    Upstream(#[from] AttemptError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
