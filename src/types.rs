use serde::{Deserialize, Serialize};

/// A playable search result. Only built through [`ScrapeRecord::new`], which
/// rejects entries without an id or with a duration outside `(0, ceiling)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrapeRecord {
    #[serde(rename = "videoId")]
    id: String,
    title: String,
    author: String,
    #[serde(rename = "lengthSeconds")]
    duration_secs: u64,
    thumbnail: Option<String>,
}

impl ScrapeRecord {
    pub fn new(id: Option<String>, title: String, author: String, duration_secs: u64, thumbnail: Option<String>, ceiling_secs: u64) -> Option<Self> {
        let id = id.filter(|s| !s.is_empty())?;
        if duration_secs == 0 || duration_secs >= ceiling_secs { return None; }
        Some(Self { id, title, author, duration_secs, thumbnail })
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn title(&self) -> &str { &self.title }
    pub fn author(&self) -> &str { &self.author }
    pub fn duration_secs(&self) -> u64 { self.duration_secs }
    pub fn thumbnail(&self) -> Option<&str> { self.thumbnail.as_deref() }
}

/// An audio-only adaptive format from the player response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioStream {
    pub itag: Option<u32>,
    pub url: String,
    pub mime_type: String,
    pub bitrate: u64,
    pub content_length: Option<u64>,
}
