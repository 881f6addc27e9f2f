//! Request/response handling for the video platform's internal player endpoint.

use serde_json::{json, Value};

use crate::config::PlayerClient;
use crate::error::PlayerError;
use crate::types::AudioStream;

pub const PLAYER_PATH: &str = "/youtubei/v1/player?prettyPrint=false";

pub fn player_request_body(video_id: &str, client: &PlayerClient) -> Value {
    json!({
        "videoId": video_id,
        "context": {
            "client": {
                "clientName": client.name,
                "clientVersion": client.version,
                "hl": client.hl,
                "gl": client.gl,
            }
        },
        "contentCheckOk": true,
        "racyCheckOk": true,
    })
}

/// Audio formats that carry a direct URL, highest bitrate first.
pub fn extract_audio_streams(resp: &Value) -> Result<Vec<AudioStream>, PlayerError> {
    if let Some(status) = resp.pointer("/playabilityStatus/status").and_then(Value::as_str) {
        if status != "OK" {
            let reason = resp
                .pointer("/playabilityStatus/reason")
                .and_then(Value::as_str)
                .unwrap_or("no reason given");
            return Err(PlayerError::Unplayable { status: status.to_string(), reason: reason.to_string() });
        }
    }

    let Some(formats) = resp.pointer("/streamingData/adaptiveFormats") else { return Ok(Vec::new()); };
    let formats = formats
        .as_array()
        .ok_or_else(|| PlayerError::Malformed("adaptiveFormats is not an array".into()))?;

    let mut streams: Vec<AudioStream> = formats
        .iter()
        .filter_map(|f| {
            let mime_type = f.get("mimeType")?.as_str()?;
            if !mime_type.starts_with("audio/") { return None; }
            Some(AudioStream {
                itag: f.get("itag").and_then(Value::as_u64).and_then(|n| u32::try_from(n).ok()),
                url: f.get("url")?.as_str()?.to_string(),
                mime_type: mime_type.to_string(),
                bitrate: f.get("bitrate").and_then(Value::as_u64).unwrap_or(0),
                // contentLength arrives as a decimal string
                content_length: f.get("contentLength").and_then(|v| v.as_str().and_then(|s| s.parse().ok()).or_else(|| v.as_u64())),
            })
        })
        .collect();
    streams.sort_by(|a, b| b.bitrate.cmp(&a.bitrate));
    Ok(streams)
}
