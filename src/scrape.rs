//! Extraction of search results from the JSON blob a results page embeds in a
//! `<script>` assignment.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::error::ScrapeError;
use crate::types::ScrapeRecord;

/// One navigation step from the parsed root down to the item entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Look up an object key. Missing key or non-object drops the branch.
    Key(String),
    /// Fan out over array elements. A non-array drops the branch.
    Each,
}

impl Step {
    pub fn key(k: &str) -> Self { Step::Key(k.to_string()) }
}

/// Where to find the embedded data and how to walk to the entries.
#[derive(Debug, Clone)]
pub struct ScrapeProfile {
    pub markers: Vec<String>,
    pub path: Vec<Step>,
    /// Entries are playable only when they carry this object, which then holds
    /// the item fields. `None` treats every entry as an item.
    pub item_field: Option<String>,
}

impl ScrapeProfile {
    /// Search results page of the video platform (`ytInitialData`).
    pub fn search_results() -> Self {
        Self {
            markers: vec!["ytInitialData".to_string()],
            path: vec![
                Step::key("contents"),
                Step::key("twoColumnSearchResultsRenderer"),
                Step::key("primaryContents"),
                Step::key("sectionListRenderer"),
                Step::key("contents"),
                Step::Each,
                Step::key("itemSectionRenderer"),
                Step::key("contents"),
                Step::Each,
            ],
            item_field: Some("videoRenderer".to_string()),
        }
    }
}

lazy_static! {
    static ref TERMINATOR: Regex = Regex::new(r"^\s*;").unwrap();
}

/// Assignment shapes tried for each marker, in order.
fn marker_patterns(marker: &str) -> Vec<Regex> {
    let m = regex::escape(marker);
    [
        format!(r"var\s+{m}\s*=\s*"),
        format!(r#"window\[\s*["']{m}["']\s*\]\s*=\s*"#),
        format!(r"\b{m}\s*=\s*"),
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
}

#[derive(Debug, Clone)]
pub struct ScrapeExtractor {
    profile: ScrapeProfile,
}

impl Default for ScrapeExtractor {
    fn default() -> Self { Self::new(ScrapeProfile::search_results()) }
}

impl ScrapeExtractor {
    pub fn new(profile: ScrapeProfile) -> Self { Self { profile } }

    pub fn extract(&self, html: &str, ceiling_secs: u64) -> Result<Vec<ScrapeRecord>, ScrapeError> {
        let root = self.embedded_json(html)?;
        let entries = navigate(&root, &self.profile.path);
        Ok(entries
            .into_iter()
            .filter_map(|entry| match &self.profile.item_field {
                Some(field) => entry.get(field.as_str()).filter(|v| v.is_object()),
                None => Some(entry),
            })
            .filter_map(|item| record_from_item(item, ceiling_secs))
            .collect())
    }

    fn embedded_json(&self, html: &str) -> Result<Value, ScrapeError> {
        let start = self
            .profile
            .markers
            .iter()
            .flat_map(|m| marker_patterns(m))
            .find_map(|re| re.find(html).map(|m| m.end()))
            .ok_or(ScrapeError::NoEmbeddedData)?;

        let rest = &html[start..];
        let mut stream = serde_json::Deserializer::from_str(rest).into_iter::<Value>();
        let value = match stream.next() {
            Some(Ok(v)) => v,
            Some(Err(e)) => return Err(ScrapeError::MalformedEmbeddedData(e.to_string())),
            None => return Err(ScrapeError::MalformedEmbeddedData("empty assignment".into())),
        };
        if !TERMINATOR.is_match(&rest[stream.byte_offset()..]) {
            return Err(ScrapeError::MalformedEmbeddedData("assignment is not terminated by ';'".into()));
        }
        Ok(value)
    }
}

/// Walk `path` from `root`; dead branches contribute nothing.
pub fn navigate<'v>(root: &'v Value, path: &[Step]) -> Vec<&'v Value> {
    path.iter().fold(vec![root], |level, step| match step {
        Step::Key(k) => level.into_iter().filter_map(|v| v.get(k.as_str())).collect(),
        Step::Each => level
            .into_iter()
            .filter_map(Value::as_array)
            .flat_map(|a| a.iter())
            .collect(),
    })
}

fn first_text(item: &Value, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|f| {
        let node = item.get(*f)?;
        node.pointer("/runs/0/text")
            .or_else(|| node.get("simpleText"))
            .and_then(Value::as_str)
            .map(str::to_string)
    })
}

fn record_from_item(item: &Value, ceiling_secs: u64) -> Option<ScrapeRecord> {
    let id = item.get("videoId").and_then(Value::as_str).map(str::to_string);
    let title = first_text(item, &["title"]).unwrap_or_default();
    let author = first_text(item, &["ownerText", "longBylineText", "shortBylineText"]).unwrap_or_default();
    let duration = item
        .pointer("/lengthText/simpleText")
        .and_then(Value::as_str)
        .map(parse_duration)
        .unwrap_or(0);
    let thumbnail = item
        .pointer("/thumbnail/thumbnails")
        .and_then(Value::as_array)
        .and_then(|t| t.last())
        .and_then(|t| t.get("url"))
        .and_then(Value::as_str)
        .map(str::to_string);
    ScrapeRecord::new(id, title, author, duration, thumbnail, ceiling_secs)
}

/// `MM:SS` or `H:MM:SS` to seconds; anything else is 0.
pub fn parse_duration(text: &str) -> u64 {
    let parts: Option<Vec<u64>> = text.trim().split(':').map(|p| p.trim().parse::<u64>().ok()).collect();
    let secs = match parts.as_deref() {
        Some([m, s]) => m.checked_mul(60).and_then(|v| v.checked_add(*s)),
        Some([h, m, s]) => h
            .checked_mul(3600)
            .and_then(|v| v.checked_add(m.checked_mul(60)?))
            .and_then(|v| v.checked_add(*s)),
        _ => None,
    };
    secs.unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_profile(marker: &str) -> ScrapeProfile {
        ScrapeProfile { markers: vec![marker.to_string()], path: vec![Step::key("a"), Step::Each], item_field: None }
    }

    fn item(id: &str, length: &str) -> String {
        format!(r#"{{"videoId":"{id}","title":{{"runs":[{{"text":"t-{id}"}}]}},"lengthText":{{"simpleText":"{length}"}}}}"#)
    }

    #[test]
    fn extracts_record_from_simple_assignment() {
        let html = r#"<script>var X = {"a":[{"videoId":"abc12345678","title":{"runs":[{"text":"Song"}]},"lengthText":{"simpleText":"3:45"}}]};</script>"#;
        let out = ScrapeExtractor::new(flat_profile("X")).extract(html, 1200).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id(), "abc12345678");
        assert_eq!(out[0].duration_secs(), 225);
        assert_eq!(out[0].title(), "Song");
        assert_eq!(out[0].author(), "");
        assert_eq!(out[0].thumbnail(), None);
    }

    #[test]
    fn zero_and_ceiling_durations_are_dropped() {
        let html = format!(
            "var X = {{\"a\":[{},{},{},{}]}};",
            item("zero", "0:00"),
            item("limit", "20:00"),
            item("under", "19:59"),
            item("garbage", "live"),
        );
        let out = ScrapeExtractor::new(flat_profile("X")).extract(&html, 1200).unwrap();
        let ids: Vec<_> = out.iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["under"]);
        assert_eq!(out[0].duration_secs(), 1199);
    }

    #[test]
    fn missing_marker_is_an_error_not_empty() {
        let err = ScrapeExtractor::new(flat_profile("X")).extract("<html>nothing here</html>", 1200).unwrap_err();
        assert_eq!(err, ScrapeError::NoEmbeddedData);
    }

    #[test]
    fn unparsable_literal_is_malformed() {
        let err = ScrapeExtractor::new(flat_profile("X")).extract("var X = {\"a\": [1,;", 1200).unwrap_err();
        assert!(matches!(err, ScrapeError::MalformedEmbeddedData(_)));
    }

    #[test]
    fn missing_terminator_is_malformed() {
        let err = ScrapeExtractor::new(flat_profile("X")).extract("var X = {\"a\": []} </script>", 1200).unwrap_err();
        assert!(matches!(err, ScrapeError::MalformedEmbeddedData(_)));
    }

    #[test]
    fn absent_path_yields_empty_list() {
        let out = ScrapeExtractor::default().extract(r#"var ytInitialData = {"contents":{}};"#, 1200).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn window_assignment_is_recognised() {
        let html = format!(r#"window["X"] = {{"a":[{}]}};"#, item("w", "1:00"));
        let out = ScrapeExtractor::new(flat_profile("X")).extract(&html, 1200).unwrap();
        assert_eq!(out[0].id(), "w");
    }

    #[test]
    fn search_page_layout_keeps_only_video_renderers_in_order() {
        let html = r#"<script nonce="n">var ytInitialData = {"contents":{"twoColumnSearchResultsRenderer":{"primaryContents":{"sectionListRenderer":{"contents":[
            {"itemSectionRenderer":{"contents":[
                {"channelRenderer":{"channelId":"UC1"}},
                {"videoRenderer":{"videoId":"aaaaaaaaaaa","title":{"runs":[{"text":"First"}]},"ownerText":{"runs":[{"text":"Artist"}]},
                    "lengthText":{"simpleText":"1:02:03"},"thumbnail":{"thumbnails":[{"url":"https://i/small.jpg"},{"url":"https://i/big.jpg"}]}}},
                {"reelShelfRenderer":{}},
                {"videoRenderer":{"title":{"runs":[{"text":"No id"}]},"lengthText":{"simpleText":"3:00"}}}
            ]}},
            {"continuationItemRenderer":{}},
            {"itemSectionRenderer":{"contents":[
                {"videoRenderer":{"videoId":"bbbbbbbbbbb","title":{"simpleText":"Second"},"longBylineText":{"runs":[{"text":"Other"}]},"lengthText":{"simpleText":"4:10"}}}
            ]}}
        ]}}}}};</script>"#;
        let out = ScrapeExtractor::default().extract(html, 4000).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].id(), "aaaaaaaaaaa");
        assert_eq!(out[0].author(), "Artist");
        assert_eq!(out[0].duration_secs(), 3723);
        assert_eq!(out[0].thumbnail(), Some("https://i/big.jpg"));
        assert_eq!(out[1].title(), "Second");
        assert_eq!(out[1].author(), "Other");
    }

    #[test]
    fn extraction_is_repeatable() {
        let html = format!("var X = {{\"a\":[{},{}]}};", item("p", "2:00"), item("q", "3:00"));
        let ex = ScrapeExtractor::new(flat_profile("X"));
        assert_eq!(ex.extract(&html, 1200).unwrap(), ex.extract(&html, 1200).unwrap());
    }

    #[test]
    fn duration_shapes() {
        assert_eq!(parse_duration("3:45"), 225);
        assert_eq!(parse_duration("1:00:00"), 3600);
        assert_eq!(parse_duration("45"), 0);
        assert_eq!(parse_duration("1:2:3:4"), 0);
        assert_eq!(parse_duration("a:10"), 0);
        assert_eq!(parse_duration(""), 0);
        assert_eq!(parse_duration("307445734561825861:00"), 0);
        assert_eq!(parse_duration("5124095576030432:00:00"), 0);
    }

    #[test]
    fn overflowing_duration_is_dropped_not_fatal() {
        let html = r#"var X = {"a":[{"videoId":"abc12345678","lengthText":{"simpleText":"307445734561825861:00"}},{"videoId":"def12345678","lengthText":{"simpleText":"2:00"}}]};"#;
        let out = ScrapeExtractor::new(flat_profile("X")).extract(html, 1200).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id(), "def12345678");
    }
}
