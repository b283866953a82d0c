//! Core data types produced by the Captionist pipeline.

use serde::{Deserialize, Serialize};

/// The result of captioning one image.
///
/// The hashtags are always derived from the caption stored in the same value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedImage {
    /// File name (or upload name) of the source image
    pub file_name: String,

    /// BLAKE3 hash of the image bytes
    pub content_hash: String,

    /// Image width in pixels
    pub width: u32,

    /// Image height in pixels
    pub height: u32,

    /// Detected format ("jpeg", "png", ...)
    pub format: String,

    /// Size of the image bytes
    pub file_size: u64,

    /// Generated caption
    pub caption: String,

    /// Hashtags ranked by relevance to the caption
    pub hashtags: Vec<Hashtag>,

    /// Per-stage timings
    pub timings: StageTimings,
}

impl ProcessedImage {
    /// Hashtag strings only, in rank order.
    pub fn hashtag_strings(&self) -> Vec<&str> {
        self.hashtags.iter().map(|h| h.tag.as_str()).collect()
    }
}

/// Wall-clock time spent in each stage, in milliseconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageTimings {
    pub decode_ms: u64,
    pub caption_ms: u64,
    pub hashtags_ms: u64,
}

/// A ranked phrase returned by a key-phrase extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyPhrase {
    /// Candidate phrase (one or more words, lowercase)
    pub phrase: String,

    /// Relevance score (cosine similarity for the embedding extractor)
    pub score: f32,
}

impl KeyPhrase {
    pub fn new(phrase: impl Into<String>, score: f32) -> Self {
        Self {
            phrase: phrase.into(),
            score,
        }
    }
}

/// A hashtag derived from a key phrase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hashtag {
    /// The hashtag, e.g. "#windowsill"
    pub tag: String,

    /// The phrase it was built from, e.g. "windowsill"
    pub phrase: String,

    /// Relevance score of the phrase
    pub score: f32,
}

impl Hashtag {
    /// Build a hashtag from a key phrase: strip all whitespace and prefix `#`.
    pub fn from_phrase(phrase: &KeyPhrase) -> Self {
        let compact: String = phrase
            .phrase
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        Self {
            tag: format!("#{compact}"),
            phrase: phrase.phrase.clone(),
            score: phrase.score,
        }
    }
}

/// A caption rewritten in a given tone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RephrasedCaption {
    /// Tone label the caption was rewritten in
    pub tone: String,

    /// Rewritten text
    pub text: String,

    /// Model that produced it
    pub model: String,

    /// Number of tokens used, if reported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u32>,

    /// Round-trip latency in milliseconds
    pub latency_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashtag_from_bigram_removes_space() {
        let tag = Hashtag::from_phrase(&KeyPhrase::new("cat sitting", 0.61));
        assert_eq!(tag.tag, "#catsitting");
        assert_eq!(tag.phrase, "cat sitting");
        assert!((tag.score - 0.61).abs() < f32::EPSILON);
    }

    #[test]
    fn test_hashtag_from_unigram() {
        let tag = Hashtag::from_phrase(&KeyPhrase::new("windowsill", 0.7));
        assert_eq!(tag.tag, "#windowsill");
    }

    #[test]
    fn test_hashtag_removes_all_whitespace_kinds() {
        let tag = Hashtag::from_phrase(&KeyPhrase::new("red\tbarn  door", 0.1));
        assert_eq!(tag.tag, "#redbarndoor");
    }

    #[test]
    fn test_processed_image_serializes_hashtags() {
        let image = ProcessedImage {
            file_name: "cat.jpg".to_string(),
            content_hash: "abc".to_string(),
            width: 10,
            height: 10,
            format: "jpeg".to_string(),
            file_size: 100,
            caption: "a cat on a windowsill".to_string(),
            hashtags: vec![Hashtag::from_phrase(&KeyPhrase::new("cat", 0.8))],
            timings: StageTimings::default(),
        };
        let json = serde_json::to_string(&image).unwrap();
        assert!(json.contains("\"caption\":\"a cat on a windowsill\""));
        assert!(json.contains("\"tag\":\"#cat\""));
        assert_eq!(image.hashtag_strings(), vec!["#cat"]);
    }
}
