//! Result records and their JSON / JSON Lines serialization.

use serde::{Deserialize, Serialize};
use std::io::{self, Write};

use crate::types::{Hashtag, ProcessedImage, RephrasedCaption};

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// One JSON array of records
    Json,
    /// One JSON record per line
    JsonLines,
}

impl OutputFormat {
    /// Parse format from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "jsonl" | "jsonlines" | "ndjson" => Some(Self::JsonLines),
            _ => None,
        }
    }
}

/// Everything produced for one input image.
///
/// A failed rephrase is reported next to the caption rather than replacing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionRecord {
    #[serde(flatten)]
    pub image: ProcessedImage,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rephrased: Option<RephrasedCaption>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rephrase_error: Option<String>,
}

impl CaptionRecord {
    pub fn new(image: ProcessedImage) -> Self {
        Self {
            image,
            rephrased: None,
            rephrase_error: None,
        }
    }
}

/// Hashtags as one space-separated line, e.g. `#cat #windowsill`.
pub fn hashtag_line(hashtags: &[Hashtag]) -> String {
    hashtags
        .iter()
        .map(|h| h.tag.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Writes records as JSON or JSON Lines.
///
/// JSON output is buffered until [`finish`](Self::finish) so the whole run
/// forms one array; JSON Lines output is written as records arrive.
pub struct OutputWriter<W: Write> {
    writer: W,
    format: OutputFormat,
    pretty: bool,
    pending: Vec<CaptionRecord>,
    records_written: usize,
}

impl<W: Write> OutputWriter<W> {
    pub fn new(writer: W, format: OutputFormat, pretty: bool) -> Self {
        Self {
            writer,
            format,
            pretty,
            pending: Vec::new(),
            records_written: 0,
        }
    }

    /// Add one record.
    pub fn write(&mut self, record: CaptionRecord) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => self.pending.push(record),
            OutputFormat::JsonLines => {
                serde_json::to_writer(&mut self.writer, &record).map_err(io::Error::other)?;
                writeln!(self.writer)?;
                self.writer.flush()?;
            }
        }
        self.records_written += 1;
        Ok(())
    }

    /// Number of records accepted so far.
    pub fn records_written(&self) -> usize {
        self.records_written
    }

    /// Emit any buffered records and flush.
    ///
    /// A single JSON record is written as an object, several as an array.
    pub fn finish(mut self) -> io::Result<W> {
        if self.format == OutputFormat::Json && !self.pending.is_empty() {
            let pending = std::mem::take(&mut self.pending);
            let result = match (pending.len(), self.pretty) {
                (1, true) => serde_json::to_writer_pretty(&mut self.writer, &pending[0]),
                (1, false) => serde_json::to_writer(&mut self.writer, &pending[0]),
                (_, true) => serde_json::to_writer_pretty(&mut self.writer, &pending),
                (_, false) => serde_json::to_writer(&mut self.writer, &pending),
            };
            result.map_err(io::Error::other)?;
            writeln!(self.writer)?;
        }
        self.writer.flush()?;
        Ok(self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{KeyPhrase, StageTimings};

    fn record(name: &str) -> CaptionRecord {
        CaptionRecord::new(ProcessedImage {
            file_name: name.to_string(),
            content_hash: "abc".to_string(),
            width: 4,
            height: 4,
            format: "png".to_string(),
            file_size: 10,
            caption: "a cat on a windowsill".to_string(),
            hashtags: vec![
                Hashtag::from_phrase(&KeyPhrase::new("windowsill", 0.7)),
                Hashtag::from_phrase(&KeyPhrase::new("cat", 0.6)),
            ],
            timings: StageTimings::default(),
        })
    }

    #[test]
    fn test_single_json_record_is_object() {
        let mut writer = OutputWriter::new(Vec::new(), OutputFormat::Json, false);
        writer.write(record("a.png")).unwrap();
        let output = String::from_utf8(writer.finish().unwrap()).unwrap();
        assert!(output.starts_with('{'));
        assert!(output.contains("\"file_name\":\"a.png\""));
        assert!(!output.contains("rephrase_error"));
    }

    #[test]
    fn test_multiple_json_records_form_array() {
        let mut writer = OutputWriter::new(Vec::new(), OutputFormat::Json, true);
        writer.write(record("a.png")).unwrap();
        writer.write(record("b.png")).unwrap();
        assert_eq!(writer.records_written(), 2);
        let output = String::from_utf8(writer.finish().unwrap()).unwrap();
        let parsed: Vec<CaptionRecord> = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].image.file_name, "b.png");
    }

    #[test]
    fn test_jsonl_one_line_per_record() {
        let mut writer = OutputWriter::new(Vec::new(), OutputFormat::JsonLines, true);
        writer.write(record("a.png")).unwrap();
        let mut failed = record("b.png");
        failed.rephrase_error = Some("LLM error: HTTP 503".to_string());
        writer.write(failed).unwrap();

        let output = String::from_utf8(writer.finish().unwrap()).unwrap();
        let lines: Vec<&str> = output.trim().split('\n').collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("\"rephrase_error\":\"LLM error: HTTP 503\""));
        assert!(lines[1].contains("\"caption\":\"a cat on a windowsill\""));
    }

    #[test]
    fn test_hashtag_line() {
        assert_eq!(hashtag_line(&record("a.png").image.hashtags), "#windowsill #cat");
        assert_eq!(hashtag_line(&[]), "");
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(OutputFormat::parse("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("JSONL"), Some(OutputFormat::JsonLines));
        assert_eq!(OutputFormat::parse("csv"), None);
    }
}
