use serde::Deserialize;
use thiserror::Error;

/// Status value of a successful capture.
pub const STATUS_OK: &str = "200";

/// One decoded capture entry.
///
/// CDX-JSON lines look like `<surt> <timestamp> {json}`; only the JSON part is
/// decoded. Missing fields decode as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IndexRecord {
    pub url: String,
    pub mime: String,
    #[serde(rename = "mime-detected")]
    pub mime_detected: String,
    pub status: String,
    pub digest: String,
    pub length: String,
    pub offset: String,
    pub filename: String,
    pub charset: String,
    pub languages: String,
}

#[derive(Debug, Error)]
pub enum LineError {
    #[error("line has no JSON object")]
    NoObject,

    #[error("invalid record: {0}")]
    Decode(#[from] serde_json::Error),
}

impl IndexRecord {
    pub fn is_ok_status(&self) -> bool {
        self.status == STATUS_OK
    }

    /// True when the record carries no language tag or exactly `target`.
    pub fn matches_language(&self, target: &str) -> bool {
        self.languages.is_empty() || self.languages == target
    }
}

/// Decodes the JSON object starting at the first `{` of `line`.
pub fn parse_line(line: &[u8]) -> Result<IndexRecord, LineError> {
    let start = line
        .iter()
        .position(|b| *b == b'{')
        .ok_or(LineError::NoObject)?;
    Ok(serde_json::from_slice(&line[start..])?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"edu,example,lab)/papers/report 20240301120000 {"url": "https://lab.example.edu/papers/report", "mime": "application/pdf", "mime-detected": "application/pdf", "status": "200", "digest": "ABCDEF", "length": "12345", "offset": "678", "filename": "crawl-data/CC-MAIN-2024-10/segments/x.warc.gz", "languages": "eng"}"#;

    #[test]
    fn test_parse_cdx_line() {
        let record = parse_line(SAMPLE.as_bytes()).unwrap();
        assert_eq!(record.url, "https://lab.example.edu/papers/report");
        assert_eq!(record.mime_detected, "application/pdf");
        assert!(record.is_ok_status());
        assert_eq!(record.languages, "eng");
        assert_eq!(record.charset, "");
    }

    #[test]
    fn test_line_without_object() {
        assert!(matches!(
            parse_line(b"com,example)/ 20240301120000 nothing here"),
            Err(LineError::NoObject)
        ));
        assert!(matches!(parse_line(b""), Err(LineError::NoObject)));
    }

    #[test]
    fn test_line_with_broken_json() {
        assert!(matches!(
            parse_line(br#"com,example)/ 2024 {"url": "https://example.com/"#),
            Err(LineError::Decode(_))
        ));
        // Field of the wrong type
        assert!(matches!(
            parse_line(br#"x 1 {"status": 200}"#),
            Err(LineError::Decode(_))
        ));
    }

    #[test]
    fn test_language_filter() {
        let mut record = IndexRecord::default();
        assert!(record.matches_language("eng"));
        record.languages = "eng".to_string();
        assert!(record.matches_language("eng"));
        record.languages = "eng,fra".to_string();
        assert!(!record.matches_language("eng"));
        record.languages = "deu".to_string();
        assert!(!record.matches_language("eng"));
    }
}
