//! Output file naming.

use std::path::Path;

use url::Url;

use crate::mime::MimeExtensionMap;

/// Name used when the URL path ends with a slash.
const FALLBACK_STEM: &str = "index";

/// Last path segment of `raw`, without query or fragment.
fn last_segment(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(url) => url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default()
            .to_string(),
        Err(_) => raw.rsplit('/').next().unwrap_or_default().to_string(),
    }
}

/// Derives the on-disk file name for a download.
///
/// The extension of the last URL segment is replaced by the canonical one
/// for `mime`, or appended if there is none. Types without a canonical
/// extension keep the segment as is.
pub fn derive_filename(url: &str, mime: &str, extensions: &MimeExtensionMap) -> String {
    let segment = last_segment(url);
    let segment = if segment.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        segment
    };

    let Some(canonical) = extensions.extension_for(mime) else {
        return segment;
    };

    let path = Path::new(&segment);
    let stem = match path.extension() {
        Some(_) => path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| segment.clone()),
        None => segment.clone(),
    };
    format!("{stem}.{canonical}")
}
