//! Content-type tables: per-type byte budgets, canonical extensions and the
//! producer-owned set of types that are still under budget.

use std::collections::HashMap;

pub const IMAGE_JPEG: &str = "image/jpeg";
pub const IMAGE_JPG: &str = "image/jpg";
pub const IMAGE_PNG: &str = "image/png";
pub const APPLICATION_PDF: &str = "application/pdf";
pub const VIDEO_MP4: &str = "video/mp4";
pub const TEXT_CSV: &str = "text/csv";
pub const DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const PPTX: &str = "application/vnd.openxmlformats-officedocument.presentationml.presentation";

/// Content types harvested when the configuration doesn't name any.
pub const DEFAULT_ALLOWED_MIMES: &[&str] = &[
    IMAGE_PNG,
    IMAGE_JPEG,
    APPLICATION_PDF,
    VIDEO_MP4,
    DOCX,
    XLSX,
    PPTX,
];

/// Returns true for `image/*` types, which go through moderation.
pub fn is_image(mime: &str) -> bool {
    mime.starts_with("image/")
}

/// Maximum cumulative megabytes per content type for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentTypeLimits {
    limits: HashMap<String, f64>,
}

impl ContentTypeLimits {
    pub fn new(limits: HashMap<String, f64>) -> Self {
        Self { limits }
    }

    /// Limit for `mime` in megabytes. Unknown types have no budget at all.
    pub fn limit_mb(&self, mime: &str) -> f64 {
        self.limits.get(mime).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, mime: &str) -> bool {
        self.limits.contains_key(mime)
    }

    /// Overrides (or adds) limits from another table.
    pub fn merge(&mut self, overrides: HashMap<String, f64>) {
        self.limits.extend(overrides);
    }
}

impl Default for ContentTypeLimits {
    fn default() -> Self {
        let limits = [
            (IMAGE_JPEG, 10.0),
            // Nothing is detected as image/jpg in practice, image/jpeg is used instead
            (IMAGE_JPG, 0.0),
            (IMAGE_PNG, 10.0),
            (APPLICATION_PDF, 1.0),
            (VIDEO_MP4, 0.0),
            (DOCX, 10.0),
            (XLSX, 1.0),
            (PPTX, 1.0),
        ];
        Self::new(
            limits
                .into_iter()
                .map(|(mime, mb)| (mime.to_string(), mb))
                .collect(),
        )
    }
}

/// Canonical file extension (without the leading dot) per content type.
#[derive(Debug, Clone, PartialEq)]
pub struct MimeExtensionMap {
    extensions: HashMap<String, String>,
}

impl MimeExtensionMap {
    pub fn new(extensions: HashMap<String, String>) -> Self {
        Self { extensions }
    }

    pub fn extension_for(&self, mime: &str) -> Option<&str> {
        self.extensions.get(mime).map(String::as_str)
    }

    pub fn merge(&mut self, overrides: HashMap<String, String>) {
        self.extensions.extend(
            overrides
                .into_iter()
                .map(|(mime, ext)| (mime, ext.trim_start_matches('.').to_string())),
        );
    }
}

impl Default for MimeExtensionMap {
    fn default() -> Self {
        let extensions = [
            (IMAGE_JPEG, "jpeg"),
            (IMAGE_JPG, "jpg"),
            (IMAGE_PNG, "png"),
            (APPLICATION_PDF, "pdf"),
            (VIDEO_MP4, "mp4"),
            (TEXT_CSV, "csv"),
            (DOCX, "docx"),
            (XLSX, "xlsx"),
            (PPTX, "pptx"),
        ];
        Self::new(
            extensions
                .into_iter()
                .map(|(mime, ext)| (mime.to_string(), ext.to_string()))
                .collect(),
        )
    }
}

/// Ordered allow-list of content types that are still under budget.
///
/// Owned by the single producer; never shared with workers, so it needs no
/// locking. Iteration order is the configured order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveMimeSet {
    mimes: Vec<String>,
}

impl ActiveMimeSet {
    pub fn new<I, S>(mimes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::default();
        for mime in mimes {
            let mime = mime.into();
            if !set.contains(&mime) {
                set.mimes.push(mime);
            }
        }
        set
    }

    pub fn contains(&self, mime: &str) -> bool {
        self.mimes.iter().any(|m| m == mime)
    }

    /// Removes `mime`, returning whether it was present.
    pub fn remove(&mut self, mime: &str) -> bool {
        match self.mimes.iter().position(|m| m == mime) {
            Some(index) => {
                self.mimes.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.mimes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mimes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.mimes.iter().map(String::as_str)
    }

    /// Owned copy of the current order, for iterating while pruning.
    pub fn snapshot(&self) -> Vec<String> {
        self.mimes.clone()
    }
}
