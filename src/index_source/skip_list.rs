use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

/// Collections already processed on earlier runs, one id per line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipList {
    entries: HashSet<String>,
}

fn normalize(id: &str) -> &str {
    id.trim().trim_end_matches('/')
}

impl SkipList {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|e| normalize(e.as_ref()).to_string())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    /// Reads the list at `path`. A missing file is an empty list.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No skip list at {}, processing every collection", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read skip list {}", path.display()))?;
        let list = Self::new(content.lines());
        info!("Loaded {} skipped collections from {}", list.len(), path.display());
        Ok(list)
    }

    /// Trailing slashes are ignored on both sides.
    pub fn contains(&self, collection: &str) -> bool {
        self.entries.contains(normalize(collection))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
