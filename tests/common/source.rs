use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use commoncrawl_harvester::index_source::{AcquisitionError, IndexSource};

/// In-memory index source: every file is staged from a string on fetch.
pub struct StaticIndexSource {
    staging: PathBuf,
    collections: Vec<(String, Vec<(String, String)>)>,
    fetched: Mutex<Vec<String>>,
}

impl StaticIndexSource {
    pub fn new(staging: PathBuf) -> Self {
        Self {
            staging,
            collections: Vec::new(),
            fetched: Mutex::new(Vec::new()),
        }
    }

    /// Adds a collection whose files have the given contents.
    pub fn with_collection(mut self, id: &str, files: &[(&str, String)]) -> Self {
        self.collections.push((
            id.to_string(),
            files
                .iter()
                .map(|(name, content)| (name.to_string(), content.clone()))
                .collect(),
        ));
        self
    }

    /// `<collection>/<file>` for every fetch so far, in order.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl IndexSource for StaticIndexSource {
    async fn list_collections(&self) -> Result<Vec<String>, AcquisitionError> {
        Ok(self.collections.iter().map(|(id, _)| id.clone()).collect())
    }

    async fn list_index_files(&self, collection: &str) -> Result<Vec<String>, AcquisitionError> {
        Ok(self
            .collections
            .iter()
            .find(|(id, _)| id == collection)
            .map(|(_, files)| files.iter().map(|(name, _)| name.clone()).collect())
            .unwrap_or_default())
    }

    async fn fetch_index(
        &self,
        collection: &str,
        file: &str,
    ) -> Result<PathBuf, AcquisitionError> {
        self.fetched
            .lock()
            .unwrap()
            .push(format!("{}/{}", collection, file));

        let content = self
            .collections
            .iter()
            .find(|(id, _)| id == collection)
            .and_then(|(_, files)| files.iter().find(|(name, _)| name == file))
            .map(|(_, content)| content.clone())
            .unwrap_or_default();

        std::fs::create_dir_all(&self.staging).unwrap();
        let path = self.staging.join(file.trim_end_matches(".gz"));
        std::fs::write(&path, content).unwrap();
        Ok(path)
    }
}
