//! In-memory gist service for tests

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};
use crate::storage::{GistDocument, GistFile, GistPatch, GistTransport, NewGist};

#[derive(Default)]
struct FakeState {
    documents: BTreeMap<String, GistDocument>,
    calls: Vec<String>,
    failing: bool,
    next_id: u32,
}

/// Shared fake; clones observe the same documents.
#[derive(Clone, Default)]
pub struct FakeGist {
    state: Arc<Mutex<FakeState>>,
}

impl FakeGist {
    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a document holding the given raw file contents
    pub fn seed<'a>(&self, files: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
        let mut state = self.lock();
        state.next_id += 1;
        let id = format!("gist-{}", state.next_id);
        let document = GistDocument {
            id: id.clone(),
            description: Some("seeded".to_string()),
            public: false,
            files: files
                .into_iter()
                .map(|(key, content)| (key.to_string(), GistFile::with_content(content)))
                .collect(),
        };
        state.documents.insert(id.clone(), document);
        id
    }

    pub fn seed_empty(&self) -> String {
        self.seed(Vec::<(&str, &str)>::new())
    }

    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    pub fn document(&self, id: &str) -> Option<GistDocument> {
        self.lock().documents.get(id).cloned()
    }

    pub fn document_count(&self) -> usize {
        self.lock().documents.len()
    }

    pub fn file(&self, id: &str, key: &str) -> Option<String> {
        self.lock()
            .documents
            .get(id)
            .and_then(|document| document.files.get(key))
            .and_then(|file| file.content.clone())
    }

    /// Parsed JSON of one file
    pub fn json(&self, id: &str, key: &str) -> Option<serde_json::Value> {
        self.file(id, key)
            .and_then(|content| serde_json::from_str(&content).ok())
    }

    /// `"<method> <id>"` for every request received, in order
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Number of create and update requests received
    pub fn write_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| !call.starts_with("GET"))
            .count()
    }
}

impl GistTransport for FakeGist {
    async fn fetch(&self, gist_id: &str) -> Result<GistDocument> {
        let mut state = self.lock();
        state.calls.push(format!("GET {gist_id}"));
        if state.failing {
            return Err(Error::Remote("connection refused".to_string()));
        }
        state
            .documents
            .get(gist_id)
            .cloned()
            .ok_or_else(|| Error::Remote("Not Found (404)".to_string()))
    }

    async fn create(&self, gist: &NewGist) -> Result<GistDocument> {
        let mut state = self.lock();
        state.calls.push("POST".to_string());
        if state.failing {
            return Err(Error::Remote("connection refused".to_string()));
        }
        state.next_id += 1;
        let id = format!("gist-{}", state.next_id);
        let document = GistDocument {
            id: id.clone(),
            description: Some(gist.description.clone()),
            public: gist.public,
            files: gist.files.clone(),
        };
        state.documents.insert(id, document.clone());
        Ok(document)
    }

    async fn update(&self, gist_id: &str, patch: &GistPatch) -> Result<GistDocument> {
        let mut state = self.lock();
        state.calls.push(format!("PATCH {gist_id}"));
        if state.failing {
            return Err(Error::Remote("connection refused".to_string()));
        }
        let document = state
            .documents
            .get_mut(gist_id)
            .ok_or_else(|| Error::Remote("Not Found (404)".to_string()))?;
        for (key, file) in &patch.files {
            match file {
                Some(file) => {
                    document.files.insert(key.clone(), file.clone());
                }
                None => {
                    document.files.remove(key);
                }
            }
        }
        Ok(document.clone())
    }
}
