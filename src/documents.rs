//! In-memory store of open document texts, keyed by URI.

use dashmap::DashMap;

/// Latest full text of every open document. Sync is full-document only, so
/// each update replaces the stored text wholesale.
#[derive(Debug, Default)]
pub struct DocumentStore {
    docs: DashMap<String, String>,
}

impl DocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the text for a URI.
    pub fn update(&self, uri: impl Into<String>, text: impl Into<String>) {
        self.docs.insert(uri.into(), text.into());
    }

    /// Current text for a URI, if the document is open.
    #[must_use]
    pub fn get(&self, uri: &str) -> Option<String> {
        self.docs.get(uri).map(|entry| entry.clone())
    }

    /// Drop a closed document.
    pub fn remove(&self, uri: &str) {
        self.docs.remove(uri);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}
