//! Identifier registry for collection items

use std::collections::HashSet;

use thiserror::Error;
use uuid::Uuid;

/// Raised when an item is created with an identifier that is already taken
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Identifier '{id}' already exists")]
pub struct DuplicateIdentifierError {
    pub id: String,
}

/// Tracks the identifiers currently present in a collection
///
/// Suggested identifiers are used verbatim; a suggestion that collides is an
/// error rather than something to mangle into a fresh id.
#[derive(Debug, Default)]
pub struct IdManager {
    ids: HashSet<String>,
}

impl IdManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether `id` is taken
    pub fn has_id(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Accept `suggestion` as a new identifier
    pub fn generate_id(&self, suggestion: &str) -> Result<String, DuplicateIdentifierError> {
        if self.has_id(suggestion) {
            return Err(DuplicateIdentifierError {
                id: suggestion.to_string(),
            });
        }
        Ok(suggestion.to_string())
    }

    /// Generate a fresh random identifier
    pub fn generate_unique(&self) -> String {
        loop {
            let id = Uuid::new_v4().to_string();
            if !self.has_id(&id) {
                return id;
            }
        }
    }

    pub(crate) fn register(&mut self, id: impl Into<String>) {
        self.ids.insert(id.into());
    }

    pub(crate) fn release(&mut self, id: &str) {
        self.ids.remove(id);
    }

    pub(crate) fn clear(&mut self) {
        self.ids.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggestion_returned_unchanged() {
        let ids = IdManager::new();
        assert_eq!(ids.generate_id("Front Door").unwrap(), "Front Door");
        // Generating does not reserve
        assert!(!ids.has_id("Front Door"));
    }

    #[test]
    fn test_duplicate_suggestion_fails() {
        let mut ids = IdManager::new();
        ids.register("abc");

        let err = ids.generate_id("abc").unwrap_err();
        assert_eq!(err.id, "abc");
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_release_frees_id() {
        let mut ids = IdManager::new();
        ids.register("abc");
        ids.release("abc");

        assert!(!ids.has_id("abc"));
        assert!(ids.generate_id("abc").is_ok());
    }

    #[test]
    fn test_generate_unique_is_uuid() {
        let ids = IdManager::new();
        let id = ids.generate_unique();
        assert!(Uuid::parse_str(&id).is_ok());
        assert_ne!(id, ids.generate_unique());
    }
}
