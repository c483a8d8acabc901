//! Node id generation.
//!
//! Ids are document-scoped and sequential: a CRC32 seed derived from the
//! document name plus a counter, `"{seed}-{n}"`. Deterministic per document,
//! unique within it, and stable across the document's lifetime.

use crc32fast::Hasher;

/// Derive the id seed for a document from its name.
pub fn document_seed(name: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(name.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Sequential id generator for nodes within one document.
#[derive(Debug, Clone)]
pub struct NodeIdGenerator {
    seed: String,
    count: u32,
}

impl NodeIdGenerator {
    pub fn new(document_name: &str) -> Self {
        Self {
            seed: document_seed(document_name),
            count: 0,
        }
    }

    pub fn from_seed(seed: String) -> Self {
        Self { seed, count: 0 }
    }

    /// Generate the next sequential id.
    pub fn next_id(&mut self) -> String {
        self.count += 1;
        format!("{}-{}", self.seed, self.count)
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_is_deterministic() {
        assert_eq!(document_seed("article"), document_seed("article"));
        assert_ne!(document_seed("article"), document_seed("letter"));
    }

    #[test]
    fn test_ids_are_sequential_and_unique() {
        let mut ids = NodeIdGenerator::new("article");
        let a = ids.next_id();
        let b = ids.next_id();
        assert_ne!(a, b);
        assert!(a.ends_with("-1"));
        assert!(b.ends_with("-2"));
    }
}
