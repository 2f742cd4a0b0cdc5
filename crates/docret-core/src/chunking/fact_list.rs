use crate::models::{Chunk, DocumentInput};

/// Separator-based splitter: one trimmed, non-empty fragment per chunk.
/// No token windowing.
pub struct FactListSplitter {
    separator: String,
}

impl FactListSplitter {
    pub fn new(separator: &str) -> Self {
        Self {
            separator: separator.to_string(),
        }
    }

    fn split_text(&self, text: &str) -> Vec<String> {
        text.split(&self.separator)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect()
    }

    pub fn split(&self, inputs: &[DocumentInput]) -> Vec<Chunk> {
        inputs
            .iter()
            .flat_map(|doc| super::with_offsets(doc, self.split_text(&doc.text)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metadata;

    #[test]
    fn trailing_empty_fragment_is_dropped() {
        let splitter = FactListSplitter::new("###");
        let doc = DocumentInput::new("A###B###", Metadata::new());
        let chunks = splitter.split(&[doc]);
        let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["A", "B"]);
        assert_eq!(chunks[0].offset(), Some(0));
        assert_eq!(chunks[1].offset(), Some(4));
    }

    #[test]
    fn fragments_are_trimmed() {
        let splitter = FactListSplitter::new("\n\n");
        let doc = DocumentInput::new("  first fact  \n\n\n\n second fact ", Metadata::new());
        let chunks = splitter.split(&[doc]);
        let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["first fact", "second fact"]);
    }

    #[test]
    fn document_metadata_is_copied_per_chunk() {
        let splitter = FactListSplitter::new("###");
        let mut meta = Metadata::new();
        meta.insert("p_source".to_string(), "facts.txt".to_string());
        let doc = DocumentInput::new("A###B", meta);
        let chunks = splitter.split(&[doc]);
        assert_eq!(chunks.len(), 2);
        for chunk in &chunks {
            assert_eq!(
                chunk.metadata.get("p_source").map(String::as_str),
                Some("facts.txt")
            );
        }
    }
}
