use crate::models::{Chunk, DocumentInput};

const FAQ_SEPARATOR: &str = "#### FAQ ####";
const QUESTION_PREFIX: &str = "\"question\":";
const ANSWER_PREFIX: &str = "\"answer\":";

/// FAQ-block splitter: one chunk per `#### FAQ ####` block, reformatted as
/// a question header line followed by the answer body. Lines matching
/// neither prefix are dropped, and so are blocks that end up empty.
pub struct FaqSplitter;

impl FaqSplitter {
    pub fn new() -> Self {
        Self
    }

    fn format_item(block: &str) -> String {
        let mut result = Vec::new();
        for line in block.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(rest) = line.strip_prefix(QUESTION_PREFIX) {
                result.push(format!("<h1>{}</h1>", rest.trim().trim_matches('"')));
                continue;
            }
            if let Some(rest) = line.strip_prefix(ANSWER_PREFIX) {
                result.push(rest.trim().trim_matches('"').to_string());
            }
        }
        result.join("\n")
    }

    fn split_text(&self, text: &str) -> Vec<String> {
        text.split(FAQ_SEPARATOR)
            .filter(|block| !block.trim().is_empty())
            .map(Self::format_item)
            .filter(|item| !item.trim().is_empty())
            .collect()
    }

    pub fn split(&self, inputs: &[DocumentInput]) -> Vec<Chunk> {
        inputs
            .iter()
            .flat_map(|doc| super::with_offsets(doc, self.split_text(&doc.text)))
            .collect()
    }
}

impl Default for FaqSplitter {
    fn default() -> Self {
        Self::new()
    }
}
