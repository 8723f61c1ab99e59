//! Prompt assembly for grounded answers.
//!
//! Retrieved chunks are rendered in ranked order into a context block, each
//! tagged with its citation, and substituted with the question into a
//! template containing `{context}` and `{question}` placeholders.

use thiserror::Error;

use crate::models::SearchHit;

/// Default template: answer only from the context, admit ignorance
/// instead of guessing.
pub const DEFAULT_TEMPLATE: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer. \
Only use information from the context.

{context}

Question: {question}
Answer: ";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("prompt template is missing the {0} placeholder")]
pub struct TemplateError(pub &'static str);

/// A validated prompt template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self, TemplateError> {
        let template = template.into();
        for placeholder in ["{context}", "{question}"] {
            if !template.contains(placeholder) {
                return Err(TemplateError(placeholder));
            }
        }
        Ok(Self { template })
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Substitute the rendered context block and the question.
    ///
    /// The context is substituted first so that braces inside the question
    /// are never interpreted.
    pub fn render(&self, hits: &[SearchHit], question: &str) -> String {
        let (head, tail) = self
            .template
            .split_once("{question}")
            .unwrap_or((self.template.as_str(), ""));
        let context = context_block(hits);
        format!(
            "{}{}{}",
            head.replace("{context}", &context),
            question,
            tail.replace("{context}", &context)
        )
    }
}

/// Render retrieved chunks as numbered, source-tagged passages.
pub fn context_block(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| {
            format!(
                "[{}] Source: {}\n{}",
                hit.rank,
                hit.chunk.citation(),
                hit.chunk.text.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chunk, Document, DocumentKind, Segment};

    fn hit(rank: usize, source: &str, text: &str) -> SearchHit {
        let doc = Document::new(source, DocumentKind::Text, vec![Segment::new(text)]);
        SearchHit {
            rank,
            score: 1.0,
            chunk: Chunk::new(&doc, 0, text, 0, 0, None),
        }
    }

    #[test]
    fn test_context_block_tags_sources_in_rank_order() {
        let hits = vec![hit(1, "a.txt", "Sky is blue."), hit(2, "b.txt", "Grass is green.")];
        let block = context_block(&hits);
        assert_eq!(
            block,
            "[1] Source: a.txt\nSky is blue.\n\n[2] Source: b.txt\nGrass is green."
        );
    }

    #[test]
    fn test_default_render() {
        let hits = vec![hit(1, "sky.txt", "The sky is blue.")];
        let prompt = PromptTemplate::default().render(&hits, "What color is the sky?");
        assert!(prompt.contains("don't know"));
        assert!(prompt.contains("[1] Source: sky.txt\nThe sky is blue."));
        assert!(prompt.ends_with("Question: What color is the sky?\nAnswer: "));
    }

    #[test]
    fn test_question_braces_are_literal() {
        let template = PromptTemplate::new("Q: {question}\nC: {context}").unwrap();
        let prompt = template.render(&[hit(1, "a.txt", "ctx")], "what is {context}?");
        assert!(prompt.starts_with("Q: what is {context}?\nC: [1] Source: a.txt"));
    }

    #[test]
    fn test_template_requires_placeholders() {
        assert_eq!(
            PromptTemplate::new("only {question}"),
            Err(TemplateError("{context}"))
        );
        assert_eq!(
            PromptTemplate::new("only {context}"),
            Err(TemplateError("{question}"))
        );
    }
}
