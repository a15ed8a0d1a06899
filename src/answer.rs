//! Grounded question answering over the document index.

use std::fmt::Write;
use std::sync::Arc;

use crate::error::{EngineError, Result};
use crate::llm::prompt::{sanitize_for_prompt, truncate_to_char_boundary};
use crate::llm::GenerationProvider;
use crate::models::{Answer, DocumentHit};
use crate::search::DocumentIndex;
use crate::upstream::RetryPolicy;

/// Longest question accepted into a prompt, in bytes.
pub const MAX_QUESTION_LEN: usize = 2_000;

/// Longest excerpt of a single document placed into a prompt, in bytes.
const MAX_EXCERPT_LEN: usize = 1_500;

#[derive(Debug, Clone, Copy)]
pub struct AnswerOptions {
    /// Documents retrieved per question.
    pub context_docs: usize,
    /// Retrieved documents scoring below this are not used as context.
    pub min_similarity: f32,
}

impl Default for AnswerOptions {
    fn default() -> Self {
        Self {
            context_docs: 4,
            min_similarity: 0.35,
        }
    }
}

pub struct QueryOrchestrator {
    index: Arc<DocumentIndex>,
    generator: Arc<dyn GenerationProvider>,
    retry: RetryPolicy,
    options: AnswerOptions,
}

impl QueryOrchestrator {
    pub fn new(
        index: Arc<DocumentIndex>,
        generator: Arc<dyn GenerationProvider>,
        retry: RetryPolicy,
        options: AnswerOptions,
    ) -> Self {
        Self {
            index,
            generator,
            retry,
            options,
        }
    }

    /// Answer `question` from retrieved documents, or report that none were
    /// relevant enough. The generation provider is not called in that case.
    pub async fn answer(&self, question: &str) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(EngineError::invalid("question text is required"));
        }
        let question = truncate_to_char_boundary(question, MAX_QUESTION_LEN);

        let mut citations = self
            .index
            .search(&question, self.options.context_docs)
            .await?;
        citations.retain(|hit| hit.score >= self.options.min_similarity);
        if citations.is_empty() {
            tracing::info!("No document above {} similarity; not generating", self.options.min_similarity);
            return Ok(Answer::InsufficientContext);
        }

        let prompt = build_prompt(&question, &citations);
        let answer = self
            .retry
            .run("generate answer", || self.generator.generate(&prompt))
            .await?;

        Ok(Answer::Grounded { answer, citations })
    }
}

fn build_system_prompt() -> &'static str {
    "You are a campus assistant for students and visitors.\n\
     Answer ONLY from the documents provided below. Never use outside knowledge.\n\
     If the documents do not contain the answer, say what they do cover and what is missing.\n\
     Mention the document title when you rely on it. Keep answers short."
}

fn build_context_block(hits: &[DocumentHit]) -> String {
    let mut ctx = String::from("Here are the relevant campus documents:\n\n");
    for hit in hits {
        let title = sanitize_for_prompt(&hit.title);
        let source = sanitize_for_prompt(&hit.source);
        let content = sanitize_for_prompt(&truncate_to_char_boundary(&hit.content, MAX_EXCERPT_LEN));
        let _ = write!(ctx, "--- {} ({}) ---\n{}\n\n", title, source, content);
    }
    ctx
}

pub(crate) fn build_prompt(question: &str, hits: &[DocumentHit]) -> String {
    format!(
        "{}\n\n{}---\nQuestion: {}",
        build_system_prompt(),
        build_context_block(hits),
        sanitize_for_prompt(question)
    )
}
