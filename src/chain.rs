use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;

use crate::errors::{QaError, QaResult};
use crate::llm::ChatModel;
use crate::retriever::Retriever;
use crate::vector_db::Document;

lazy_static! {
    static ref SOURCES_MARKER: Regex = Regex::new(r"(?i)SOURCES?:").unwrap();
}

/// What one chain invocation produces.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<String>,
}

/// Retrieval QA with sources: every retrieved chunk is stuffed into a
/// single prompt and the model is asked to cite the chunks it used.
pub struct QaChain {
    retriever: Retriever,
    llm: Arc<dyn ChatModel>,
    max_context_chars: Option<usize>,
}

impl QaChain {
    pub fn new(
        retriever: Retriever,
        llm: Arc<dyn ChatModel>,
        max_context_chars: Option<usize>,
    ) -> Self {
        QaChain {
            retriever,
            llm,
            max_context_chars,
        }
    }

    pub async fn call(&self, question: &str) -> QaResult<Answer> {
        if question.trim().is_empty() {
            return Err(QaError::EmptyQuestion);
        }

        let mut documents = self.retriever.retrieve(question).await?;
        if let Some(limit) = self.max_context_chars {
            reduce_below_limit(&mut documents, limit);
        }
        tracing::debug!(
            "Stuffing {} of at most {} chunks into the prompt",
            documents.len(),
            self.retriever.top_k()
        );
        for doc in &documents {
            tracing::debug!("  chunk {} score {:.4} from {}", doc.id, doc.score, doc.source);
        }

        let prompt = construct_prompt(question, &documents);
        let output = self.llm.complete(&prompt).await?;
        Ok(parse_output(&output))
    }
}

/// Drops trailing chunks until the combined chunk text fits `limit`,
/// keeping at least one.
fn reduce_below_limit(documents: &mut Vec<Document>, limit: usize) {
    let mut total: usize = documents.iter().map(|d| d.content.chars().count()).sum();
    while total > limit && documents.len() > 1 {
        if let Some(dropped) = documents.pop() {
            total -= dropped.content.chars().count();
        }
    }
}

fn construct_prompt(question: &str, documents: &[Document]) -> String {
    let summaries = documents
        .iter()
        .map(|doc| format!("Content: {}\nSource: {}", doc.content, doc.source))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Given the following extracted parts of a long document and a question, \
         create a final answer with references (\"SOURCES\").\n\
         If you don't know the answer, just say that you don't know. \
         Don't try to make up an answer.\n\
         ALWAYS return a \"SOURCES\" part in your answer.\n\n\
         QUESTION: {question}\n\
         =========\n\
         {summaries}\n\
         =========\n\
         FINAL ANSWER:"
    )
}

fn parse_output(output: &str) -> Answer {
    match SOURCES_MARKER.find(output) {
        Some(m) => {
            let answer = output[..m.start()].trim().to_string();
            let sources = output[m.end()..]
                .lines()
                .next()
                .unwrap_or("")
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            Answer { answer, sources }
        }
        None => Answer {
            answer: output.trim().to_string(),
            sources: Vec::new(),
        },
    }
}
