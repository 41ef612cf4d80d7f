use std::sync::Arc;

use crate::errors::QaResult;
use crate::vector_db::{Document, SimilaritySearch};

pub struct Retriever {
    store: Arc<dyn SimilaritySearch>,
    top_k: usize,
}

impl Retriever {
    pub fn new(store: Arc<dyn SimilaritySearch>, top_k: usize) -> Self {
        Retriever { store, top_k }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub async fn retrieve(&self, query: &str) -> QaResult<Vec<Document>> {
        self.store.similarity_search(query, self.top_k).await
    }
}
