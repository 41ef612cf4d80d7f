use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::cache::HandleCache;
use crate::chain::{Answer, QaChain};
use crate::config::{RetrievalSettings, Settings};
use crate::embeddings::OpenAiEmbeddings;
use crate::errors::{QaError, QaResult};
use crate::llm::{ChatModel, ChatOpenAi, LLMConfig};
use crate::retriever::Retriever;
use crate::utils::key_fingerprint;
use crate::vector_db::{Neo4jVector, SimilaritySearch};

/// Builds the external clients for one API key.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect_store(&self, api_key: &str) -> QaResult<Arc<dyn SimilaritySearch>>;

    fn chat_model(&self, api_key: &str) -> QaResult<Arc<dyn ChatModel>>;
}

/// Neo4j vector index + OpenAI embeddings and chat.
pub struct Neo4jOpenAiConnector {
    settings: Settings,
}

impl Neo4jOpenAiConnector {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Connector for Neo4jOpenAiConnector {
    async fn connect_store(&self, api_key: &str) -> QaResult<Arc<dyn SimilaritySearch>> {
        let openai = &self.settings.openai;
        let embedder = OpenAiEmbeddings::new(&openai.api_base, api_key, &openai.embedding_model)?;
        let store = Neo4jVector::from_existing_index(
            &self.settings.neo4j,
            self.settings.index.clone(),
            Arc::new(embedder),
        )
        .await?;
        Ok(Arc::new(store))
    }

    fn chat_model(&self, api_key: &str) -> QaResult<Arc<dyn ChatModel>> {
        let config = LLMConfig {
            model: self.settings.openai.chat_model.clone(),
            ..LLMConfig::default()
        };
        Ok(Arc::new(ChatOpenAi::new(
            &self.settings.openai.api_base,
            api_key,
            config,
        )?))
    }
}

/// A constructed vector store together with its cache identity.
pub struct StoreHandle {
    id: Uuid,
    store: Arc<dyn SimilaritySearch>,
}

impl StoreHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

/// The three operations behind the page, with process-wide memoization of
/// the two constructors.
pub struct QaService {
    connector: Arc<dyn Connector>,
    retrieval: RetrievalSettings,
    stores: HandleCache<String, Arc<StoreHandle>>,
    chains: HandleCache<(Uuid, String), Arc<QaChain>>,
}

impl QaService {
    pub fn new(connector: Arc<dyn Connector>, retrieval: RetrievalSettings) -> Self {
        QaService {
            connector,
            retrieval,
            stores: HandleCache::new(),
            chains: HandleCache::new(),
        }
    }

    pub async fn initialize_vector_store(&self, api_key: &str) -> QaResult<Arc<StoreHandle>> {
        self.stores
            .get_or_try_init(&api_key.to_string(), || async move {
                tracing::info!(
                    "Initializing vector store for key {}",
                    key_fingerprint(api_key)
                );
                let store = self.connector.connect_store(api_key).await?;
                Ok::<_, QaError>(Arc::new(StoreHandle {
                    id: Uuid::new_v4(),
                    store,
                }))
            })
            .await
    }

    pub async fn initialize_qa_chain(
        &self,
        handle: &Arc<StoreHandle>,
        api_key: &str,
    ) -> QaResult<Arc<QaChain>> {
        let key = (handle.id, api_key.to_string());
        self.chains
            .get_or_try_init(&key, || async move {
                tracing::info!("Initializing QA chain for store {}", handle.id());
                let llm = self.connector.chat_model(api_key)?;
                let retriever = Retriever::new(handle.store.clone(), self.retrieval.top_k);
                Ok::<_, QaError>(Arc::new(QaChain::new(
                    retriever,
                    llm,
                    self.retrieval.max_context_chars,
                )))
            })
            .await
    }

    pub async fn get_answer(&self, question: &str, chain: &QaChain) -> QaResult<Answer> {
        let answer = chain.call(question).await?;
        tracing::info!(
            "Answered question ({} chars) citing {} sources",
            question.chars().count(),
            answer.sources.len()
        );
        Ok(answer)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeConnector;
    use super::*;

    fn service(connector: &Arc<FakeConnector>) -> QaService {
        QaService::new(connector.clone(), RetrievalSettings::default())
    }

    #[tokio::test]
    async fn test_store_is_memoized_per_key() {
        let connector = Arc::new(FakeConnector::new(Vec::new()));
        let service = service(&connector);

        let first = service.initialize_vector_store("sk-one").await.unwrap();
        let again = service.initialize_vector_store("sk-one").await.unwrap();
        let other = service.initialize_vector_store("sk-two").await.unwrap();

        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_ne!(first.id(), other.id());
        assert_eq!(connector.store_calls(), 2);
    }

    #[tokio::test]
    async fn test_chain_is_memoized_per_store_and_key() {
        let connector = Arc::new(FakeConnector::new(Vec::new()));
        let service = service(&connector);

        let store = service.initialize_vector_store("sk-one").await.unwrap();
        let first = service.initialize_qa_chain(&store, "sk-one").await.unwrap();
        let again = service.initialize_qa_chain(&store, "sk-one").await.unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(connector.chat_calls(), 1);

        let other_store = service.initialize_vector_store("sk-two").await.unwrap();
        let other = service.initialize_qa_chain(&other_store, "sk-two").await.unwrap();
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(connector.chat_calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_store_is_retried() {
        let connector = Arc::new(FakeConnector::failing_store("connection refused"));
        let service = service(&connector);

        let err = service.initialize_vector_store("sk-one").await.err().unwrap();
        assert!(err.to_string().contains("connection refused"));
        assert!(service.initialize_vector_store("sk-one").await.is_err());
        assert_eq!(connector.store_calls(), 2);
    }

    #[tokio::test]
    async fn test_get_answer_returns_text_and_sources() {
        let connector = Arc::new(FakeConnector::new(vec![Ok(
            "Streaming entertainment.\nSOURCES: https://www.sec.gov/nflx-0".to_string(),
        )]));
        let service = service(&connector);

        let store = service.initialize_vector_store("sk-one").await.unwrap();
        let chain = service.initialize_qa_chain(&store, "sk-one").await.unwrap();
        let answer = service
            .get_answer("What is Netflix's primary business?", &chain)
            .await
            .unwrap();
        assert_eq!(answer.answer, "Streaming entertainment.");
        assert_eq!(answer.sources, vec!["https://www.sec.gov/nflx-0"]);
    }
}
