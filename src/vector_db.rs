use async_trait::async_trait;
use neo4rs::{ConfigBuilder, Graph, query};
use std::sync::Arc;

use crate::config::{Neo4jSettings, VectorIndexSpec};
use crate::embeddings::Embedder;
use crate::errors::{QaError, QaResult};

/// One retrieved chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub source: String,
    pub score: f64,
}

/// Anything that can return the `k` chunks nearest to a query.
#[async_trait]
pub trait SimilaritySearch: Send + Sync {
    async fn similarity_search(&self, query: &str, k: usize) -> QaResult<Vec<Document>>;
}

/// Read-only handle to a vector index that already exists in Neo4j.
pub struct Neo4jVector {
    graph: Arc<Graph>,
    embedder: Arc<dyn Embedder>,
    index: VectorIndexSpec,
}

impl Neo4jVector {
    /// Connects and checks that the index exists with the dimensionality
    /// produced by `embedder`.
    pub async fn from_existing_index(
        settings: &Neo4jSettings,
        index: VectorIndexSpec,
        embedder: Arc<dyn Embedder>,
    ) -> QaResult<Self> {
        let uri = settings.uri()?;
        let config = ConfigBuilder::default()
            .uri(uri)
            .user(settings.username()?)
            .password(settings.password()?)
            .db(settings.database.as_str())
            .build()?;

        tracing::info!("🔷 Connecting to Neo4j at {}", uri);
        let graph = Graph::connect(config).await?;

        let store = Self {
            graph: Arc::new(graph),
            embedder,
            index,
        };

        let expected = store.index_dimensions().await?;
        let actual = store.embedder.embed_query("foo").await?.len();
        if expected != actual {
            return Err(QaError::DimensionMismatch {
                index: store.index.index_name.clone(),
                expected,
                actual,
            });
        }

        tracing::info!(
            "✅ Vector index '{}' ready ({} dimensions)",
            store.index.index_name,
            expected
        );
        Ok(store)
    }

    async fn index_dimensions(&self) -> QaResult<usize> {
        let cypher = "SHOW INDEXES YIELD name, type, labelsOrTypes, properties, options \
                      WHERE type = 'VECTOR' AND (name = $index_name \
                      OR (labelsOrTypes[0] = $node_label AND properties[0] = $embedding_property)) \
                      RETURN name, options.indexConfig['vector.dimensions'] AS dimensions";

        let mut result = self
            .graph
            .execute(
                query(cypher)
                    .param("index_name", self.index.index_name.as_str())
                    .param("node_label", self.index.node_label.as_str())
                    .param("embedding_property", self.index.embedding_property.as_str()),
            )
            .await?;

        match result.next().await? {
            Some(row) => {
                let dimensions: i64 = row
                    .get("dimensions")
                    .map_err(|e| QaError::Neo4j(e.to_string()))?;
                usize::try_from(dimensions)
                    .map_err(|_| QaError::Neo4j(format!("bad index dimensions {}", dimensions)))
            }
            None => Err(QaError::IndexNotFound(self.index.index_name.clone())),
        }
    }
}

fn retrieval_cypher(index: &VectorIndexSpec) -> String {
    format!(
        "CALL db.index.vector.queryNodes($index_name, $k, $embedding) YIELD node, score \
         RETURN elementId(node) AS id, \
         coalesce(toString(node.`{text}`), '') AS text, \
         coalesce(toString(node.source), elementId(node)) AS source, \
         score",
        text = index.text_property
    )
}

#[async_trait]
impl SimilaritySearch for Neo4jVector {
    async fn similarity_search(&self, text: &str, k: usize) -> QaResult<Vec<Document>> {
        let embedding = self.embedder.embed_query(text).await?;
        let k = i64::try_from(k).unwrap_or(i64::MAX);

        let mut result = self
            .graph
            .execute(
                query(&retrieval_cypher(&self.index))
                    .param("index_name", self.index.index_name.as_str())
                    .param("k", k)
                    .param("embedding", embedding),
            )
            .await?;

        let mut documents = Vec::new();
        while let Some(row) = result.next().await? {
            let get_str = |key: &str| {
                row.get::<String>(key)
                    .map_err(|e| QaError::Neo4j(e.to_string()))
            };
            documents.push(Document {
                id: get_str("id")?,
                content: get_str("text")?,
                source: get_str("source")?,
                score: row
                    .get::<f64>("score")
                    .map_err(|e| QaError::Neo4j(e.to_string()))?,
            });
        }

        tracing::debug!("Retrieved {} chunks from '{}'", documents.len(), self.index.index_name);
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retrieval_cypher_reads_configured_text_property() {
        let cypher = retrieval_cypher(&VectorIndexSpec::default());
        assert!(cypher.contains("db.index.vector.queryNodes($index_name, $k, $embedding)"));
        assert!(cypher.contains("node.`text`"));
        assert!(!cypher.contains("CREATE"));
        assert!(!cypher.contains("SET"));
    }

    #[tokio::test]
    async fn test_missing_uri_fails_before_connecting() {
        struct NoEmbedder;

        #[async_trait]
        impl Embedder for NoEmbedder {
            async fn embed_query(&self, _text: &str) -> QaResult<Vec<f64>> {
                panic!("embedder must not be called");
            }
        }

        let settings = Neo4jSettings {
            uri: None,
            username: Some("neo4j".to_string()),
            password: Some("secret".to_string()),
            database: "neo4j".to_string(),
        };
        let err = Neo4jVector::from_existing_index(
            &settings,
            VectorIndexSpec::default(),
            Arc::new(NoEmbedder),
        )
        .await
        .err()
        .unwrap();
        assert_eq!(err.to_string(), "NEO4J_URI is not set");
    }
}
