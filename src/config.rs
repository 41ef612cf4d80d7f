use crate::errors::{QaError, QaResult};

pub const VECTOR_INDEX_NAME: &str = "form_10k_chunks";
pub const VECTOR_NODE_LABEL: &str = "TextChunk";
pub const VECTOR_SOURCE_PROPERTY: &str = "text";
pub const VECTOR_EMBEDDING_PROPERTY: &str = "textEmbedding";

const DEFAULT_DATABASE: &str = "neo4j";
const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_TOP_K: usize = 4;

/// Names of the pre-built vector index this application reads from.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndexSpec {
    pub index_name: String,
    pub node_label: String,
    pub text_property: String,
    pub embedding_property: String,
}

impl Default for VectorIndexSpec {
    fn default() -> Self {
        Self {
            index_name: VECTOR_INDEX_NAME.to_string(),
            node_label: VECTOR_NODE_LABEL.to_string(),
            text_property: VECTOR_SOURCE_PROPERTY.to_string(),
            embedding_property: VECTOR_EMBEDDING_PROPERTY.to_string(),
        }
    }
}

/// Connection parameters for the graph database.
///
/// Credentials are optional here: a missing value only becomes an error
/// when the vector store is first initialized.
#[derive(Debug, Clone)]
pub struct Neo4jSettings {
    pub uri: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: String,
}

impl Neo4jSettings {
    pub fn uri(&self) -> QaResult<&str> {
        self.uri.as_deref().ok_or(QaError::MissingSetting("NEO4J_URI"))
    }

    pub fn username(&self) -> QaResult<&str> {
        self.username
            .as_deref()
            .ok_or(QaError::MissingSetting("NEO4J_USERNAME"))
    }

    pub fn password(&self) -> QaResult<&str> {
        self.password
            .as_deref()
            .ok_or(QaError::MissingSetting("NEO4J_PASSWORD"))
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_base: String,
    pub embedding_model: String,
    pub chat_model: String,
}

#[derive(Debug, Clone)]
pub struct RetrievalSettings {
    pub top_k: usize,
    /// Upper bound on the stuffed context, in characters. `None` passes
    /// every retrieved chunk through untouched.
    pub max_context_chars: Option<usize>,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            max_context_chars: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub neo4j: Neo4jSettings,
    pub openai: OpenAiSettings,
    pub retrieval: RetrievalSettings,
    pub server: ServerSettings,
    pub index: VectorIndexSpec,
}

impl Settings {
    /// Reads settings from the process environment. Call `dotenvy::dotenv`
    /// first if a `.env` file should be honored.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset, same as an absent variable.
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let top_k = match get("QA_TOP_K") {
            Some(v) => v
                .parse::<usize>()
                .map_err(|e| anyhow::anyhow!("Invalid QA_TOP_K '{}': {}", v, e))?,
            None => DEFAULT_TOP_K,
        };
        if top_k == 0 {
            anyhow::bail!("QA_TOP_K must be at least 1");
        }

        let max_context_chars = get("QA_MAX_CONTEXT_CHARS")
            .map(|v| {
                v.parse::<usize>()
                    .map_err(|e| anyhow::anyhow!("Invalid QA_MAX_CONTEXT_CHARS '{}': {}", v, e))
            })
            .transpose()?;

        let port = match get("QA_PORT") {
            Some(v) => v
                .parse::<u16>()
                .map_err(|e| anyhow::anyhow!("Invalid QA_PORT '{}': {}", v, e))?,
            None => 8501,
        };

        Ok(Settings {
            neo4j: Neo4jSettings {
                uri: get("NEO4J_URI"),
                username: get("NEO4J_USERNAME"),
                password: get("NEO4J_PASSWORD"),
                database: get("NEO4J_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            },
            openai: OpenAiSettings {
                api_base: get("OPENAI_API_BASE")
                    .map(|v| v.trim_end_matches('/').to_string())
                    .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
                embedding_model: get("OPENAI_EMBEDDING_MODEL")
                    .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
                chat_model: get("OPENAI_CHAT_MODEL")
                    .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            },
            retrieval: RetrievalSettings {
                top_k,
                max_context_chars,
            },
            server: ServerSettings {
                host: get("QA_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port,
            },
            index: VectorIndexSpec::default(),
        })
    }
}
