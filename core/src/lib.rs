// Minerva Core Library
// Retrieval-augmented reasoning agent engine

pub mod agent;
pub mod dispatch;
pub mod embedding;
pub mod index;
pub mod llm;
pub mod parser;
pub mod search;
pub mod segmenter;
pub mod telemetry;
pub mod tools;

// Export core types
pub use agent::{Agent, AgentConfig, AgentState, ConversationTurn, TurnOutcome};
pub use dispatch::{Action, DispatchOutcome, Dispatcher, Grounding};
pub use embedding::{EmbeddingClient, EmbeddingConfig, EmbeddingService};
pub use index::{DocumentIndex, IndexEntry};
pub use llm::{CompletionService, LlamaClient, LlmConfig};
pub use parser::{parse_response, ParsedFields};
pub use search::{Citation, Retrieval, ScoredMatch, SemanticSearch};
pub use segmenter::{segment, Chunk};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MinervaError {
    #[error("{0}")]
    ToolConfig(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("Completion service error: {0}")]
    Completion(String),

    #[error("Embedding service error: {0}")]
    Embedding(String),

    #[error("Search invoked on an empty corpus")]
    EmptyCorpus,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
pub type Result<T> = std::result::Result<T, MinervaError>;
