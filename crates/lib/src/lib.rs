//! # Memento
//!
//! The orchestration core of a conversational data assistant. A [`Controller`]
//! takes one utterance through intent classification, table discovery, schema
//! grounding, SQL synthesis, validation with a bounded repair loop, execution and
//! summarization. All outside access goes through the three tools of
//! [`tools::ToolPort`]; the production implementation is backed by a Turso
//! (SQLite) lake and its metadata catalog.

pub mod classifier;
pub mod config;
pub mod constants;
pub mod context;
pub mod controller;
pub mod discovery;
pub mod errors;
pub mod prompts;
pub mod providers;
pub mod render;
pub mod rerank;
pub mod session;
pub mod state_graph;
pub mod summarizer;
pub mod synthesizer;
pub mod tools;
pub mod types;
pub mod validator;

pub use config::{AgentConfig, EmbeddingConfig, ProviderConfig, SqlDialect};
pub use controller::Controller;
pub use errors::AgentError;
pub use prompts::{AgentTask, AgentTasks};
pub use render::{detect_language, Language, ResponseRenderer, TurnResponse};
pub use session::{Session, SessionHandle, SessionStore, Turn};
pub use tools::{LakeTools, ToolPort};
