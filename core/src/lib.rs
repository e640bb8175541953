// Core exam tutor functionality:
// - Prompt templates for solving questions, follow-ups and study plans
// - Completion client for OpenAI-compatible endpoints, with an LRU memo layer
// - Vision client for question screenshots
// - Conversation state and the orchestrator that drives it
// - Configuration loading and shared error types

pub mod cache;
pub mod client;
pub mod config;
pub mod conversation;
pub mod errors;
pub mod markup;
pub mod prompt;
pub mod tutor;
pub mod types;
pub mod vision;

pub use cache::{CacheStats, MemoizedBackend};
pub use client::{CompletionBackend, CompletionClient, CompletionOptions};
pub use config::TutorConfig;
pub use conversation::{Conversation, ConversationState, Role, Turn};
pub use errors::{CallError, TutorError, TutorResult, ValidationError};
pub use prompt::{Level, Prompt, PromptKind, PromptRequest, Subject};
pub use tutor::{Reply, Tutor};
pub use vision::VisionClient;
