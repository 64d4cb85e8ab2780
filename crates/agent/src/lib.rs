//! Agent facade - LLM-backed drafting of acts of completed works
//!
//! This crate wraps the external LLM service behind a small surface:
//! - **LLM client** (`llm`) - `LlmClient` trait plus the HTTP implementation
//!   for an OpenAI-compatible chat/files API
//! - **Tools** (`tools`) - registry of callable tools the model may invoke
//! - **Runtime** (`runtime`) - `AgentFacade`, one persistent conversation
//!   thread with upload, prime and invoke operations
//!
//! # Safety Principle
//!
//! The LLM drafts text and decides *when* to call the document tool. The
//! document itself is rendered deterministically by the generation pipeline;
//! the model never writes files or touches the filesystem.

pub mod llm;
pub mod runtime;
pub mod tools;

pub use llm::{ChatMessage, ChatRequest, ChatResponse, ChatRole, HttpLlmClient, LlmClient,
    LlmError, ToolCall, UploadedFile};
pub use runtime::{AgentFacade, SYSTEM_PROMPT};
pub use tools::{Tool, ToolRegistry};
