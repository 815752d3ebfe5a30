//! Concurrent execution core for a tool-using LLM agent loop: tool
//! contract and executor, a background shell manager, a subagent
//! scheduler, and a slash-command dispatcher.
//!
//! The LLM client itself, session persistence, and REPL rendering are
//! consumed through traits (`llm::LlmClient`) or left to callers; this
//! crate owns only the concurrency-critical core.

pub mod agent;
pub mod command;
pub mod llm;
pub mod shell;
pub mod tool;
pub mod tools;
