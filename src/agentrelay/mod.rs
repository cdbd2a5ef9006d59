// src/agentrelay/mod.rs

pub mod agent;
pub mod config;
pub mod event;
pub mod files;
pub mod function_map;
pub mod message;
pub mod orchestrator;
pub mod prompt;
pub mod reply;
pub mod sink;
pub mod team;
pub mod usage;

// Export the orchestrator so it can be reached as agentrelay::Orchestrator rather than
// agentrelay::orchestrator::Orchestrator.
pub use orchestrator::{ConversationResult, Orchestrator, OrchestratorError};
