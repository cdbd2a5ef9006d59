//! # AgentRelay
//!
//! AgentRelay coordinates turn-based exchanges between a fixed, ordered set of agents until a
//! goal keyword is reached or the exchange is exhausted.
//!
//! The crate provides:
//!
//! * **Agents**: [`Agent`] values built from a name, a [`reply::ReplyGenerator`], an optional
//!   [`function_map::FunctionMap`] of callable functions and an optional termination predicate
//! * **Orchestration**: [`Orchestrator`] with a sequential pipeline protocol and a concurrent
//!   broadcast protocol, both returning a [`ConversationResult`]
//! * **Accounting**: estimated token and dollar cost of every run via [`usage`]
//! * **Observability**: chat-record sinks ([`sink`]) and lifecycle events ([`event`])
//! * **Ready-made teams**: the Postgres analytics agents of [`team`], with their SQL and file
//!   writing functions ([`files`])
//!
//! Reply generation is pluggable. Nothing in this crate talks to a language model directly; wrap
//! your client in a [`reply::ReplyGenerator`] implementation and hand it to the agents.
//!
//! ## Getting Started
//!
//! ```rust
//! use agentrelay::reply::{DefaultAutoReply, ReplyFn};
//! use agentrelay::{Agent, Orchestrator};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     agentrelay::init_logger();
//!
//!     let agents = vec![
//!         Arc::new(Agent::new("User_Proxy", Arc::new(DefaultAutoReply))),
//!         Arc::new(Agent::new(
//!             "Data_Engineer",
//!             Arc::new(ReplyFn::constant("SELECT count(*) FROM users")),
//!         )),
//!         Arc::new(Agent::new("Product_Manager", Arc::new(ReplyFn::constant("APPROVED")))),
//!     ];
//!
//!     let mut orchestrator = Orchestrator::new("analytics", agents)?;
//!     let result = orchestrator.sequential_conversation("How many users are there?").await;
//!
//!     println!("success={} tokens={} cost=${:.4}", result.success, result.tokens, result.cost);
//!     Ok(())
//! }
//! ```

use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Initialise the global [`env_logger`] subscriber exactly once.
///
/// ```rust
/// agentrelay::init_logger();
/// log::info!("Logger is ready");
/// ```
pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        env_logger::init();
    });
}

// Import the top-level `agentrelay` module.
pub mod agentrelay;

// Re-exporting key items for easier external access.
pub use crate::agentrelay::agent::Agent;
pub use crate::agentrelay::agent;
pub use crate::agentrelay::config;
pub use crate::agentrelay::config::AgentRelayConfig;
pub use crate::agentrelay::event;
pub use crate::agentrelay::event::{EventHandler, OrchestratorEvent};
pub use crate::agentrelay::files;
pub use crate::agentrelay::function_map;
pub use crate::agentrelay::function_map::{FunctionMap, FunctionSpec};
pub use crate::agentrelay::message;
pub use crate::agentrelay::message::{Chat, FunctionCall, Message};
pub use crate::agentrelay::orchestrator;
pub use crate::agentrelay::orchestrator::{ConversationResult, Orchestrator, OrchestratorError};
pub use crate::agentrelay::prompt;
pub use crate::agentrelay::reply;
pub use crate::agentrelay::sink;
pub use crate::agentrelay::team;
pub use crate::agentrelay::usage;
