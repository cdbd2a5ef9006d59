//! Orchestrator event system.
//!
//! Implement [`EventHandler`] to observe a run as it happens: when it starts, every delivered
//! chat, every function an agent executes, and how the run ended. The handler has a default no-op
//! implementation, so only override what you care about.
//!
//! # Example
//!
//! ```rust,no_run
//! use agentrelay::event::{EventHandler, OrchestratorEvent};
//! use async_trait::async_trait;
//!
//! struct Printer;
//!
//! #[async_trait]
//! impl EventHandler for Printer {
//!     async fn on_orchestrator_event(&self, event: &OrchestratorEvent) {
//!         if let OrchestratorEvent::ChatDelivered { from_name, to_name, .. } = event {
//!             println!("{} -> {}", from_name, to_name);
//!         }
//!     }
//! }
//! ```

use async_trait::async_trait;
use uuid::Uuid;

/// Events emitted by an [`Orchestrator`](crate::orchestrator::Orchestrator) during a run.
///
/// Every variant carries the `run_id` of the protocol invocation so handlers shared across
/// several orchestrators can tell runs apart.
#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    /// A protocol method was invoked and the message log was seeded.
    RunStarted {
        run_id: Uuid,
        orchestrator_name: String,
        /// `"sequential"` or `"broadcast"`.
        protocol: &'static str,
        agent_count: usize,
    },

    /// A message was delivered from one agent to another. Emitted for every chat record,
    /// including a delivery whose reply generation then failed.
    ChatDelivered {
        run_id: Uuid,
        from_name: String,
        to_name: String,
        /// First ~120 characters of the delivered message.
        message_preview: String,
    },

    /// An agent executed one of its registered functions and produced textual output.
    FunctionExecuted {
        run_id: Uuid,
        agent_name: String,
        function_name: String,
    },

    /// The run concluded, successfully or not.
    RunCompleted {
        run_id: Uuid,
        orchestrator_name: String,
        success: bool,
        message_count: usize,
        tokens: usize,
        cost: f64,
        /// Failure description, empty on success or when approval was simply not reached.
        error_message: String,
    },
}

/// Trait for receiving orchestrator events.
///
/// The `Send + Sync` bound allows one handler to be shared by several orchestrators via
/// `Arc<dyn EventHandler>`.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Called for every event. The default implementation is a no-op.
    async fn on_orchestrator_event(&self, _event: &OrchestratorEvent) {}
}

pub(crate) fn preview(text: &str) -> String {
    const LIMIT: usize = 120;
    if text.chars().count() <= LIMIT {
        return text.to_string();
    }
    let mut shortened: String = text.chars().take(LIMIT).collect();
    shortened.push('…');
    shortened
}
