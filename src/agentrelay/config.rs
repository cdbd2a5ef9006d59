//! Configuration for agentrelay.
//!
//! [`AgentRelayConfig`] is a plain struct; construct it however you like. No config-file parsing
//! dependencies are introduced.
//!
//! # Example
//!
//! ```rust
//! use agentrelay::AgentRelayConfig;
//! use std::path::PathBuf;
//!
//! let config = AgentRelayConfig {
//!     price_per_1k_tokens: 0.03,
//!     chat_log_dir: PathBuf::from("/tmp/agent_chats"),
//! };
//! assert_eq!(config.chat_log_dir, PathBuf::from("/tmp/agent_chats"));
//! ```

use std::path::PathBuf;

/// Settings shared by orchestrators and team builders.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRelayConfig {
    /// Dollar rate applied to the token estimate by
    /// [`get_cost_and_tokens`](crate::orchestrator::Orchestrator::get_cost_and_tokens).
    pub price_per_1k_tokens: f64,
    /// Directory for the per-team chat logs attached by
    /// [`build_team_orchestrator`](crate::team::build_team_orchestrator).
    pub chat_log_dir: PathBuf,
}

impl Default for AgentRelayConfig {
    /// `0.06` dollars per 1K tokens, files under `"agent_results"` in the working directory.
    ///
    /// ```rust
    /// use agentrelay::AgentRelayConfig;
    /// use std::path::PathBuf;
    ///
    /// let config = AgentRelayConfig::default();
    /// assert_eq!(config.chat_log_dir, PathBuf::from("agent_results"));
    /// ```
    fn default() -> Self {
        Self {
            price_per_1k_tokens: 0.06,
            chat_log_dir: PathBuf::from("agent_results"),
        }
    }
}
