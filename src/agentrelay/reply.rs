//! Reply-generation capability consumed by agents.
//!
//! A [`ReplyGenerator`] is the opaque "brain" of an agent: given the conversation thread it has
//! been sent so far, it produces one reply. Implementations are typically backed by a remote
//! language model, but the orchestrator never knows or cares; it only awaits the result.
//!
//! # Example
//!
//! ```
//! use agentrelay::reply::ReplyFn;
//! use agentrelay::Message;
//!
//! let reviewer = ReplyFn::new(|request| {
//!     let draft = request.history.last().and_then(Message::text).unwrap_or_default();
//!     Ok(Message::plain(format!("Reviewed: {}", draft)))
//! });
//! # let _ = reviewer;
//! ```

use crate::agentrelay::function_map::FunctionSpec;
use crate::agentrelay::message::Message;
use async_trait::async_trait;
use std::error::Error;
use std::sync::Arc;

/// Everything a generator may use to produce one reply.
#[derive(Debug, Clone, Copy)]
pub struct ReplyRequest<'a> {
    /// Name of the agent that is replying.
    pub agent_name: &'a str,
    /// The replying agent's standing instructions.
    pub system_message: &'a str,
    /// Name of the agent whose message is being answered.
    pub sender: &'a str,
    /// The thread between `sender` and the replying agent, oldest first. The last entry is the
    /// message being answered.
    pub history: &'a [Message],
    /// Functions the replying agent can execute, for generators that advertise them.
    pub functions: &'a [FunctionSpec],
}

/// Trait implemented by anything that can answer a message.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    /// Produce the next reply. Errors are surfaced to the orchestrator caller verbatim.
    async fn generate_reply(
        &self,
        request: ReplyRequest<'_>,
    ) -> Result<Message, Box<dyn Error + Send + Sync>>;
}

type ReplyResult = Result<Message, Box<dyn Error + Send + Sync>>;
type ReplyClosure = dyn for<'a> Fn(ReplyRequest<'a>) -> ReplyResult + Send + Sync;

/// Adapts a synchronous closure into a [`ReplyGenerator`].
#[derive(Clone)]
pub struct ReplyFn {
    inner: Arc<ReplyClosure>,
}

impl ReplyFn {
    pub fn new<F>(f: F) -> Self
    where
        F: for<'a> Fn(ReplyRequest<'a>) -> Result<Message, Box<dyn Error + Send + Sync>>
            + Send
            + Sync
            + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    /// A generator that always answers with the same message.
    pub fn constant(reply: impl Into<Message>) -> Self {
        let reply = reply.into();
        Self::new(move |_| Ok(reply.clone()))
    }
}

#[async_trait]
impl ReplyGenerator for ReplyFn {
    async fn generate_reply(
        &self,
        request: ReplyRequest<'_>,
    ) -> Result<Message, Box<dyn Error + Send + Sync>> {
        (self.inner)(request)
    }
}

/// Reply used by agents without a model behind them, such as a non-interactive user proxy.
/// Always answers with an empty plain string.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultAutoReply;

#[async_trait]
impl ReplyGenerator for DefaultAutoReply {
    async fn generate_reply(
        &self,
        _request: ReplyRequest<'_>,
    ) -> Result<Message, Box<dyn Error + Send + Sync>> {
        Ok(Message::plain(""))
    }
}
