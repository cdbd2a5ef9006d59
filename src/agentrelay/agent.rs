//! Agent System
//!
//! An [`Agent`] is plain data: a unique name plus three capabilities supplied when it is built.
//!
//! - **Reply generation** (required): an [`Arc<dyn ReplyGenerator>`](ReplyGenerator) that answers
//!   whatever it is sent.
//! - **Function map** (optional): named callables the agent executes when it answers its own
//!   function-call request naming one of them.
//! - **Termination predicate** (optional): decides whether a message is an approval signal.
//!
//! Agents hold no conversation state. The [`Orchestrator`](crate::orchestrator::Orchestrator)
//! keeps one thread per directed pair of agents and hands it over on every delivery, so the same
//! `Arc<Agent>` can be shared by the caller and several orchestrators at once.
//!
//! # Example
//!
//! ```
//! use agentrelay::{Agent, Message};
//! use agentrelay::reply::ReplyFn;
//! use std::sync::Arc;
//!
//! let reviewer = Agent::new("Reviewer", Arc::new(ReplyFn::constant("APPROVED")))
//!     .with_system_message("You review SQL and answer APPROVED when it is correct.")
//!     .with_default_termination();
//!
//! assert!(reviewer.is_termination_message(&Message::plain("APPROVED")));
//! assert!(!reviewer.has_functions());
//! ```

use crate::agentrelay::function_map::FunctionMap;
use crate::agentrelay::message::{is_termination_msg, Message, ERROR_KEYWORD};
use crate::agentrelay::reply::{ReplyGenerator, ReplyRequest};
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Predicate marking a message as a terminal/approval signal.
pub type TerminationPredicate = Arc<dyn Fn(&Message) -> bool + Send + Sync>;

/// A named participant in an orchestrated exchange.
pub struct Agent {
    /// Unique name within one orchestrator; used as the identity in chat records.
    pub name: String,
    /// Standing instructions passed to the reply generator on every request.
    pub system_message: String,
    /// Arbitrary metadata associated with the agent (e.g. team, role).
    pub metadata: HashMap<String, String>,
    generator: Arc<dyn ReplyGenerator>,
    function_map: Option<FunctionMap>,
    termination: Option<TerminationPredicate>,
}

impl Agent {
    /// Create an agent with a name and a reply-generation capability.
    pub fn new(name: impl Into<String>, generator: Arc<dyn ReplyGenerator>) -> Self {
        Self {
            name: name.into(),
            system_message: String::new(),
            metadata: HashMap::new(),
            generator,
            function_map: None,
            termination: None,
        }
    }

    pub fn with_system_message(mut self, system_message: impl Into<String>) -> Self {
        self.system_message = system_message.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Grant the agent a set of callable functions.
    pub fn with_function_map(mut self, function_map: FunctionMap) -> Self {
        self.function_map = Some(function_map);
        self
    }

    /// Install a custom termination predicate.
    pub fn with_termination_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Message) -> bool + Send + Sync + 'static,
    {
        self.termination = Some(Arc::new(predicate));
        self
    }

    /// Install [`is_termination_msg`] (substring match on `"APPROVED"`) as the predicate.
    pub fn with_default_termination(self) -> Self {
        self.with_termination_predicate(is_termination_msg)
    }

    pub fn function_map(&self) -> Option<&FunctionMap> {
        self.function_map.as_ref()
    }

    /// True when a function map was registered, even an empty one.
    pub fn has_functions(&self) -> bool {
        self.function_map.is_some()
    }

    /// Evaluate the termination predicate. Agents without one never terminate.
    pub fn is_termination_message(&self, message: &Message) -> bool {
        self.termination
            .as_ref()
            .map_or(false, |predicate| predicate(message))
    }

    /// Answer the last message of `history`, which was sent by `sender`.
    ///
    /// Functions only run when the agent answers its own request (`sender` is this agent). Then
    /// a function-call request naming a registered function is executed and its output becomes
    /// the reply's `content`; failures are reported as `"ERROR: ..."` content rather than raised.
    /// Every other message, including a call sent by another agent, goes to the reply generator,
    /// whose errors are returned unchanged.
    pub async fn generate_reply(
        &self,
        history: &[Message],
        sender: &str,
    ) -> Result<Message, Box<dyn Error + Send + Sync>> {
        let own_call = history
            .last()
            .and_then(Message::requested_call)
            .filter(|_| sender == self.name);
        if let (Some(call), Some(functions)) = (own_call, self.function_map.as_ref()) {
            log::debug!("{} executing function '{}'", self.name, call.name);
            let reply = match functions.call(&call.name, call.arguments.clone()).await {
                Ok(output) => Message::content(output),
                Err(e) => {
                    log::warn!("{} failed to execute '{}': {}", self.name, call.name, e);
                    Message::content(format!("{}: {}", ERROR_KEYWORD, e))
                }
            };
            return Ok(reply);
        }

        let functions = self
            .function_map
            .as_ref()
            .map(FunctionMap::specs)
            .unwrap_or_default();

        self.generator
            .generate_reply(ReplyRequest {
                agent_name: &self.name,
                system_message: &self.system_message,
                sender,
                history,
                functions: &functions,
            })
            .await
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("function_map", &self.function_map)
            .field("has_termination_predicate", &self.termination.is_some())
            .finish()
    }
}
