//! Multi-Agent Orchestrator
//!
//! The [`Orchestrator`] drives a turn-based exchange between a fixed, ordered list of
//! [`Agent`]s until the goal keyword shows up or the exchange is exhausted.
//!
//! # Protocols
//!
//! - **Sequential** ([`Orchestrator::sequential_conversation`]): a pipeline. Agent `i` hands the
//!   latest message to agent `i + 1`, whose reply becomes the next latest message. After the last
//!   agent has replied the run succeeds iff that reply contains `"APPROVED"`.
//! - **Broadcast** ([`Orchestrator::broadcast_conversation`]): the first agent sends the same
//!   prompt to every other agent. Recipients are independent, run concurrently, and are merged
//!   back in agent-list order. The run succeeds iff every recipient replied.
//!
//! # Message classification
//!
//! Only the *latest* logged message is ever inspected. A function-call request is routed through
//! [`Orchestrator::function_chat`] before plain text is considered:
//!
//! ```text
//! latest is function call  &&  agent_a has functions  -> function_chat(agent_a, agent_b)
//! latest is plain string                              -> basic_chat(agent_a, agent_b)
//! anything else                                       -> StalledConversation
//! ```
//!
//! # Example
//!
//! ```rust
//! use agentrelay::{Agent, Orchestrator};
//! use agentrelay::reply::{DefaultAutoReply, ReplyFn};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let admin = Arc::new(Agent::new("Admin", Arc::new(DefaultAutoReply)));
//! let engineer = Arc::new(Agent::new("Engineer", Arc::new(ReplyFn::constant("SELECT 1"))));
//! let reviewer = Arc::new(
//!     Agent::new("Reviewer", Arc::new(ReplyFn::constant("APPROVED"))).with_default_termination(),
//! );
//!
//! let mut orchestrator = Orchestrator::new("sql-team", vec![admin, engineer, reviewer])?;
//! let result = orchestrator.sequential_conversation("do the task").await;
//!
//! assert!(result.success);
//! assert_eq!(result.messages.len(), 3);
//! # Ok(())
//! # }
//! ```

use crate::agentrelay::agent::Agent;
use crate::agentrelay::config::AgentRelayConfig;
use crate::agentrelay::event::{preview, EventHandler, OrchestratorEvent};
use crate::agentrelay::message::{Chat, Message, ERROR_KEYWORD, TERMINATION_KEYWORD};
use crate::agentrelay::sink::{ChatSink, SinkError};
use crate::agentrelay::usage::estimate_messages;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Errors raised while configuring or running an [`Orchestrator`].
///
/// Only [`OrchestratorError::ConfigurationError`] escapes as an `Err` from
/// [`Orchestrator::new`]; protocol methods fold every other kind into a failed
/// [`ConversationResult`].
///
/// ```
/// use agentrelay::orchestrator::OrchestratorError;
///
/// let err = OrchestratorError::AgentNotFound("Ghost".into());
/// assert_eq!(err.to_string(), "Agent not found: Ghost");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum OrchestratorError {
    /// Fewer than two agents, or two agents sharing a name.
    ConfigurationError(String),
    /// A function execution produced something other than textual content.
    ProtocolViolation(String),
    /// The latest message can be handled by neither the plain nor the function-call branch.
    StalledConversation(String),
    /// An agent name passed to a chat method is not part of this orchestrator.
    AgentNotFound(String),
    /// An agent's reply generator returned an error; `message` is that error's text.
    ReplyFailed { agent: String, message: String },
    /// A fan-out task could not be joined.
    ExecutionFailed(String),
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrchestratorError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            OrchestratorError::ProtocolViolation(msg) => write!(f, "Protocol violation: {}", msg),
            OrchestratorError::StalledConversation(msg) => {
                write!(f, "Stalled conversation: {}", msg)
            }
            OrchestratorError::AgentNotFound(name) => write!(f, "Agent not found: {}", name),
            OrchestratorError::ReplyFailed { agent, message } => {
                write!(f, "Reply generation failed for {}: {}", agent, message)
            }
            OrchestratorError::ExecutionFailed(msg) => write!(f, "Execution failed: {}", msg),
        }
    }
}

impl Error for OrchestratorError {}

/// Outcome of one protocol run. Built once, when the run ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationResult {
    /// Sequential: the last reply contains `"APPROVED"`. Broadcast: every recipient replied.
    pub success: bool,
    /// The full message log, seed prompt first.
    pub messages: Vec<Message>,
    /// Every chat record of the run, in delivery order.
    pub chats: Vec<Chat>,
    /// Estimated dollar cost of the message log.
    pub cost: f64,
    /// Estimated token count of the message log.
    pub tokens: usize,
    /// Text of the latest message, empty when the log is empty.
    pub last_message: String,
    /// Description of the failure that aborted the run, empty otherwise.
    pub error_message: String,
}

/// Logs produced by a run: messages, chat records, and one thread per directed agent pair.
///
/// Broadcast recipients each fill a private transcript on their own task; the results are
/// merged into the orchestrator's transcript in agent-list order.
#[derive(Debug, Default)]
struct Transcript {
    messages: Vec<Message>,
    chats: Vec<Chat>,
    threads: HashMap<(String, String), Vec<Message>>,
    /// `(agent, function)` pairs executed since the last event flush.
    executed: Vec<(String, String)>,
}

impl Transcript {
    async fn basic_chat(
        &mut self,
        sender: &Agent,
        receiver: &Agent,
        message: Message,
    ) -> Result<Message, OrchestratorError> {
        log::info!("basic_chat: {} -> {}", sender.name, receiver.name);
        self.chats
            .push(Chat::new(&sender.name, &receiver.name, message.to_string()));

        let thread = self
            .threads
            .entry((sender.name.clone(), receiver.name.clone()))
            .or_default();
        thread.push(message);

        let reply = receiver
            .generate_reply(&thread[..], &sender.name)
            .await
            .map_err(|e| OrchestratorError::ReplyFailed {
                agent: receiver.name.clone(),
                message: e.to_string(),
            })?;
        thread.push(reply.clone());

        log::debug!("basic_chat: {} replied with: {}", receiver.name, reply);
        if receiver.is_termination_message(&reply) {
            log::debug!("{} signalled termination", receiver.name);
        }

        self.messages.push(reply.clone());
        Ok(reply)
    }

    async fn function_chat(
        &mut self,
        sender: &Agent,
        receiver: &Agent,
        message: Message,
    ) -> Result<Message, OrchestratorError> {
        log::info!("function_chat: {} -> {}", sender.name, receiver.name);
        let function_name = message
            .requested_call()
            .map(|call| call.name.clone())
            .unwrap_or_default();

        let result = self.basic_chat(sender, sender, message).await?;
        if !result.has_content() {
            return Err(OrchestratorError::ProtocolViolation(format!(
                "{} executed '{}' but did not reply with content: {}",
                sender.name, function_name, result
            )));
        }
        self.executed.push((sender.name.clone(), function_name));

        self.basic_chat(sender, receiver, result).await
    }

    /// One broadcast leg: deliver the prompt, and if the recipient answers with a call it can
    /// execute, run it and report the output back to the originator.
    async fn broadcast_leg(
        &mut self,
        originator: &Agent,
        recipient: &Agent,
        prompt: Message,
    ) -> Result<(), OrchestratorError> {
        let reply = self.basic_chat(originator, recipient, prompt).await?;
        if reply.is_function_call() && recipient.has_functions() {
            self.function_chat(recipient, originator, reply).await?;
        }
        Ok(())
    }

    fn absorb(&mut self, other: Transcript) {
        self.messages.extend(other.messages);
        self.chats.extend(other.chats);
        self.executed.extend(other.executed);
        for (pair, thread) in other.threads {
            self.threads.entry(pair).or_default().extend(thread);
        }
    }
}

/// Coordinates an ordered list of at least two agents through one of the conversation protocols.
///
/// An instance owns its logs exclusively. Each protocol run starts by clearing them, so an
/// orchestrator can be reused run after run, but must not be shared between concurrent runs.
pub struct Orchestrator {
    /// Display name used in logs and events.
    pub name: String,
    agents: Vec<Arc<Agent>>,
    transcript: Transcript,
    complete_keyword: &'static str,
    error_keyword: &'static str,
    config: AgentRelayConfig,
    sink: Option<Arc<dyn ChatSink>>,
    /// Number of chat records already delivered to the sink.
    spied: usize,
    event_handler: Option<Arc<dyn EventHandler>>,
    run_id: Uuid,
}

impl Orchestrator {
    /// Create an orchestrator over `agents`, in the order given.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::ConfigurationError`] when fewer than two agents are supplied or two
    /// agents share a name.
    pub fn new(
        name: impl Into<String>,
        agents: Vec<Arc<Agent>>,
    ) -> Result<Self, OrchestratorError> {
        if agents.len() < 2 {
            return Err(OrchestratorError::ConfigurationError(format!(
                "Orchestrator must have at least 2 agents, got {}",
                agents.len()
            )));
        }

        let mut seen = HashSet::new();
        for agent in &agents {
            if !seen.insert(agent.name.as_str()) {
                return Err(OrchestratorError::ConfigurationError(format!(
                    "Agent name '{}' appears more than once",
                    agent.name
                )));
            }
        }

        Ok(Self {
            name: name.into(),
            agents,
            transcript: Transcript::default(),
            complete_keyword: TERMINATION_KEYWORD,
            error_keyword: ERROR_KEYWORD,
            config: AgentRelayConfig::default(),
            sink: None,
            spied: 0,
            event_handler: None,
            run_id: Uuid::new_v4(),
        })
    }

    /// Attach the side-channel sink used by [`Orchestrator::spy_on_agents`] (builder pattern).
    pub fn with_sink(mut self, sink: Arc<dyn ChatSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Override pricing and output locations (builder pattern).
    pub fn with_config(mut self, config: AgentRelayConfig) -> Self {
        self.config = config;
        self
    }

    /// Attach an [`EventHandler`] for run lifecycle events (builder pattern).
    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    pub fn agents(&self) -> &[Arc<Agent>] {
        &self.agents
    }

    pub fn total_agents(&self) -> usize {
        self.agents.len()
    }

    pub fn messages(&self) -> &[Message] {
        &self.transcript.messages
    }

    pub fn chats(&self) -> &[Chat] {
        &self.transcript.chats
    }

    /// The keyword whose presence in the last reply marks a sequential run as successful.
    pub fn complete_keyword(&self) -> &str {
        self.complete_keyword
    }

    /// The prefix agents use to report failed function executions.
    pub fn error_keyword(&self) -> &str {
        self.error_keyword
    }

    pub fn latest_message(&self) -> Option<&Message> {
        self.transcript.messages.last()
    }

    pub fn last_message_is_string(&self) -> bool {
        self.latest_message().map_or(false, Message::is_plain)
    }

    pub fn last_message_is_structured(&self) -> bool {
        self.latest_message().map_or(false, Message::is_structured)
    }

    pub fn last_message_is_func_call(&self) -> bool {
        self.latest_message().map_or(false, Message::is_function_call)
    }

    pub fn last_message_is_content(&self) -> bool {
        self.latest_message().map_or(false, Message::has_content)
    }

    /// Append a message to the log.
    pub fn add_message(&mut self, message: impl Into<Message>) {
        self.transcript.messages.push(message.into());
    }

    /// Clear every log and the spy cursor.
    pub fn reset(&mut self) {
        self.transcript = Transcript::default();
        self.spied = 0;
    }

    fn agent(&self, name: &str) -> Result<Arc<Agent>, OrchestratorError> {
        self.agents
            .iter()
            .find(|agent| agent.name == name)
            .cloned()
            .ok_or_else(|| OrchestratorError::AgentNotFound(name.to_string()))
    }

    /// Deliver `message` from `sender` to `receiver`, log the reply and return it.
    ///
    /// Appends one chat record and one message. This is the unit every protocol is built from.
    pub async fn basic_chat(
        &mut self,
        sender: &str,
        receiver: &str,
        message: impl Into<Message>,
    ) -> Result<Message, OrchestratorError> {
        let sender = self.agent(sender)?;
        let receiver = self.agent(receiver)?;
        let chats_before = self.transcript.chats.len();
        let outcome = self
            .transcript
            .basic_chat(&sender, &receiver, message.into())
            .await;
        self.publish_progress(chats_before).await;
        outcome
    }

    /// Have `sender` execute the function-call request in `message`, then forward the textual
    /// output to `receiver`.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::ProtocolViolation`] when the self-directed reply is not content.
    pub async fn function_chat(
        &mut self,
        sender: &str,
        receiver: &str,
        message: impl Into<Message>,
    ) -> Result<Message, OrchestratorError> {
        let sender = self.agent(sender)?;
        let receiver = self.agent(receiver)?;
        let chats_before = self.transcript.chats.len();
        let outcome = self
            .transcript
            .function_chat(&sender, &receiver, message.into())
            .await;
        self.publish_progress(chats_before).await;
        outcome
    }

    /// Run the agents as a pipeline: `agents[0] -> agents[1] -> ... -> agents[n-1]`.
    ///
    /// The run ends after `agents[n-1]` replies; it succeeds iff that reply contains
    /// `"APPROVED"`. Failures (reply errors, protocol violations, stalls) yield
    /// `success == false` with `error_message` set.
    pub async fn sequential_conversation(
        &mut self,
        prompt: impl Into<Message>,
    ) -> ConversationResult {
        self.begin_run("sequential", prompt.into()).await;
        let outcome = self.run_sequential().await;
        self.finish_run(outcome).await
    }

    async fn run_sequential(&mut self) -> Result<bool, OrchestratorError> {
        let last_index = self.agents.len() - 2;

        for idx in 0..=last_index {
            let agent_a = Arc::clone(&self.agents[idx]);
            let agent_b = Arc::clone(&self.agents[idx + 1]);
            log::info!(
                "---------- {} iteration {} ({} -> {}) ----------",
                self.name,
                idx,
                agent_a.name,
                agent_b.name
            );

            let latest = match self.latest_message() {
                Some(message) => message.clone(),
                None => {
                    return Err(OrchestratorError::StalledConversation(
                        "message log is empty".to_string(),
                    ))
                }
            };

            let chats_before = self.transcript.chats.len();
            let step = if latest.is_function_call() && agent_a.has_functions() {
                self.transcript
                    .function_chat(&agent_a, &agent_b, latest)
                    .await
                    .map(|_| ())
            } else if latest.is_plain() {
                self.transcript
                    .basic_chat(&agent_a, &agent_b, latest)
                    .await
                    .map(|_| ())
            } else {
                Err(OrchestratorError::StalledConversation(format!(
                    "{} cannot hand '{}' to {}",
                    agent_a.name, latest, agent_b.name
                )))
            };
            self.publish_progress(chats_before).await;
            step?;
        }

        Ok(self
            .latest_message()
            .map_or(false, |message| message.contains_keyword(self.complete_keyword)))
    }

    /// Send `prompt` from `agents[0]` to every other agent.
    ///
    /// Recipients run concurrently. A recipient that answers with a function call it can execute
    /// runs it and reports the output back to the originator. Records are merged in agent-list
    /// order, so the result does not depend on completion timing. The run succeeds iff every
    /// recipient replied.
    pub async fn broadcast_conversation(
        &mut self,
        prompt: impl Into<Message>,
    ) -> ConversationResult {
        let prompt = prompt.into();
        self.begin_run("broadcast", prompt.clone()).await;
        let outcome = self.run_broadcast(prompt).await;
        self.finish_run(outcome).await
    }

    async fn run_broadcast(&mut self, prompt: Message) -> Result<bool, OrchestratorError> {
        let originator = Arc::clone(&self.agents[0]);
        let recipients: Vec<Arc<Agent>> = self.agents[1..].iter().cloned().collect();
        log::info!(
            "---------- {} broadcasting from {} to {} agents ----------",
            self.name,
            originator.name,
            recipients.len()
        );

        let tasks = recipients.iter().map(|recipient| {
            let originator = Arc::clone(&originator);
            let recipient = Arc::clone(recipient);
            let prompt = prompt.clone();
            tokio::spawn(async move {
                let mut transcript = Transcript::default();
                let outcome = transcript
                    .broadcast_leg(&originator, &recipient, prompt)
                    .await;
                (transcript, outcome)
            })
        });
        let joined = join_all(tasks).await;

        let mut first_error = None;
        for (recipient, task) in recipients.iter().zip(joined) {
            match task {
                Ok((transcript, outcome)) => {
                    let chats_before = self.transcript.chats.len();
                    self.transcript.absorb(transcript);
                    self.publish_progress(chats_before).await;
                    if let Err(e) = outcome {
                        log::warn!("{} broadcast to {} failed: {}", self.name, recipient.name, e);
                        first_error.get_or_insert(e);
                    }
                }
                Err(join_error) => {
                    log::warn!(
                        "{} broadcast task for {} failed: {}",
                        self.name,
                        recipient.name,
                        join_error
                    );
                    // The task's transcript is lost, but the prompt had been delivered.
                    let chats_before = self.transcript.chats.len();
                    self.transcript.chats.push(Chat::new(
                        &originator.name,
                        &recipient.name,
                        prompt.to_string(),
                    ));
                    self.publish_progress(chats_before).await;
                    first_error.get_or_insert(OrchestratorError::ExecutionFailed(format!(
                        "broadcast task for {} failed: {}",
                        recipient.name, join_error
                    )));
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(true),
        }
    }

    /// Estimated `(cost, tokens)` of everything in the message log.
    ///
    /// Recomputed on every call from the concatenated message content, so it only grows while
    /// messages are appended. An empty log is `(0.0, 0)`.
    pub fn get_cost_and_tokens(&self) -> (f64, usize) {
        let usage = estimate_messages(&self.transcript.messages, self.config.price_per_1k_tokens);
        (usage.cost, usage.tokens)
    }

    /// Deliver the chat records not yet seen by the sink, oldest first.
    ///
    /// Returns how many records were written. Without a sink this is a no-op returning `0`.
    /// A sink failure is logged and returned; the logs themselves are untouched and the same
    /// records will be offered again on the next call.
    pub async fn spy_on_agents(&mut self) -> Result<usize, SinkError> {
        let sink = match &self.sink {
            Some(sink) => Arc::clone(sink),
            None => {
                log::debug!("{}: no chat sink attached, nothing to spy on", self.name);
                return Ok(0);
            }
        };

        let pending = self.transcript.chats[self.spied..].to_vec();
        if pending.is_empty() {
            return Ok(0);
        }

        match sink.append(&pending).await {
            Ok(()) => {
                self.spied += pending.len();
                Ok(pending.len())
            }
            Err(e) => {
                log::warn!("{}: failed to write chat log: {}", self.name, e);
                Err(e)
            }
        }
    }

    async fn begin_run(&mut self, protocol: &'static str, prompt: Message) {
        self.reset();
        self.run_id = Uuid::new_v4();
        log::info!(
            "---------- {} orchestrator starting ({}, {} agents) ----------",
            self.name,
            protocol,
            self.agents.len()
        );
        self.add_message(prompt);

        self.emit(OrchestratorEvent::RunStarted {
            run_id: self.run_id,
            orchestrator_name: self.name.clone(),
            protocol,
            agent_count: self.agents.len(),
        })
        .await;
    }

    async fn finish_run(&mut self, outcome: Result<bool, OrchestratorError>) -> ConversationResult {
        let (success, error_message) = match outcome {
            Ok(success) => (success, String::new()),
            Err(e) => {
                log::warn!("{} orchestrator aborted: {}", self.name, e);
                (false, e.to_string())
            }
        };

        if success {
            log::info!("---------- {} orchestrator was successful ----------", self.name);
        } else {
            log::info!("---------- {} orchestrator failed ----------", self.name);
        }

        let (cost, tokens) = self.get_cost_and_tokens();
        let result = ConversationResult {
            success,
            messages: self.transcript.messages.clone(),
            chats: self.transcript.chats.clone(),
            cost,
            tokens,
            last_message: self
                .latest_message()
                .map(ToString::to_string)
                .unwrap_or_default(),
            error_message,
        };

        self.emit(OrchestratorEvent::RunCompleted {
            run_id: self.run_id,
            orchestrator_name: self.name.clone(),
            success: result.success,
            message_count: result.messages.len(),
            tokens: result.tokens,
            cost: result.cost,
            error_message: result.error_message.clone(),
        })
        .await;

        result
    }

    /// Emit events for chat records appended since `chats_before` and for executed functions.
    async fn publish_progress(&mut self, chats_before: usize) {
        let executed = std::mem::take(&mut self.transcript.executed);
        let handler = match &self.event_handler {
            Some(handler) => Arc::clone(handler),
            None => return,
        };

        for chat in &self.transcript.chats[chats_before..] {
            handler
                .on_orchestrator_event(&OrchestratorEvent::ChatDelivered {
                    run_id: self.run_id,
                    from_name: chat.from_name.clone(),
                    to_name: chat.to_name.clone(),
                    message_preview: preview(&chat.message),
                })
                .await;
        }

        for (agent_name, function_name) in executed {
            handler
                .on_orchestrator_event(&OrchestratorEvent::FunctionExecuted {
                    run_id: self.run_id,
                    agent_name,
                    function_name,
                })
                .await;
        }
    }

    async fn emit(&self, event: OrchestratorEvent) {
        if let Some(handler) = &self.event_handler {
            handler.on_orchestrator_event(&event).await;
        }
    }
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("name", &self.name)
            .field(
                "agents",
                &self.agents.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(),
            )
            .field("messages", &self.transcript.messages.len())
            .field("chats", &self.transcript.chats.len())
            .finish()
    }
}
