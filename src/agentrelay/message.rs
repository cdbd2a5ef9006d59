//! Message model shared by agents and the orchestrator.
//!
//! A reply produced by an agent is either a bare string or a structured record that may carry
//! textual `content`, a `function_call` request, or both. The orchestrator only ever branches on
//! the *latest* message in its log, using the classification helpers defined here.
//!
//! # Example
//!
//! ```
//! use agentrelay::message::{Message, FunctionCall};
//! use serde_json::json;
//!
//! let plain = Message::plain("SELECT 1");
//! assert!(plain.is_plain());
//! assert_eq!(plain.text(), Some("SELECT 1"));
//!
//! let call = Message::function_call(FunctionCall::new("run_sql", json!({"sql": "SELECT 1"})));
//! assert!(call.is_function_call());
//! assert!(!call.has_content());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Substring whose presence in a message marks a successful sequential run.
pub const TERMINATION_KEYWORD: &str = "APPROVED";

/// Prefix used when a function execution fails and the failure is reported as content.
pub const ERROR_KEYWORD: &str = "ERROR";

/// A request, emitted by an agent, to execute one of its registered functions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Name of the registered function (e.g. `"run_sql"`).
    pub name: String,
    /// Raw JSON arguments forwarded to the function.
    #[serde(default)]
    pub arguments: serde_json::Value,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// One entry of the orchestrator's message log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    /// A bare string: the seed prompt, or an agent reply with no structure.
    PlainText(String),
    /// A structured reply with optional text and an optional function-call request.
    Structured {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        function_call: Option<FunctionCall>,
    },
}

impl Message {
    /// Build a plain string message.
    pub fn plain(text: impl Into<String>) -> Self {
        Message::PlainText(text.into())
    }

    /// Build a structured message carrying only textual content.
    pub fn content(content: impl Into<String>) -> Self {
        Message::Structured {
            content: Some(content.into()),
            function_call: None,
        }
    }

    /// Build a structured message carrying only a function-call request.
    pub fn function_call(call: FunctionCall) -> Self {
        Message::Structured {
            content: None,
            function_call: Some(call),
        }
    }

    pub fn is_plain(&self) -> bool {
        matches!(self, Message::PlainText(_))
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Message::Structured { .. })
    }

    /// Structured record whose `function_call` names a function.
    pub fn is_function_call(&self) -> bool {
        self.requested_call().is_some()
    }

    /// Structured record with non-empty `content`.
    pub fn has_content(&self) -> bool {
        match self {
            Message::Structured {
                content: Some(content),
                ..
            } => !content.is_empty(),
            _ => false,
        }
    }

    /// The function call carried by this message, if it is a valid request.
    pub fn requested_call(&self) -> Option<&FunctionCall> {
        match self {
            Message::Structured {
                function_call: Some(call),
                ..
            } if !call.name.is_empty() => Some(call),
            _ => None,
        }
    }

    /// Human-readable text: the plain string, or the structured `content`.
    pub fn text(&self) -> Option<&str> {
        match self {
            Message::PlainText(text) => Some(text.as_str()),
            Message::Structured { content, .. } => content.as_deref(),
        }
    }

    /// Case-sensitive substring search over [`Message::text`].
    pub fn contains_keyword(&self, keyword: &str) -> bool {
        self.text().map_or(false, |text| text.contains(keyword))
    }

    /// Everything in the message that would be sent to a model, used for usage estimates.
    pub(crate) fn accounting_text(&self) -> String {
        let mut text = self.text().unwrap_or_default().to_string();
        if let Some(call) = self.requested_call() {
            text.push_str(&call.name);
            text.push_str(&call.arguments.to_string());
        }
        text
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Message::plain(text)
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Message::PlainText(text)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::PlainText(text) => write!(f, "{}", text),
            Message::Structured {
                content,
                function_call,
            } => {
                if let Some(content) = content {
                    write!(f, "{}", content)?;
                }
                if let Some(call) = function_call {
                    if content.is_some() {
                        write!(f, " ")?;
                    }
                    write!(f, "<call {}({})>", call.name, call.arguments)?;
                }
                Ok(())
            }
        }
    }
}

/// Audit record of one directed exchange.
///
/// `message` is the text that was delivered; function-call requests are rendered with
/// [`Message`]'s `Display` implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub from_name: String,
    pub to_name: String,
    pub message: String,
}

impl Chat {
    pub fn new(
        from_name: impl Into<String>,
        to_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            from_name: from_name.into(),
            to_name: to_name.into(),
            message: message.into(),
        }
    }
}

/// Default termination predicate: the message carries text containing [`TERMINATION_KEYWORD`].
pub fn is_termination_msg(message: &Message) -> bool {
    message.contains_keyword(TERMINATION_KEYWORD)
}
