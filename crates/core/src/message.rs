//! Message and Conversation domain types.
//!
//! A research session owns one [`Conversation`]; the agent loop is the only
//! writer. Adapters translate it into each vendor's own turn format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user (or the loop speaking on the user's behalf)
    User,
    /// The model
    Assistant,
    /// System instructions and injected guidance
    System,
    /// Tool execution result
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Tool => "tool",
        }
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<MessageToolCall>,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create an assistant message carrying tool calls.
    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<MessageToolCall>) -> Self {
        let mut msg = Self::with_role(Role::Assistant, content);
        msg.tool_calls = tool_calls;
        msg
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// Create a tool result message.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut msg = Self::with_role(Role::Tool, content);
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }

    /// Whether this is an assistant turn that requested tools.
    pub fn has_tool_calls(&self) -> bool {
        self.role == Role::Assistant && !self.tool_calls.is_empty()
    }
}

/// A tool call embedded in an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageToolCall {
    /// Unique ID for this tool call; tool results refer back to it
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as the raw string the model produced (may be malformed)
    pub arguments: String,
}

/// The ordered message list of one research session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conversation {
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message to the conversation.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn last_role(&self) -> Option<Role> {
        self.messages.last().map(|m| m.role)
    }

    /// Look up the tool name of the assistant call with `call_id`, newest first.
    pub fn tool_name_for_call(&self, call_id: &str) -> Option<&str> {
        find_tool_name(&self.messages, call_id)
    }

    /// Drop trailing tool-call turns that were never fully resolved.
    ///
    /// After pruning, the conversation never ends with an assistant turn
    /// whose tool calls lack matching tool results. Returns the number of
    /// messages removed.
    pub fn prune_incomplete_tool_calls(&mut self) -> usize {
        let before = self.messages.len();
        loop {
            let tail_start = self
                .messages
                .iter()
                .rposition(|m| m.role != Role::Tool)
                .map(|i| i + 1)
                .unwrap_or(0);
            let Some(anchor) = tail_start.checked_sub(1) else {
                break;
            };
            let assistant = &self.messages[anchor];
            if !assistant.has_tool_calls() {
                break;
            }

            let answered: Vec<&str> = self.messages[tail_start..]
                .iter()
                .filter_map(|m| m.tool_call_id.as_deref())
                .collect();
            let resolved = assistant
                .tool_calls
                .iter()
                .all(|call| answered.contains(&call.id.as_str()));
            if resolved {
                break;
            }

            tracing::warn!(
                removed = self.messages.len() - anchor,
                "Removing incomplete assistant tool-call turn"
            );
            self.messages.truncate(anchor);
        }
        before - self.messages.len()
    }
}

/// Look up the tool name of the assistant call with `call_id` in `messages`, newest first.
pub fn find_tool_name<'a>(messages: &'a [Message], call_id: &str) -> Option<&'a str> {
    messages
        .iter()
        .rev()
        .filter(|m| m.has_tool_calls())
        .flat_map(|m| m.tool_calls.iter())
        .find(|c| c.id == call_id)
        .map(|c| c.name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(id: &str, name: &str) -> MessageToolCall {
        MessageToolCall {
            id: id.into(),
            name: name.into(),
            arguments: "{}".into(),
        }
    }

    #[test]
    fn message_constructors() {
        let msg = Message::tool_result("call_1", "ok");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));

        let msg = Message::assistant_with_tools("", vec![call("a", "web_search")]);
        assert!(msg.has_tool_calls());
        assert!(!Message::assistant("plain").has_tool_calls());
    }

    #[test]
    fn prune_removes_trailing_assistant_with_calls() {
        let mut conv = Conversation::new();
        conv.push(Message::system("sys"));
        conv.push(Message::user("go"));
        conv.push(Message::assistant_with_tools("", vec![call("a", "web_search")]));

        assert_eq!(conv.prune_incomplete_tool_calls(), 1);
        assert_eq!(conv.last_role(), Some(Role::User));
    }

    #[test]
    fn prune_removes_mismatched_tool_response() {
        let mut conv = Conversation::new();
        conv.push(Message::user("go"));
        conv.push(Message::assistant_with_tools("", vec![call("a", "web_search")]));
        conv.push(Message::tool_result("zzz", "stray"));

        conv.prune_incomplete_tool_calls();
        assert_eq!(conv.len(), 1);
        assert_eq!(conv.last_role(), Some(Role::User));
    }

    #[test]
    fn prune_removes_partially_answered_batch() {
        let mut conv = Conversation::new();
        conv.push(Message::user("go"));
        conv.push(Message::assistant_with_tools(
            "",
            vec![call("a", "web_search"), call("b", "arxiv_search")],
        ));
        conv.push(Message::tool_result("a", "result a"));

        conv.prune_incomplete_tool_calls();
        assert_eq!(conv.len(), 1);
    }

    #[test]
    fn prune_keeps_resolved_turns() {
        let mut conv = Conversation::new();
        conv.push(Message::user("go"));
        conv.push(Message::assistant_with_tools("", vec![call("a", "web_search")]));
        conv.push(Message::tool_result("a", "result"));

        assert_eq!(conv.prune_incomplete_tool_calls(), 0);
        assert_eq!(conv.len(), 3);
    }

    #[test]
    fn prune_cascades_through_nested_incomplete_turns() {
        let mut conv = Conversation::new();
        conv.push(Message::user("go"));
        conv.push(Message::assistant_with_tools("", vec![call("a", "web_search")]));
        conv.push(Message::assistant_with_tools("", vec![call("b", "web_search")]));

        conv.prune_incomplete_tool_calls();
        assert_eq!(conv.len(), 1);
    }

    #[test]
    fn tool_name_lookup_prefers_newest() {
        let mut conv = Conversation::new();
        conv.push(Message::assistant_with_tools("", vec![call("x", "web_search")]));
        conv.push(Message::tool_result("x", "r"));
        conv.push(Message::assistant_with_tools("", vec![call("x", "github_search")]));
        assert_eq!(conv.tool_name_for_call("x"), Some("github_search"));
        assert_eq!(conv.tool_name_for_call("missing"), None);
    }
}
