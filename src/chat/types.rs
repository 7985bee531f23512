use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who wrote a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Agent,
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::User => f.write_str("user"),
            Sender::Agent => f.write_str("agent"),
        }
    }
}

/// Content-type flags derived from a message's final HTML
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MessageMetadata {
    pub has_code_block: bool,
    pub has_table: bool,
    pub has_list: bool,
}

impl MessageMetadata {
    /// Derive the flags by looking for the corresponding markup
    pub fn from_content(content: &str) -> Self {
        Self {
            has_code_block: content.contains("<pre") || content.contains("<code"),
            has_table: content.contains("<table"),
            has_list: content.contains("<ul") || content.contains("<ol"),
        }
    }
}

/// One extracted conversation turn
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    sender: Sender,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
    metadata: MessageMetadata,
}

impl Message {
    /// Create a message; metadata is derived from the content
    pub fn new(sender: Sender, content: impl Into<String>, timestamp: Option<String>) -> Self {
        let content = content.into();
        let metadata = MessageMetadata::from_content(&content);
        Self {
            sender,
            content,
            timestamp,
            metadata,
        }
    }

    pub fn sender(&self) -> Sender {
        self.sender
    }

    /// Sanitized semantic HTML
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }

    pub fn metadata(&self) -> MessageMetadata {
        self.metadata
    }
}

/// Message counts of a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ChatStats {
    pub total_messages: usize,
    pub user_messages: usize,
    pub agent_messages: usize,
}

/// A whole extracted conversation
#[derive(Debug, Clone, Serialize)]
pub struct ChatContent {
    messages: Vec<Message>,
    timestamp: DateTime<Local>,
    metadata: ChatStats,
}

impl ChatContent {
    /// Create the conversation; counts are computed from the messages
    pub fn new(messages: Vec<Message>, timestamp: DateTime<Local>) -> Self {
        let user_messages = messages.iter().filter(|m| m.sender == Sender::User).count();
        let metadata = ChatStats {
            total_messages: messages.len(),
            user_messages,
            agent_messages: messages.len() - user_messages,
        };

        Self {
            messages,
            timestamp,
            metadata,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Capture time
    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn metadata(&self) -> ChatStats {
        self.metadata
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Outcome of one expansion pass
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ExpandResult {
    total_found: usize,
    expanded: usize,
    failed: usize,
    errors: Vec<String>,
}

impl ExpandResult {
    /// Count a unit that reached the expanded state
    pub fn record_success(&mut self) {
        self.total_found += 1;
        self.expanded += 1;
    }

    /// Count a unit that could not be expanded
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.total_found += 1;
        self.failed += 1;
        self.errors.push(error.into());
    }

    pub fn total_found(&self) -> usize {
        self.total_found
    }

    pub fn expanded(&self) -> usize {
        self.expanded
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_flags() {
        let plain = MessageMetadata::from_content("<p>Hello</p>");
        assert_eq!(plain, MessageMetadata::default());

        let rich = MessageMetadata::from_content("<pre><code>x</code></pre><table></table><ol><li>a</li></ol>");
        assert!(rich.has_code_block && rich.has_table && rich.has_list);

        assert!(MessageMetadata::from_content("inline <code>x</code>").has_code_block);
        assert!(MessageMetadata::from_content("<ul><li>x</li></ul>").has_list);
    }

    #[test]
    fn test_chat_content_counts() {
        let messages = vec![
            Message::new(Sender::User, "<p>a</p>", None),
            Message::new(Sender::Agent, "<p>b</p>", None),
            Message::new(Sender::User, "<p>c</p>", None),
        ];
        let content = ChatContent::new(messages, Local::now());
        let stats = content.metadata();

        assert_eq!(stats.total_messages, 3);
        assert_eq!(stats.user_messages, 2);
        assert_eq!(stats.agent_messages, 1);
        assert_eq!(stats.total_messages, content.messages().len());
    }

    #[test]
    fn test_empty_chat_content() {
        let content = ChatContent::new(Vec::new(), Local::now());
        assert!(content.is_empty());
        assert_eq!(content.metadata(), ChatStats::default());
    }

    #[test]
    fn test_expand_result_invariants() {
        let mut result = ExpandResult::default();
        result.record_success();
        result.record_failure("Message 2: Expansion timed out after 2000ms");
        result.record_success();

        assert_eq!(result.total_found(), 3);
        assert_eq!(result.expanded() + result.failed(), result.total_found());
        assert_eq!(result.errors().len(), result.failed());
    }

    #[test]
    fn test_message_serialization() {
        let message = Message::new(Sender::Agent, "<table></table>", Some("2024-05-01T10:00:00Z".to_string()));
        let json = serde_json::to_value(&message).unwrap();

        assert_eq!(json["sender"], "agent");
        assert_eq!(json["metadata"]["has_table"], true);
        assert_eq!(json["timestamp"], "2024-05-01T10:00:00Z");
    }
}
