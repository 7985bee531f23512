use crate::chat::types::Sender;
use crate::dom::ElementNode;
use serde::{Deserialize, Serialize};

/// One way of recognising who wrote a unit
///
/// Rules are evaluated by kind, known tags first, then explicit roles, then class substrings.
/// Within a kind, configuration order is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SenderRule {
    /// The unit's tag name identifies the sender (e.g. `user-query`)
    KnownTag { tag: String, sender: Sender },

    /// An attribute carries the role; `attribute: "class"` matches a whole class name
    ExplicitRole { attribute: String, value: String, sender: Sender },

    /// Some class name contains the pattern, case-insensitively
    ClassSubstring { pattern: String, sender: Sender },
}

impl SenderRule {
    fn priority(&self) -> u8 {
        match self {
            SenderRule::KnownTag { .. } => 0,
            SenderRule::ExplicitRole { .. } => 1,
            SenderRule::ClassSubstring { .. } => 2,
        }
    }

    fn classify(&self, unit: &ElementNode) -> Option<Sender> {
        let matched = match self {
            SenderRule::KnownTag { tag, .. } => unit.is_tag(tag),
            SenderRule::ExplicitRole { attribute, value, .. } if attribute == "class" => unit.has_class(value),
            SenderRule::ExplicitRole { attribute, value, .. } => {
                unit.get_attribute(attribute).is_some_and(|v| v.eq_ignore_ascii_case(value))
            }
            SenderRule::ClassSubstring { pattern, .. } => {
                let pattern = pattern.to_ascii_lowercase();
                unit.classes().any(|c| c.to_ascii_lowercase().contains(&pattern))
            }
        };

        matched.then_some(self.sender())
    }

    fn sender(&self) -> Sender {
        match self {
            SenderRule::KnownTag { sender, .. }
            | SenderRule::ExplicitRole { sender, .. }
            | SenderRule::ClassSubstring { sender, .. } => *sender,
        }
    }

    /// Rules for the common chat front-ends
    pub fn defaults() -> Vec<SenderRule> {
        use Sender::{Agent, User};

        let tag = |tag: &str, sender| SenderRule::KnownTag { tag: tag.to_string(), sender };
        let role = |attribute: &str, value: &str, sender| SenderRule::ExplicitRole {
            attribute: attribute.to_string(),
            value: value.to_string(),
            sender,
        };
        let class = |pattern: &str, sender| SenderRule::ClassSubstring { pattern: pattern.to_string(), sender };

        vec![
            tag("user-query", User),
            tag("model-response", Agent),
            role("data-message-author-role", "user", User),
            role("data-message-author-role", "assistant", Agent),
            role("data-role", "user", User),
            role("data-role", "model", Agent),
            role("class", "user-message", User),
            role("class", "model-message", Agent),
            role("class", "assistant-message", Agent),
            class("user", User),
            class("model", Agent),
            class("assistant", Agent),
            class("ai", Agent),
        ]
    }
}

/// Prioritized sender matcher with a terminal default of [`Sender::Agent`]
///
/// The agent default keeps unrecognised response variants from being labelled as user input.
#[derive(Debug, Clone)]
pub struct SenderClassifier {
    rules: Vec<SenderRule>,
}

impl SenderClassifier {
    /// Create a classifier; rules are ordered by kind, keeping the given order within a kind
    pub fn new(mut rules: Vec<SenderRule>) -> Self {
        rules.sort_by_key(SenderRule::priority);
        Self { rules }
    }

    /// Classify a unit
    pub fn classify(&self, unit: &ElementNode) -> Sender {
        self.rules
            .iter()
            .find_map(|rule| rule.classify(unit))
            .unwrap_or(Sender::Agent)
    }
}

impl Default for SenderClassifier {
    fn default() -> Self {
        Self::new(SenderRule::defaults())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_tags() {
        let classifier = SenderClassifier::default();
        assert_eq!(classifier.classify(&ElementNode::new("user-query")), Sender::User);
        assert_eq!(classifier.classify(&ElementNode::new("model-response")), Sender::Agent);
    }

    #[test]
    fn test_known_tag_beats_class_heuristic() {
        let classifier = SenderClassifier::default();
        let unit = ElementNode::new("model-response").with_class("user-visible");
        assert_eq!(classifier.classify(&unit), Sender::Agent);
    }

    #[test]
    fn test_explicit_role_attribute() {
        let classifier = SenderClassifier::default();
        let user = ElementNode::new("div").with_attribute("data-message-author-role", "user");
        let agent = ElementNode::new("div")
            .with_attribute("data-message-author-role", "assistant")
            .with_class("user-avatar-hidden");

        assert_eq!(classifier.classify(&user), Sender::User);
        assert_eq!(classifier.classify(&agent), Sender::Agent);
    }

    #[test]
    fn test_explicit_role_class() {
        let classifier = SenderClassifier::default();
        let unit = ElementNode::new("div").with_class("bubble user-message");
        assert_eq!(classifier.classify(&unit), Sender::User);
    }

    #[test]
    fn test_class_substring() {
        let classifier = SenderClassifier::default();
        assert_eq!(classifier.classify(&ElementNode::new("div").with_class("turn UserTurn")), Sender::User);
        assert_eq!(classifier.classify(&ElementNode::new("div").with_class("modelTurn")), Sender::Agent);
        assert_eq!(classifier.classify(&ElementNode::new("div").with_class("chat-ai-bubble")), Sender::Agent);
    }

    #[test]
    fn test_unrecognised_defaults_to_agent() {
        let classifier = SenderClassifier::default();
        assert_eq!(classifier.classify(&ElementNode::new("div")), Sender::Agent);
        assert_eq!(classifier.classify(&ElementNode::new("article").with_class("bubble")), Sender::Agent);
    }

    #[test]
    fn test_rules_sorted_by_kind() {
        let classifier = SenderClassifier::new(vec![
            SenderRule::ClassSubstring { pattern: "msg".to_string(), sender: Sender::Agent },
            SenderRule::KnownTag { tag: "div".to_string(), sender: Sender::User },
        ]);

        let unit = ElementNode::new("div").with_class("msg");
        assert_eq!(classifier.classify(&unit), Sender::User);
    }

    #[test]
    fn test_rule_deserialization() {
        let json = r#"[
            {"kind": "known_tag", "tag": "human-turn", "sender": "user"},
            {"kind": "class_substring", "pattern": "bot", "sender": "agent"}
        ]"#;
        let rules: Vec<SenderRule> = serde_json::from_str(json).unwrap();
        let classifier = SenderClassifier::new(rules);

        assert_eq!(classifier.classify(&ElementNode::new("human-turn")), Sender::User);
        assert_eq!(classifier.classify(&ElementNode::new("div").with_class("bot-reply")), Sender::Agent);
    }
}
