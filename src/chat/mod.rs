//! Conversation model and the stages that build it from a page
//!
//! - [`TreeLocator`] finds the container, message units, title and anchor in a snapshot
//! - [`ExpansionEngine`] clicks collapsed units open and waits for them to settle
//! - [`ContentExtractor`] turns units into [`Message`]s
//! - [`PageLayout`] holds every selector and heuristic the stages rely on

pub mod expansion;
pub mod extractor;
pub mod layout;
pub mod locator;
pub mod sender;
pub mod types;

pub use expansion::ExpansionEngine;
pub use extractor::ContentExtractor;
pub use layout::{AttributeMatch, CollapseMarkers, PageLayout};
pub use locator::{TreeLocator, Unit};
pub use sender::{SenderClassifier, SenderRule};
pub use types::{ChatContent, ChatStats, ExpandResult, Message, MessageMetadata, Sender};
