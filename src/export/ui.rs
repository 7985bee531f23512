use serde::Serialize;
use std::sync::{Mutex, MutexGuard};

/// Kind of a user-visible notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    Info,
}

/// User-visible side effects of an export
///
/// Calls are fire-and-forget; the exporter never looks at what they did.
pub trait Affordances: Send + Sync {
    fn show_loading(&self);
    fn hide_loading(&self);
    fn disable_button(&self);
    fn enable_button(&self);
    fn show_notification(&self, message: &str, kind: NotificationKind);
}

/// Affordances for a terminal: state changes go to the log, notifications to stderr
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleAffordances;

impl Affordances for ConsoleAffordances {
    fn show_loading(&self) {
        log::info!("Exporting chat...");
    }

    fn hide_loading(&self) {
        log::debug!("Export finished");
    }

    fn disable_button(&self) {
        log::debug!("Export button disabled");
    }

    fn enable_button(&self) {
        log::debug!("Export button enabled");
    }

    fn show_notification(&self, message: &str, kind: NotificationKind) {
        match kind {
            NotificationKind::Error => eprintln!("error: {}", message),
            NotificationKind::Success | NotificationKind::Info => eprintln!("{}", message),
        }
    }
}

/// A recorded affordance call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    LoadingShown,
    LoadingHidden,
    ButtonDisabled,
    ButtonEnabled,
    Notified(NotificationKind, String),
}

/// Affordances that only record what was asked of them
#[derive(Debug, Default)]
pub struct NotificationLog {
    events: Mutex<Vec<UiEvent>>,
}

impl NotificationLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn events_mut(&self) -> MutexGuard<'_, Vec<UiEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every call so far, in order
    pub fn events(&self) -> Vec<UiEvent> {
        self.events_mut().clone()
    }

    /// Notifications shown so far, in order
    pub fn notifications(&self) -> Vec<(NotificationKind, String)> {
        self.events_mut()
            .iter()
            .filter_map(|event| match event {
                UiEvent::Notified(kind, message) => Some((*kind, message.clone())),
                _ => None,
            })
            .collect()
    }

    /// Whether the button was left enabled; true if it was never touched
    pub fn button_enabled(&self) -> bool {
        self.events_mut()
            .iter()
            .rev()
            .find_map(|event| match event {
                UiEvent::ButtonEnabled => Some(true),
                UiEvent::ButtonDisabled => Some(false),
                _ => None,
            })
            .unwrap_or(true)
    }

    /// Whether the loading indicator is currently shown
    pub fn loading(&self) -> bool {
        self.events_mut()
            .iter()
            .rev()
            .find_map(|event| match event {
                UiEvent::LoadingShown => Some(true),
                UiEvent::LoadingHidden => Some(false),
                _ => None,
            })
            .unwrap_or(false)
    }

    /// Forget everything recorded so far
    pub fn clear(&self) {
        self.events_mut().clear();
    }
}

impl Affordances for NotificationLog {
    fn show_loading(&self) {
        self.events_mut().push(UiEvent::LoadingShown);
    }

    fn hide_loading(&self) {
        self.events_mut().push(UiEvent::LoadingHidden);
    }

    fn disable_button(&self) {
        self.events_mut().push(UiEvent::ButtonDisabled);
    }

    fn enable_button(&self) {
        self.events_mut().push(UiEvent::ButtonEnabled);
    }

    fn show_notification(&self, message: &str, kind: NotificationKind) {
        self.events_mut().push(UiEvent::Notified(kind, message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_tracks_state() {
        let log = NotificationLog::new();
        assert!(log.button_enabled());
        assert!(!log.loading());

        log.disable_button();
        log.show_loading();
        assert!(!log.button_enabled());
        assert!(log.loading());

        log.show_notification("Chat exported", NotificationKind::Success);
        log.hide_loading();
        log.enable_button();

        assert!(log.button_enabled());
        assert!(!log.loading());
        assert_eq!(log.notifications(), vec![(NotificationKind::Success, "Chat exported".to_string())]);
    }

    #[test]
    fn test_clear() {
        let log = NotificationLog::new();
        log.show_notification("x", NotificationKind::Info);
        log.clear();
        assert!(log.events().is_empty());
    }
}
