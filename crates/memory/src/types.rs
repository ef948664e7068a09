use crate::ledger::ActionRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One addressable window as reported by the external UI layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiWindow {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_active: bool,
    /// Attributes the core does not interpret but passes through.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Last-known snapshot of externally-owned window state.
///
/// The UI layer is authoritative; the core holds a read-only cached copy
/// and only ever replaces it wholesale. Selectors like "the active window"
/// or "the newest window" are relative to present state, so they must
/// always resolve against the latest snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UiContextMirror {
    pub windows: Vec<UiWindow>,
}

impl UiContextMirror {
    /// Replace the mirror with a whole new snapshot. Applied atomically by
    /// the single owner; there is no field-level mutation path.
    pub fn replace(&mut self, windows: Vec<UiWindow>) {
        tracing::debug!(window_count = windows.len(), "ui context snapshot replaced");
        self.windows = windows;
    }

    pub fn active(&self) -> Option<&UiWindow> {
        self.windows.iter().find(|w| w.is_active)
    }

    pub fn newest(&self) -> Option<&UiWindow> {
        self.windows.iter().max_by_key(|w| w.created_at)
    }

    pub fn by_id(&self, id: &str) -> Option<&UiWindow> {
        self.windows.iter().find(|w| w.id == id)
    }

    pub fn by_title(&self, needle: &str) -> Option<&UiWindow> {
        let needle = needle.to_lowercase();
        self.windows
            .iter()
            .find(|w| w.title.to_lowercase().contains(&needle))
    }
}

/// Snapshot handed to the intent extraction service on every cycle:
/// full transcript window, recent action history, current UI context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationState {
    pub transcript: String,
    pub recent_actions: Vec<ActionRecord>,
    pub ui: UiContextMirror,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(id: &str, title: &str, at: i64, active: bool) -> UiWindow {
        UiWindow {
            id: id.to_string(),
            title: title.to_string(),
            created_at: DateTime::from_timestamp(at, 0).unwrap(),
            is_active: active,
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn test_active_and_newest_selectors() {
        let mut mirror = UiContextMirror::default();
        mirror.replace(vec![
            window("w1", "notes", 100, false),
            window("w2", "search", 200, true),
            window("w3", "cheese", 150, false),
        ]);

        assert_eq!(mirror.active().unwrap().id, "w2");
        assert_eq!(mirror.newest().unwrap().id, "w2");
        assert_eq!(mirror.by_title("CHEESE").unwrap().id, "w3");
        assert!(mirror.by_id("w9").is_none());
    }

    #[test]
    fn test_replace_is_wholesale() {
        let mut mirror = UiContextMirror::default();
        mirror.replace(vec![window("w1", "notes", 100, true)]);
        mirror.replace(vec![window("w2", "other", 200, true)]);

        assert_eq!(mirror.windows.len(), 1);
        assert!(mirror.by_id("w1").is_none());
    }

    #[test]
    fn test_ui_window_keeps_unknown_fields() {
        let json = r#"{"id":"w1","title":"notes","created_at":"2026-01-01T00:00:00Z","is_active":true,"monitor":2}"#;
        let w: UiWindow = serde_json::from_str(json).unwrap();
        assert_eq!(w.extra["monitor"], 2);
    }
}
