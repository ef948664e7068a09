//! Bounded sliding window over the user's speech transcript.

/// Outcome of folding a full-transcript push into the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptUpdate {
    /// The stored window was a prefix of the incoming text; only the
    /// remainder was appended.
    Appended { delta_chars: usize },
    /// The incoming text did not extend the stored window (source-side
    /// rewrite, or our own front-truncation); the window was replaced
    /// wholesale with its tail.
    Replaced,
    /// The incoming text was identical to the stored window.
    Unchanged,
}

/// Append-growing transcript text, bounded to the most recent `cap`
/// characters. Older content is truncated from the front; the window is
/// never rewritten except by truncation.
#[derive(Debug, Clone)]
pub struct TranscriptWindow {
    text: String,
    cap: usize,
}

impl TranscriptWindow {
    pub fn new(cap: usize) -> Self {
        Self {
            text: String::new(),
            cap,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Window length in characters.
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Whether `needle` occurs literally in the current window. Used to
    /// corroborate a proposed action's source text.
    pub fn contains(&self, needle: &str) -> bool {
        !needle.is_empty() && self.text.contains(needle)
    }

    /// Append new speech to the window, truncating from the front when the
    /// combined length exceeds the cap.
    pub fn append(&mut self, delta: &str) {
        self.text.push_str(delta);
        self.truncate_front();
    }

    /// Fold an authoritative full-transcript push into the window.
    ///
    /// The speech layer sends the entire transcript on every pause; the
    /// window computes its own delta. If the stored text is a prefix of the
    /// incoming text, only the remainder is appended. Otherwise the payload
    /// replaces the window (bounded to its tail). De-duplication never
    /// depends on which path was taken; that lives in the action ledger.
    pub fn apply_full(&mut self, full: &str) -> TranscriptUpdate {
        if full == self.text {
            return TranscriptUpdate::Unchanged;
        }

        if !self.text.is_empty() && full.starts_with(&self.text) {
            let delta = &full[self.text.len()..];
            let delta_chars = delta.chars().count();
            self.append(delta);
            tracing::debug!(delta_chars, "transcript extended");
            return TranscriptUpdate::Appended { delta_chars };
        }

        self.text = full.to_string();
        self.truncate_front();
        tracing::debug!(window_chars = self.len(), "transcript replaced");
        TranscriptUpdate::Replaced
    }

    fn truncate_front(&mut self) {
        let overflow = self.len().saturating_sub(self.cap);
        if overflow == 0 {
            return;
        }
        // Drop whole characters, never split a boundary.
        let cut = self
            .text
            .char_indices()
            .nth(overflow)
            .map(|(idx, _)| idx)
            .unwrap_or(self.text.len());
        self.text.drain(..cut);
        tracing::trace!(dropped_chars = overflow, "front-truncated transcript window");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_within_cap() {
        let mut window = TranscriptWindow::new(20);
        window.append("hello world");
        assert_eq!(window.as_str(), "hello world");
        assert_eq!(window.len(), 11);
    }

    #[test]
    fn test_window_never_exceeds_cap() {
        let mut window = TranscriptWindow::new(10);
        for _ in 0..50 {
            window.append("abcdefg");
            assert!(window.len() <= 10);
        }
    }

    #[test]
    fn test_front_truncation_keeps_tail() {
        let mut window = TranscriptWindow::new(5);
        window.append("abcdefgh");
        assert_eq!(window.as_str(), "defgh");
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let mut window = TranscriptWindow::new(4);
        window.append("héllo wörld");
        assert_eq!(window.len(), 4);
        assert_eq!(window.as_str(), "örld");
    }

    #[test]
    fn test_apply_full_appends_remainder() {
        let mut window = TranscriptWindow::new(100);
        window.apply_full("open a window");
        let update = window.apply_full("open a window saying cheese");
        assert_eq!(update, TranscriptUpdate::Appended { delta_chars: 14 });
        assert_eq!(window.as_str(), "open a window saying cheese");
    }

    #[test]
    fn test_apply_full_identical_is_unchanged() {
        let mut window = TranscriptWindow::new(100);
        window.apply_full("open a window");
        let update = window.apply_full("open a window");
        assert_eq!(update, TranscriptUpdate::Unchanged);
    }

    #[test]
    fn test_apply_full_replaces_on_rewrite() {
        let mut window = TranscriptWindow::new(100);
        window.apply_full("close the window");
        let update = window.apply_full("open a new window");
        assert_eq!(update, TranscriptUpdate::Replaced);
        assert_eq!(window.as_str(), "open a new window");
    }

    #[test]
    fn test_apply_full_bounded_after_replacement() {
        let mut window = TranscriptWindow::new(8);
        let update = window.apply_full("a very long transcript");
        assert_eq!(update, TranscriptUpdate::Replaced);
        assert_eq!(window.len(), 8);
        assert_eq!(window.as_str(), "anscript");
    }

    #[test]
    fn test_contains_rejects_empty_needle() {
        let mut window = TranscriptWindow::new(100);
        window.append("open a window");
        assert!(window.contains("a window"));
        assert!(!window.contains(""));
    }
}
