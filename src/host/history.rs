//! Back/forward navigation history.

/// Browser-style session history: a list of entries and a cursor.
///
/// Visiting a new URL drops every entry ahead of the cursor.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<String>,
    cursor: Option<usize>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a navigation to `url` as the newest entry.
    ///
    /// Navigating to the URL already under the cursor does not add a
    /// duplicate entry.
    pub fn visit(&mut self, url: &str) {
        if self.current() == Some(url) {
            return;
        }
        let keep = self.cursor.map_or(0, |c| c + 1);
        self.entries.truncate(keep);
        self.entries.push(url.to_string());
        self.cursor = Some(self.entries.len() - 1);
    }

    pub fn current(&self) -> Option<&str> {
        self.cursor.map(|c| self.entries[c].as_str())
    }

    pub fn can_go_back(&self) -> bool {
        matches!(self.cursor, Some(c) if c > 0)
    }

    pub fn can_go_forward(&self) -> bool {
        matches!(self.cursor, Some(c) if c + 1 < self.entries.len())
    }

    /// Step back one entry and return it.
    pub fn back(&mut self) -> Option<&str> {
        if !self.can_go_back() {
            return None;
        }
        self.cursor = self.cursor.map(|c| c - 1);
        self.current()
    }

    /// Step forward one entry and return it.
    pub fn forward(&mut self) -> Option<&str> {
        if !self.can_go_forward() {
            return None;
        }
        self.cursor = self.cursor.map(|c| c + 1);
        self.current()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_history_cannot_navigate() {
        let mut history = History::new();
        assert!(history.is_empty());
        assert!(!history.can_go_back());
        assert!(!history.can_go_forward());
        assert_eq!(history.back(), None);
        assert_eq!(history.forward(), None);
        assert_eq!(history.current(), None);
    }

    #[test]
    fn back_and_forward_walk_entries() {
        let mut history = History::new();
        history.visit("a");
        history.visit("b");
        history.visit("c");

        assert_eq!(history.back(), Some("b"));
        assert_eq!(history.back(), Some("a"));
        assert!(!history.can_go_back());
        assert_eq!(history.forward(), Some("b"));
        assert_eq!(history.current(), Some("b"));
        assert!(history.can_go_forward());
    }

    #[test]
    fn visit_truncates_forward_entries() {
        let mut history = History::new();
        history.visit("a");
        history.visit("b");
        history.visit("c");
        history.back();
        history.back();

        history.visit("d");
        assert_eq!(history.len(), 2);
        assert!(!history.can_go_forward());
        assert_eq!(history.back(), Some("a"));
    }

    #[test]
    fn revisiting_current_entry_is_not_duplicated() {
        let mut history = History::new();
        history.visit("a");
        history.visit("a");
        assert_eq!(history.len(), 1);
        assert!(!history.can_go_back());
    }
}
