//! Presentation boundary. The engine only talks to the screen through these
//! traits so it has no dependency on a concrete toolkit.

use crate::flatten::FlatRow;
use crate::snapshot::RowKey;
use std::collections::HashSet;

/// List capability: the handful of operations needed to repaint a result
/// list without losing the user's place in it.
pub trait ListView {
    fn render(&mut self, rows: &[FlatRow]);
    /// Selected keys in display order.
    fn selection(&self) -> Vec<RowKey>;
    fn set_selection(&mut self, keys: &[RowKey]);
    fn focus(&self) -> Option<RowKey>;
    fn set_focus(&mut self, key: &RowKey);
    fn top_visible(&self) -> Option<RowKey>;
    fn ensure_visible(&mut self, key: &RowKey);
}

/// Everything the engine reports back to the presentation layer.
pub trait ResultsView: ListView {
    /// Called after every poll cycle, whether or not a repaint happened.
    fn on_rows_changed(&mut self, rows: &[FlatRow], repainted: bool);
    fn on_status(&mut self, message: &str);
    fn on_enqueue_result(&mut self, succeeded: usize, total: usize);
    /// Audible cue that accompanies error statuses.
    fn alert(&mut self) {}
}

/// Toolkit-independent list state shared by the GUI and console front-ends.
#[derive(Debug, Default)]
pub struct ListModel {
    rows: Vec<FlatRow>,
    selected: HashSet<RowKey>,
    focus: Option<usize>,
    top: usize,
    scroll_request: Option<usize>,
}

impl ListModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[FlatRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn index_of(&self, key: &RowKey) -> Option<usize> {
        self.rows.iter().position(|r| RowKey::of(r) == *key)
    }

    pub fn is_selected(&self, index: usize) -> bool {
        self.rows
            .get(index)
            .is_some_and(|r| self.selected.contains(&RowKey::of(r)))
    }

    pub fn focused_index(&self) -> Option<usize> {
        self.focus
    }

    pub fn selected_rows(&self) -> Vec<FlatRow> {
        self.rows
            .iter()
            .filter(|r| self.selected.contains(&RowKey::of(r)))
            .cloned()
            .collect()
    }

    /// Plain click: select only this row and move focus to it.
    pub fn click(&mut self, index: usize) {
        let Some(row) = self.rows.get(index) else {
            return;
        };
        self.selected.clear();
        self.selected.insert(RowKey::of(row));
        self.focus = Some(index);
        self.scroll_request = Some(index);
    }

    /// Ctrl+click / Space: flip selection of a row, keep focus on it.
    pub fn toggle(&mut self, index: usize) {
        let Some(row) = self.rows.get(index) else {
            return;
        };
        let key = RowKey::of(row);
        if !self.selected.remove(&key) {
            self.selected.insert(key);
        }
        self.focus = Some(index);
    }

    /// Arrow keys: move focus and selection together.
    pub fn move_focus(&mut self, delta: isize) {
        if self.rows.is_empty() {
            return;
        }
        let max_index = self.rows.len() - 1;
        let current = self.focus.unwrap_or(0) as isize;
        let next = (current + delta).clamp(0, max_index as isize) as usize;
        self.click(next);
    }

    pub fn set_top(&mut self, index: usize) {
        self.top = index.min(self.rows.len().saturating_sub(1));
    }

    /// Row the front-end should scroll to on its next frame.
    pub fn take_scroll_request(&mut self) -> Option<usize> {
        self.scroll_request.take()
    }
}

impl ListView for ListModel {
    fn render(&mut self, rows: &[FlatRow]) {
        self.rows = rows.to_vec();
        self.selected.clear();
        self.focus = None;
        self.top = 0;
        self.scroll_request = None;
    }

    fn selection(&self) -> Vec<RowKey> {
        self.rows
            .iter()
            .map(RowKey::of)
            .filter(|k| self.selected.contains(k))
            .collect()
    }

    fn set_selection(&mut self, keys: &[RowKey]) {
        self.selected = keys
            .iter()
            .filter(|k| self.index_of(k).is_some())
            .cloned()
            .collect();
    }

    fn focus(&self) -> Option<RowKey> {
        self.focus.and_then(|i| self.rows.get(i)).map(RowKey::of)
    }

    fn set_focus(&mut self, key: &RowKey) {
        if let Some(index) = self.index_of(key) {
            self.focus = Some(index);
        }
    }

    fn top_visible(&self) -> Option<RowKey> {
        self.rows.get(self.top).map(RowKey::of)
    }

    fn ensure_visible(&mut self, key: &RowKey) {
        if let Some(index) = self.index_of(key) {
            self.scroll_request = Some(index);
        }
    }
}
