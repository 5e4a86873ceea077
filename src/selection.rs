use crate::flatten::FlatRow;
use crate::snapshot::RowKey;
use crate::view::ListView;
use std::collections::HashSet;

/// Where the user was in the list before a repaint, by row identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    pub selected: Vec<RowKey>,
    pub focus: Option<RowKey>,
    pub top: Option<RowKey>,
}

impl SelectionState {
    pub fn capture(view: &dyn ListView) -> Self {
        let selected = view.selection();
        // Screen readers track the focused row; without one the first
        // selected row stands in.
        let focus = view.focus().or_else(|| selected.first().cloned());
        Self {
            selected,
            focus,
            top: view.top_visible(),
        }
    }

    /// Reapplies the captured state to a view that now shows `rows`.
    /// Returns the key that ends up focused, if any.
    pub fn restore(&self, view: &mut dyn ListView, rows: &[FlatRow]) -> Option<RowKey> {
        let present: HashSet<RowKey> = rows.iter().map(RowKey::of).collect();
        let wanted: HashSet<&RowKey> = self.selected.iter().collect();
        let reselected: Vec<RowKey> = rows
            .iter()
            .map(RowKey::of)
            .filter(|k| wanted.contains(k))
            .collect();
        view.set_selection(&reselected);

        let focus = self
            .focus
            .as_ref()
            .filter(|k| present.contains(*k))
            .or_else(|| reselected.first());
        if let Some(key) = focus {
            view.set_focus(key);
            view.ensure_visible(key);
            return Some(key.clone());
        }

        let first = rows.first().map(RowKey::of)?;
        view.set_selection(std::slice::from_ref(&first));
        view.set_focus(&first);
        // Keep the viewport where it was when the old top row survived.
        match self.top.as_ref().filter(|k| present.contains(*k)) {
            Some(top) => view.ensure_visible(top),
            None => view.ensure_visible(&first),
        }
        Some(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Category;
    use crate::flatten::flatten_responses;
    use crate::flatten::tests::{file, responder};
    use crate::view::ListModel;

    fn rows(names: &[&str]) -> Vec<FlatRow> {
        let files = names.iter().map(|n| file(n, 10)).collect();
        flatten_responses(&[responder("alice", files, vec![])], Category::All)
    }

    fn key(name: &str) -> RowKey {
        RowKey {
            username: "alice".into(),
            filename: name.into(),
            size: 10,
        }
    }

    fn repaint(view: &mut ListModel, next: &[FlatRow]) -> Option<RowKey> {
        let state = SelectionState::capture(view);
        view.render(next);
        state.restore(view, next)
    }

    #[test]
    fn focus_survives_reorder() {
        let mut view = ListModel::new();
        view.render(&rows(&["/a", "/b", "/c"]));
        view.click(1);

        let focused = repaint(&mut view, &rows(&["/c", "/b", "/a", "/d"]));

        assert_eq!(focused, Some(key("/b")));
        assert_eq!(view.focused_index(), Some(1));
        assert_eq!(view.selection(), vec![key("/b")]);
    }

    #[test]
    fn focus_falls_back_to_remaining_selected_row() {
        let mut view = ListModel::new();
        view.render(&rows(&["/a", "/b", "/c"]));
        view.toggle(1);
        view.toggle(0);
        assert_eq!(view.focus(), Some(key("/a")));

        let focused = repaint(&mut view, &rows(&["/b", "/c"]));

        assert_eq!(focused, Some(key("/b")));
        assert_eq!(view.selection(), vec![key("/b")]);
        assert_eq!(view.focused_index(), Some(0));
    }

    #[test]
    fn first_row_is_selected_when_nothing_survives() {
        let mut view = ListModel::new();
        view.render(&rows(&["/a", "/b"]));
        view.toggle(0);
        view.toggle(1);

        let focused = repaint(&mut view, &rows(&["/x", "/y"]));

        assert_eq!(focused, Some(key("/x")));
        assert_eq!(view.selection(), vec![key("/x")]);
        assert_eq!(view.focused_index(), Some(0));
    }

    #[test]
    fn first_render_selects_first_row() {
        let mut view = ListModel::new();
        let focused = repaint(&mut view, &rows(&["/a"]));
        assert_eq!(focused, Some(key("/a")));
        assert_eq!(view.take_scroll_request(), Some(0));
    }

    #[test]
    fn top_row_anchors_scroll_while_first_row_takes_focus() {
        let mut view = ListModel::new();
        view.render(&rows(&["/a", "/b", "/c"]));
        view.set_top(2);

        let focused = repaint(&mut view, &rows(&["/new", "/a", "/b", "/c"]));

        assert_eq!(focused, Some(key("/new")));
        assert_eq!(view.selection(), vec![key("/new")]);
        assert_eq!(view.focused_index(), Some(0));
        assert_eq!(view.take_scroll_request(), Some(3));
    }

    #[test]
    fn surviving_top_row_still_leaves_a_focused_row() {
        let mut view = ListModel::new();
        view.render(&rows(&["/top", "/a", "/b"]));
        view.toggle(2);
        view.toggle(1);
        view.set_top(0);
        assert_eq!(view.focus(), Some(key("/a")));

        let focused = repaint(&mut view, &rows(&["/top", "/c"]));

        assert_eq!(focused, Some(key("/top")));
        assert_eq!(view.selection(), vec![key("/top")]);
        assert_eq!(view.focused_index(), Some(0));
        assert_eq!(view.take_scroll_request(), Some(0));
    }

    #[test]
    fn empty_repaint_leaves_no_focus() {
        let mut view = ListModel::new();
        view.render(&rows(&["/a"]));
        view.click(0);

        assert_eq!(repaint(&mut view, &[]), None);
        assert!(view.selection().is_empty());
    }
}
