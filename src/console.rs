use crate::flatten::FlatRow;
use crate::snapshot::RowKey;
use crate::view::{ListModel, ListView, ResultsView};
use std::io::Write;

/// Headless front-end: prints the whole list on every repaint and status
/// lines to stderr, so stdout only ever carries result rows.
pub struct ConsoleView<W: Write> {
    list: ListModel,
    out: W,
    last_status: String,
    pub repaints: usize,
    pub cycles: usize,
}

impl<W: Write> ConsoleView<W> {
    pub fn new(out: W) -> Self {
        Self {
            list: ListModel::new(),
            out,
            last_status: String::new(),
            repaints: 0,
            cycles: 0,
        }
    }

    pub(crate) fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ListView for ConsoleView<W> {
    fn render(&mut self, rows: &[FlatRow]) {
        self.list.render(rows);
    }

    fn selection(&self) -> Vec<RowKey> {
        self.list.selection()
    }

    fn set_selection(&mut self, keys: &[RowKey]) {
        self.list.set_selection(keys);
    }

    fn focus(&self) -> Option<RowKey> {
        self.list.focus()
    }

    fn set_focus(&mut self, key: &RowKey) {
        self.list.set_focus(key);
    }

    fn top_visible(&self) -> Option<RowKey> {
        self.list.top_visible()
    }

    fn ensure_visible(&mut self, key: &RowKey) {
        self.list.ensure_visible(key);
    }
}

impl<W: Write> ResultsView for ConsoleView<W> {
    fn on_rows_changed(&mut self, rows: &[FlatRow], repainted: bool) {
        self.cycles += 1;
        if !repainted || rows.is_empty() {
            return;
        }
        self.repaints += 1;
        for row in rows {
            let _ = writeln!(self.out, "{}", row.display_text());
        }
        let _ = writeln!(self.out);
        let _ = self.out.flush();
    }

    fn on_status(&mut self, message: &str) {
        if message != self.last_status {
            eprintln!("{message}");
            self.last_status = message.to_string();
        }
    }

    fn on_enqueue_result(&mut self, succeeded: usize, total: usize) {
        eprintln!("{succeeded}/{total} file(s) queued");
    }

    fn alert(&mut self) {
        eprint!("\x07");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Category;
    use crate::flatten::flatten_responses;
    use crate::flatten::tests::{file, responder};

    #[test]
    fn only_repaints_reach_stdout() {
        let rows = flatten_responses(
            &[responder("alice", vec![file("/music/a.mp3", 100)], vec![])],
            Category::All,
        );
        let mut view = ConsoleView::new(Vec::new());

        view.render(&rows);
        view.on_rows_changed(&rows, true);
        view.on_rows_changed(&rows, false);

        assert_eq!(view.repaints, 1);
        assert_eq!(view.cycles, 2);
        let text = String::from_utf8(view.into_inner()).expect("utf8");
        assert_eq!(text.lines().filter(|l| !l.is_empty()).count(), 1);
        assert!(text.starts_with("a.mp3; Size: 100; User: alice;"));
    }
}
