use crate::flatten::FlatRow;

/// Identity of a result across refreshes. Volatile fields such as queue
/// length and speed are deliberately left out.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowKey {
    pub username: String,
    pub filename: String,
    pub size: u64,
}

impl RowKey {
    pub fn of(row: &FlatRow) -> Self {
        Self {
            username: row.username.clone(),
            filename: row.file.filename.clone(),
            size: row.file.size,
        }
    }
}

fn row_keys(rows: &[FlatRow]) -> Vec<RowKey> {
    rows.iter().map(RowKey::of).collect()
}

/// Decides whether a freshly fetched row sequence needs a repaint by
/// comparing its ordered keys with what is on screen.
#[derive(Debug, Default)]
pub struct DiffEngine {
    snapshot: Vec<RowKey>,
}

impl DiffEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when `rows` differ from the rendered snapshot in
    /// content or order. The snapshot is replaced only when a repaint is
    /// required.
    pub fn evaluate(&mut self, rows: &[FlatRow]) -> bool {
        let keys = row_keys(rows);
        if keys == self.snapshot {
            return false;
        }
        self.snapshot = keys;
        true
    }

    /// Forgets the rendered snapshot. Must run whenever a new session starts
    /// so that its first results always paint.
    pub fn reset(&mut self) {
        self.snapshot.clear();
    }

    pub fn snapshot(&self) -> &[RowKey] {
        &self.snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Category;
    use crate::flatten::flatten_responses;
    use crate::flatten::tests::{file, responder};

    fn rows(names: &[&str]) -> Vec<FlatRow> {
        let files = names.iter().map(|n| file(n, 100)).collect();
        flatten_responses(&[responder("alice", files, vec![])], Category::All)
    }

    #[test]
    fn same_sequence_twice_does_not_repaint() {
        let mut diff = DiffEngine::new();
        let batch = rows(&["/a.mp3", "/b.mp3"]);

        assert!(diff.evaluate(&batch));
        assert!(!diff.evaluate(&batch));
    }

    #[test]
    fn reorder_alone_triggers_repaint() {
        let mut diff = DiffEngine::new();
        assert!(diff.evaluate(&rows(&["/a.mp3", "/b.mp3"])));
        assert!(diff.evaluate(&rows(&["/b.mp3", "/a.mp3"])));
    }

    #[test]
    fn volatile_fields_do_not_change_identity() {
        let mut diff = DiffEngine::new();
        let mut batch = rows(&["/a.mp3"]);
        assert!(diff.evaluate(&batch));

        batch[0].queue_length = 99;
        batch[0].upload_speed = 1;
        batch[0].has_free_upload_slot = false;
        assert!(!diff.evaluate(&batch));

        batch[0].file.size = 101;
        assert!(diff.evaluate(&batch));
    }

    #[test]
    fn reset_makes_identical_keys_repaint_again() {
        let mut diff = DiffEngine::new();
        let batch = rows(&["/music/song.mp3"]);
        assert!(diff.evaluate(&batch));

        diff.reset();

        assert!(diff.snapshot().is_empty());
        assert!(diff.evaluate(&batch));
        assert_eq!(diff.snapshot(), row_keys(&batch).as_slice());
    }
}
