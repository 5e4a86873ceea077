use crate::filter::Category;
use serde::{Deserialize, Serialize};

/// One file inside a responder entry, as returned by the search service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawFile {
    pub filename: String,
    pub size: u64,
    pub length: Option<u64>,
    pub bit_rate: Option<u32>,
    pub bit_depth: Option<u32>,
    pub sample_rate: Option<u32>,
}

/// One per-user entry of a search response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawResponder {
    pub username: String,
    pub queue_length: u64,
    pub upload_speed: u64,
    pub has_free_upload_slot: bool,
    pub files: Vec<RawFile>,
    pub locked_files: Vec<RawFile>,
}

/// A single file result denormalized with its responder's metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatRow {
    pub username: String,
    pub queue_length: u64,
    pub upload_speed: u64,
    pub has_free_upload_slot: bool,
    pub file: RawFile,
    pub locked: bool,
}

impl FlatRow {
    pub fn filename(&self) -> &str {
        &self.file.filename
    }

    pub fn size(&self) -> u64 {
        self.file.size
    }

    /// Folder part of the remote path including the trailing separator, and
    /// the bare file name. Remote paths may use either `\` or `/`.
    pub fn split_path(&self) -> (&str, &str) {
        let full = self.file.filename.as_str();
        match full.rfind(['\\', '/']) {
            Some(pos) => (&full[..=pos], &full[pos + 1..]),
            None => ("", full),
        }
    }

    /// Containing directory without the trailing separator, if any.
    pub fn containing_directory(&self) -> Option<&str> {
        let full = self.file.filename.as_str();
        let pos = full.rfind(['\\', '/'])?;
        let dir = &full[..pos];
        if dir.is_empty() {
            None
        } else {
            Some(dir)
        }
    }

    /// Single-line description read out by screen readers.
    pub fn display_text(&self) -> String {
        let (folder, name) = self.split_path();
        let mut parts = vec![
            name.to_string(),
            format!("Size: {}", self.file.size),
            format!("User: {}", self.username),
            format!("Queue: {}", self.queue_length),
            format!(
                "Slot Free: {}",
                if self.has_free_upload_slot { "Yes" } else { "No" }
            ),
            format!("Speed: {}", self.upload_speed),
        ];
        if let Some(length) = self.file.length {
            parts.push(format!("Length(s): {length}"));
        }
        if let Some(bit_rate) = self.file.bit_rate {
            parts.push(format!("Bitrate: {bit_rate}"));
        }
        if let Some(bit_depth) = self.file.bit_depth {
            parts.push(format!("BitDepth: {bit_depth}"));
        }
        if let Some(sample_rate) = self.file.sample_rate {
            parts.push(format!("SampleRate: {sample_rate}"));
        }
        parts.push(format!("Locked: {}", if self.locked { "Yes" } else { "No" }));
        if !folder.is_empty() {
            parts.push(format!("Folder: {folder}"));
        }
        parts.join("; ")
    }
}

/// Flattens responders into rows, regular files before locked files, keeping
/// the service's responder order. Rows whose filename does not match
/// `category` are dropped.
pub fn flatten_responses(responders: &[RawResponder], category: Category) -> Vec<FlatRow> {
    let mut out = Vec::new();
    for responder in responders {
        let regular = responder.files.iter().map(|f| (f, false));
        let locked = responder.locked_files.iter().map(|f| (f, true));
        for (file, locked) in regular.chain(locked) {
            if !category.matches(&file.filename) {
                continue;
            }
            out.push(FlatRow {
                username: responder.username.clone(),
                queue_length: responder.queue_length,
                upload_speed: responder.upload_speed,
                has_free_upload_slot: responder.has_free_upload_slot,
                file: file.clone(),
                locked,
            });
        }
    }
    out
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn file(name: &str, size: u64) -> RawFile {
        RawFile {
            filename: name.to_string(),
            size,
            ..RawFile::default()
        }
    }

    pub(crate) fn responder(user: &str, files: Vec<RawFile>, locked: Vec<RawFile>) -> RawResponder {
        RawResponder {
            username: user.to_string(),
            queue_length: 3,
            upload_speed: 1024,
            has_free_upload_slot: true,
            files,
            locked_files: locked,
        }
    }

    #[test]
    fn keeps_responder_order_and_puts_locked_files_last() {
        let responses = vec![
            responder(
                "alice",
                vec![file("/music/a.mp3", 100), file("/music/b.mp3", 200)],
                vec![file("/music/secret.mp3", 300)],
            ),
            responder("bob", vec![file("C:\\share\\c.flac", 400)], vec![]),
        ];

        let rows = flatten_responses(&responses, Category::All);

        let names: Vec<&str> = rows.iter().map(|r| r.filename()).collect();
        assert_eq!(
            names,
            ["/music/a.mp3", "/music/b.mp3", "/music/secret.mp3", "C:\\share\\c.flac"]
        );
        assert_eq!(
            rows.iter().map(|r| r.locked).collect::<Vec<_>>(),
            [false, false, true, false]
        );
        assert_eq!(rows[3].username, "bob");
        assert_eq!(rows[0].queue_length, 3);
        assert!(rows[0].has_free_upload_slot);
    }

    #[test]
    fn category_filter_drops_non_matching_files() {
        let responses = vec![responder(
            "alice",
            vec![file("/x/movie.MKV", 1), file("/x/song.mp3", 2)],
            vec![file("/x/other.avi", 3)],
        )];

        let rows = flatten_responses(&responses, Category::Videos);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].filename(), "/x/movie.MKV");
        assert!(rows[1].locked);
    }

    #[test]
    fn deserializes_service_payload_with_missing_fields() {
        let json = r#"[{
            "username": "alice",
            "queueLength": 2,
            "uploadSpeed": 5000,
            "hasFreeUploadSlot": true,
            "fileCount": 1,
            "files": [{"filename": "@@abc\\Music\\a.mp3", "size": 100, "bitRate": 320, "length": 180}]
        }]"#;
        let parsed: Vec<RawResponder> = serde_json::from_str(json).expect("parse");
        assert_eq!(parsed[0].files[0].bit_rate, Some(320));
        assert!(parsed[0].locked_files.is_empty());
    }

    #[test]
    fn display_text_lists_fields_in_reading_order() {
        let mut f = file("@@abc\\Music\\a.mp3", 100);
        f.bit_rate = Some(320);
        let rows = flatten_responses(&[responder("alice", vec![f], vec![])], Category::All);

        assert_eq!(
            rows[0].display_text(),
            "a.mp3; Size: 100; User: alice; Queue: 3; Slot Free: Yes; Speed: 1024; \
             Bitrate: 320; Locked: No; Folder: @@abc\\Music\\"
        );
    }

    #[test]
    fn containing_directory_handles_both_separators() {
        let rows = flatten_responses(
            &[responder(
                "u",
                vec![file("@@x\\A\\b.mp3", 1), file("/a/b/c.mp3", 1), file("bare.mp3", 1)],
                vec![],
            )],
            Category::All,
        );
        assert_eq!(rows[0].containing_directory(), Some("@@x\\A"));
        assert_eq!(rows[1].containing_directory(), Some("/a/b"));
        assert_eq!(rows[2].containing_directory(), None);
    }
}
