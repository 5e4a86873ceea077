use crate::error::SearchError;
use crate::flatten::{FlatRow, RawFile};
use crate::service::{RemoteDirectory, SearchService, TransferRequest};
use anyhow::Result;
use std::collections::HashMap;
use tracing::warn;

/// Per-owner batches in the order owners first appear in the selection.
pub type OwnerBatches = Vec<(String, Vec<TransferRequest>)>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnqueueReport {
    pub succeeded: usize,
    pub total: usize,
    pub failed_owners: Vec<String>,
}

impl EnqueueReport {
    pub fn status(&self) -> String {
        format!("Enqueued {}/{} file(s).", self.succeeded, self.total)
    }

    /// Partial success is reported, never escalated further than this.
    pub fn into_result(self) -> std::result::Result<Self, SearchError> {
        if self.failed_owners.is_empty() {
            Ok(self)
        } else {
            Err(SearchError::PartialEnqueueFailure {
                succeeded: self.succeeded,
                total: self.total,
            })
        }
    }
}

pub fn group_by_owner(rows: &[FlatRow]) -> OwnerBatches {
    let mut order: HashMap<&str, usize> = HashMap::new();
    let mut out: OwnerBatches = Vec::new();
    for row in rows {
        let slot = *order.entry(row.username.as_str()).or_insert_with(|| {
            out.push((row.username.clone(), Vec::new()));
            out.len() - 1
        });
        out[slot].1.push(TransferRequest {
            filename: row.file.filename.clone(),
            size: row.file.size,
        });
    }
    out
}

/// Every listed row owned by the first selected row's user.
pub fn all_from_same_user(selected: &[FlatRow], listed: &[FlatRow]) -> Vec<FlatRow> {
    let Some(first) = selected.first() else {
        return Vec::new();
    };
    listed
        .iter()
        .filter(|r| r.username == first.username)
        .cloned()
        .collect()
}

/// Submits one batch per owner. A rejected or failed batch only affects
/// its own owner's count.
pub fn submit_batches<S: SearchService + ?Sized>(service: &S, batches: &OwnerBatches) -> EnqueueReport {
    let mut report = EnqueueReport::default();
    for (owner, files) in batches {
        if files.is_empty() {
            continue;
        }
        report.total += files.len();
        match service.enqueue_transfers(owner, files) {
            Ok(true) => report.succeeded += files.len(),
            Ok(false) => {
                warn!(owner = %owner, files = files.len(), "enqueue rejected");
                report.failed_owners.push(owner.clone());
            }
            Err(err) => {
                warn!(owner = %owner, error = %err, "enqueue failed");
                report.failed_owners.push(owner.clone());
            }
        }
    }
    report
}

fn full_remote_path(directory: &str, file: &RawFile) -> String {
    let name = file.filename.as_str();
    if name.starts_with('\\') || name.starts_with('/') || name.contains(':') {
        return name.to_string();
    }
    let sep = if directory.contains('\\') { '\\' } else { '/' };
    format!("{}{sep}{name}", directory.trim_end_matches(['\\', '/']))
}

fn walk_listing(
    node: &RemoteDirectory,
    directory: &str,
    cap: Option<usize>,
    out: &mut Vec<TransferRequest>,
) {
    // Listings name each node by its full remote path; fall back to the
    // requested directory when the server leaves it blank.
    let base = if node.name.is_empty() {
        directory
    } else {
        node.name.as_str()
    };
    for file in &node.files {
        if cap.is_some_and(|c| out.len() >= c) {
            return;
        }
        out.push(TransferRequest {
            filename: full_remote_path(base, file),
            size: file.size,
        });
    }
    for sub in &node.directories {
        walk_listing(sub, base, cap, out);
    }
}

/// Flattens a recursive listing into transfer requests, stopping at `cap`
/// files when one is given.
pub fn collect_directory_files(
    listing: &[RemoteDirectory],
    directory: &str,
    cap: Option<usize>,
) -> Vec<TransferRequest> {
    let mut out = Vec::new();
    for node in listing {
        walk_listing(node, directory, cap, &mut out);
    }
    out
}

/// Enqueues everything under `directory` on `owner`'s share. An empty
/// listing enqueues nothing and is not an error.
pub fn enqueue_directory<S: SearchService + ?Sized>(
    service: &S,
    owner: &str,
    directory: &str,
    cap: Option<usize>,
) -> Result<EnqueueReport> {
    let listing = service.directory_listing(owner, directory)?;
    let files = collect_directory_files(&listing, directory, cap);
    if files.is_empty() {
        return Ok(EnqueueReport::default());
    }
    Ok(submit_batches(service, &vec![(owner.to_string(), files)]))
}
