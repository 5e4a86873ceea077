//! Calls the engine makes against the remote search/transfer service.

use crate::flatten::{RawFile, RawResponder};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Lightweight search status, fetched without the response payload.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionState {
    pub id: String,
    pub search_text: String,
    pub state: String,
    pub is_complete: bool,
    pub response_count: u64,
    pub file_count: u64,
    pub locked_file_count: u64,
}

/// One file to queue for download from a given owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub filename: String,
    pub size: u64,
}

/// A remote directory listing node. Servers may or may not nest
/// subdirectories; both shapes are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteDirectory {
    pub name: String,
    pub files: Vec<RawFile>,
    pub directories: Vec<RemoteDirectory>,
}

pub trait SearchService: Send + Sync + 'static {
    /// Starts a server-side search and returns its identifier.
    fn start_search(&self, query: &str, timeout_ms: u64) -> Result<String>;
    fn session_state(&self, session_id: &str, include_responses: bool) -> Result<SessionState>;
    fn session_responses(&self, session_id: &str) -> Result<Vec<RawResponder>>;
    fn stop_session(&self, session_id: &str) -> Result<bool>;
    fn delete_session(&self, session_id: &str) -> Result<bool>;
    fn enqueue_transfers(&self, owner: &str, files: &[TransferRequest]) -> Result<bool>;
    fn directory_listing(&self, owner: &str, path: &str) -> Result<Vec<RemoteDirectory>>;
}
