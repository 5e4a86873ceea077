use crate::error::{SearchError, SearchResult};
use crate::filter::Category;
use crate::service::SearchService;
use tracing::{info, warn};

/// Server-side searches shorter than this silently truncate results.
pub const MIN_SEARCH_TIMEOUT_MS: u64 = 30 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Pending,
    Active,
    Stopped,
}

/// Immutable identity of one remote search. Every background operation
/// carries a clone, and its result is accepted only while the id is still
/// current.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSession {
    pub id: String,
    pub query: String,
    pub category: Category,
    pub timeout_ms: u64,
    pub phase: SessionPhase,
}

/// A validated search that has not been submitted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub request_id: u64,
    pub query: String,
    pub category: Category,
    pub timeout_ms: u64,
}

/// Requested timeout clamped up to [`MIN_SEARCH_TIMEOUT_MS`]; absent or
/// non-positive values use the floor.
pub fn effective_timeout_ms(requested: Option<i64>) -> u64 {
    match requested {
        Some(ms) if ms > 0 => (ms as u64).max(MIN_SEARCH_TIMEOUT_MS),
        _ => MIN_SEARCH_TIMEOUT_MS,
    }
}

/// Submits a prepared request. Runs on a background thread.
pub fn submit<S: SearchService + ?Sized>(
    service: &S,
    request: &SearchRequest,
) -> SearchResult<SearchSession> {
    let id = service
        .start_search(&request.query, request.timeout_ms)
        .map_err(|err| SearchError::RemoteUnavailable(format!("{err:#}")))?;
    info!(session_id = %id, query = %request.query, timeout_ms = request.timeout_ms, "search started");
    Ok(SearchSession {
        id,
        query: request.query.clone(),
        category: request.category,
        timeout_ms: request.timeout_ms,
        phase: SessionPhase::Active,
    })
}

/// Best-effort stop. Returns a status line; never fails.
pub fn stop<S: SearchService + ?Sized>(service: &S, session: &SearchSession) -> String {
    match service.stop_session(&session.id) {
        Ok(true) => format!("Stopped search \"{}\".", session.query),
        Ok(false) => format!("Search \"{}\" was already stopped.", session.query),
        Err(err) => {
            warn!(session_id = %session.id, error = %err, "stop failed");
            format!("Could not stop search \"{}\": {err}", session.query)
        }
    }
}

/// Best-effort delete. Returns a status line; never fails.
pub fn delete<S: SearchService + ?Sized>(service: &S, session: &SearchSession) -> String {
    match service.delete_session(&session.id) {
        Ok(true) => format!("Removed search \"{}\".", session.query),
        Ok(false) => format!("Search \"{}\" had already expired.", session.query),
        Err(err) => {
            warn!(session_id = %session.id, error = %err, "delete failed");
            format!("Could not remove search \"{}\": {err}", session.query)
        }
    }
}

/// Owns which session is current and which start request is outstanding.
#[derive(Debug)]
pub struct SearchSessionManager {
    requested_timeout_ms: Option<i64>,
    current: Option<SearchSession>,
    pending_request_id: Option<u64>,
    next_request_id: u64,
}

impl SearchSessionManager {
    pub fn new(requested_timeout_ms: Option<i64>) -> Self {
        Self {
            requested_timeout_ms,
            current: None,
            pending_request_id: None,
            next_request_id: 1,
        }
    }

    pub fn set_requested_timeout(&mut self, requested_timeout_ms: Option<i64>) {
        self.requested_timeout_ms = requested_timeout_ms;
    }

    /// Validates the query and reserves a request id. The previous session,
    /// if any, stays current until the new one is activated.
    pub fn prepare(&mut self, query: &str, category: Category) -> SearchResult<SearchRequest> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::InvalidQuery);
        }
        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.saturating_add(1);
        self.pending_request_id = Some(request_id);
        Ok(SearchRequest {
            request_id,
            query: query.to_string(),
            category,
            timeout_ms: effective_timeout_ms(self.requested_timeout_ms),
        })
    }

    /// `false` once a newer request has been prepared or the session was
    /// discarded; the outcome of such a request must be dropped.
    pub fn is_pending(&self, request_id: u64) -> bool {
        self.pending_request_id == Some(request_id)
    }

    /// Applies the outcome of the pending request. A failure leaves no
    /// session current.
    pub fn complete(&mut self, outcome: SearchResult<SearchSession>) -> SearchResult<SearchSession> {
        self.pending_request_id = None;
        match outcome {
            Ok(session) => {
                self.current = Some(session.clone());
                Ok(session)
            }
            Err(err) => {
                self.current = None;
                Err(err)
            }
        }
    }

    /// Synchronous start: validate, submit and activate in one call.
    pub fn start<S: SearchService + ?Sized>(
        &mut self,
        service: &S,
        query: &str,
        category: Category,
        requested_timeout_ms: Option<i64>,
    ) -> SearchResult<SearchSession> {
        self.requested_timeout_ms = requested_timeout_ms;
        let request = self.prepare(query, category)?;
        let outcome = submit(service, &request);
        self.complete(outcome)
    }

    pub fn current(&self) -> Option<&SearchSession> {
        self.current.as_ref()
    }

    pub fn is_current(&self, session_id: &str) -> bool {
        self.current.as_ref().is_some_and(|s| s.id == session_id)
    }

    pub fn start_pending(&self) -> bool {
        self.pending_request_id.is_some()
    }

    /// Marks the current session stopped and hands it back for the remote
    /// stop call.
    pub fn mark_stopped(&mut self) -> Option<SearchSession> {
        let session = self.current.as_mut()?;
        session.phase = SessionPhase::Stopped;
        Some(session.clone())
    }

    /// Drops the current session; its in-flight results become stale.
    pub fn discard(&mut self) -> Option<SearchSession> {
        self.pending_request_id = None;
        self.current.take()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::flatten::RawResponder;
    use crate::service::{RemoteDirectory, SessionState, TransferRequest};
    use anyhow::{anyhow, Result};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted in-memory service shared by the engine tests.
    #[derive(Default)]
    pub(crate) struct FakeService {
        pub(crate) started: Mutex<Vec<(String, u64)>>,
        pub(crate) start_fails: Mutex<bool>,
        pub(crate) responses: Mutex<Vec<RawResponder>>,
        pub(crate) fetch_fails: Mutex<bool>,
        pub(crate) fetches: AtomicUsize,
        pub(crate) stopped: Mutex<Vec<String>>,
        pub(crate) deleted: Mutex<Vec<String>>,
        pub(crate) rejecting_owners: Mutex<Vec<String>>,
        pub(crate) enqueued: Mutex<Vec<(String, Vec<TransferRequest>)>>,
        pub(crate) directories: Mutex<HashMap<(String, String), Vec<RemoteDirectory>>>,
        pub(crate) fetch_gate: Mutex<Option<std::sync::mpsc::Receiver<()>>>,
    }

    impl FakeService {
        pub(crate) fn set_responses(&self, responses: Vec<RawResponder>) {
            *self.responses.lock().expect("lock") = responses;
        }
    }

    impl SearchService for FakeService {
        fn start_search(&self, query: &str, timeout_ms: u64) -> Result<String> {
            if *self.start_fails.lock().expect("lock") {
                return Err(anyhow!("connection refused"));
            }
            let mut started = self.started.lock().expect("lock");
            started.push((query.to_string(), timeout_ms));
            Ok(format!("S{}", started.len()))
        }

        fn session_state(&self, session_id: &str, include_responses: bool) -> Result<SessionState> {
            assert!(!include_responses);
            if let Some(gate) = self.fetch_gate.lock().expect("lock").as_ref() {
                let _ = gate.recv();
            }
            if *self.fetch_fails.lock().expect("lock") {
                return Err(anyhow!("timed out"));
            }
            Ok(SessionState {
                id: session_id.to_string(),
                state: "InProgress".into(),
                ..SessionState::default()
            })
        }

        fn session_responses(&self, _session_id: &str) -> Result<Vec<RawResponder>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.responses.lock().expect("lock").clone())
        }

        fn stop_session(&self, session_id: &str) -> Result<bool> {
            self.stopped.lock().expect("lock").push(session_id.to_string());
            Ok(true)
        }

        fn delete_session(&self, session_id: &str) -> Result<bool> {
            self.deleted.lock().expect("lock").push(session_id.to_string());
            Err(anyhow!("404 not found"))
        }

        fn enqueue_transfers(&self, owner: &str, files: &[TransferRequest]) -> Result<bool> {
            if self.rejecting_owners.lock().expect("lock").iter().any(|o| o == owner) {
                return Ok(false);
            }
            self.enqueued
                .lock()
                .expect("lock")
                .push((owner.to_string(), files.to_vec()));
            Ok(true)
        }

        fn directory_listing(&self, owner: &str, path: &str) -> Result<Vec<RemoteDirectory>> {
            self.directories
                .lock()
                .expect("lock")
                .get(&(owner.to_string(), path.to_string()))
                .cloned()
                .ok_or_else(|| anyhow!("user {owner} is offline"))
        }
    }

    #[test]
    fn timeout_is_clamped_up_to_thirty_minutes() {
        assert_eq!(effective_timeout_ms(Some(5000)), 1_800_000);
        assert_eq!(effective_timeout_ms(Some(5_000_000)), 5_000_000);
        assert_eq!(effective_timeout_ms(Some(0)), 1_800_000);
        assert_eq!(effective_timeout_ms(Some(-1)), 1_800_000);
        assert_eq!(effective_timeout_ms(None), 1_800_000);
    }

    #[test]
    fn start_submits_effective_timeout() {
        let service = FakeService::default();
        let mut manager = SearchSessionManager::new(None);

        let session = manager
            .start(&service, "  foo  ", Category::Audio, Some(5000))
            .expect("start");

        assert_eq!(session.id, "S1");
        assert_eq!(session.query, "foo");
        assert_eq!(session.timeout_ms, 1_800_000);
        assert_eq!(session.phase, SessionPhase::Active);
        assert_eq!(*service.started.lock().expect("lock"), [("foo".to_string(), 1_800_000)]);
        assert!(manager.is_current("S1"));
    }

    #[test]
    fn blank_query_is_rejected_before_any_remote_call() {
        let service = FakeService::default();
        let mut manager = SearchSessionManager::new(None);

        let err = manager.start(&service, "   ", Category::All, None).unwrap_err();

        assert_eq!(err, SearchError::InvalidQuery);
        assert!(service.started.lock().expect("lock").is_empty());
    }

    #[test]
    fn failed_submission_leaves_no_current_session() {
        let service = FakeService::default();
        let mut manager = SearchSessionManager::new(None);
        manager.start(&service, "first", Category::All, None).expect("start");
        *service.start_fails.lock().expect("lock") = true;

        let err = manager.start(&service, "second", Category::All, None).unwrap_err();

        assert!(matches!(err, SearchError::RemoteUnavailable(ref m) if m.contains("refused")));
        assert!(manager.current().is_none());
    }

    #[test]
    fn superseded_start_outcome_is_ignored() {
        let service = FakeService::default();
        let mut manager = SearchSessionManager::new(None);
        let old = manager.prepare("old", Category::All).expect("prepare");
        let new = manager.prepare("new", Category::All).expect("prepare");

        assert!(!manager.is_pending(old.request_id));
        assert!(manager.is_pending(new.request_id));
        let superseded = submit(&service, &old).expect("old started");
        let session = manager.complete(submit(&service, &new)).expect("started");

        assert_eq!(superseded.id, "S1");
        assert_eq!(session.id, "S2");
        assert_eq!(manager.current().map(|s| s.query.as_str()), Some("new"));
        assert!(!manager.is_current(&superseded.id));
        assert!(manager.is_current(&session.id));
    }

    #[test]
    fn stop_and_delete_swallow_failures() {
        let service = FakeService::default();
        let mut manager = SearchSessionManager::new(None);
        manager.start(&service, "foo", Category::All, None).expect("start");
        let session = manager.mark_stopped().expect("session");
        assert_eq!(session.phase, SessionPhase::Stopped);

        assert_eq!(stop(&service, &session), "Stopped search \"foo\".");
        assert!(delete(&service, &session).starts_with("Could not remove search"));
        assert_eq!(*service.deleted.lock().expect("lock"), ["S1"]);
    }
}
