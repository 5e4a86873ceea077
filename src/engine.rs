//! Interactive-context owner of a search panel.
//!
//! Background threads do the network calls and post [`EngineEvent`]s back
//! over a channel; only [`SearchEngine::pump`] (called from the interactive
//! thread) mutates rendering state.

use crate::config::AppConfig;
use crate::enqueue::{
    all_from_same_user, enqueue_directory, group_by_owner, submit_batches, EnqueueReport,
};
use crate::error::SearchError;
use crate::filter::Category;
use crate::flatten::FlatRow;
use crate::poller::{fetch_cycle, CycleReport, PollingScheduler};
use crate::selection::SelectionState;
use crate::service::{SearchService, SessionState};
use crate::session::{self, SearchSession, SearchSessionManager};
use crate::snapshot::{DiffEngine, RowKey};
use crate::view::{ListView, ResultsView};
use std::collections::HashSet;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub auto_update: bool,
    pub interval_secs: u64,
    pub requested_timeout_ms: Option<i64>,
    /// Upper bound on files queued by "download containing directory".
    pub directory_cap: Option<usize>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            auto_update: true,
            interval_secs: crate::poller::DEFAULT_INTERVAL_SECS,
            requested_timeout_ms: None,
            directory_cap: None,
        }
    }
}

impl From<&AppConfig> for EngineSettings {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            auto_update: cfg.search_auto_update,
            interval_secs: cfg.search_interval_sec,
            requested_timeout_ms: Some(cfg.search_timeout_ms),
            directory_cap: None,
        }
    }
}

enum EngineEvent {
    SearchStarted {
        request_id: u64,
        outcome: Result<SearchSession, SearchError>,
    },
    CycleFinished {
        session_id: String,
        outcome: Result<CycleReport, String>,
    },
    EnqueueFinished {
        report: EnqueueReport,
    },
    DirectoryEnqueued {
        outcome: Result<EnqueueReport, String>,
    },
    Status(String),
}

pub struct SearchEngine<S: SearchService> {
    service: Arc<S>,
    sessions: SearchSessionManager,
    poller: PollingScheduler,
    diff: DiffEngine,
    category: Category,
    rows: Vec<FlatRow>,
    last_state: Option<SessionState>,
    directory_cap: Option<usize>,
    initial_fetch_pending: bool,
    closed: bool,
    status: String,
    tx: Sender<EngineEvent>,
    rx: Receiver<EngineEvent>,
}

impl<S: SearchService> SearchEngine<S> {
    pub fn new(service: Arc<S>, settings: EngineSettings) -> Self {
        let (tx, rx) = mpsc::channel::<EngineEvent>();
        Self {
            service,
            sessions: SearchSessionManager::new(settings.requested_timeout_ms),
            poller: PollingScheduler::new(settings.interval_secs, settings.auto_update),
            diff: DiffEngine::new(),
            category: Category::All,
            rows: Vec::new(),
            last_state: None,
            directory_cap: settings.directory_cap,
            initial_fetch_pending: false,
            closed: false,
            status: String::new(),
            tx,
            rx,
        }
    }

    pub fn rows(&self) -> &[FlatRow] {
        &self.rows
    }

    pub fn current_session(&self) -> Option<&SearchSession> {
        self.sessions.current()
    }

    pub fn last_state(&self) -> Option<&SessionState> {
        self.last_state.as_ref()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn poller(&self) -> &PollingScheduler {
        &self.poller
    }

    /// `true` while a start request or fetch cycle is outstanding.
    pub fn is_busy(&self) -> bool {
        self.sessions.start_pending() || self.poller.in_flight()
    }

    fn report<V: ResultsView>(&mut self, view: &mut V, message: impl Into<String>) {
        self.status = message.into();
        view.on_status(&self.status);
    }

    fn report_error<V: ResultsView>(&mut self, view: &mut V, err: SearchError) {
        debug!(error = %err, "reporting failure");
        self.report(view, err.to_string());
        view.alert();
    }

    /// Validates `query` and starts a new remote search in the background.
    /// Results of the previous session stop being accepted once the new one
    /// is active.
    pub fn submit_search<V: ResultsView>(
        &mut self,
        query: &str,
        view: &mut V,
    ) -> Result<(), SearchError> {
        let request = match self.sessions.prepare(query, self.category) {
            Ok(request) => request,
            Err(err) => {
                self.report_error(view, err.clone());
                return Err(err);
            }
        };
        self.closed = false;
        self.report(view, format!("Searching ({})…", self.category));

        let service = Arc::clone(&self.service);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let outcome = session::submit(&*service, &request);
            let event = EngineEvent::SearchStarted {
                request_id: request.request_id,
                outcome,
            };
            // Engine already dropped: nobody else will clean this one up.
            if let Err(mpsc::SendError(EngineEvent::SearchStarted {
                outcome: Ok(orphan),
                ..
            })) = tx.send(event)
            {
                retire(&*service, &orphan);
            }
        });
        Ok(())
    }

    /// Manual "refresh now". Dropped silently while a cycle is in flight.
    pub fn refresh_now<V: ResultsView>(&mut self, view: &mut V) {
        let Some(session) = self.sessions.current().cloned() else {
            self.report(view, "Nothing to refresh. Run a search first.");
            return;
        };
        if !self.poller.try_begin() {
            debug!(session_id = %session.id, "refresh dropped, cycle in flight");
            return;
        }
        self.spawn_cycle(session);
    }

    /// Timer entry point: applies finished background work, then starts a
    /// cycle if one is due.
    pub fn tick<V: ResultsView>(&mut self, now: Instant, view: &mut V) {
        self.pump(view);
        let Some(session) = self.sessions.current().cloned() else {
            return;
        };
        if self.poller.tick(now) {
            self.spawn_cycle(session);
        }
    }

    /// Applies every finished background operation. Call from the
    /// interactive thread only.
    pub fn pump<V: ResultsView>(&mut self, view: &mut V) -> usize {
        let mut handled = 0usize;
        while let Ok(event) = self.rx.try_recv() {
            self.handle_event(event, view);
            handled += 1;
        }
        handled
    }

    /// Waits up to `timeout` for background work, then applies everything
    /// that has finished. Returns `false` on timeout.
    pub fn pump_blocking<V: ResultsView>(&mut self, view: &mut V, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => {
                self.handle_event(event, view);
                self.pump(view);
                true
            }
            Err(_) => false,
        }
    }

    fn spawn_cycle(&mut self, session: SearchSession) {
        let service = Arc::clone(&self.service);
        let tx = self.tx.clone();
        let category = self.category;
        debug!(session_id = %session.id, "fetch cycle started");
        thread::spawn(move || {
            let outcome = fetch_cycle(&*service, &session, category).map_err(|e| format!("{e:#}"));
            let _ = tx.send(EngineEvent::CycleFinished {
                session_id: session.id,
                outcome,
            });
        });
    }

    fn handle_event<V: ResultsView>(&mut self, event: EngineEvent, view: &mut V) {
        match event {
            EngineEvent::SearchStarted {
                request_id,
                outcome,
            } => self.on_search_started(request_id, outcome, view),
            EngineEvent::CycleFinished {
                session_id,
                outcome,
            } => self.on_cycle_finished(session_id, outcome, view),
            EngineEvent::EnqueueFinished { report } => {
                view.on_enqueue_result(report.succeeded, report.total);
                match report.into_result() {
                    Ok(report) => self.report(view, report.status()),
                    Err(err) => self.report_error(view, err),
                }
            }
            EngineEvent::DirectoryEnqueued { outcome } => match outcome {
                Ok(report) => {
                    view.on_enqueue_result(report.succeeded, report.total);
                    let partial = !report.failed_owners.is_empty();
                    self.report(
                        view,
                        format!("Enqueued {} file(s) from directory.", report.succeeded),
                    );
                    if partial {
                        view.alert();
                    }
                }
                Err(err) => {
                    self.report(view, format!("Download directory failed: {err}"));
                    view.alert();
                }
            },
            EngineEvent::Status(message) => self.report(view, message),
        }
    }

    fn on_search_started<V: ResultsView>(
        &mut self,
        request_id: u64,
        outcome: Result<SearchSession, SearchError>,
        view: &mut V,
    ) {
        if !self.sessions.is_pending(request_id) {
            debug!(request_id, "ignoring superseded search start");
            if let Ok(orphan) = outcome {
                if self.closed {
                    self.retire_quietly(orphan);
                } else {
                    self.stop_quietly(orphan);
                }
            }
            return;
        }
        let previous = self.sessions.current().cloned();
        match self.sessions.complete(outcome) {
            Ok(session) => {
                // A fresh session must always paint its first results, even
                // when their keys equal the previous session's.
                self.diff.reset();
                self.rows.clear();
                self.last_state = None;
                view.render(&[]);
                self.poller.arm(Instant::now());
                if let Some(previous) = previous {
                    self.stop_quietly(previous);
                }
                info!(session_id = %session.id, "session active");
                if self.poller.try_begin() {
                    self.spawn_cycle(session);
                } else {
                    self.initial_fetch_pending = true;
                }
            }
            Err(err) => {
                warn!(error = %err, "search could not start");
                self.poller.disarm();
                self.report_error(view, err);
            }
        }
    }

    fn on_cycle_finished<V: ResultsView>(
        &mut self,
        session_id: String,
        outcome: Result<CycleReport, String>,
        view: &mut V,
    ) {
        self.poller.finish();
        if !self.sessions.is_current(&session_id) {
            debug!(session_id = %session_id, "discarding results of stale session");
            self.start_initial_fetch();
            return;
        }
        match outcome {
            Ok(report) => self.apply_report(report, view),
            Err(err) => {
                warn!(session_id = %session_id, error = %err, "fetch cycle failed");
                self.report_error(view, SearchError::TransientFetchFailure(err));
            }
        }
    }

    fn start_initial_fetch(&mut self) {
        if !self.initial_fetch_pending {
            return;
        }
        let Some(session) = self.sessions.current().cloned() else {
            self.initial_fetch_pending = false;
            return;
        };
        if self.poller.try_begin() {
            self.initial_fetch_pending = false;
            self.spawn_cycle(session);
        }
    }

    fn apply_report<V: ResultsView>(&mut self, report: CycleReport, view: &mut V) {
        let repaint = self.diff.evaluate(&report.rows);
        let started = Instant::now();
        if repaint {
            let state = SelectionState::capture(view);
            view.render(&report.rows);
            state.restore(view, &report.rows);
        }
        let ui_ms = started.elapsed().as_secs_f64() * 1000.0 + report.timings.flatten_ms;
        self.rows = report.rows;
        view.on_rows_changed(&self.rows, repaint);

        let count = self.rows.len();
        debug!(
            session_id = %report.session_id,
            rows = count,
            repaint,
            net_ms = report.timings.network_ms(),
            "fetch cycle applied"
        );
        let phase = if report.state.state.is_empty() {
            String::new()
        } else {
            format!(" [{}]", report.state.state)
        };
        self.last_state = Some(report.state);
        self.report(
            view,
            format!(
                "{} — {count} files.{phase} net:{:.0}ms ui:{ui_ms:.0}ms",
                if repaint { "Updated" } else { "No change" },
                report.timings.network_ms(),
            ),
        );
    }

    /// Rows of the current listing whose keys the view reports as selected.
    pub fn selected_rows<V: ListView>(&self, view: &V) -> Vec<FlatRow> {
        let keys: HashSet<RowKey> = view.selection().into_iter().collect();
        self.rows
            .iter()
            .filter(|r| keys.contains(&RowKey::of(r)))
            .cloned()
            .collect()
    }

    fn spawn_enqueue(&self, rows: &[FlatRow]) -> (usize, usize) {
        let batches = group_by_owner(rows);
        let total = batches.iter().map(|(_, files)| files.len()).sum::<usize>();
        let owners = batches.len();
        let service = Arc::clone(&self.service);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let report = submit_batches(&*service, &batches);
            let _ = tx.send(EngineEvent::EnqueueFinished { report });
        });
        (total, owners)
    }

    pub fn enqueue_selected<V: ResultsView>(&mut self, view: &mut V) {
        let rows = self.selected_rows(view);
        if rows.is_empty() {
            self.report(view, "Select one or more files to enqueue.");
            return;
        }
        let (total, owners) = self.spawn_enqueue(&rows);
        self.report(
            view,
            format!("Enqueueing {total} file(s) from {owners} user(s)..."),
        );
    }

    /// Queues every listed file of the first selected row's user.
    pub fn enqueue_all_from_user<V: ResultsView>(&mut self, view: &mut V) {
        let selected = self.selected_rows(view);
        if selected.is_empty() {
            self.report(view, "Select a file so I know which user.");
            return;
        }
        let rows = all_from_same_user(&selected, &self.rows);
        let (total, owners) = self.spawn_enqueue(&rows);
        self.report(
            view,
            format!("Enqueueing {total} file(s) from {owners} user(s)..."),
        );
    }

    /// Queues the whole remote folder containing the first selected row.
    pub fn enqueue_containing_directory<V: ResultsView>(&mut self, view: &mut V) {
        let selected = self.selected_rows(view);
        let Some(row) = selected.first() else {
            self.report(view, "Select a file first.");
            return;
        };
        let Some(directory) = row.containing_directory().map(str::to_string) else {
            self.report(view, "Could not determine containing directory.");
            return;
        };
        let owner = row.username.clone();
        self.report(
            view,
            format!("Enqueueing directory for {owner}: {directory} …"),
        );
        let service = Arc::clone(&self.service);
        let tx = self.tx.clone();
        let cap = self.directory_cap;
        thread::spawn(move || {
            let outcome = enqueue_directory(&*service, &owner, &directory, cap)
                .map_err(|e| format!("{e:#}"));
            let _ = tx.send(EngineEvent::DirectoryEnqueued { outcome });
        });
    }

    pub fn set_category<V: ResultsView>(&mut self, category: Category, view: &mut V) {
        self.category = category;
        self.report(view, format!("Type: {category}"));
    }

    pub fn set_auto_update(&mut self, enabled: bool) {
        let has_session = self.sessions.current().is_some();
        self.poller
            .set_auto_update(enabled, Instant::now(), has_session);
    }

    pub fn set_interval(&mut self, secs: u64) {
        self.poller.set_interval(secs, Instant::now());
    }

    pub fn set_requested_timeout(&mut self, requested_timeout_ms: Option<i64>) {
        self.sessions.set_requested_timeout(requested_timeout_ms);
    }

    fn stop_quietly(&self, session: SearchSession) {
        let service = Arc::clone(&self.service);
        thread::spawn(move || {
            let message = session::stop(&*service, &session);
            debug!(session_id = %session.id, status = %message, "previous session stopped");
        });
    }

    fn retire_quietly(&self, session: SearchSession) {
        let service = Arc::clone(&self.service);
        thread::spawn(move || retire(&*service, &session));
    }

    /// Stops the current search server-side; results already listed stay.
    pub fn stop_search<V: ResultsView>(&mut self, view: &mut V) {
        let Some(session) = self.sessions.mark_stopped() else {
            self.report(view, "No search is running.");
            return;
        };
        self.poller.disarm();
        let service = Arc::clone(&self.service);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let _ = tx.send(EngineEvent::Status(session::stop(&*service, &session)));
        });
    }

    /// Forgets the current session and deletes it server-side. The returned
    /// handle yields the status line; callers that are about to exit can
    /// join it.
    /// A start still in flight is retired as soon as it lands.
    pub fn close(&mut self) -> Option<JoinHandle<String>> {
        self.poller.disarm();
        self.initial_fetch_pending = false;
        self.closed = true;
        let session = self.sessions.discard()?;
        let service = Arc::clone(&self.service);
        Some(thread::spawn(move || retire(&*service, &session)))
    }
}

/// Stop then delete; returns the delete status line.
fn retire<S: SearchService + ?Sized>(service: &S, session: &SearchSession) -> String {
    let stopped = session::stop(service, session);
    debug!(session_id = %session.id, %stopped, "retiring session");
    session::delete(service, session)
}
