use crate::filter::Category;
use crate::flatten::{flatten_responses, FlatRow};
use crate::service::{SearchService, SessionState};
use crate::session::SearchSession;
use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

pub const DEFAULT_INTERVAL_SECS: u64 = 2;

/// Per-stage wall time of one fetch cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CycleTimings {
    pub state_ms: f64,
    pub responses_ms: f64,
    pub flatten_ms: f64,
}

impl CycleTimings {
    pub fn network_ms(&self) -> f64 {
        self.state_ms + self.responses_ms
    }
}

/// Everything one background fetch cycle produces, tagged with the session
/// it was issued for.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub session_id: String,
    pub state: SessionState,
    pub rows: Vec<FlatRow>,
    pub timings: CycleTimings,
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}

/// One fetch cycle: status, then responses, then flatten and filter. Runs
/// off the interactive thread.
pub fn fetch_cycle<S: SearchService + ?Sized>(
    service: &S,
    session: &SearchSession,
    category: Category,
) -> Result<CycleReport> {
    let t0 = Instant::now();
    let state = service.session_state(&session.id, false)?;
    let state_ms = elapsed_ms(t0);

    let t1 = Instant::now();
    let responses = service.session_responses(&session.id)?;
    let responses_ms = elapsed_ms(t1);

    let t2 = Instant::now();
    let rows = flatten_responses(&responses, category);
    let flatten_ms = elapsed_ms(t2);

    Ok(CycleReport {
        session_id: session.id.clone(),
        state,
        rows,
        timings: CycleTimings {
            state_ms,
            responses_ms,
            flatten_ms,
        },
    })
}

/// Fixed-cadence, single-flight trigger for fetch cycles.
///
/// `Idle -> FetchInFlight -> Idle`, with arming deciding whether the timer
/// may start a cycle. Ticks and manual refreshes that arrive while a cycle
/// is in flight are dropped, not queued.
#[derive(Debug)]
pub struct PollingScheduler {
    in_flight: AtomicBool,
    interval: Duration,
    auto_update: bool,
    next_due: Option<Instant>,
}

impl PollingScheduler {
    pub fn new(interval_secs: u64, auto_update: bool) -> Self {
        Self {
            in_flight: AtomicBool::new(false),
            interval: Duration::from_secs(interval_secs.max(1)),
            auto_update,
            next_due: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn auto_update(&self) -> bool {
        self.auto_update
    }

    pub fn is_armed(&self) -> bool {
        self.next_due.is_some()
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Restarts the timer from `now`. Stays disarmed while auto update is
    /// off.
    pub fn arm(&mut self, now: Instant) {
        self.next_due = self.auto_update.then(|| now + self.interval);
    }

    /// Stops future ticks. A cycle already in flight still completes.
    pub fn disarm(&mut self) {
        self.next_due = None;
    }

    pub fn set_interval(&mut self, secs: u64, now: Instant) {
        self.interval = Duration::from_secs(secs.max(1));
        if self.is_armed() {
            self.arm(now);
        }
    }

    pub fn set_auto_update(&mut self, enabled: bool, now: Instant, has_session: bool) {
        self.auto_update = enabled;
        if enabled && has_session {
            self.arm(now);
        } else {
            self.disarm();
        }
    }

    /// Atomically claims the in-flight slot. `false` means a cycle is
    /// already running and the request must be dropped.
    pub fn try_begin(&self) -> bool {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn finish(&self) {
        self.in_flight.store(false, Ordering::Release);
    }

    /// Timer entry point. Returns `true` when the caller should launch a
    /// cycle; the in-flight slot is already claimed in that case.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(due) = self.next_due else {
            return false;
        };
        if now < due {
            return false;
        }
        self.next_due = Some(now + self.interval);
        self.try_begin()
    }

    /// Time left until the next tick, for front-ends that sleep between
    /// frames.
    pub fn until_next(&self, now: Instant) -> Option<Duration> {
        self.next_due.map(|due| due.saturating_duration_since(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::tests::{file, responder};
    use crate::session::tests::FakeService;
    use crate::session::SessionPhase;

    fn session() -> SearchSession {
        SearchSession {
            id: "S1".into(),
            query: "foo".into(),
            category: Category::All,
            timeout_ms: 1_800_000,
            phase: SessionPhase::Active,
        }
    }

    #[test]
    fn tick_fires_on_cadence_only_when_armed() {
        let start = Instant::now();
        let mut poller = PollingScheduler::new(2, true);
        assert!(!poller.tick(start + Duration::from_secs(10)));

        poller.arm(start);
        assert!(!poller.tick(start + Duration::from_millis(1999)));
        assert!(poller.tick(start + Duration::from_secs(2)));
        poller.finish();
        assert!(!poller.tick(start + Duration::from_secs(3)));
        assert!(poller.tick(start + Duration::from_secs(4)));
    }

    #[test]
    fn ticks_while_in_flight_are_dropped() {
        let start = Instant::now();
        let mut poller = PollingScheduler::new(1, true);
        poller.arm(start);

        assert!(poller.tick(start + Duration::from_secs(1)));
        assert!(!poller.tick(start + Duration::from_secs(2)));
        assert!(!poller.try_begin());

        poller.finish();
        assert!(poller.try_begin());
    }

    #[test]
    fn disabling_auto_update_disarms_but_keeps_in_flight_cycle() {
        let start = Instant::now();
        let mut poller = PollingScheduler::new(2, true);
        poller.arm(start);
        assert!(poller.tick(start + Duration::from_secs(2)));

        poller.set_auto_update(false, start, true);

        assert!(!poller.is_armed());
        assert!(poller.in_flight());
        poller.arm(start);
        assert!(!poller.is_armed());
    }

    #[test]
    fn interval_change_rearms_and_has_a_floor() {
        let start = Instant::now();
        let mut poller = PollingScheduler::new(0, true);
        assert_eq!(poller.interval(), Duration::from_secs(1));
        poller.arm(start);

        let later = start + Duration::from_millis(500);
        poller.set_interval(5, later);

        assert_eq!(poller.until_next(later), Some(Duration::from_secs(5)));
    }

    #[test]
    fn fetch_cycle_flattens_with_category() {
        let service = FakeService::default();
        service.set_responses(vec![responder(
            "alice",
            vec![file("/music/a.mp3", 100), file("/docs/b.pdf", 5)],
            vec![],
        )]);

        let report = fetch_cycle(&service, &session(), Category::Audio).expect("cycle");

        assert_eq!(report.session_id, "S1");
        assert_eq!(report.state.state, "InProgress");
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].filename(), "/music/a.mp3");
    }

    #[test]
    fn fetch_cycle_propagates_network_errors() {
        let service = FakeService::default();
        *service.fetch_fails.lock().expect("lock") = true;

        let err = fetch_cycle(&service, &session(), Category::All).unwrap_err();

        assert!(err.to_string().contains("timed out"));
    }
}
