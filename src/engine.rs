use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::auth::AuthProvider;
use crate::error::Result;
use crate::metrics::FinalMetrics;
use crate::session::{SessionId, SessionState, TestConfiguration, Transition};
use crate::store::ResultSink;
use crate::timer::{TimerEvent, TimerKind, TimerSchedule};

/// What happened to the result of the last finished session.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// Nobody was signed in.
    Skipped,
    Saved,
    /// The sink refused or failed; the message is for display.
    Failed(String),
}

/// Drives one session at a time and talks to the collaborators.
///
/// Timers are bound to the session they were armed for; events from an
/// earlier session are dropped.
pub struct Engine<A, S> {
    state: SessionState,
    timers: TimerSchedule,
    auth: A,
    sink: S,
    rng: StdRng,
    next_session: u64,
    last_submission: Option<Submission>,
}

impl<A: AuthProvider, S: ResultSink> Engine<A, S> {
    pub fn new(auth: A, sink: S) -> Self {
        Self::with_rng(auth, sink, StdRng::from_entropy())
    }

    /// Use a fixed rng, e.g. for reproducible passage selection.
    pub fn with_rng(auth: A, sink: S, rng: StdRng) -> Self {
        Self {
            state: SessionState::default(),
            timers: TimerSchedule::new(),
            auth,
            sink,
            rng,
            next_session: 1,
            last_submission: None,
        }
    }

    /// Start a session and arm its timers.
    pub fn start(&mut self, config: &TestConfiguration, now: Instant) -> Result<SessionId> {
        let session = SessionId(self.next_session);
        let text = config.resolve_text(&mut self.rng);
        self.state.start(config, text, session, now)?;

        self.next_session += 1;
        self.last_submission = None;
        self.timers.arm(session, config.mode, now);
        Ok(session)
    }

    pub fn edit(&mut self, typed: impl Into<String>, now: Instant) -> Result<Transition> {
        let transition = self.state.edit(typed, now)?;
        self.after(&transition);
        Ok(transition)
    }

    /// Finish the running session explicitly. A second call is a no-op.
    pub fn finish(&mut self, now: Instant) -> Option<FinalMetrics> {
        let metrics = self.state.finish(now)?;
        self.complete(&metrics);
        Some(metrics)
    }

    /// Deliver one timer event.
    pub fn handle_timer(&mut self, event: TimerEvent, now: Instant) -> Transition {
        if self.state.session() != Some(event.session) {
            debug!(session = %event.session, "dropping stale timer event");
            return Transition::Ignored;
        }

        let transition = match event.kind {
            TimerKind::Countdown => self.state.tick(event.session, now),
            TimerKind::Sample => match self.state.sample(event.session, now) {
                Some(_) => Transition::Continue,
                None => Transition::Ignored,
            },
        };
        self.after(&transition);
        transition
    }

    /// Deliver every timer event due at `now`. Returns the metrics if one of
    /// them finished the session.
    pub fn poll_timers(&mut self, now: Instant) -> Option<FinalMetrics> {
        let mut finished = None;
        for event in self.timers.due(now) {
            if let Transition::Finished(metrics) = self.handle_timer(event, now) {
                finished = Some(metrics);
            }
        }
        finished
    }

    /// Abandon or clear the current session and go back to Idle.
    pub fn reset(&mut self) {
        self.timers.cancel();
        self.state.reset();
        self.last_submission = None;
    }

    fn after(&mut self, transition: &Transition) {
        if let Transition::Finished(metrics) = transition {
            self.complete(metrics);
        }
    }

    fn complete(&mut self, metrics: &FinalMetrics) {
        self.timers.cancel();

        let submission = match self.auth.current_user() {
            None => Submission::Skipped,
            Some(user) => match self.sink.submit_result(&user, metrics) {
                Ok(()) => {
                    info!(user = user.id, wpm = metrics.wpm, "test result saved");
                    Submission::Saved
                }
                Err(e) => {
                    warn!(user = user.id, error = %e, "failed to save test result");
                    Submission::Failed(e.to_string())
                }
            },
        };
        self.last_submission = Some(submission);
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn timers(&self) -> &TimerSchedule {
        &self.timers
    }

    pub fn last_submission(&self) -> Option<&Submission> {
        self.last_submission.as_ref()
    }

    pub fn auth(&self) -> &A {
        &self.auth
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Anonymous, SignedIn, User};
    use crate::error::Error;
    use crate::session::Status;
    use assert_matches::assert_matches;
    use std::cell::RefCell;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingSink {
        submitted: RefCell<Vec<FinalMetrics>>,
        fail: bool,
    }

    impl ResultSink for RecordingSink {
        fn submit_result(&self, _user: &User, metrics: &FinalMetrics) -> Result<()> {
            self.submitted.borrow_mut().push(metrics.clone());
            if self.fail {
                Err(Error::Validation("rejected".into()))
            } else {
                Ok(())
            }
        }
    }

    fn ada() -> SignedIn {
        SignedIn(User {
            id: 1,
            email: "ada@example.com".into(),
            name: Some("Ada".into()),
        })
    }

    fn at(t0: Instant, millis: u64) -> Instant {
        t0 + Duration::from_millis(millis)
    }

    #[test]
    fn test_anonymous_session_is_not_submitted() {
        let mut engine = Engine::new(Anonymous, RecordingSink::default());
        let t0 = Instant::now();
        engine
            .start(&TestConfiguration::chars(3).with_custom_text("abc"), t0)
            .unwrap();
        engine.edit("abc", at(t0, 12_000)).unwrap();

        assert_eq!(engine.state().status(), Status::Finished);
        assert_eq!(engine.last_submission(), Some(&Submission::Skipped));
        assert!(engine.sink().submitted.borrow().is_empty());
    }

    #[test]
    fn test_signed_in_result_submitted_once() {
        let mut engine = Engine::new(ada(), RecordingSink::default());
        let t0 = Instant::now();
        engine
            .start(&TestConfiguration::chars(3).with_custom_text("abc"), t0)
            .unwrap();
        engine.edit("abc", at(t0, 12_000)).unwrap();
        assert!(engine.finish(at(t0, 12_500)).is_none());

        let submitted = engine.sink().submitted.borrow();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].wpm, 3.0);
        assert_eq!(engine.last_submission(), Some(&Submission::Saved));
    }

    #[test]
    fn test_failed_submission_keeps_result() {
        let sink = RecordingSink {
            fail: true,
            ..RecordingSink::default()
        };
        let mut engine = Engine::new(ada(), sink);
        let t0 = Instant::now();
        engine
            .start(&TestConfiguration::timed(30).with_custom_text("abc"), t0)
            .unwrap();
        engine.edit("ab", at(t0, 1_000)).unwrap();
        let metrics = engine.finish(at(t0, 6_000)).unwrap();

        assert_eq!(engine.state().status(), Status::Finished);
        assert_eq!(engine.state().final_metrics(), Some(&metrics));
        assert_matches!(engine.last_submission(), Some(Submission::Failed(_)));
        assert_eq!(engine.sink().submitted.borrow().len(), 1);
    }

    #[test]
    fn test_blank_custom_text_stays_idle() {
        let mut engine = Engine::new(Anonymous, RecordingSink::default());
        let err = engine.start(&TestConfiguration::timed(30).with_custom_text("   "), Instant::now());
        assert_matches!(err, Err(Error::EmptyText));
        assert_eq!(engine.state().status(), Status::Idle);
        assert_eq!(engine.timers().armed_for(), None);
    }

    #[test]
    fn test_random_source_picks_builtin_passage() {
        let mut engine = Engine::with_rng(Anonymous, RecordingSink::default(), StdRng::seed_from_u64(1));
        engine.start(&TestConfiguration::timed(15), Instant::now()).unwrap();
        assert!(crate::passages::PASSAGES.contains(&engine.state().reference_text()));
    }

    #[test]
    fn test_countdown_finishes_via_polling() {
        let mut engine = Engine::new(ada(), RecordingSink::default());
        let t0 = Instant::now();
        engine
            .start(&TestConfiguration::timed(2).with_custom_text("abc"), t0)
            .unwrap();

        assert!(engine.poll_timers(at(t0, 1_000)).is_none());
        assert_eq!(engine.state().seconds_remaining(), Some(1));

        let metrics = engine.poll_timers(at(t0, 2_000)).unwrap();
        assert_eq!(metrics.chars_typed, 0);
        assert_eq!(metrics.duration_sec, 2);
        assert_eq!(engine.timers().armed_for(), None);
        assert!(engine.poll_timers(at(t0, 3_000)).is_none());
        assert_eq!(engine.sink().submitted.borrow().len(), 1);
    }

    #[test]
    fn test_sampler_updates_live_metrics() {
        let mut engine = Engine::new(Anonymous, RecordingSink::default());
        let t0 = Instant::now();
        engine
            .start(&TestConfiguration::timed(30).with_custom_text("abcdef"), t0)
            .unwrap();
        engine.edit("abx", at(t0, 5_000)).unwrap();
        engine.poll_timers(at(t0, 6_000));

        assert_eq!(engine.state().live().wpm, 4.0);
        assert_eq!(engine.state().live().raw_wpm, 6.0);
    }

    #[test]
    fn test_stale_timer_from_previous_session_ignored() {
        let mut engine = Engine::new(Anonymous, RecordingSink::default());
        let t0 = Instant::now();
        let config = TestConfiguration::timed(1).with_custom_text("abc");

        let first = engine.start(&config, t0).unwrap();
        engine.reset();
        let second = engine.start(&config, at(t0, 100)).unwrap();
        assert_ne!(first, second);

        let stale = TimerEvent {
            kind: TimerKind::Countdown,
            session: first,
        };
        assert_eq!(engine.handle_timer(stale, at(t0, 1_000)), Transition::Ignored);
        assert_eq!(engine.state().status(), Status::Running);
        assert_eq!(engine.state().seconds_remaining(), Some(1));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut engine = Engine::new(ada(), RecordingSink::default());
        let t0 = Instant::now();
        engine
            .start(&TestConfiguration::chars(1).with_custom_text("abc"), t0)
            .unwrap();
        engine.edit("a", at(t0, 1_000)).unwrap();
        engine.reset();

        assert_eq!(engine.state(), &SessionState::default());
        assert_eq!(engine.last_submission(), None);
        assert_eq!(engine.timers().armed_for(), None);
    }
}
