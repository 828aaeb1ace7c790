use std::time::{Duration, Instant};

use crate::session::{Mode, SessionId};

/// Period of the time-mode countdown.
pub const COUNTDOWN_INTERVAL: Duration = Duration::from_secs(1);
/// Period of the live wpm sampler.
pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Countdown,
    Sample,
}

/// A timer firing, stamped with the session it was armed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerEvent {
    pub kind: TimerKind,
    pub session: SessionId,
}

#[derive(Debug, Clone)]
struct Armed {
    session: SessionId,
    next_countdown: Option<Instant>,
    next_sample: Instant,
}

/// The recurring timers of one running session.
///
/// Polled from the event loop; nothing fires once cancelled.
#[derive(Debug, Clone, Default)]
pub struct TimerSchedule {
    armed: Option<Armed>,
}

impl TimerSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timers for a freshly started session, replacing any others.
    pub fn arm(&mut self, session: SessionId, mode: Mode, now: Instant) {
        self.armed = Some(Armed {
            session,
            next_countdown: (mode == Mode::Time).then(|| now + COUNTDOWN_INTERVAL),
            next_sample: now + SAMPLE_INTERVAL,
        });
    }

    pub fn cancel(&mut self) {
        self.armed = None;
    }

    pub fn armed_for(&self) -> Option<SessionId> {
        self.armed.as_ref().map(|a| a.session)
    }

    /// Events due at `now`, oldest first.
    ///
    /// Overdue countdown seconds are all delivered so a stalled loop does
    /// not stretch the test; overdue samples collapse into one.
    pub fn due(&mut self, now: Instant) -> Vec<TimerEvent> {
        let Some(armed) = self.armed.as_mut() else {
            return Vec::new();
        };

        let mut events = Vec::new();
        if let Some(next) = armed.next_countdown.as_mut() {
            while *next <= now {
                events.push(TimerEvent {
                    kind: TimerKind::Countdown,
                    session: armed.session,
                });
                *next += COUNTDOWN_INTERVAL;
            }
        }
        if armed.next_sample <= now {
            events.push(TimerEvent {
                kind: TimerKind::Sample,
                session: armed.session,
            });
            armed.next_sample = now + SAMPLE_INTERVAL;
        }
        events
    }

    /// Time until the next event, if any timer is armed.
    pub fn until_next(&self, now: Instant) -> Option<Duration> {
        let armed = self.armed.as_ref()?;
        let next = match armed.next_countdown {
            Some(countdown) => countdown.min(armed.next_sample),
            None => armed.next_sample,
        };
        Some(next.saturating_duration_since(now))
    }
}
