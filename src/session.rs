use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::metrics::{count_errors, FinalMetrics, LiveSample, MetricsInput};
use crate::passages;

/// How a test decides it is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Mode {
    /// Ends when the configured number of seconds elapses.
    #[default]
    Time,
    /// Ends when the typed text reaches the configured length.
    Chars,
}

impl Mode {
    /// Target values offered for this mode, in ascending order.
    pub fn presets(self) -> &'static [u32] {
        match self {
            Mode::Time => &[15, 30, 60],
            Mode::Chars => &[100, 200],
        }
    }

    pub fn default_target(self) -> u32 {
        match self {
            Mode::Time => 30,
            Mode::Chars => 100,
        }
    }
}

/// Where the passage comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TextSource {
    #[default]
    Random,
    Custom,
}

/// User selections for one test. Locked once the session starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestConfiguration {
    pub mode: Mode,
    pub target_value: u32,
    pub text_source: TextSource,
    /// Custom passage; ignored for [`TextSource::Random`].
    pub text: String,
}

impl Default for TestConfiguration {
    fn default() -> Self {
        Self {
            mode: Mode::Time,
            target_value: Mode::Time.default_target(),
            text_source: TextSource::Random,
            text: String::new(),
        }
    }
}

impl TestConfiguration {
    pub fn timed(seconds: u32) -> Self {
        Self {
            mode: Mode::Time,
            target_value: seconds,
            ..Self::default()
        }
    }

    pub fn chars(count: u32) -> Self {
        Self {
            mode: Mode::Chars,
            target_value: count,
            ..Self::default()
        }
    }

    pub fn with_custom_text(mut self, text: impl Into<String>) -> Self {
        self.text_source = TextSource::Custom;
        self.text = text.into();
        self
    }

    /// The passage the user will type: a random sample or the custom text
    /// as given.
    pub fn resolve_text<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        match self.text_source {
            TextSource::Random => passages::random_passage(rng).to_string(),
            TextSource::Custom => self.text.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum_macros::Display)]
pub enum Status {
    #[default]
    Idle,
    Running,
    Finished,
}

/// Identifies one started session so timers armed for it can be told apart
/// from timers armed for a later one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a transition did.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Applied; the session keeps running.
    Continue,
    /// Applied, and it ended the session.
    Finished(FinalMetrics),
    /// Did not apply to the current session.
    Ignored,
}

/// All mutable state of one test attempt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    status: Status,
    session: Option<SessionId>,
    config: Option<TestConfiguration>,
    reference_text: String,
    typed_text: String,
    started_at: Option<Instant>,
    seconds_remaining: Option<u32>,
    backspace_count: u32,
    error_count: u32,
    finishing: bool,
    live: LiveSample,
    final_metrics: Option<FinalMetrics>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idle -> Running.
    ///
    /// A rejected start leaves the state untouched.
    pub fn start(
        &mut self,
        config: &TestConfiguration,
        reference_text: String,
        session: SessionId,
        now: Instant,
    ) -> Result<()> {
        self.expect_status(Status::Idle)?;

        if config.target_value == 0 {
            return Err(Error::InvalidConfig(format!(
                "target value for {} mode must be positive",
                config.mode
            )));
        }
        if reference_text.trim().is_empty() {
            return Err(Error::EmptyText);
        }

        *self = Self {
            status: Status::Running,
            session: Some(session),
            config: Some(config.clone()),
            reference_text,
            started_at: Some(now),
            seconds_remaining: match config.mode {
                Mode::Time => Some(config.target_value),
                Mode::Chars => None,
            },
            ..Self::default()
        };

        info!(
            %session,
            mode = %config.mode,
            target = config.target_value,
            source = %config.text_source,
            "session started"
        );
        Ok(())
    }

    /// Replace the typed text.
    ///
    /// Any edit that shrinks the text counts as exactly one backspace, no
    /// matter how many chars it removed.
    pub fn edit(&mut self, typed: impl Into<String>, now: Instant) -> Result<Transition> {
        self.expect_status(Status::Running)?;
        let typed = typed.into();

        if typed.chars().count() < self.typed_text.chars().count() {
            self.backspace_count += 1;
        }
        self.error_count = count_errors(&typed, &self.reference_text) as u32;
        self.typed_text = typed;

        if let Some(config) = &self.config {
            if config.mode == Mode::Chars && self.chars_typed() >= config.target_value as usize {
                return Ok(self.finish_transition(now));
            }
        }
        Ok(Transition::Continue)
    }

    /// One second of countdown for `session`.
    pub fn tick(&mut self, session: SessionId, now: Instant) -> Transition {
        if !self.is_active(session) {
            debug!(%session, status = %self.status, "ignoring countdown tick");
            return Transition::Ignored;
        }
        let Some(remaining) = self.seconds_remaining else {
            return Transition::Ignored;
        };

        let remaining = remaining.saturating_sub(1);
        self.seconds_remaining = Some(remaining);
        if remaining == 0 {
            self.finish_transition(now)
        } else {
            Transition::Continue
        }
    }

    /// Refresh the display-only rates for `session`.
    pub fn sample(&mut self, session: SessionId, now: Instant) -> Option<LiveSample> {
        if !self.is_active(session) {
            return None;
        }
        let elapsed = self.elapsed(now);
        if let Some(sample) = LiveSample::measure(&self.typed_text, &self.reference_text, elapsed) {
            self.live = sample;
        }
        Some(self.live)
    }

    /// Running -> Finished, at most once per session.
    pub fn finish(&mut self, now: Instant) -> Option<FinalMetrics> {
        if self.status != Status::Running || self.finishing {
            return None;
        }
        self.finishing = true;

        let config = self.config.clone().unwrap_or_default();
        let metrics = FinalMetrics::compute(MetricsInput {
            reference: &self.reference_text,
            typed: &self.typed_text,
            elapsed: self.elapsed(now),
            backspaces: self.backspace_count,
            errors: self.error_count,
            mode: config.mode,
            target_value: config.target_value,
            source: config.text_source,
        });

        self.status = Status::Finished;
        self.final_metrics = Some(metrics.clone());

        info!(
            session = %self.session.map_or(0, |s| s.0),
            wpm = metrics.wpm,
            raw_wpm = metrics.raw_wpm,
            accuracy = metrics.accuracy,
            "session finished"
        );
        Some(metrics)
    }

    /// Back to a fresh Idle state, abandoning any running session.
    pub fn reset(&mut self) {
        if self.status != Status::Idle {
            debug!(status = %self.status, "session reset");
        }
        *self = Self::default();
    }

    fn finish_transition(&mut self, now: Instant) -> Transition {
        match self.finish(now) {
            Some(metrics) => Transition::Finished(metrics),
            None => Transition::Ignored,
        }
    }

    fn is_active(&self, session: SessionId) -> bool {
        self.status == Status::Running && !self.finishing && self.session == Some(session)
    }

    fn expect_status(&self, expected: Status) -> Result<()> {
        if self.status == expected {
            Ok(())
        } else {
            Err(Error::InvalidState {
                expected,
                actual: self.status,
            })
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn session(&self) -> Option<SessionId> {
        self.session
    }

    pub fn config(&self) -> Option<&TestConfiguration> {
        self.config.as_ref()
    }

    pub fn reference_text(&self) -> &str {
        &self.reference_text
    }

    pub fn typed_text(&self) -> &str {
        &self.typed_text
    }

    pub fn chars_typed(&self) -> usize {
        self.typed_text.chars().count()
    }

    pub fn backspace_count(&self) -> u32 {
        self.backspace_count
    }

    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    pub fn seconds_remaining(&self) -> Option<u32> {
        self.seconds_remaining
    }

    /// Chars left before a chars-mode test completes.
    pub fn chars_remaining(&self) -> Option<usize> {
        self.config
            .as_ref()
            .filter(|c| c.mode == Mode::Chars)
            .map(|c| (c.target_value as usize).saturating_sub(self.chars_typed()))
    }

    pub fn live(&self) -> LiveSample {
        self.live
    }

    pub fn final_metrics(&self) -> Option<&FinalMetrics> {
        self.final_metrics.as_ref()
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        self.started_at
            .map(|t| now.saturating_duration_since(t))
            .unwrap_or_default()
    }
}
