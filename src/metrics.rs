use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::session::{Mode, TextSource};

/// Characters per word in the standard WPM convention.
pub const CHARS_PER_WORD: f64 = 5.0;

/// Number of positions where `typed` differs from `reference`.
///
/// Only the typed length is scanned. Typed chars beyond the end of the
/// reference have nothing to match and count as errors.
pub fn count_errors(typed: &str, reference: &str) -> usize {
    let mut expected = reference.chars();
    typed
        .chars()
        .filter(|c| expected.next() != Some(*c))
        .count()
}

/// Number of typed positions matching the reference.
pub fn count_correct(typed: &str, reference: &str) -> usize {
    typed
        .chars()
        .zip(reference.chars())
        .filter(|(t, r)| t == r)
        .count()
}

/// Count of whitespace-delimited tokens in the typed text.
pub fn count_words(typed: &str) -> usize {
    typed.split_whitespace().count()
}

/// Words per minute for a number of characters over an elapsed time.
///
/// Returns 0 when no time has elapsed.
pub fn words_per_minute(chars: usize, elapsed: Duration) -> f64 {
    let minutes = elapsed.as_secs_f64() / 60.0;
    if minutes == 0.0 {
        return 0.0;
    }
    (chars as f64 / CHARS_PER_WORD) / minutes
}

/// Fraction of typed chars that were correct, 0 when nothing was typed.
pub fn accuracy(correct: usize, typed: usize) -> f64 {
    if typed == 0 {
        return 0.0;
    }
    correct as f64 / typed as f64
}

/// Round to a fixed number of decimal places.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10_f64.powi(places);
    (value * factor).round() / factor
}

/// Result of one completed test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalMetrics {
    pub duration_sec: u64,
    pub mode: Mode,
    pub target_value: u32,
    pub wpm: f64,
    pub raw_wpm: f64,
    pub accuracy: f64,
    pub backspaces: u32,
    pub errors: u32,
    pub chars_typed: u32,
    pub words_typed: u32,
    pub source: TextSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet_id: Option<String>,
}

/// Inputs collected by the session at the moment it finishes.
#[derive(Debug, Clone, Copy)]
pub struct MetricsInput<'a> {
    pub reference: &'a str,
    pub typed: &'a str,
    pub elapsed: Duration,
    pub backspaces: u32,
    pub errors: u32,
    pub mode: Mode,
    pub target_value: u32,
    pub source: TextSource,
}

impl FinalMetrics {
    pub fn compute(input: MetricsInput<'_>) -> Self {
        let duration_sec = input.elapsed.as_secs_f64().round() as u64;
        let chars_typed = input.typed.chars().count();

        if chars_typed == 0 {
            return Self {
                duration_sec,
                mode: input.mode,
                target_value: input.target_value,
                wpm: 0.0,
                raw_wpm: 0.0,
                accuracy: 0.0,
                backspaces: 0,
                errors: 0,
                chars_typed: 0,
                words_typed: 0,
                source: input.source,
                snippet_id: None,
            };
        }

        let correct = count_correct(input.typed, input.reference);

        Self {
            duration_sec,
            mode: input.mode,
            target_value: input.target_value,
            wpm: round_to(words_per_minute(correct, input.elapsed), 2),
            raw_wpm: round_to(words_per_minute(chars_typed, input.elapsed), 2),
            accuracy: round_to(accuracy(correct, chars_typed), 4),
            backspaces: input.backspaces,
            errors: input.errors,
            chars_typed: chars_typed as u32,
            words_typed: count_words(input.typed) as u32,
            source: input.source,
            snippet_id: None,
        }
    }
}

/// Display-only rates sampled while a session runs.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LiveSample {
    pub wpm: f64,
    pub raw_wpm: f64,
}

impl LiveSample {
    /// Recompute from partial state, or `None` when there is nothing to
    /// measure yet.
    pub fn measure(typed: &str, reference: &str, elapsed: Duration) -> Option<Self> {
        let chars_typed = typed.chars().count();
        if elapsed.is_zero() || chars_typed == 0 {
            return None;
        }
        let correct = count_correct(typed, reference);
        Some(Self {
            wpm: words_per_minute(correct, elapsed).round(),
            raw_wpm: words_per_minute(chars_typed, elapsed).round(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input<'a>(reference: &'a str, typed: &'a str, secs: u64) -> MetricsInput<'a> {
        MetricsInput {
            reference,
            typed,
            elapsed: Duration::from_secs(secs),
            backspaces: 0,
            errors: count_errors(typed, reference) as u32,
            mode: Mode::Time,
            target_value: 30,
            source: TextSource::Random,
        }
    }

    #[test]
    fn test_count_errors() {
        assert_eq!(count_errors("", "abc"), 0);
        assert_eq!(count_errors("abc", "abc"), 0);
        assert_eq!(count_errors("abx", "abc"), 1);
        assert_eq!(count_errors("xyz", "abc"), 3);
    }

    #[test]
    fn test_count_errors_past_end_of_reference() {
        assert_eq!(count_errors("abcde", "abc"), 2);
        assert_eq!(count_errors("a", ""), 1);
    }

    #[test]
    fn test_count_errors_is_char_based() {
        assert_eq!(count_errors("café", "café"), 0);
        assert_eq!(count_errors("cafe", "café"), 1);
    }

    #[test]
    fn test_errors_and_correct_cover_typed_length() {
        for (typed, reference) in [("hello", "help"), ("", "x"), ("abc", "abd"), ("zz", "")] {
            assert_eq!(
                count_errors(typed, reference) + count_correct(typed, reference),
                typed.chars().count()
            );
        }
    }

    #[test]
    fn test_count_words() {
        assert_eq!(count_words(""), 0);
        assert_eq!(count_words("   "), 0);
        assert_eq!(count_words(" the  quick\tbrown\n"), 3);
    }

    #[test]
    fn test_words_per_minute() {
        assert_eq!(words_per_minute(300, Duration::from_secs(60)), 60.0);
        assert_eq!(words_per_minute(150, Duration::from_secs(30)), 60.0);
        assert_eq!(words_per_minute(100, Duration::ZERO), 0.0);
    }

    #[test]
    fn test_accuracy_bounds() {
        assert_eq!(accuracy(0, 0), 0.0);
        assert_eq!(accuracy(3, 3), 1.0);
        assert_eq!(accuracy(0, 4), 0.0);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(0.666666, 4), 0.6667);
        assert_eq!(round_to(41.005, 0), 41.0);
        assert_eq!(round_to(3.14159, 2), 3.14);
    }

    #[test]
    fn test_perfect_run_over_twelve_seconds() {
        let m = FinalMetrics::compute(input("abc", "abc", 12));
        assert_eq!(m.wpm, 3.0);
        assert_eq!(m.raw_wpm, 3.0);
        assert_eq!(m.accuracy, 1.0);
        assert_eq!(m.chars_typed, 3);
        assert_eq!(m.words_typed, 1);
        assert_eq!(m.duration_sec, 12);
    }

    #[test]
    fn test_one_miss_over_a_minute() {
        let m = FinalMetrics::compute(input("abc", "abx", 60));
        assert_eq!(m.accuracy, 0.6667);
        assert_eq!(m.wpm, 0.4);
        assert_eq!(m.raw_wpm, 0.6);
        assert_eq!(m.errors, 1);
    }

    #[test]
    fn test_empty_input_is_all_zero() {
        let m = FinalMetrics::compute(input("abc", "", 30));
        assert_eq!(m.wpm, 0.0);
        assert_eq!(m.raw_wpm, 0.0);
        assert_eq!(m.accuracy, 0.0);
        assert_eq!(m.chars_typed, 0);
        assert_eq!(m.words_typed, 0);
        assert_eq!(m.duration_sec, 30);
    }

    #[test]
    fn test_empty_input_drops_counters() {
        let m = FinalMetrics::compute(MetricsInput {
            backspaces: 3,
            errors: 2,
            ..input("abc", "", 10)
        });
        assert_eq!(m.backspaces, 0);
        assert_eq!(m.errors, 0);
    }

    #[test]
    fn test_instant_finish_does_not_divide_by_zero() {
        let m = FinalMetrics::compute(input("abc", "ab", 0));
        assert_eq!(m.wpm, 0.0);
        assert_eq!(m.raw_wpm, 0.0);
        assert_eq!(m.accuracy, 1.0);
        assert_eq!(m.duration_sec, 0);
    }

    #[test]
    fn test_duration_is_rounded() {
        let mut i = input("abc", "a", 0);
        i.elapsed = Duration::from_millis(14_600);
        assert_eq!(FinalMetrics::compute(i).duration_sec, 15);
    }

    #[test]
    fn test_serializes_with_request_field_names() {
        let m = FinalMetrics::compute(input("abc", "abc", 12));
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["durationSec"], 12);
        assert_eq!(json["rawWpm"], 3.0);
        assert_eq!(json["mode"], "time");
        assert_eq!(json["source"], "random");
        assert!(json.get("snippetId").is_none());
    }

    #[test]
    fn test_live_sample() {
        assert_eq!(LiveSample::measure("", "abc", Duration::from_secs(1)), None);
        assert_eq!(LiveSample::measure("a", "abc", Duration::ZERO), None);

        let sample = LiveSample::measure("abx", "abc", Duration::from_secs(6)).unwrap();
        assert_eq!(sample.wpm, 4.0);
        assert_eq!(sample.raw_wpm, 6.0);
    }
}
