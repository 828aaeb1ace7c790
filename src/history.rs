use chrono::{DateTime, Local};
use serde::Serialize;
use std::io::Write;

use crate::auth::User;
use crate::error::Result;
use crate::metrics::FinalMetrics;
use crate::store::ResultStore;

/// Results shown per history page.
pub const PAGE_SIZE: u32 = 10;

/// A persisted test result.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResult {
    pub id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Local>,
    pub metrics: FinalMetrics,
}

impl StoredResult {
    /// Short local timestamp for history listings.
    pub fn date_label(&self) -> String {
        self.created_at.format("%b %-d, %Y %H:%M").to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPage {
    pub results: Vec<StoredResult>,
    /// 1-based page number that was requested.
    pub page: u32,
    pub page_size: u32,
    pub total_results: u64,
    pub total_pages: u32,
}

impl HistoryPage {
    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// The highest-wpm result a user has stored.
#[derive(Debug, Clone, PartialEq)]
pub struct BestResult {
    pub wpm: f64,
    pub accuracy: f64,
    pub mode: crate::session::Mode,
    pub target_value: u32,
    pub created_at: DateTime<Local>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Aggregates {
    pub total_tests: u64,
    pub best: Option<BestResult>,
    pub average_wpm: Option<f64>,
    pub average_accuracy: Option<f64>,
}

/// Number of pages needed for `total` results.
pub fn total_pages(total: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(page_size as u64) as u32
}

/// Row offset of a 1-based page. Page 0 is treated as page 1.
pub fn page_offset(page: u32, page_size: u32) -> u64 {
    page.saturating_sub(1) as u64 * page_size as u64
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    date: String,
    mode: String,
    target_value: u32,
    duration_sec: u64,
    wpm: f64,
    raw_wpm: f64,
    accuracy: f64,
    errors: u32,
    backspaces: u32,
    chars_typed: u32,
    words_typed: u32,
    source: String,
    snippet_id: Option<&'a str>,
}

/// Write every stored result for `user` as CSV, newest first.
pub fn export_history_csv<W: Write>(store: &ResultStore, user: &User, writer: W) -> Result<usize> {
    let results = store.all_results(user)?;
    let mut csv_writer = csv::Writer::from_writer(writer);

    for result in &results {
        let m = &result.metrics;
        csv_writer.serialize(CsvRow {
            date: result.created_at.to_rfc3339(),
            mode: m.mode.to_string(),
            target_value: m.target_value,
            duration_sec: m.duration_sec,
            wpm: m.wpm,
            raw_wpm: m.raw_wpm,
            accuracy: m.accuracy,
            errors: m.errors,
            backspaces: m.backspaces,
            chars_typed: m.chars_typed,
            words_typed: m.words_typed,
            source: m.source.to_string(),
            snippet_id: m.snippet_id.as_deref(),
        })?;
    }
    csv_writer.flush()?;

    Ok(results.len())
}
