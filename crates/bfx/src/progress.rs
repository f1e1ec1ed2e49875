// AI
//! 📊 progress.rs: "Are we there yet?" Every backfill, every time, forever.
//!
//! 🚀 Two jobs: a live bar while workers are sending, and a comfy table of
//! cold hard numbers when they're done.
//!
//! ⚠️ Watching this progress bar will not make it go faster.
//! Neither will refreshing it. We've tried. Science says no.
//!
//! 🦆 The duck has nothing to do with this module. It's just vibing.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};
use indicatif::{ProgressBar, ProgressStyle};

use crate::supervisors::{RunOutcome, RunReport};

/// 🔢 Formats a number with commas for the 3 people in the audience who like readability.
/// "1000000 objects" → "1,000,000 objects". You're welcome, eyes.
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// ⏱️ Formats a Duration into MM:SS.mmm or HH:MM:SS.mmm.
/// If it shows HH, you should probably call your mom. It's been a while.
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    let millis = duration.subsec_millis();
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
    } else {
        format!("{minutes:02}:{seconds:02}.{millis:03}")
    }
}

/// 📈 The live "N of M objects processed" bar, shared by every worker.
///
/// Cloning is cheap: the bar and the counter are both reference counted, and
/// both advance atomically. The counter is what tests read; the bar is what
/// humans read. Neither feeds the sent/failed accounting.
#[derive(Clone)]
pub struct DispatchProgress {
    progress_bar: ProgressBar,
    processed: Arc<AtomicU64>,
}

impl std::fmt::Debug for DispatchProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- 🎭 ProgressBar is a diva and doesn't derive Debug
        f.debug_struct("DispatchProgress")
            .field("processed", &self.processed())
            .field("total", &self.progress_bar.length())
            .finish()
    }
}

impl DispatchProgress {
    /// 🚀 A bar sized for `total` objects. `visible = false` keeps it off the terminal.
    pub fn new(total: u64, visible: bool) -> Self {
        let progress_bar = if visible {
            ProgressBar::new(total)
        } else {
            ProgressBar::hidden()
        };
        progress_bar.set_length(total);
        progress_bar.set_style(
            ProgressStyle::with_template(
                "{msg} [{bar:40.green}] {pos}/{len} ({per_sec}, eta {eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
        );
        progress_bar.set_message("Processing");

        Self {
            progress_bar,
            processed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// ➕ One object done, whichever way it went.
    pub fn advance(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        self.progress_bar.inc(1);
    }

    /// 📊 objects processed so far
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// ✅ Mark the bar done. Ring the bell. We made it.
    pub fn finish(&self) {
        self.progress_bar.finish();
    }
}

/// 🍽️ The end-of-run summary, comfy-table style.
///
/// ```text
///   Processing time          00:12.345
///   Messages sent to SQS        25,000
///   Failed messages                  3   (only when > 0)
///   Abandoned objects               10   (only when > 0)
///   Processing rate   2,025.11 objects/sec
/// ```
pub fn summary_table(report: &RunReport) -> Table {
    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    let mut add_row = |label: &str, value: String| {
        table.add_row(vec![
            Cell::new(label),
            Cell::new(value).set_alignment(CellAlignment::Right),
        ]);
    };

    add_row("Objects found", format_number(report.objects_found));
    add_row("Processing time", format_duration(report.elapsed));
    add_row("Messages sent to SQS", format_number(report.sent));
    if report.failed > 0 {
        add_row("Failed messages", format_number(report.failed));
    }
    if report.abandoned > 0 {
        add_row("Abandoned objects", format_number(report.abandoned));
    }
    add_row(
        "Processing rate",
        format!("{:.2} objects/sec", report.objects_per_sec()),
    );
    if let RunOutcome::Aborted(err) = &report.outcome {
        add_row("Aborted", format!("{err:#}"));
    }
    table
}
