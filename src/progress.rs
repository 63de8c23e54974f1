//! Console reporting for benchmark runs: spinner while running, table at the end.

use std::time::Duration;

use davbench_core::workflow::{Reporter, SpeedSummary, SuiteReport, format_bytes};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

/// Reporter that drives a terminal spinner.
///
/// Progress lines are printed above the spinner so they stay in the
/// scrollback; the spinner itself shows the latest line.
pub(crate) struct ConsoleReporter {
    spinner: ProgressBar,
}

impl ConsoleReporter {
    /// A visible spinner, or a hidden one when `use_spinner` is false.
    pub(crate) fn new(use_spinner: bool) -> Self {
        if !use_spinner {
            return Self {
                spinner: ProgressBar::hidden(),
            };
        }
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));
        Self { spinner }
    }

    pub(crate) fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl Reporter for ConsoleReporter {
    fn broadcast(&self, message: &str) {
        if !self.spinner.is_hidden() {
            self.spinner.println(message);
        }
        self.spinner.set_message(message.to_string());
    }

    fn send_result(&self, report: &SuiteReport) {
        debug!(
            scenarios = report.scenarios().count(),
            errors = report.error_count(),
            "result snapshot"
        );
    }
}

/// Renders the final report as a plain-text table.
pub(crate) fn render_table(report: &SuiteReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("Server:  {}\n", report.target_url));
    if !report.server_version.is_empty() {
        out.push_str(&format!("Version: {}\n", report.server_version));
    }
    out.push('\n');
    out.push_str(&format!(
        "{:<44} {:>6} {:>12} {:>10} {:>7}\n",
        "Scenario", "Files", "Size", "MB/s", "Errors"
    ));
    for summary in report.scenarios() {
        out.push_str(&render_row(summary));
    }
    if let Some(error) = &report.error {
        out.push_str(&format!("\nRun stopped: {error}\n"));
    }
    out
}

fn render_row(summary: &SpeedSummary) -> String {
    format!(
        "{:<44} {:>6} {:>12} {:>10.2} {:>7}\n",
        summary.scenario,
        summary.files,
        format_bytes(summary.total_bytes),
        summary.speed_mbps,
        summary.errors.len()
    )
}
