use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use spoofer_core::{CollectionObserver, CollectionSummary, ProgressSnapshot, SpooferError};
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const CLEAR_LINE: &str = "\r\x1b[K";

pub fn progress_line(snapshot: &ProgressSnapshot) -> String {
    format!(
        "Page {} | Total routed spoofers: {} | Total private spoofers: {} | ETA: {}",
        snapshot.page, snapshot.routed_matches, snapshot.private_matches, snapshot.eta
    )
}

/// Prints collection progress to stdout, keeping one live progress line.
#[derive(Default)]
pub struct ConsoleObserver {
    progress_active: AtomicBool,
}

impl ConsoleObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the live progress line before printing a full line.
    fn break_progress(&self) {
        if self.progress_active.swap(false, Ordering::Relaxed) {
            print!("{}", CLEAR_LINE);
        }
    }
}

impl CollectionObserver for ConsoleObserver {
    fn on_start(&self, start_date: &str, routed_path: &Path, private_path: &Path) {
        println!(
            "{} Starting data collection from {} to present...",
            "→".blue(),
            start_date.yellow()
        );
        println!("  Routed spoofers:  {}", routed_path.display());
        println!("  Private spoofers: {}", private_path.display());
    }

    fn on_retry(&self, _attempt: u32, _max_attempts: u32, delay: Duration, error: &SpooferError) {
        self.break_progress();
        println!(
            "{} Error fetching data: {}. Retrying in {} seconds...",
            "⚠".yellow(),
            error,
            delay.as_secs()
        );
    }

    fn on_fetch_failed(&self, attempts: u32, error: &SpooferError) {
        self.break_progress();
        println!(
            "{} Failed to fetch data after {} attempts: {}",
            "✗".red().bold(),
            attempts,
            error
        );
    }

    fn on_total_pages_estimated(&self, total_pages: u64) {
        self.break_progress();
        println!("Estimated total pages: {}", total_pages);
    }

    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        print!("{}{}", CLEAR_LINE, progress_line(snapshot));
        let _ = io::stdout().flush();
        self.progress_active.store(true, Ordering::Relaxed);
    }

    fn on_stopped(&self) {
        self.break_progress();
        println!("{}", "Failed to fetch data. Stopping.".red());
    }

    fn on_finished(&self, summary: &CollectionSummary) {
        if self.progress_active.swap(false, Ordering::Relaxed) {
            println!();
        }
        println!();

        if summary.is_complete() {
            println!("{} Data collection complete.", "✓".green().bold());
        } else {
            println!(
                "{} Data collection stopped early; partial results were kept.",
                "!".yellow().bold()
            );
        }
        println!();

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("Metric").fg(comfy_table::Color::Cyan),
                Cell::new("Value").fg(comfy_table::Color::Cyan),
            ]);

        table.add_row(vec![
            Cell::new("Total records processed"),
            Cell::new(summary.total_records.to_string()),
        ]);
        table.add_row(vec![
            Cell::new("Routed spoofers found"),
            Cell::new(summary.routed_matches.to_string()),
        ]);
        table.add_row(vec![
            Cell::new("Private spoofers found"),
            Cell::new(summary.private_matches.to_string()),
        ]);
        table.add_row(vec![
            Cell::new("Pages processed"),
            Cell::new(summary.pages_processed.to_string()),
        ]);
        table.add_row(vec![
            Cell::new("Routed output"),
            Cell::new(summary.routed_path.display().to_string()),
        ]);
        table.add_row(vec![
            Cell::new("Private output"),
            Cell::new(summary.private_path.display().to_string()),
        ]);
        table.add_row(vec![
            Cell::new("Total time"),
            Cell::new(summary.elapsed_hms()),
        ]);

        println!("{}", table);
    }
}
