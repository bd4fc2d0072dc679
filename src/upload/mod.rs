//! Upload driver. Walks the scanner output one path at a time and hands
//! each to the photos service. Strictly sequential: the first error ends
//! the run and nothing after it is attempted.

pub mod error;
pub mod exif;
pub mod prepare;

use std::io::IsTerminal;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};

use crate::photos::error::UploadServiceError;
use crate::photos::PhotosService;
use crate::scan::ImageScanner;
use crate::types::FileOutcome;

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub uploaded: usize,
    pub skipped: usize,
}

impl UploadSummary {
    pub fn total(&self) -> usize {
        self.uploaded + self.skipped
    }

    fn record(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Uploaded => self.uploaded += 1,
            FileOutcome::Skipped => self.skipped += 1,
        }
    }
}

/// Create a spinner with a consistent template.
///
/// Returns `ProgressBar::hidden()` when the user passed `--no-progress-bar`
/// or stderr is not a TTY.
fn create_spinner(no_progress_bar: bool) -> ProgressBar {
    if no_progress_bar || !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("[{elapsed_precise}] {spinner} {pos} files {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Upload every image the scanner finds that is not already online.
pub async fn upload_directory(
    scanner: &ImageScanner,
    service: &mut PhotosService,
    full_quality: bool,
    no_progress_bar: bool,
) -> Result<UploadSummary, UploadServiceError> {
    let started = Instant::now();
    let pb = create_spinner(no_progress_bar);
    let mut summary = UploadSummary::default();

    tracing::debug!("Scanning {}", scanner.root().display());
    for path in scanner {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        pb.set_message(name);

        let outcome = match service.ensure_file_uploaded(&path, full_quality).await {
            Ok(outcome) => outcome,
            Err(e) => {
                pb.finish_and_clear();
                tracing::error!("Stopping at {}: {}", path.display(), e);
                return Err(e);
            }
        };
        summary.record(outcome);
        pb.inc(1);
    }
    pb.finish_and_clear();

    tracing::info!("── Summary ──");
    tracing::info!(
        "  {} uploaded, {} already online, {} total",
        summary.uploaded,
        summary.skipped,
        summary.total()
    );
    tracing::info!("  elapsed: {}", format_duration(started.elapsed()));

    Ok(summary)
}

/// Format a duration as a human-readable string (e.g. "1h 23m 45s").
fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
