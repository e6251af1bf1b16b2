use std::time::{Duration, Instant};

/// Invoked with `(progress, total)`. Cheap and non-blocking: called inline
/// from the processing thread, never from a background task.
pub type ProgressCallback<'a> = dyn FnMut(u64, u64) + 'a;

/// Throttles a progress callback so it fires at most once per
/// `min_time_between_reports`, plus unconditionally once progress reaches
/// the total.
pub struct ProgressReporter<'a> {
    min_time_between_reports: Duration,
    callback: Box<ProgressCallback<'a>>,
    last_report: Option<Instant>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(min_time_between_reports: Duration, callback: Box<ProgressCallback<'a>>) -> Self {
        ProgressReporter {
            min_time_between_reports,
            callback,
            last_report: None,
        }
    }

    pub fn report(&mut self, progress: u64, total: u64) {
        let now = Instant::now();
        let due = match self.last_report {
            None => true,
            Some(last) => now.duration_since(last) >= self.min_time_between_reports,
        };

        if due || progress >= total {
            (self.callback)(progress, total);
            self.last_report = Some(now);
        }
    }
}

/// Builds a reporter that prints `"{text}: {percent}%\r"` to stderr, the
/// same cadence as the original `make_ostream_progress_report`.
pub fn stderr_progress<'a>(text: impl Into<String>, min_time_between_reports: Duration) -> ProgressReporter<'a> {
    let text = text.into();
    ProgressReporter::new(
        min_time_between_reports,
        Box::new(move |progress, total| {
            let percent = if total == 0 { 100 } else { progress * 100 / total };
            eprint!("{text}: {percent}%\r");
        }),
    )
}
