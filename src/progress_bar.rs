use indicatif::{MultiProgress, ProgressStyle};

/// Progress over a batch of files, weighted by file size so large images
/// move the bar proportionally to the time they take.
pub struct ProgressBar {
    inner: indicatif::ProgressBar,
}

impl ProgressBar {
    pub fn new(multi_progress: MultiProgress, prefix: &str, total_bytes: u64) -> Self {
        let style = ProgressStyle::with_template(
            "{prefix:.bold} [{bar:40.cyan/blue}] {binary_bytes}/{binary_total_bytes} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");

        let inner = multi_progress.add(indicatif::ProgressBar::new(total_bytes));
        inner.set_style(style);
        inner.set_prefix(prefix.to_string());

        Self { inner }
    }

    /// A bar that draws nothing, for runs that print per-file logs instead.
    pub fn hidden() -> Self {
        Self {
            inner: indicatif::ProgressBar::hidden(),
        }
    }

    pub fn set_msg(&self, msg: &str) {
        self.inner.set_message(msg.to_string());
    }

    pub fn inc(&self, bytes: u64) {
        self.inner.inc(bytes);
    }

    pub fn finish(&self) {
        self.inner.finish_and_clear();
    }
}
