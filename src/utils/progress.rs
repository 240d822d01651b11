use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

pub fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template(
            "[{bar:30.cyan/dim}] {percent}% ({pos}/{len}) {elapsed_precise} {prefix} - {msg}",
        )
        .unwrap()
        .progress_chars("█░░"),
    );
    pb
}

/// Per-archive tracker handed out by a [`ProgressSink`].
pub trait ChildProgress: Send + Sync {
    fn tick(&self, message: &str);
    fn set_message(&self, message: &str);
    fn finish(&self, message: &str);
}

/// Where the repack pipeline reports progress. Must tolerate calls from many
/// archive workers at once.
pub trait ProgressSink: Sync {
    fn spawn_child(&self, total: u64, label: &str) -> Box<dyn ChildProgress>;
    fn tick_root(&self);
}

fn new_multi(quiet: bool) -> MultiProgress {
    if quiet {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    } else {
        MultiProgress::new()
    }
}

/// Renders progress to the terminal. With a root bar (batch mode) every
/// archive gets its own child bar below it.
pub struct TerminalProgress {
    multi: MultiProgress,
    root: Option<ProgressBar>,
}

impl TerminalProgress {
    pub fn single(quiet: bool) -> Self {
        Self {
            multi: new_multi(quiet),
            root: None,
        }
    }

    pub fn batch(total: u64, quiet: bool) -> Self {
        let multi = new_multi(quiet);
        let root = multi.add(create_progress_bar(total));
        root.set_prefix("archives");
        Self {
            multi,
            root: Some(root),
        }
    }

    pub fn finish(&self) {
        if let Some(root) = &self.root {
            root.finish_and_clear();
        }
    }
}

impl ProgressSink for TerminalProgress {
    fn spawn_child(&self, total: u64, label: &str) -> Box<dyn ChildProgress> {
        let pb = self.multi.add(create_progress_bar(total));
        pb.set_prefix(label.to_string());
        Box::new(pb)
    }

    fn tick_root(&self) {
        if let Some(root) = &self.root {
            root.inc(1);
        }
    }
}

impl ChildProgress for ProgressBar {
    fn tick(&self, message: &str) {
        self.inc(1);
        ProgressBar::set_message(self, message.to_string());
    }

    fn set_message(&self, message: &str) {
        ProgressBar::set_message(self, message.to_string());
    }

    fn finish(&self, message: &str) {
        self.finish_with_message(message.to_string());
    }
}
