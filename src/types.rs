use serde::Serialize;
use std::path::PathBuf;

/// Encoder settings shared read-only by every entry of every archive in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscodeConfig {
    /// Lossy quality, 0 to 100. Out-of-range values reach the encoder unchanged.
    pub quality: i32,
    /// Upper bound on output height. `None` disables downscaling.
    pub max_height: Option<u32>,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            quality: 75,
            max_height: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RepackOptions {
    /// Copy entries that are not page images into the output unchanged.
    pub keep_other_entries: bool,
}

#[derive(Debug, Clone)]
pub struct FileOptions {
    pub input: PathBuf,
    pub config: TranscodeConfig,
    pub repack: RepackOptions,
    pub json: bool,
    pub quiet: bool,
}

#[derive(Debug, Clone)]
pub struct DirOptions {
    pub dir: PathBuf,
    pub config: TranscodeConfig,
    pub repack: RepackOptions,
    pub jobs: Option<usize>,
    pub json: bool,
    pub quiet: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedEntry {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepackResult {
    pub output: PathBuf,
    pub original_size: u64,
    pub new_size: u64,
    pub ratio_percent: f64,
    pub images_written: usize,
    pub entries_copied: usize,
    pub skipped: Vec<SkippedEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Repacked(RepackResult),
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveOutcome {
    pub input: PathBuf,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl ArchiveOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, Outcome::Failed { .. })
    }
}

/// `new / original * 100`, rounded to two decimals.
pub fn ratio_percent(original_size: u64, new_size: u64) -> f64 {
    if original_size == 0 {
        return 0.0;
    }
    let ratio = new_size as f64 / original_size as f64 * 100.0;
    (ratio * 100.0).round() / 100.0
}
