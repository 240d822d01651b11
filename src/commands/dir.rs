use anyhow::{bail, Result};
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::warn;

use crate::commands::file::print_box;
use crate::core::repacker::repack_archive;
use crate::core::scanner::{find_archives, ARCHIVE_EXTENSION};
use crate::types::{ArchiveOutcome, DirOptions, Outcome, RepackOptions, TranscodeConfig};
use crate::utils::fs::{format_bytes, OUTPUT_PREFIX};
use crate::utils::progress::{ProgressSink, TerminalProgress};

pub fn repack_dir(options: &DirOptions) -> Result<Vec<ArchiveOutcome>> {
    let dir = &options.dir;

    if !dir.is_dir() {
        eprintln!("Directory not found: {}", dir.display());
        return Ok(Vec::new());
    }

    let archives = find_archives(dir)?;
    if archives.is_empty() {
        eprintln!("No .{} archives found in {}", ARCHIVE_EXTENSION, dir.display());
        return Ok(Vec::new());
    }

    let jobs = options.jobs.unwrap_or_else(default_jobs);
    let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;

    if !options.quiet {
        eprintln!(
            "Repacking {} archives in {} ({} workers)",
            archives.len(),
            dir.display(),
            jobs
        );
    }

    let progress = TerminalProgress::batch(archives.len() as u64, options.quiet);
    let start = Instant::now();
    let outcomes =
        pool.install(|| run_batch(&archives, &options.config, &options.repack, &progress));
    let elapsed = start.elapsed().as_secs_f64();
    progress.finish();

    if !options.quiet {
        print_summary(&outcomes, elapsed);
    }

    if options.json {
        println!("{}", serde_json::to_string_pretty(&outcomes)?);
    }

    let failed = outcomes.iter().filter(|o| o.is_failed()).count();
    if failed > 0 {
        bail!("{} of {} archives failed to repack", failed, outcomes.len());
    }

    Ok(outcomes)
}

/// Repacks every archive on the current rayon pool. Each archive gets its own
/// outcome; one failing archive does not stop the others.
pub fn run_batch(
    archives: &[PathBuf],
    config: &TranscodeConfig,
    options: &RepackOptions,
    progress: &dyn ProgressSink,
) -> Vec<ArchiveOutcome> {
    let mut outcomes = Vec::with_capacity(archives.len());

    for wave in repack_waves(archives) {
        let finished: Vec<ArchiveOutcome> = wave
            .par_iter()
            .map(|input| {
                let outcome = match repack_archive(input, config, options, progress) {
                    Ok(result) => Outcome::Repacked(result),
                    Err(e) => {
                        warn!(archive = %input.display(), error = ?e, "Archive failed");
                        Outcome::Failed {
                            error: format!("{:#}", e),
                        }
                    }
                };
                progress.tick_root();

                ArchiveOutcome {
                    input: input.to_path_buf(),
                    outcome,
                }
            })
            .collect();
        outcomes.extend(finished);
    }

    outcomes.sort_by(|a, b| a.input.cmp(&b.input));
    outcomes
}

/// Splits archives into rounds that can run side by side. An archive whose
/// file is the output of another matched archive (`(Repack) a.cbz` next to
/// `a.cbz`) runs in a later round than the one that rewrites it.
fn repack_waves(archives: &[PathBuf]) -> Vec<Vec<&Path>> {
    let matched: HashSet<&Path> = archives.iter().map(PathBuf::as_path).collect();
    let mut waves: Vec<Vec<&Path>> = Vec::new();

    for archive in archives {
        let mut depth = 0;
        let mut current = archive.clone();
        while let Some(source) = source_of(&current) {
            if !matched.contains(source.as_path()) {
                break;
            }
            depth += 1;
            current = source;
        }

        if waves.len() <= depth {
            waves.resize_with(depth + 1, Vec::new);
        }
        waves[depth].push(archive.as_path());
    }

    waves
}

/// `dir/(Repack) a.cbz` -> `dir/a.cbz`
fn source_of(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    let original = name.strip_prefix(OUTPUT_PREFIX)?;
    Some(path.with_file_name(original))
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn print_summary(outcomes: &[ArchiveOutcome], elapsed: f64) {
    let mut lines = Vec::with_capacity(outcomes.len() + 2);
    let mut original_total = 0;
    let mut new_total = 0;

    for outcome in outcomes {
        let name = outcome
            .input
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        match &outcome.outcome {
            Outcome::Repacked(result) => {
                original_total += result.original_size;
                new_total += result.new_size;
                let skipped = if result.skipped.is_empty() {
                    String::new()
                } else {
                    format!(", {} skipped", result.skipped.len())
                };
                lines.push(format!(
                    "  ✓ {}: {} -> {} ({}%{})",
                    name,
                    format_bytes(result.original_size),
                    format_bytes(result.new_size),
                    result.ratio_percent,
                    skipped
                ));
            }
            Outcome::Failed { error } => {
                lines.push(format!("  ✗ {}: {}", name, error));
            }
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "Total: {} -> {}",
        format_bytes(original_total),
        format_bytes(new_total)
    ));
    lines.push(format!("Time: {:.1}s", elapsed));

    let any_failed = outcomes.iter().any(|o| o.is_failed());
    let color = if any_failed { "\x1b[31m" } else { "\x1b[32m" };
    let line_refs: Vec<&str> = lines.iter().map(|s| s.as_str()).collect();
    print_box("Batch Complete", &line_refs, color);
}
