use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{Read, Seek, Write};
use std::path::Path;
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::core::scanner::{scan_entries, ArchiveScan, EntryKind};
use crate::core::transcoder::{transcode, TARGET_EXTENSION};
use crate::types::{ratio_percent, RepackOptions, RepackResult, SkippedEntry, TranscodeConfig};
use crate::utils::fs::{format_bytes, output_path_for, remove_if_exists, replace_extension};
use crate::utils::progress::{ChildProgress, ProgressSink};

/// Highest Deflate level the container supports.
const MAX_DEFLATE_LEVEL: i64 = 9;

/// Entry sizes come from the archive header, so preallocation is capped.
const MAX_PREALLOC: u64 = 64 * 1024 * 1024;

/// Repacks one archive into `(Repack) <name>` next to it. Page images are
/// transcoded one after another in archive order; an image that fails to
/// decode or encode is skipped and the rest of the archive still goes out.
pub fn repack_archive(
    input: &Path,
    config: &TranscodeConfig,
    options: &RepackOptions,
    progress: &dyn ProgressSink,
) -> Result<RepackResult> {
    if !input.is_file() {
        bail!("Input not found: {}", input.display());
    }

    let output = output_path_for(input)?;
    remove_if_exists(&output)?;

    let source =
        File::open(input).with_context(|| format!("Failed to open {}", input.display()))?;
    let mut archive = ZipArchive::new(source)
        .with_context(|| format!("Not a readable archive: {}", input.display()))?;
    let scan = scan_entries(&mut archive)?;
    let image_count = scan.image_count();

    debug!(
        input = %input.display(),
        entries = scan.entries.len(),
        images = image_count,
        "Repacking archive"
    );

    let label = input
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let child = progress.spawn_child(image_count as u64, &label);

    let target = File::create(&output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let written = match write_archive(&mut archive, &scan, target, config, options, child.as_ref())
    {
        Ok(written) => written,
        Err(e) => {
            if let Err(remove_err) = fs::remove_file(&output) {
                warn!(output = %output.display(), error = %remove_err, "Failed to remove partial output");
            }
            return Err(e);
        }
    };

    let original_size = fs::metadata(input)?.len();
    let new_size = fs::metadata(&output)?.len();
    let ratio = ratio_percent(original_size, new_size);

    child.finish(&format!(
        "{} -> {} ({}%)",
        format_bytes(original_size),
        format_bytes(new_size),
        ratio
    ));

    Ok(RepackResult {
        output,
        original_size,
        new_size,
        ratio_percent: ratio,
        images_written: written.images,
        entries_copied: written.copied,
        skipped: written.skipped,
    })
}

#[derive(Default)]
struct WrittenEntries {
    images: usize,
    copied: usize,
    skipped: Vec<SkippedEntry>,
}

/// Writes the comment and every entry of `scan` into `target` in archive
/// order. Only failures that leave the output unusable are returned as errors.
fn write_archive<R: Read + Seek, W: Write + Seek>(
    archive: &mut ZipArchive<R>,
    scan: &ArchiveScan,
    target: W,
    config: &TranscodeConfig,
    options: &RepackOptions,
    child: &dyn ChildProgress,
) -> Result<WrittenEntries> {
    let mut writer = ZipWriter::new(target);
    writer.set_raw_comment(Box::from(archive.comment()));

    let file_options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(MAX_DEFLATE_LEVEL));

    let mut written_names = HashSet::new();
    let mut written = WrittenEntries::default();

    for entry in &scan.entries {
        if entry.kind == EntryKind::Other {
            if options.keep_other_entries && written_names.insert(entry.path.clone()) {
                let raw = archive
                    .by_index_raw(entry.index)
                    .with_context(|| format!("Failed to read {}", entry.path))?;
                writer
                    .raw_copy_file(raw)
                    .with_context(|| format!("Failed to copy {}", entry.path))?;
                written.copied += 1;
            } else {
                debug!(entry = %entry.path, "Leaving out non-image entry");
            }
            continue;
        }

        let new_name = replace_extension(&entry.path, TARGET_EXTENSION);
        if written_names.contains(&new_name) {
            warn!(entry = %entry.path, output = %new_name, "Skipping page image with a duplicate output name");
            written.skip(child, &entry.path, format!("{} is already in the archive", new_name));
            continue;
        }

        debug!(
            entry = %entry.path,
            size = entry.size,
            compressed_size = entry.compressed_size,
            "Transcoding page image"
        );
        child.set_message(&entry.path);

        let mut data = Vec::with_capacity(entry.size.min(MAX_PREALLOC) as usize);
        let read = archive
            .by_index(entry.index)
            .with_context(|| format!("Failed to open {}", entry.path))?
            .read_to_end(&mut data);
        if let Err(e) = read {
            warn!(entry = %entry.path, error = %e, "Skipping unreadable page image");
            written.skip(child, &entry.path, format!("read failed: {}", e));
            continue;
        }

        match transcode(&data, config) {
            Ok(encoded) => {
                writer
                    .start_file(new_name.as_str(), file_options)
                    .with_context(|| format!("Failed to add {}", new_name))?;
                writer
                    .write_all(&encoded.bytes)
                    .with_context(|| format!("Failed to write {}", new_name))?;
                written_names.insert(new_name);
                written.images += 1;
                child.tick(&format!("{} ({}x{})", entry.path, encoded.width, encoded.height));
            }
            Err(e) => {
                warn!(entry = %entry.path, stage = e.stage(), error = %e, "Skipping page image");
                written.skip(child, &entry.path, e.to_string());
            }
        }
    }

    writer.finish().context("Failed to finish archive")?;
    Ok(written)
}

impl WrittenEntries {
    fn skip(&mut self, child: &dyn ChildProgress, path: &str, reason: String) {
        self.skipped.push(SkippedEntry {
            path: path.to_string(),
            reason,
        });
        child.tick(&format!("skipped {}", path));
    }
}
