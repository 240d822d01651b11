use anyhow::{Context, Result};
use std::time::Instant;

use crate::core::repacker::repack_archive;
use crate::types::{FileOptions, RepackResult};
use crate::utils::fs::format_bytes;
use crate::utils::progress::TerminalProgress;

pub fn repack_file(options: &FileOptions) -> Result<Option<RepackResult>> {
    let input = &options.input;

    if !input.is_file() {
        eprintln!("File not found: {}", input.display());
        return Ok(None);
    }

    if !options.quiet {
        eprintln!("Repacking {}", input.display());
    }

    let progress = TerminalProgress::single(options.quiet);
    let start = Instant::now();
    let result = repack_archive(input, &options.config, &options.repack, &progress)
        .with_context(|| format!("Failed to repack {}", input.display()))?;
    let elapsed = start.elapsed().as_secs_f64();

    if !options.quiet {
        let mut lines = vec![
            format!("Output: {}", result.output.display()),
            format!(
                "Size: {} -> {} ({}%)",
                format_bytes(result.original_size),
                format_bytes(result.new_size),
                result.ratio_percent
            ),
            format!("Pages: {} written, {} skipped", result.images_written, result.skipped.len()),
        ];
        if result.entries_copied > 0 {
            lines.push(format!("Copied as-is: {}", result.entries_copied));
        }
        for skipped in result.skipped.iter().take(10) {
            lines.push(format!("  ! {}: {}", skipped.path, skipped.reason));
        }
        lines.push(format!("Time: {:.1}s", elapsed));

        let color = if result.skipped.is_empty() {
            "\x1b[32m"
        } else {
            "\x1b[33m"
        };
        let line_refs: Vec<&str> = lines.iter().map(|s| s.as_str()).collect();
        print_box("Repack Complete", &line_refs, color);
    }

    if options.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    Ok(Some(result))
}

pub fn print_box(title: &str, lines: &[&str], color: &str) {
    let reset = "\x1b[0m";
    let max_width = lines
        .iter()
        .map(|l| l.chars().count())
        .max()
        .unwrap_or(0)
        .max(title.len() + 4);
    let width = max_width + 2;

    eprintln!(
        "{}┌─ {} {}─┐{}",
        color,
        title,
        "─".repeat(width.saturating_sub(title.len() + 4)),
        reset
    );
    for line in lines {
        eprintln!(
            "{}│{} {}{:<pad$} {}│{}",
            color,
            reset,
            line,
            "",
            color,
            reset,
            pad = width.saturating_sub(line.chars().count() + 1)
        );
    }
    eprintln!("{}└{}┘{}", color, "─".repeat(width), reset);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::repacker::tests::{read_cbz, write_cbz};
    use crate::core::transcoder::tests::encode_test_image;
    use crate::types::{RepackOptions, TranscodeConfig};
    use image::ImageFormat;
    use std::path::Path;

    fn options(input: &Path) -> FileOptions {
        FileOptions {
            input: input.to_path_buf(),
            config: TranscodeConfig::default(),
            repack: RepackOptions::default(),
            json: false,
            quiet: true,
        }
    }

    #[test]
    fn test_missing_file_is_reported_not_fatal() {
        let temp = tempfile::tempdir().unwrap();
        let input = temp.path().join("nope.cbz");

        let result = repack_file(&options(&input)).unwrap();

        assert!(result.is_none());
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_repacks_single_file() {
        let temp = tempfile::tempdir().unwrap();
        let input = temp.path().join("vol1.cbz");
        write_cbz(
            &input,
            &[("p1.png", encode_test_image(20, 20, ImageFormat::Png))],
            b"",
        );

        let result = repack_file(&options(&input)).unwrap().unwrap();

        let (entries, _) = read_cbz(&result.output);
        assert_eq!(entries[0].0, "p1.webp");
    }

    #[test]
    fn test_unreadable_archive_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let input = temp.path().join("bad.cbz");
        std::fs::write(&input, b"garbage").unwrap();

        let err = repack_file(&options(&input)).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to repack"));
    }
}
