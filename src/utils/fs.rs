use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const OUTPUT_PREFIX: &str = "(Repack) ";

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    let formatted = format!("{:.2}", size);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[unit_index])
}

/// `dir/book.cbz` -> `dir/(Repack) book.cbz`
pub fn output_path_for(input: &Path) -> Result<PathBuf> {
    let name = input
        .file_name()
        .with_context(|| format!("Not a file path: {}", input.display()))?;
    Ok(input.with_file_name(format!("{}{}", OUTPUT_PREFIX, name.to_string_lossy())))
}

/// Swaps the extension of an archive entry path, keeping any directory prefix.
pub fn replace_extension(entry_path: &str, extension: &str) -> String {
    let name_start = entry_path.rfind('/').map_or(0, |i| i + 1);
    let stem_end = match entry_path[name_start..].rfind('.') {
        Some(dot) => name_start + dot,
        None => entry_path.len(),
    };
    format!("{}.{}", &entry_path[..stem_end], extension)
}

pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

pub fn remove_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path)
            .with_context(|| format!("Failed to remove existing {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1024), "1 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1048576), "1 MB");
        assert_eq!(format_bytes(1073741824), "1 GB");
        assert_eq!(format_bytes(1099511627776), "1 TB");
    }

    #[test]
    fn test_format_bytes_two_decimals() {
        assert_eq!(format_bytes(1234567), "1.18 MB");
        assert_eq!(format_bytes(1025), "1 KB");
        assert_eq!(format_bytes(2047), "2 KB");
    }

    #[test]
    fn test_output_path_for() {
        let out = output_path_for(Path::new("/comics/book.cbz")).unwrap();
        assert_eq!(out, PathBuf::from("/comics/(Repack) book.cbz"));

        let out = output_path_for(Path::new("book.cbz")).unwrap();
        assert_eq!(out, PathBuf::from("(Repack) book.cbz"));
    }

    #[test]
    fn test_replace_extension() {
        assert_eq!(replace_extension("001.jpg", "webp"), "001.webp");
        assert_eq!(replace_extension("ch1/002.PNG", "webp"), "ch1/002.webp");
        assert_eq!(replace_extension("a.b/page.jpeg", "webp"), "a.b/page.webp");
        assert_eq!(replace_extension("v1.0/cover", "webp"), "v1.0/cover.webp");
    }

    #[test]
    fn test_replace_extension_of_bare_suffix_name() {
        assert_eq!(replace_extension("pages/.jpg", "webp"), "pages/.webp");
        assert_eq!(replace_extension(".PNG", "webp"), ".webp");
    }

    #[test]
    fn test_has_extension() {
        assert!(has_extension(Path::new("x/book.cbz"), "cbz"));
        assert!(has_extension(Path::new("BOOK.CBZ"), "cbz"));
        assert!(!has_extension(Path::new("book.zip"), "cbz"));
        assert!(!has_extension(Path::new("cbz"), "cbz"));
    }
}
