use anyhow::{Context, Result};
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::utils::fs::has_extension;

pub const ARCHIVE_EXTENSION: &str = "cbz";

const IMAGE_EXTENSIONS: [&str; 4] = [".jpg", ".jpeg", ".png", ".bmp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Image,
    Other,
}

#[derive(Debug, Clone)]
pub struct EntryRef {
    pub index: usize,
    pub path: String,
    pub size: u64,
    pub compressed_size: u64,
    pub kind: EntryKind,
}

#[derive(Debug, Clone, Default)]
pub struct ArchiveScan {
    pub entries: Vec<EntryRef>,
}

impl ArchiveScan {
    /// Page images in archive order.
    pub fn images(&self) -> impl Iterator<Item = &EntryRef> {
        self.entries.iter().filter(|e| e.kind == EntryKind::Image)
    }

    pub fn image_count(&self) -> usize {
        self.images().count()
    }
}

pub fn is_page_image(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Lists the file entries of an archive in their stored order. Directory
/// entries are left out.
pub fn scan_entries<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<ArchiveScan> {
    let mut entries = Vec::with_capacity(archive.len());

    for index in 0..archive.len() {
        let file = archive
            .by_index_raw(index)
            .with_context(|| format!("Failed to read entry #{}", index))?;
        if file.is_dir() {
            continue;
        }

        let path = file.name().to_string();
        let kind = if is_page_image(&path) {
            EntryKind::Image
        } else {
            EntryKind::Other
        };

        entries.push(EntryRef {
            index,
            path,
            size: file.size(),
            compressed_size: file.compressed_size(),
            kind,
        });
    }

    Ok(ArchiveScan { entries })
}

/// Archives sitting directly inside `dir`, sorted by name.
pub fn find_archives(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut archives = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
        if entry.file_type().is_file() && has_extension(entry.path(), ARCHIVE_EXTENSION) {
            archives.push(entry.into_path());
        }
    }

    archives.sort();
    Ok(archives)
}
