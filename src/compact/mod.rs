//! Repacks archived mailbox directories into size-capped zip parts labeled
//! by the time span of their messages.

pub mod pack;
pub mod range;

use anyhow::{Context, Result};
use chrono::Local;
use log::{info, warn};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::summary::{self, CompactionSummary, FolderCompaction};
use pack::{Container, PackEntry};

/// Subdirectory of the archive root holding the zip parts; never packed itself.
pub const COMPRESSED_DIR: &str = "compressed";
const COMPRESSION_LEVEL: i64 = 6;
const BYTES_PER_MB: u64 = 1024 * 1024;

#[derive(Clone, Debug)]
pub struct CompactOptions {
    pub root: PathBuf,
    pub max_part_size_mb: u64,
    pub keep_originals: bool,
}

impl CompactOptions {
    pub fn cap_bytes(&self) -> u64 {
        self.max_part_size_mb.saturating_mul(BYTES_PER_MB)
    }
}

/// Compacts every mailbox directory under `opts.root` and writes the summary.
pub fn compact(opts: &CompactOptions) -> Result<CompactionSummary> {
    let out_dir = opts.root.join(COMPRESSED_DIR);
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let mut folders = Vec::new();
    for dir in mailbox_dirs(&opts.root)? {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!("Compressing folder: {name}");

        match compact_folder(&dir, &name, &out_dir, opts.cap_bytes()) {
            Ok(Some(entry)) => {
                info!(
                    "{name}: {:.2} MB -> {:.2} MB in {} part(s), {:.2}% smaller",
                    entry.original_size_mb,
                    entry.compressed_size_mb,
                    entry.zip_count,
                    entry.compression_ratio
                );
                if !opts.keep_originals {
                    remove_originals(&dir);
                }
                folders.push(entry);
            }
            Ok(None) => info!("{name} is empty, skipping"),
            Err(e) => warn!("could not compress {name}, originals kept: {e:#}"),
        }
    }

    let summary = CompactionSummary {
        timestamp: Local::now(),
        max_part_size_mb: opts.max_part_size_mb,
        folders_compressed: folders,
    };
    summary::write_json(&out_dir.join(summary::COMPACTION_SUMMARY_FILE), &summary)?;
    Ok(summary)
}

/// Immediate subdirectories of `root`, by name, excluding the output directory.
fn mailbox_dirs(root: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to read {}", root.display()))?;
        if entry.file_type().is_dir() && entry.file_name() != COMPRESSED_DIR {
            dirs.push(entry.into_path());
        }
    }
    Ok(dirs)
}

/// Every regular file under `dir`, recursively, in path order.
pub fn walk_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", dir.display()))?;
        if entry.file_type().is_file() {
            out.push(entry.into_path());
        }
    }
    Ok(out)
}

/// Removes a packed mailbox directory. Failure leaves the originals behind
/// next to their parts and is only logged.
fn remove_originals(dir: &Path) -> bool {
    match fs::remove_dir_all(dir) {
        Ok(()) => true,
        Err(e) => {
            warn!("could not remove {} after packing: {e}", dir.display());
            false
        }
    }
}

/// Deletes the parts of a folder whose packing failed part way through.
fn discard_parts(out_dir: &Path, names: &[String]) {
    for name in names {
        let path = out_dir.join(name);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("could not remove partial part {}: {e}", path.display()),
        }
    }
}

fn collect_entries(dir: &Path) -> Result<Vec<PackEntry>> {
    walk_files(dir)?
        .into_iter()
        .map(|path| -> Result<PackEntry> {
            let size = fs::metadata(&path)?.len();
            let rel = path.strip_prefix(dir)?.to_path_buf();
            Ok(PackEntry { path: rel, size })
        })
        .collect()
}

/// Packs one mailbox directory. `None` means it held no files.
fn compact_folder(dir: &Path, name: &str, out_dir: &Path, cap: u64) -> Result<Option<FolderCompaction>> {
    let entries = collect_entries(dir)?;
    if entries.is_empty() {
        return Ok(None);
    }
    let original: u64 = entries.iter().map(|e| e.size).sum();

    let label = range::base_label(name, range::content_range(dir)?);
    let containers = pack::pack(entries, cap);

    let mut zip_files = Vec::with_capacity(containers.len());
    let mut compressed = 0;
    for (i, container) in containers.iter().enumerate() {
        let zip_name = format!("{label}_part{:03}.zip", i + 1);
        if container.cap_exceeded {
            warn!(
                "{zip_name} holds a single {} byte file, over the {cap} byte cap",
                container.size
            );
        }
        let dest = out_dir.join(&zip_name);
        let written = match write_container(dir, container, &dest) {
            Ok(n) => n,
            Err(e) => {
                discard_parts(out_dir, &zip_files);
                if dest.is_file() {
                    discard_parts(out_dir, &[zip_name]);
                }
                return Err(e);
            }
        };
        compressed += written;
        zip_files.push(zip_name);
    }

    Ok(Some(FolderCompaction {
        folder_name: name.to_string(),
        original_size_mb: summary::to_mb(original),
        zip_count: zip_files.len(),
        zip_files,
        compressed_size_mb: summary::to_mb(compressed),
        compression_ratio: summary::compression_ratio(original, compressed),
    }))
}

/// Writes one zip part, returning its size on disk.
fn write_container(src: &Path, container: &Container, dest: &Path) -> Result<u64> {
    let file = File::create(dest).with_context(|| format!("failed to create {}", dest.display()))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(COMPRESSION_LEVEL));

    for entry in &container.entries {
        let name = entry
            .path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        zip.start_file(name, options)?;
        let mut f = File::open(src.join(&entry.path))?;
        io::copy(&mut f, &mut zip)?;
    }

    let file = zip.finish()?;
    file.sync_all()?;
    Ok(file.metadata()?.len())
}
