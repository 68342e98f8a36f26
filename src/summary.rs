//! JSON records written at the end of an archive run and a compaction pass.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const RUN_SUMMARY_FILE: &str = "archive_summary.json";
pub const COMPACTION_SUMMARY_FILE: &str = "compression_summary.json";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    pub timestamp: DateTime<Local>,
    pub server: String,
    pub folders: Vec<String>,
    pub date_range: DateRange,
    pub total_downloaded: usize,
    pub total_errors: usize,
    pub total_deleted: usize,
    pub delete_messages: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FolderCompaction {
    pub folder_name: String,
    pub original_size_mb: f64,
    pub zip_files: Vec<String>,
    pub zip_count: usize,
    pub compressed_size_mb: f64,
    pub compression_ratio: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CompactionSummary {
    pub timestamp: DateTime<Local>,
    pub max_part_size_mb: u64,
    pub folders_compressed: Vec<FolderCompaction>,
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Bytes to MiB, rounded to two decimals.
pub fn to_mb(bytes: u64) -> f64 {
    (bytes as f64 / BYTES_PER_MB * 100.0).round() / 100.0
}

/// Percentage saved by compression: `(1 - compressed/original) * 100`.
pub fn compression_ratio(original: u64, compressed: u64) -> f64 {
    if original == 0 {
        return 0.0;
    }
    let ratio = (1.0 - compressed as f64 / original as f64) * 100.0;
    (ratio * 100.0).round() / 100.0
}
