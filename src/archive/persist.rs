use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::compact::COMPRESSED_DIR;
use crate::mail::ArchivedMessage;

pub const RAW_EXT: &str = "eml";
pub const METADATA_SUFFIX: &str = "_metadata.json";
const MAX_SUBJECT_LEN: usize = 50;

/// Sidecar record written next to each raw message.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageMeta {
    pub message_id: String,
    pub subject: String,
    pub from: String,
    pub date: String,
    pub filename: String,
}

/// Keeps alphanumerics, space, `-` and `_`, trimmed and capped at 50 chars.
pub fn safe_subject(subject: &str) -> String {
    let cleaned: String = subject
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    cleaned.trim_end().chars().take(MAX_SUBJECT_LEN).collect()
}

/// Directory name for a mailbox; hierarchy separators are flattened.
///
/// Names that would escape the archive root or collide with the compaction
/// output directory get a leading `_`.
pub fn mailbox_dir_name(mailbox: &str) -> String {
    let flat = mailbox.replace('/', "_");
    match flat.as_str() {
        "" | "." | ".." | COMPRESSED_DIR => format!("_{flat}"),
        _ => flat,
    }
}

fn write_durably(path: &Path, data: &[u8]) -> Result<()> {
    let mut f = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    f.write_all(data)
        .and_then(|_| f.sync_all())
        .with_context(|| format!("failed to write {}", path.display()))
}

/// Writes the raw message then its metadata; returns the raw file's path.
///
/// Both files are synced before returning.
pub fn persist(dir: &Path, msg: &ArchivedMessage) -> Result<PathBuf> {
    let stem = format!("{}_{}", msg.uid, safe_subject(&msg.headers.subject));
    let filename = format!("{stem}.{RAW_EXT}");
    let raw_path = dir.join(&filename);
    write_durably(&raw_path, &msg.raw)?;

    let meta = MessageMeta {
        message_id: msg.uid.to_string(),
        subject: msg.headers.subject.clone(),
        from: msg.headers.from.clone(),
        date: msg.headers.date.clone(),
        filename,
    };
    let json = serde_json::to_vec_pretty(&meta)?;
    write_durably(&dir.join(format!("{stem}{METADATA_SUFFIX}")), &json)?;

    Ok(raw_path)
}

pub fn is_metadata_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(METADATA_SUFFIX))
}

pub fn read_metadata(path: &Path) -> Result<MessageMeta> {
    let data = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&data).with_context(|| format!("invalid metadata {}", path.display()))
}
