//! Walks the target mailboxes and copies matching messages to disk,
//! optionally flagging and expunging them once a local copy exists.

pub mod criteria;
pub mod persist;

use anyhow::{Context, Result};
use chrono::Local;
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

use crate::mail::{ArchivedMessage, Connector};
use crate::session::Session;
use crate::summary::{self, DateRange, RunSummary};

pub use criteria::DateFilter;

const PROGRESS_EVERY: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FolderSelection {
    Explicit(Vec<String>),
    All,
}

#[derive(Clone, Debug)]
pub struct ArchiveOptions {
    pub folders: FolderSelection,
    pub filter: DateFilter,
    /// Cap on messages attempted across the whole run.
    pub limit: Option<usize>,
    /// Set only once the confirmation gate has been passed.
    pub delete: bool,
    pub output_dir: PathBuf,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MailboxReport {
    pub name: String,
    pub found: usize,
    pub downloaded: usize,
    pub errors: usize,
    pub deleted: usize,
    pub expunged: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArchiveReport {
    pub folders: Vec<String>,
    pub mailboxes: Vec<MailboxReport>,
    pub skipped: Vec<String>,
    pub total_downloaded: usize,
    pub total_errors: usize,
    pub total_deleted: usize,
    pub limit_reached: bool,
}

impl ArchiveReport {
    fn add(&mut self, mb: MailboxReport) {
        self.total_downloaded += mb.downloaded;
        self.total_errors += mb.errors;
        self.total_deleted += mb.deleted;
        self.mailboxes.push(mb);
    }
}

/// Tracks the run-wide message cap.
struct Budget {
    limit: Option<usize>,
    attempted: usize,
    /// Set when the cap cut the run short with work left undone.
    stopped: bool,
}

impl Budget {
    fn exhausted(&self) -> bool {
        self.limit.is_some_and(|l| self.attempted >= l)
    }
}

/// Validates options, connects, archives and writes the run summary.
///
/// Nothing touches the network if the options are invalid. A failed initial
/// connection is returned as an error; per-mailbox and per-message failures
/// are only counted.
pub fn archive<C: Connector>(session: &mut Session<C>, opts: &ArchiveOptions) -> Result<ArchiveReport> {
    opts.filter.validate()?;

    fs::create_dir_all(&opts.output_dir)
        .with_context(|| format!("failed to create {}", opts.output_dir.display()))?;

    session
        .connect()
        .with_context(|| format!("failed to connect to {}", session.config().host))?;

    let report = run(session, opts);
    session.disconnect();

    info!("Archiving complete!");
    info!("Total downloaded: {}", report.total_downloaded);
    info!("Total errors: {}", report.total_errors);
    if opts.delete {
        info!("Total deleted: {}", report.total_deleted);
    }

    let summary = RunSummary {
        timestamp: Local::now(),
        server: session.config().host.clone(),
        folders: report.folders.clone(),
        date_range: DateRange {
            start: opts.filter.start,
            end: opts.filter.end,
        },
        total_downloaded: report.total_downloaded,
        total_errors: report.total_errors,
        total_deleted: report.total_deleted,
        delete_messages: opts.delete,
    };
    summary::write_json(&opts.output_dir.join(summary::RUN_SUMMARY_FILE), &summary)?;

    Ok(report)
}

/// Archives every target mailbox over an already connected session.
pub fn run<C: Connector>(session: &mut Session<C>, opts: &ArchiveOptions) -> ArchiveReport {
    let query = opts.filter.search_query();
    info!(
        "Date criteria: {}",
        opts.filter.criteria().as_deref().unwrap_or("All messages")
    );

    let folders = match resolve_folders(session, &opts.folders) {
        Ok(folders) => folders,
        Err(e) => {
            warn!("could not list mailboxes: {e:#}");
            return ArchiveReport::default();
        }
    };
    let mut report = ArchiveReport {
        folders,
        ..Default::default()
    };

    let mut budget = Budget {
        limit: opts.limit,
        attempted: 0,
        stopped: false,
    };

    for mailbox in report.folders.clone() {
        if budget.exhausted() {
            budget.stopped = true;
            break;
        }
        info!("Processing folder: {mailbox}");
        match archive_mailbox(session, &mailbox, &query, opts, &mut budget) {
            Ok(mb) => report.add(mb),
            Err(e) => {
                warn!("skipping {mailbox}: {e:#}");
                report.skipped.push(mailbox);
            }
        }
    }

    report.limit_reached = budget.stopped;
    report
}

fn resolve_folders<C: Connector>(session: &mut Session<C>, sel: &FolderSelection) -> Result<Vec<String>> {
    match sel {
        FolderSelection::Explicit(names) => Ok(names.clone()),
        FolderSelection::All => {
            let names = session.list()?;
            info!("Server reports {} mailboxes", names.len());
            Ok(names)
        }
    }
}

/// Errors returned here skip the mailbox; message failures are counted instead.
fn archive_mailbox<C: Connector>(
    session: &mut Session<C>,
    mailbox: &str,
    query: &str,
    opts: &ArchiveOptions,
    budget: &mut Budget,
) -> Result<MailboxReport> {
    let dir = opts.output_dir.join(persist::mailbox_dir_name(mailbox));
    fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    session.select(mailbox).context("select failed")?;
    debug!("searching {mailbox} with {query}");
    let uids = session.search(mailbox, query).context("search failed")?;

    let mut mb = MailboxReport {
        name: mailbox.to_string(),
        found: uids.len(),
        ..Default::default()
    };
    info!("Found {} messages in {mailbox}", uids.len());

    for (i, &uid) in uids.iter().enumerate() {
        if budget.exhausted() {
            info!("Reached limit of {} messages", budget.attempted);
            budget.stopped = true;
            break;
        }
        budget.attempted += 1;

        let n = i + 1;
        debug!("Downloading message {n}/{}: {uid}", uids.len());
        match archive_one(session, mailbox, uid, &dir, opts.delete) {
            Ok(deleted) => {
                mb.downloaded += 1;
                mb.deleted += usize::from(deleted);
            }
            Err(e) => {
                warn!("Error archiving message {uid} in {mailbox}: {e:#}");
                mb.errors += 1;
            }
        }

        if n % PROGRESS_EVERY == 0 {
            info!("Progress: {n}/{} messages processed", uids.len());
        }
    }

    if opts.delete && mb.downloaded > 0 {
        match session.expunge(mailbox) {
            Ok(n) => {
                mb.expunged = true;
                info!("Expunged {n} messages from {mailbox}");
            }
            Err(e) => warn!("expunge of {mailbox} failed: {e}"),
        }
    }

    Ok(mb)
}

/// Fetch, persist and, when asked, flag one message. Returns whether it was flagged.
fn archive_one<C: Connector>(
    session: &mut Session<C>,
    mailbox: &str,
    uid: u32,
    dir: &Path,
    delete: bool,
) -> Result<bool> {
    let raw = session.fetch(mailbox, uid).context("fetch failed")?;
    let msg = ArchivedMessage::new(uid, raw);
    persist::persist(dir, &msg)?;

    if delete {
        session.mark_deleted(mailbox, uid).context("delete-mark failed")?;
    }
    Ok(delete)
}
