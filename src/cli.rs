use chrono::NaiveDate;
use std::path::PathBuf;
use structopt::StructOpt;

use crate::archive::criteria::parse_date;

/// Download old messages from an IMAP server for archival, optionally
/// deleting them from the server and packing the result into zip parts.
///
/// Command-line values override the configuration file.
#[derive(StructOpt, Debug, Default)]
#[structopt(name = "imap-archiver", max_term_width = 100)]
pub struct Cli {
    /// Configuration file
    /// [default: <config dir>/imap-archiver/config.toml]
    #[structopt(long, parse(from_os_str))]
    pub config: Option<PathBuf>,

    /// IMAP server address
    #[structopt(short, long)]
    pub server: Option<String>,

    /// IMAP server port [default: 993 for TLS, 143 otherwise]
    #[structopt(short, long)]
    pub port: Option<u16>,

    /// Username for IMAP login
    #[structopt(short, long)]
    pub username: Option<String>,

    /// Password for IMAP login (prompted for if not given anywhere)
    #[structopt(long)]
    pub password: Option<String>,

    /// Connect in plain text
    #[structopt(long, conflicts_with = "starttls")]
    pub no_ssl: bool,

    /// Upgrade a plain connection with STARTTLS
    #[structopt(long)]
    pub starttls: bool,

    /// Accept invalid server certificates and host names
    #[structopt(long)]
    pub insecure: bool,

    /// Archive messages on or after this date (YYYY-MM-DD)
    #[structopt(long, parse(try_from_str = parse_date))]
    pub start_date: Option<NaiveDate>,

    /// Archive messages before this date (YYYY-MM-DD)
    #[structopt(long, parse(try_from_str = parse_date))]
    pub end_date: Option<NaiveDate>,

    /// Folders to archive [default: INBOX]
    #[structopt(long)]
    pub folders: Vec<String>,

    /// Archive every folder the server lists
    #[structopt(long, conflicts_with = "folders")]
    pub all_folders: bool,

    /// Maximum number of messages to download in this run
    #[structopt(long)]
    pub limit: Option<usize>,

    /// Output directory for archived messages [default: email_archive]
    #[structopt(short, long, parse(from_os_str))]
    pub output_dir: Option<PathBuf>,

    /// Delete archived messages from the server
    #[structopt(long)]
    pub delete: bool,

    /// Skip the deletion confirmation prompt
    #[structopt(long)]
    pub force: bool,

    /// Pack the archive into zip parts after downloading
    #[structopt(long)]
    pub compress: bool,

    /// Largest zip part in MiB [default: 100]
    #[structopt(long)]
    pub max_part_size_mb: Option<u64>,

    /// Keep the uncompressed folders after packing
    #[structopt(long)]
    pub keep_originals: bool,

    /// Only pack an existing archive directory; do not connect
    #[structopt(long)]
    pub compress_only: bool,

    /// Log protocol-level detail
    #[structopt(short, long)]
    pub verbose: bool,
}
