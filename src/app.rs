use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use crate::archive::{self, ArchiveOptions, DateFilter, FolderSelection};
use crate::cli::Cli;
use crate::compact::{self, CompactOptions};
use crate::config::{self, Config, Security, ServerConfig};
use crate::session::Session;

const PASSWORD_ENV: &str = "IMAP_ARCHIVER_PASSWORD";

/// A fully resolved run: file config with command-line overrides applied.
pub struct Plan {
    pub server: Option<ServerConfig>,
    pub archive: ArchiveOptions,
    pub compact: Option<CompactOptions>,
    pub force: bool,
    pub compress_only: bool,
}

pub fn run(cli: Cli) -> Result<()> {
    let cfg = Config::load(cli.config.as_deref())?;
    let mut plan = resolve(&cli, cfg)?;

    if plan.compress_only {
        let opts = plan
            .compact
            .ok_or_else(|| anyhow!("--compress-only needs compression settings"))?;
        report_compaction(&compact::compact(&opts)?);
        return Ok(());
    }

    plan.archive.filter.validate()?;

    let mut server = plan
        .server
        .take()
        .ok_or_else(|| anyhow!("server and username are required"))?;

    info!("Starting email archival from {}:{}", server.host, server.port);
    info!("Username: {}", server.username);
    info!("Security: {:?}", server.security);
    info!("Output directory: {}", plan.archive.output_dir.display());

    if plan.archive.delete && !plan.force {
        let stdin = io::stdin();
        if !confirm_deletion(&mut stdin.lock(), &mut io::stderr())? {
            info!("Deletion not confirmed; nothing was done");
            return Ok(());
        }
    }

    if server.password.is_empty() {
        server.password = acquire_password(&server.username)?;
    }

    let mut session = Session::new(server);
    let report = archive::archive(&mut session, &plan.archive)?;

    for mb in &report.mailboxes {
        info!(
            "{}: {} found, {} downloaded, {} errors, {} deleted{}",
            mb.name,
            mb.found,
            mb.downloaded,
            mb.errors,
            mb.deleted,
            if mb.expunged { ", expunged" } else { "" }
        );
    }
    for name in &report.skipped {
        warn!("{name}: skipped");
    }
    if report.limit_reached {
        info!("Stopped at the message limit");
    }
    if session.reconnect_count() > 0 {
        info!("Reconnected {} time(s) during the run", session.reconnect_count());
    }

    if let Some(opts) = &plan.compact {
        report_compaction(&compact::compact(opts)?);
    }

    info!("Archival completed successfully!");
    Ok(())
}

fn report_compaction(summary: &crate::summary::CompactionSummary) {
    let parts: usize = summary.folders_compressed.iter().map(|f| f.zip_count).sum();
    info!(
        "Compression complete: {} folder(s) into {parts} part(s)",
        summary.folders_compressed.len()
    );
}

pub fn resolve(cli: &Cli, cfg: Config) -> Result<Plan> {
    let security = if cli.no_ssl {
        Security::None
    } else if cli.starttls {
        Security::Starttls
    } else {
        cfg.server.security
    };

    let host = cli.server.clone().or(cfg.server.host);
    let username = cli.username.clone().or(cfg.server.username);
    let server = match (host, username) {
        (Some(host), Some(username)) => Some(ServerConfig {
            host,
            port: cli.port.or(cfg.server.port).unwrap_or_else(|| security.default_port()),
            username,
            password: cli.password.clone().or(cfg.server.password).unwrap_or_default(),
            security,
            accept_invalid_certs: cli.insecure || cfg.server.accept_invalid_certs,
        }),
        _ => None,
    };

    let folders = if cli.all_folders || (cli.folders.is_empty() && cfg.archive.all_folders) {
        FolderSelection::All
    } else if !cli.folders.is_empty() {
        FolderSelection::Explicit(cli.folders.clone())
    } else if !cfg.archive.folders.is_empty() {
        FolderSelection::Explicit(cfg.archive.folders)
    } else {
        FolderSelection::Explicit(vec![config::DEFAULT_FOLDER.to_string()])
    };

    let output_dir = cli
        .output_dir
        .clone()
        .or(cfg.archive.output_dir)
        .unwrap_or_else(|| PathBuf::from(config::DEFAULT_OUTPUT_DIR));

    let compress = cli.compress || cli.compress_only || cfg.compress.enabled;
    let compact = compress.then(|| CompactOptions {
        root: output_dir.clone(),
        max_part_size_mb: cli.max_part_size_mb.unwrap_or(cfg.compress.max_part_size_mb),
        keep_originals: cli.keep_originals || cfg.compress.keep_originals,
    });
    if let Some(c) = &compact {
        if c.max_part_size_mb == 0 {
            return Err(anyhow!("max part size must be at least 1 MiB"));
        }
    }

    Ok(Plan {
        server,
        archive: ArchiveOptions {
            folders,
            filter: DateFilter::new(cli.start_date, cli.end_date),
            limit: cli.limit.or(cfg.archive.limit),
            delete: cli.delete || cfg.archive.delete,
            output_dir,
        },
        compact,
        force: cli.force,
        compress_only: cli.compress_only,
    })
}

/// Asks the operator to type `yes` before anything is deleted.
pub fn confirm_deletion(input: &mut impl BufRead, prompt: &mut impl Write) -> Result<bool> {
    write!(
        prompt,
        "Archived messages will be PERMANENTLY DELETED from the server.\nType 'yes' to continue: "
    )?;
    prompt.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("yes"))
}

fn acquire_password(username: &str) -> Result<String> {
    if let Ok(p) = env::var(PASSWORD_ENV) {
        return Ok(p);
    }
    rpassword::prompt_password(format!("Password for {username}: "))
        .context("failed to read password")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Cursor;

    fn cli() -> Cli {
        Cli {
            server: Some("mail.example.com".into()),
            username: Some("user@example.com".into()),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_when_only_server_given() {
        let plan = resolve(&cli(), Config::default()).unwrap();
        let server = plan.server.unwrap();
        assert_eq!(server.port, 993);
        assert_eq!(server.security, Security::Tls);
        assert_eq!(
            plan.archive.folders,
            FolderSelection::Explicit(vec!["INBOX".into()])
        );
        assert_eq!(plan.archive.output_dir, PathBuf::from("email_archive"));
        assert!(!plan.archive.delete);
        assert!(plan.compact.is_none());
    }

    #[test]
    fn plain_text_defaults_to_143() {
        let mut c = cli();
        c.no_ssl = true;
        let server = resolve(&c, Config::default()).unwrap().server.unwrap();
        assert_eq!(server.port, 143);
        assert_eq!(server.security, Security::None);
    }

    #[test]
    fn cli_overrides_file() {
        let cfg = Config::parse(
            r#"
[server]
host = "file.example.com"
username = "file-user"
port = 1143

[archive]
folders = ["Sent"]
limit = 10

[compress]
enabled = true
max_part_size_mb = 50
"#,
        )
        .unwrap();
        let mut c = cli();
        c.folders = vec!["INBOX".into()];
        c.max_part_size_mb = Some(20);

        let plan = resolve(&c, cfg).unwrap();
        let server = plan.server.unwrap();
        assert_eq!(server.host, "mail.example.com");
        assert_eq!(server.port, 1143);
        assert_eq!(
            plan.archive.folders,
            FolderSelection::Explicit(vec!["INBOX".into()])
        );
        assert_eq!(plan.archive.limit, Some(10));
        assert_eq!(plan.compact.unwrap().max_part_size_mb, 20);
    }

    #[test]
    fn all_folders_from_file() {
        let cfg = Config::parse("[archive]\nall_folders = true\n").unwrap();
        let plan = resolve(&cli(), cfg).unwrap();
        assert_eq!(plan.archive.folders, FolderSelection::All);
    }

    #[test]
    fn missing_host_leaves_no_server() {
        let plan = resolve(&Cli::default(), Config::default()).unwrap();
        assert!(plan.server.is_none());
    }

    #[test]
    fn zero_part_size_is_rejected() {
        let mut c = cli();
        c.compress = true;
        c.max_part_size_mb = Some(0);
        assert!(resolve(&c, Config::default()).is_err());
    }

    #[test]
    fn inverted_dates_fail_before_connecting() {
        let mut c = cli();
        c.start_date = NaiveDate::from_ymd_opt(2024, 6, 1);
        c.end_date = NaiveDate::from_ymd_opt(2024, 1, 1);
        c.output_dir = Some(PathBuf::from("/nonexistent/should-not-be-created"));
        c.force = true;
        c.password = Some("x".into());
        c.config = Some(PathBuf::from("/dev/null"));
        assert!(run(c).is_err());
        assert!(!PathBuf::from("/nonexistent/should-not-be-created").exists());
    }

    #[test]
    fn confirmation_requires_yes() {
        let mut out = Vec::new();
        assert!(confirm_deletion(&mut Cursor::new("yes\n"), &mut out).unwrap());
        assert!(confirm_deletion(&mut Cursor::new("YES\r\n"), &mut out).unwrap());
        assert!(!confirm_deletion(&mut Cursor::new("y\n"), &mut out).unwrap());
        assert!(!confirm_deletion(&mut Cursor::new(""), &mut out).unwrap());
        assert!(String::from_utf8(out).unwrap().contains("PERMANENTLY DELETED"));
    }
}
