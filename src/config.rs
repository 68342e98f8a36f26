use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_FOLDER: &str = "INBOX";
pub const DEFAULT_OUTPUT_DIR: &str = "email_archive";
pub const DEFAULT_MAX_PART_SIZE_MB: u64 = 100;

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub server: ServerSection,
    pub archive: ArchiveSection,
    pub compress: CompressSection,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Security {
    #[default]
    Tls,
    Starttls,
    None,
}

impl Security {
    pub fn default_port(self) -> u16 {
        match self {
            Security::Tls => 993,
            Security::Starttls | Security::None => 143,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct ServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub security: Security,
    pub accept_invalid_certs: bool,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct ArchiveSection {
    pub folders: Vec<String>,
    pub all_folders: bool,
    pub output_dir: Option<PathBuf>,
    pub limit: Option<usize>,
    pub delete: bool,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct CompressSection {
    pub enabled: bool,
    pub max_part_size_mb: u64,
    pub keep_originals: bool,
}

impl Default for CompressSection {
    fn default() -> Self {
        Self {
            enabled: false,
            max_part_size_mb: DEFAULT_MAX_PART_SIZE_MB,
            keep_originals: false,
        }
    }
}

/// Everything needed to open a session against the mailbox store.
#[derive(Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub security: Security,
    pub accept_invalid_certs: bool,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("security", &self.security)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn path() -> Result<PathBuf> {
        let dir = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("no config dir"))?;
        Ok(dir.join("imap-archiver").join("config.toml"))
    }

    /// Loads `path`, or the default location when none is given.
    ///
    /// A missing default file yields the built-in defaults; a missing explicit
    /// file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match Self::path() {
                Ok(p) => (p, false),
                Err(_) => return Ok(Self::default()),
            },
        };

        if !explicit && !path.exists() {
            return Ok(Self::default());
        }

        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::parse(&data).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(data: &str) -> Result<Self> {
        Ok(toml::from_str(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[server]
host = "imap.example.com"
username = "admin@example.com"
security = "starttls"

[archive]
folders = ["INBOX", "Sent"]
limit = 500
delete = true

[compress]
enabled = true
max_part_size_mb = 250
"#;

    #[test]
    fn parses_sections() {
        let cfg = Config::parse(SAMPLE).unwrap();
        assert_eq!(cfg.server.host.as_deref(), Some("imap.example.com"));
        assert_eq!(cfg.server.security, Security::Starttls);
        assert_eq!(cfg.server.port, None);
        assert_eq!(cfg.archive.folders, vec!["INBOX", "Sent"]);
        assert_eq!(cfg.archive.limit, Some(500));
        assert!(cfg.archive.delete);
        assert!(cfg.compress.enabled);
        assert_eq!(cfg.compress.max_part_size_mb, 250);
        assert!(!cfg.compress.keep_originals);
    }

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = Config::parse("").unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.compress.max_part_size_mb, DEFAULT_MAX_PART_SIZE_MB);
        assert_eq!(cfg.server.security, Security::Tls);
    }

    #[test]
    fn default_port_follows_security() {
        assert_eq!(Security::Tls.default_port(), 993);
        assert_eq!(Security::Starttls.default_port(), 143);
        assert_eq!(Security::None.default_port(), 143);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn loads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, SAMPLE).unwrap();
        let cfg = Config::load(Some(&path)).unwrap();
        assert_eq!(cfg.archive.folders.len(), 2);
    }
}
