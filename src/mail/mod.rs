pub mod imap;
pub mod list;

#[cfg(test)]
pub mod fake;

use mailparse::MailHeaderMap;

use crate::config::ServerConfig;
use crate::error::Result;

/// Mailbox-store operations the archiver needs, one call per protocol command.
///
/// Message handles are UIDs within the currently selected mailbox.
pub trait MailStore {
    /// Names of every selectable mailbox (`LIST "" "*"`).
    fn list(&mut self) -> Result<Vec<String>>;
    /// Selects `mailbox`, returning its message count.
    fn select(&mut self, mailbox: &str) -> Result<u32>;
    /// Matching UIDs in ascending order.
    fn search(&mut self, query: &str) -> Result<Vec<u32>>;
    /// Complete raw message.
    fn fetch(&mut self, uid: u32) -> Result<Vec<u8>>;
    /// Sets `\Deleted`; nothing is removed until `expunge`.
    fn mark_deleted(&mut self, uid: u32) -> Result<()>;
    /// Permanently removes flagged messages, returning how many went.
    fn expunge(&mut self) -> Result<usize>;
    fn logout(&mut self) -> Result<()>;
}

/// Opens an authenticated `MailStore`.
pub trait Connector {
    fn connect(&self, cfg: &ServerConfig) -> Result<Box<dyn MailStore>>;
}

/// Header fields kept alongside an archived message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageHeaders {
    pub subject: String,
    pub from: String,
    pub date: String,
}

impl MessageHeaders {
    pub fn parse(raw: &[u8]) -> Self {
        let headers = mailparse::parse_headers(raw).map(|(h, _)| h).ok();
        let get = |name: &str| {
            headers
                .as_ref()
                .and_then(|h| h.get_first_value(name))
                .map(|v| v.trim().to_string())
        };

        Self {
            subject: get("Subject").unwrap_or_else(|| "No Subject".to_string()),
            from: get("From").unwrap_or_else(|| "unknown".to_string()),
            date: get("Date").unwrap_or_default(),
        }
    }
}

/// A fetched message, immutable once built.
#[derive(Clone, Debug)]
pub struct ArchivedMessage {
    pub uid: u32,
    pub raw: Vec<u8>,
    pub headers: MessageHeaders,
}

impl ArchivedMessage {
    pub fn new(uid: u32, raw: Vec<u8>) -> Self {
        let headers = MessageHeaders::parse(&raw);
        Self { uid, raw, headers }
    }
}
