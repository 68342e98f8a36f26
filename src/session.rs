//! The single long-lived connection to the mailbox store, and the
//! reconnect-and-retry policy applied around every remote call.

use log::{debug, info, warn};
use std::fmt;

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::mail::imap::ImapConnector;
use crate::mail::{Connector, MailStore};

/// Retries granted to an operation after a transient failure.
const MAX_RETRIES: u32 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Disconnected,
    Connected,
}

/// Mailbox context an operation needs before it can run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope<'a> {
    Global,
    Mailbox(&'a str),
}

pub struct Session<C: Connector = ImapConnector> {
    config: ServerConfig,
    connector: C,
    handle: Option<Box<dyn MailStore>>,
    /// Cleared whenever the connection is dropped.
    selected: Option<String>,
    reconnects: u32,
}

impl Session<ImapConnector> {
    pub fn new(config: ServerConfig) -> Self {
        Self::with_connector(config, ImapConnector)
    }
}

impl<C: Connector> Session<C> {
    pub fn with_connector(config: ServerConfig, connector: C) -> Self {
        Self {
            config,
            connector,
            handle: None,
            selected: None,
            reconnects: 0,
        }
    }

    pub fn state(&self) -> State {
        if self.handle.is_some() {
            State::Connected
        } else {
            State::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == State::Connected
    }

    pub fn selected_mailbox(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Reconnects performed so far.
    pub fn reconnect_count(&self) -> u32 {
        self.reconnects
    }

    pub fn connect(&mut self) -> Result<()> {
        if self.handle.is_some() {
            return Ok(());
        }
        let handle = self.connector.connect(&self.config)?;
        self.handle = Some(handle);
        self.selected = None;
        info!(
            "Successfully connected to {}:{}",
            self.config.host, self.config.port
        );
        Ok(())
    }

    /// Logs out and releases the handle. Never fails; logout errors are logged.
    pub fn disconnect(&mut self) {
        self.selected = None;
        if let Some(mut handle) = self.handle.take() {
            if let Err(e) = handle.logout() {
                warn!("logout from {} failed: {}", self.config.host, e);
            }
        }
    }

    pub fn reconnect(&mut self) -> Result<()> {
        self.reconnects += 1;
        info!("Reconnecting to {}:{}", self.config.host, self.config.port);
        self.disconnect();
        self.connect()
    }

    /// Runs `op` against the store, with one reconnect-and-retry on transient
    /// failure.
    ///
    /// For `Scope::Mailbox` the mailbox is (re)selected first if it is not the
    /// current selection, which covers the selection lost by a reconnect. A
    /// transient failure on the retry is returned as `Error::RetryExhausted`.
    pub fn call<T, F>(&mut self, name: &'static str, scope: Scope<'_>, mut op: F) -> Result<T>
    where
        F: FnMut(&mut dyn MailStore) -> Result<T>,
    {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }

        let mut attempt = 0;
        loop {
            match self.attempt(scope, &mut op) {
                Err(e) if e.is_transient() && attempt < MAX_RETRIES => {
                    attempt += 1;
                    warn!("{name} hit a transient failure ({e}), reconnecting");
                    if let Err(re) = self.reconnect() {
                        warn!("reconnect failed: {re}");
                        return Err(re);
                    }
                }
                Err(e) if e.is_transient() => {
                    return Err(Error::RetryExhausted {
                        op: name,
                        source: Box::new(e),
                    });
                }
                other => return other,
            }
        }
    }

    fn attempt<T, F>(&mut self, scope: Scope<'_>, op: &mut F) -> Result<T>
    where
        F: FnMut(&mut dyn MailStore) -> Result<T>,
    {
        let handle = self.handle.as_deref_mut().ok_or(Error::NotConnected)?;

        if let Scope::Mailbox(mailbox) = scope {
            if self.selected.as_deref() != Some(mailbox) {
                debug!("selecting {mailbox}");
                self.selected = None;
                handle.select(mailbox)?;
                self.selected = Some(mailbox.to_string());
            }
        }

        op(handle)
    }

    /// Selects `mailbox` unconditionally, returning its message count.
    pub fn select(&mut self, mailbox: &str) -> Result<u32> {
        self.selected = None;
        let exists = self.call("SELECT", Scope::Global, |s| s.select(mailbox))?;
        self.selected = Some(mailbox.to_string());
        Ok(exists)
    }

    pub fn list(&mut self) -> Result<Vec<String>> {
        self.call("LIST", Scope::Global, |s| s.list())
    }

    pub fn search(&mut self, mailbox: &str, query: &str) -> Result<Vec<u32>> {
        self.call("SEARCH", Scope::Mailbox(mailbox), |s| s.search(query))
    }

    pub fn fetch(&mut self, mailbox: &str, uid: u32) -> Result<Vec<u8>> {
        self.call("FETCH", Scope::Mailbox(mailbox), |s| s.fetch(uid))
    }

    pub fn mark_deleted(&mut self, mailbox: &str, uid: u32) -> Result<()> {
        self.call("STORE", Scope::Mailbox(mailbox), |s| s.mark_deleted(uid))
    }

    pub fn expunge(&mut self, mailbox: &str) -> Result<usize> {
        self.call("EXPUNGE", Scope::Mailbox(mailbox), |s| s.expunge())
    }
}

impl<C: Connector> fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.config.host)
            .field("state", &self.state())
            .field("selected_mailbox", &self.selected_mailbox())
            .field("reconnects", &self.reconnects)
            .finish_non_exhaustive()
    }
}

impl<C: Connector> Drop for Session<C> {
    fn drop(&mut self) {
        self.disconnect();
    }
}
