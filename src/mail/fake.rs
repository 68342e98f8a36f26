//! Scripted in-memory mailbox store for tests.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::config::{Security, ServerConfig};
use crate::error::{Error, Result};
use crate::mail::{Connector, MailStore};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Connect,
    Logout,
    List,
    Select(String),
    Search(String),
    Fetch(u32),
    MarkDeleted(u32),
    Expunge,
}

type MarkHook = Box<dyn Fn(&str, u32)>;

#[derive(Default)]
pub struct FakeState {
    pub mailboxes: BTreeMap<String, Vec<(u32, Vec<u8>)>>,
    pub flagged: Vec<(String, u32)>,
    pub calls: Vec<Call>,
    /// Injected failures: (operation, optional UID, error), consumed on first match.
    pub failures: Vec<(&'static str, Option<u32>, Error)>,
    pub connect_failures: usize,
    pub mark_hook: Option<MarkHook>,
}

impl FakeState {
    pub fn add_mailbox(&mut self, name: &str, count: u32) {
        let messages = (1..=count)
            .map(|uid| (uid, sample_message(uid)))
            .collect();
        self.mailboxes.insert(name.to_string(), messages);
    }

    pub fn fail(&mut self, op: &'static str, uid: Option<u32>, err: Error) {
        self.failures.push((op, uid, err));
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    fn take_failure(&mut self, op: &str, uid: Option<u32>) -> Option<Error> {
        let pos = self
            .failures
            .iter()
            .position(|(o, u, _)| *o == op && (u.is_none() || *u == uid))?;
        Some(self.failures.remove(pos).2)
    }
}

pub fn sample_message(uid: u32) -> Vec<u8> {
    let day = (uid - 1) % 28 + 1;
    format!(
        "From: Sender {uid} <sender{uid}@example.com>\r\n\
         Subject: Message {uid}\r\n\
         Date: {day:02} Mar 2023 09:30:00 +0000\r\n\
         \r\n\
         Body of message {uid}.\r\n"
    )
    .into_bytes()
}

pub fn server_config() -> ServerConfig {
    ServerConfig {
        host: "imap.test".into(),
        port: 993,
        username: "admin".into(),
        password: "secret".into(),
        security: Security::Tls,
        accept_invalid_certs: false,
    }
}

#[derive(Clone, Default)]
pub struct FakeConnector {
    pub state: Rc<RefCell<FakeState>>,
}

impl FakeConnector {
    pub fn new(state: FakeState) -> Self {
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }
}

impl Connector for FakeConnector {
    fn connect(&self, _cfg: &ServerConfig) -> Result<Box<dyn MailStore>> {
        let mut st = self.state.borrow_mut();
        st.calls.push(Call::Connect);
        if st.connect_failures > 0 {
            st.connect_failures -= 1;
            return Err(Error::Auth("connection refused".into()));
        }
        Ok(Box::new(FakeStore {
            state: Rc::clone(&self.state),
            selected: None,
        }))
    }
}

pub struct FakeStore {
    state: Rc<RefCell<FakeState>>,
    selected: Option<String>,
}

impl FakeStore {
    fn begin(&self, call: Call, op: &str, uid: Option<u32>) -> Result<()> {
        let mut st = self.state.borrow_mut();
        st.calls.push(call);
        match st.take_failure(op, uid) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn selected(&self) -> Result<String> {
        self.selected
            .clone()
            .ok_or_else(|| Error::Refused("no mailbox selected".into()))
    }
}

impl MailStore for FakeStore {
    fn list(&mut self) -> Result<Vec<String>> {
        self.begin(Call::List, "LIST", None)?;
        Ok(self.state.borrow().mailboxes.keys().cloned().collect())
    }

    fn select(&mut self, mailbox: &str) -> Result<u32> {
        self.begin(Call::Select(mailbox.to_string()), "SELECT", None)?;
        let count = self
            .state
            .borrow()
            .mailboxes
            .get(mailbox)
            .map(|m| m.len() as u32)
            .ok_or_else(|| Error::Refused(format!("no such mailbox {mailbox}")))?;
        self.selected = Some(mailbox.to_string());
        Ok(count)
    }

    fn search(&mut self, query: &str) -> Result<Vec<u32>> {
        self.begin(Call::Search(query.to_string()), "SEARCH", None)?;
        let mailbox = self.selected()?;
        let st = self.state.borrow();
        Ok(st.mailboxes[&mailbox].iter().map(|(uid, _)| *uid).collect())
    }

    fn fetch(&mut self, uid: u32) -> Result<Vec<u8>> {
        self.begin(Call::Fetch(uid), "FETCH", Some(uid))?;
        let mailbox = self.selected()?;
        let st = self.state.borrow();
        st.mailboxes[&mailbox]
            .iter()
            .find(|(u, _)| *u == uid)
            .map(|(_, raw)| raw.clone())
            .ok_or_else(|| Error::Refused(format!("no message {uid}")))
    }

    fn mark_deleted(&mut self, uid: u32) -> Result<()> {
        self.begin(Call::MarkDeleted(uid), "STORE", Some(uid))?;
        let mailbox = self.selected()?;
        if let Some(hook) = &self.state.borrow().mark_hook {
            hook(&mailbox, uid);
        }
        self.state.borrow_mut().flagged.push((mailbox, uid));
        Ok(())
    }

    fn expunge(&mut self) -> Result<usize> {
        self.begin(Call::Expunge, "EXPUNGE", None)?;
        let mailbox = self.selected()?;
        let mut st = self.state.borrow_mut();
        let flagged: Vec<u32> = st
            .flagged
            .iter()
            .filter(|(m, _)| *m == mailbox)
            .map(|(_, u)| *u)
            .collect();
        let messages = st.mailboxes.get_mut(&mailbox).expect("selected mailbox exists");
        let before = messages.len();
        messages.retain(|(u, _)| !flagged.contains(u));
        Ok(before - messages.len())
    }

    fn logout(&mut self) -> Result<()> {
        self.begin(Call::Logout, "LOGOUT", None)
    }
}
