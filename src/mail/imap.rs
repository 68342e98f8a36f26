use log::debug;
use native_tls::TlsConnector;
use std::io::{Read, Write};
use std::net::TcpStream;

use crate::config::{Security, ServerConfig};
use crate::error::{Error, Result};
use crate::mail::{list, Connector, MailStore};

fn is_localhost(host: &str) -> bool {
    host == "127.0.0.1" || host == "localhost"
}

fn tls_connector_for(cfg: &ServerConfig) -> Result<TlsConnector> {
    let mut b = TlsConnector::builder();

    if cfg.accept_invalid_certs || is_localhost(&cfg.host) {
        b.danger_accept_invalid_certs(true);
        b.danger_accept_invalid_hostnames(true);
    }

    b.build().map_err(|e| Error::Tls(e.to_string()))
}

fn login<T>(client: imap::Client<T>, cfg: &ServerConfig) -> Result<Box<dyn MailStore>>
where
    T: Read + Write + 'static,
{
    let session = client
        .login(&cfg.username, &cfg.password)
        .map_err(|(e, _)| Error::Auth(e.to_string()))?;
    Ok(Box::new(session))
}

/// Connects with the `imap` crate over the configured transport.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImapConnector;

impl Connector for ImapConnector {
    fn connect(&self, cfg: &ServerConfig) -> Result<Box<dyn MailStore>> {
        let addr = (cfg.host.as_str(), cfg.port);
        debug!("connecting to {}:{} ({:?})", cfg.host, cfg.port, cfg.security);

        match cfg.security {
            Security::Tls => {
                let tls = tls_connector_for(cfg)?;
                login(imap::connect(addr, &cfg.host, &tls)?, cfg)
            }
            Security::Starttls => {
                let tls = tls_connector_for(cfg)?;
                login(imap::connect_starttls(addr, &cfg.host, &tls)?, cfg)
            }
            Security::None => {
                let stream = TcpStream::connect(addr)?;
                let mut client = imap::Client::new(stream);
                client.read_greeting()?;
                login(client, cfg)
            }
        }
    }
}

impl<T: Read + Write> MailStore for imap::Session<T> {
    fn list(&mut self) -> Result<Vec<String>> {
        let raw = self.run_command_and_read_response("LIST \"\" \"*\"")?;
        Ok(list::selectable_names(&raw))
    }

    fn select(&mut self, mailbox: &str) -> Result<u32> {
        Ok(imap::Session::select(self, mailbox)?.exists)
    }

    fn search(&mut self, query: &str) -> Result<Vec<u32>> {
        let mut uids: Vec<u32> = self.uid_search(query)?.into_iter().collect();
        uids.sort_unstable();
        Ok(uids)
    }

    fn fetch(&mut self, uid: u32) -> Result<Vec<u8>> {
        let fetches = self.uid_fetch(uid.to_string(), "BODY.PEEK[]")?;
        let raw = fetches
            .iter()
            .filter(|f| f.uid.map_or(true, |u| u == uid))
            .find_map(|f| f.body())
            .ok_or_else(|| Error::Other(format!("no body returned for UID {uid}")))?;
        Ok(raw.to_vec())
    }

    fn mark_deleted(&mut self, uid: u32) -> Result<()> {
        self.uid_store(uid.to_string(), "+FLAGS (\\Deleted)")?;
        Ok(())
    }

    fn expunge(&mut self) -> Result<usize> {
        Ok(imap::Session::expunge(self)?.len())
    }

    fn logout(&mut self) -> Result<()> {
        imap::Session::logout(self)?;
        Ok(())
    }
}
