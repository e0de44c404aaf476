// Minimal FTP session used by the directory backend, plus its libcurl
// implementation.

use anyhow::{anyhow, Context, Result};
use curl::easy::{Easy, InfoType, ReadError};
use simplelog::*;
use std::fs::File;
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const ASCII_EXTENSIONS: [&str; 3] = ["csv", "txt", "json"];
const DELETE_OK: &str = "250";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferType {
    Binary,
    /// ascii for text extensions, binary for everything else
    AutoAscii,
}

impl TransferType {
    fn is_text(&self, path: &str) -> bool {
        match self {
            TransferType::Binary => false,
            TransferType::AutoAscii => Path::new(path)
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ASCII_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                .unwrap_or(false),
        }
    }
}

/// The FTP operations the directory backend relies on.
#[cfg_attr(test, mockall::automock)]
pub trait FtpClient {
    fn set_server(&mut self, host: &str, port: u16) -> Result<()>;
    fn connect(&mut self) -> Result<()>;
    fn login(&mut self, user: &str, password: &str) -> Result<()>;
    fn set_transfer_type(&mut self, transfer_type: TransferType) -> Result<()>;
    fn set_passive(&mut self, passive: bool) -> Result<()>;
    fn put(&mut self, local: &Path, remote: &str) -> Result<()>;
    fn get(&mut self, remote: &str, local: &Path) -> Result<()>;
    fn delete(&mut self, remote: &str) -> Result<()>;
    /// Names of the entries in `dir`, without the directory part.
    fn list(&mut self, dir: &str) -> Result<Vec<String>>;
    /// Last reply line of the latest operation, or its local error.
    fn last_message(&self) -> String;
    /// Closes the session. Safe to call on a closed session.
    fn quit(&mut self);
}

/// `FtpClient` on top of a reused libcurl handle. Transfers are always
/// passive.
///
/// libcurl keeps the control connection of the handle alive between transfers,
/// and dropping the handle sends `QUIT`.
pub struct CurlFtpClient {
    easy: Option<Easy>,
    host: String,
    port: u16,
    user: String,
    password: String,
    transfer_type: TransferType,
    last_message: String,
}

impl Default for CurlFtpClient {
    fn default() -> Self {
        CurlFtpClient {
            easy: None,
            host: String::new(),
            port: 21,
            user: String::new(),
            password: String::new(),
            transfer_type: TransferType::Binary,
            last_message: String::new(),
        }
    }
}

impl CurlFtpClient {
    pub fn new() -> CurlFtpClient {
        CurlFtpClient::default()
    }

    // curl resolves ftp paths against the login directory, %2F anchors them at
    // the server root
    fn url_for(&self, path: &str) -> String {
        match path.strip_prefix('/') {
            Some(absolute) => format!("ftp://{}:{}/%2F{}", self.host, self.port, absolute),
            None => format!("ftp://{}:{}/{}", self.host, self.port, path),
        }
    }

    fn transfer_url(&self, path: &str) -> String {
        let url = self.url_for(path);
        if self.transfer_type.is_text(path) {
            format!("{};type=a", url)
        } else {
            url
        }
    }

    fn prepare(&mut self, url: &str) -> Result<&mut Easy> {
        let easy = self
            .easy
            .as_mut()
            .ok_or_else(|| anyhow!("not connected to {}:{}", self.host, self.port))?;

        easy.reset();
        easy.url(url)?;
        easy.username(&self.user)?;
        easy.password(&self.password)?;
        easy.connect_timeout(CONNECT_TIMEOUT)?;
        easy.verbose(true)?;

        Ok(easy)
    }

    /// Runs one operation and records what it left behind: the last server
    /// reply when the server answered, the local error otherwise.
    fn exchange<T, F>(&mut self, op: F) -> Result<T>
    where
        F: FnOnce(&mut CurlFtpClient, &mut Vec<String>) -> Result<T>,
    {
        self.last_message.clear();

        let mut replies = Vec::new();
        let result = op(self, &mut replies);

        self.last_message = match (&result, replies.last()) {
            (Err(e), Some(reply)) if e.downcast_ref::<curl::Error>().is_some() => reply.clone(),
            (Err(e), _) => format!("{:#}", e),
            (Ok(_), reply) => reply.cloned().unwrap_or_default(),
        };

        if !self.last_message.is_empty() {
            debug!("ftp: {}", self.last_message);
        }
        result
    }
}

fn server_reply(kind: InfoType, data: &[u8], replies: &mut Vec<String>) {
    if let InfoType::HeaderIn = kind {
        let line = String::from_utf8_lossy(data).trim().to_string();
        if !line.is_empty() {
            replies.push(line);
        }
    }
}

fn entry_name(line: &str) -> Option<String> {
    let line = line.trim_end_matches('\r').trim();
    if line.is_empty() {
        return None;
    }
    line.rsplit('/').next().map(|name| name.to_string())
}

impl FtpClient for CurlFtpClient {
    fn set_server(&mut self, host: &str, port: u16) -> Result<()> {
        (host, port)
            .to_socket_addrs()
            .with_context(|| format!("could not resolve {}:{}", host, port))?
            .next()
            .ok_or_else(|| anyhow!("no address found for {}:{}", host, port))?;

        self.host = host.to_string();
        self.port = port;
        Ok(())
    }

    fn connect(&mut self) -> Result<()> {
        let addr = (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| anyhow!("no address found for {}:{}", self.host, self.port))?;

        // fail fast on an unreachable server, login opens the real session
        TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)
            .with_context(|| format!("could not reach {}:{}", self.host, self.port))?;

        self.easy = Some(Easy::new());
        Ok(())
    }

    fn login(&mut self, user: &str, password: &str) -> Result<()> {
        self.user = user.to_string();
        self.password = password.to_string();

        self.exchange(|client, replies| {
            let url = client.url_for("");
            let easy = client.prepare(&url)?;
            easy.nobody(true)?;
            let mut transfer = easy.transfer();
            transfer.debug_function(|kind, data| server_reply(kind, data, replies))?;
            transfer.perform()?;
            Ok(())
        })
    }

    fn set_transfer_type(&mut self, transfer_type: TransferType) -> Result<()> {
        self.transfer_type = transfer_type;
        Ok(())
    }

    fn set_passive(&mut self, passive: bool) -> Result<()> {
        if !passive {
            return Err(anyhow!("active mode is not supported"));
        }
        Ok(())
    }

    fn put(&mut self, local: &Path, remote: &str) -> Result<()> {
        self.exchange(|client, replies| {
            let mut file = File::open(local)
                .with_context(|| format!("could not open {}", local.display()))?;
            let size = file.metadata()?.len();

            let url = client.transfer_url(remote);
            let easy = client.prepare(&url)?;
            easy.upload(true)?;
            easy.in_filesize(size)?;
            let mut transfer = easy.transfer();
            transfer.read_function(|buf| file.read(buf).map_err(|_| ReadError::Abort))?;
            transfer.debug_function(|kind, data| server_reply(kind, data, replies))?;
            transfer.perform()?;
            Ok(())
        })
    }

    fn get(&mut self, remote: &str, local: &Path) -> Result<()> {
        self.exchange(|client, replies| {
            let mut file = File::create(local)
                .with_context(|| format!("could not create {}", local.display()))?;

            let url = client.transfer_url(remote);
            let easy = client.prepare(&url)?;
            let mut write_error = None;
            let performed = {
                let mut transfer = easy.transfer();
                transfer.write_function(|data| match file.write_all(data) {
                    Ok(()) => Ok(data.len()),
                    Err(e) => {
                        write_error = Some(e);
                        Ok(0)
                    }
                })?;
                transfer.debug_function(|kind, data| server_reply(kind, data, replies))?;
                transfer.perform()
            };

            if let Some(e) = write_error {
                return Err(anyhow!(e).context(format!("could not write {}", local.display())));
            }
            performed?;
            Ok(())
        })
    }

    fn delete(&mut self, remote: &str) -> Result<()> {
        self.exchange(|client, replies| {
            let url = client.url_for("");
            let easy = client.prepare(&url)?;
            // sent in place of the directory listing
            easy.custom_request(&format!("DELE {}", remote))?;
            let performed = {
                let mut transfer = easy.transfer();
                transfer.write_function(|data| Ok(data.len()))?;
                transfer.debug_function(|kind, data| server_reply(kind, data, replies))?;
                transfer.perform()
            };

            // curl expects a listing and flags the plain 250 as a failure, the
            // reply code decides
            match replies.last() {
                Some(reply) if reply.starts_with(DELETE_OK) => Ok(()),
                _ => {
                    performed?;
                    Err(anyhow!("DELE {} was not confirmed", remote))
                }
            }
        })
    }

    fn list(&mut self, dir: &str) -> Result<Vec<String>> {
        self.exchange(|client, replies| {
            let url = format!("{}/", client.url_for(dir.trim_end_matches('/')));
            let mut body = Vec::new();
            let easy = client.prepare(&url)?;
            easy.custom_request("NLST")?;
            {
                let mut transfer = easy.transfer();
                transfer.write_function(|data| {
                    body.extend_from_slice(data);
                    Ok(data.len())
                })?;
                transfer.debug_function(|kind, data| server_reply(kind, data, replies))?;
                transfer.perform()?;
            }

            Ok(String::from_utf8_lossy(&body)
                .lines()
                .filter_map(entry_name)
                .collect())
        })
    }

    fn last_message(&self) -> String {
        self.last_message.clone()
    }

    fn quit(&mut self) {
        if self.easy.take().is_some() {
            debug!("ftp: closed session with {}:{}", self.host, self.port);
        }
    }
}
