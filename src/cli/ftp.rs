// Directory-convention transport: uploads land in an inbound directory and the
// server drops the processed archive into /complete.

use crate::cli::ftp_client::{FtpClient, TransferType};
use crate::cli::job::{ConnectionDetails, ExportMode, Job, PollStatus, Submission, UploadRequest};
use crate::cli::naming::result_name;
use crate::cli::transport::TransportBackend;
use crate::errors::{SetupError, TransferError};
use simplelog::*;
use std::path::Path;

pub const DEFAULT_PORT: u16 = 21;
pub const COMPLETE_DIR: &str = "/complete";

pub struct DirectoryTransferBackend<C: FtpClient> {
    client: C,
    details: Option<ConnectionDetails>,
    uploaded_name: Option<String>,
}

impl<C: FtpClient> DirectoryTransferBackend<C> {
    pub fn new(client: C) -> DirectoryTransferBackend<C> {
        DirectoryTransferBackend {
            client,
            details: None,
            uploaded_name: None,
        }
    }

    /// Name the server gave the last upload.
    pub fn uploaded_name(&self) -> Option<&str> {
        self.uploaded_name.as_deref()
    }

    pub fn connection_details(&self) -> Option<&ConnectionDetails> {
        self.details.as_ref()
    }

    fn open_session(&mut self, details: &ConnectionDetails) -> Result<(), SetupError> {
        self.client
            .set_server(&details.host, details.port)
            .map_err(|e| {
                debug!("set server failed: {:#}", e);
                SetupError::Server {
                    host: details.host.clone(),
                    port: details.port,
                }
            })?;

        self.client.connect().map_err(|e| {
            debug!("connect failed: {:#}", e);
            SetupError::Connect {
                host: details.host.clone(),
                port: details.port,
            }
        })?;

        self.client
            .login(&details.identity, &details.secret)
            .map_err(|e| {
                debug!("login failed: {:#}", e);
                SetupError::Login {
                    identity: details.identity.clone(),
                }
            })?;

        self.client
            .set_transfer_type(TransferType::AutoAscii)
            .map_err(|_| SetupError::TransferType)?;

        self.client
            .set_passive(true)
            .map_err(|_| SetupError::Passive)?;

        Ok(())
    }
}

pub fn inbound_dir(identity: &str, mode: ExportMode) -> String {
    let kind = match mode {
        ExportMode::Single => "default",
        ExportMode::Multi => "splitfile",
    };
    format!("import_{}_{}_config", identity, kind)
}

// the server appends the name it stored the upload under to its last reply
fn assigned_name(reply: &str) -> Option<String> {
    let line = reply.trim_end().lines().last()?;
    let (_, name) = line.rsplit_once(' ')?;
    let name = name.trim();

    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

impl<C: FtpClient> TransportBackend for DirectoryTransferBackend<C> {
    fn protocol(&self) -> &'static str {
        "ftp"
    }

    fn connect(&mut self, details: &ConnectionDetails) -> Result<(), SetupError> {
        match self.open_session(details) {
            Ok(()) => {
                self.details = Some(details.clone());
                Ok(())
            }
            Err(e) => {
                self.client.quit();
                Err(e)
            }
        }
    }

    fn submit(&mut self, request: &UploadRequest) -> Result<Submission, TransferError> {
        let path = request.file.display().to_string();
        let file_name = match request.file.file_name() {
            Some(name) if request.file.is_file() => name.to_string_lossy().to_string(),
            _ => {
                return Err(TransferError::MissingInput {
                    path: path.trim().to_string(),
                })
            }
        };

        let identity = self
            .details
            .as_ref()
            .map(|d| d.identity.clone())
            .unwrap_or_default();
        let remote = format!("{}/{}", inbound_dir(&identity, request.mode), file_name);

        if let Err(e) = self.client.put(&request.file, &remote) {
            debug!("put {} failed: {:#}", remote, e);
            return Err(TransferError::Upload(self.client.last_message()));
        }

        let reply = self.client.last_message();
        let uploaded =
            assigned_name(&reply).ok_or_else(|| TransferError::protocol("filename", &reply))?;

        let message = format!("{} has been uploaded as {}\n", file_name, uploaded);
        let job = Job::new(&result_name(&uploaded));
        self.uploaded_name = Some(uploaded);

        Ok(Submission {
            jobs: vec![job],
            message,
        })
    }

    fn poll_status(&mut self, job: &mut Job) -> Result<PollStatus, TransferError> {
        let listing = self.client.list(COMPLETE_DIR).map_err(|e| {
            debug!("listing {} failed: {:#}", COMPLETE_DIR, e);
            TransferError::NotFound {
                dir: COMPLETE_DIR.to_string(),
            }
        })?;

        if listing.iter().any(|entry| entry == &job.status_handle) {
            Ok(PollStatus::Ready(String::new()))
        } else {
            Ok(PollStatus::Pending)
        }
    }

    // idle sessions get dropped by the server while we wait
    fn reconnect_if_required(&mut self) -> Result<(), TransferError> {
        self.client.quit();

        let details = self.details.clone().ok_or(TransferError::Reconnect)?;
        self.connect(&details).map_err(|e| {
            warn!("reconnect failed: {}", e);
            TransferError::Reconnect
        })
    }

    fn fetch_result(&mut self, job: &Job, location: &Path) -> Result<String, TransferError> {
        let location = location.to_string_lossy();
        let local = format!("{}/{}", location.trim_end_matches('/'), job.status_handle);
        let remote = format!("{}/{}", COMPLETE_DIR, job.status_handle);

        if let Err(e) = self.client.get(&remote, Path::new(&local)) {
            debug!("get {} failed: {:#}", remote, e);
            return Err(TransferError::Download(self.client.last_message()));
        }

        Ok(format!("Downloaded into {}.\n", local))
    }

    fn delete_result(&mut self, job: &Job) -> Result<String, TransferError> {
        let remote = format!("{}/{}", COMPLETE_DIR, job.status_handle);

        self.client.delete(&remote).map_err(|e| {
            debug!("delete {} failed: {:#}", remote, e);
            TransferError::Remove {
                name: job.status_handle.clone(),
            }
        })?;

        Ok(String::new())
    }

    fn disconnect(&mut self) -> Result<(), TransferError> {
        self.client.quit();
        Ok(())
    }
}
