use crate::cli::job::{ConnectionDetails, Job, PollStatus, Submission, UploadRequest};
use crate::errors::{SetupError, TransferError};
use std::path::Path;

/// The job lifecycle as seen by one wire protocol.
///
/// `JobController` only talks to this trait, so a backend is free to keep
/// whatever session state it needs between calls.
#[cfg_attr(test, mockall::automock)]
pub trait TransportBackend {
    /// Protocol name used in messages, e.g. `ftp`.
    fn protocol(&self) -> &'static str;

    fn connect(&mut self, details: &ConnectionDetails) -> Result<(), SetupError>;

    fn submit(&mut self, request: &UploadRequest) -> Result<Submission, TransferError>;

    /// Checks a job once. `Ready` carries the completion message.
    fn poll_status(&mut self, job: &mut Job) -> Result<PollStatus, TransferError>;

    /// Called after every wait between two polls.
    fn reconnect_if_required(&mut self) -> Result<(), TransferError>;

    /// Copies the result of a completed job into `location`.
    fn fetch_result(&mut self, job: &Job, location: &Path) -> Result<String, TransferError>;

    fn delete_result(&mut self, job: &Job) -> Result<String, TransferError>;

    /// Ends the session. Backends without a session refuse.
    fn disconnect(&mut self) -> Result<(), TransferError>;
}
