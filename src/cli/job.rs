// Objects describing one run of the client: where to connect, what to upload,
// and the server-side jobs an upload turns into.

use crate::errors::TransferError;
use std::fmt;
use std::path::PathBuf;

#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionDetails {
    pub identity: String,
    pub secret: String,
    pub host: String,
    pub port: u16,
}

// keep the secret out of logs
impl fmt::Debug for ConnectionDetails {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ConnectionDetails")
            .field("identity", &self.identity)
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

/// How the server should treat the uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportMode {
    /// one result archive for the whole upload
    Single,
    /// the server may split the upload into several jobs
    Multi,
}

impl ExportMode {
    pub fn from_single_file(single_file: bool) -> ExportMode {
        if single_file {
            ExportMode::Single
        } else {
            ExportMode::Multi
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub file: PathBuf,
    pub mode: ExportMode,
    pub notify: Option<String>,
}

/// Everything `JobController::run` needs besides the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub upload: UploadRequest,
    pub location: PathBuf,
    pub remove_after: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Submitted,
    Polling,
    Completed,
    Fetching,
    Removing,
    Done,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            JobState::Submitted => "submitted",
            JobState::Polling => "polling",
            JobState::Completed => "completed",
            JobState::Fetching => "fetching",
            JobState::Removing => "removing",
            JobState::Done => "done",
            JobState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// One unit of server-side work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// result filename (ftp) or status url (http)
    pub status_handle: String,
    pub state: JobState,
    /// where the result can be fetched from, once the server says so
    pub result_location: Option<String>,
    /// advisory text from submit, replaced by the completion text after polling
    pub message: String,
}

impl Job {
    pub fn new(status_handle: &str) -> Job {
        Job {
            status_handle: status_handle.to_string(),
            state: JobState::Submitted,
            result_location: None,
            message: String::new(),
        }
    }

    pub fn with_message(status_handle: &str, message: &str) -> Job {
        Job {
            message: message.to_string(),
            ..Job::new(status_handle)
        }
    }
}

/// The jobs created by a single submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub jobs: Vec<Job>,
    pub message: String,
}

/// Result of polling a job once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    Pending,
    Ready(String),
}

/// The `(success, message)` pair reported for a whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub success: bool,
    pub message: String,
}

impl Outcome {
    pub fn success(message: &str) -> Outcome {
        Outcome {
            success: true,
            message: message.to_string(),
        }
    }

    pub fn failure(message: &str) -> Outcome {
        Outcome {
            success: false,
            message: message.to_string(),
        }
    }
}

impl From<TransferError> for Outcome {
    fn from(err: TransferError) -> Outcome {
        Outcome::failure(&err.to_string())
    }
}

impl From<Result<String, TransferError>> for Outcome {
    fn from(result: Result<String, TransferError>) -> Outcome {
        match result {
            Ok(message) => Outcome::success(&message),
            Err(err) => err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_from_result() {
        let ok: Result<String, TransferError> = Ok("Downloaded into /tmp/a.zip.\n".to_string());
        assert_eq!(
            Outcome::from(ok),
            Outcome::success("Downloaded into /tmp/a.zip.\n")
        );

        let err: Result<String, TransferError> = Err(TransferError::Reconnect);
        assert_eq!(
            Outcome::from(err),
            Outcome::failure("Could not reconnect to the server.\n")
        );
    }

    #[test]
    fn debug_hides_secret() {
        let details = ConnectionDetails {
            identity: "TestKey".to_string(),
            secret: "e261742d-fe2f-4569-95e6-312689d04903".to_string(),
            host: "localhost".to_string(),
            port: 21,
        };
        let printed = format!("{:?}", details);
        assert!(printed.contains("TestKey"));
        assert!(!printed.contains("e261742d"));
    }

    #[test]
    fn export_mode_from_flag() {
        assert_eq!(ExportMode::from_single_file(true), ExportMode::Single);
        assert_eq!(ExportMode::from_single_file(false), ExportMode::Multi);
    }
}
