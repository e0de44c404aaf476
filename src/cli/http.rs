// Status-url transport: one POST creates the jobs, each job is then polled on
// its own status url until the server reports it completed.

use crate::cli::http_client::{is_json, HttpClient};
use crate::cli::job::{ConnectionDetails, ExportMode, Job, PollStatus, Submission, UploadRequest};
use crate::cli::transport::TransportBackend;
use crate::errors::{SetupError, TransferError};
use serde::Deserialize;
use simplelog::*;
use std::fs;
use std::fs::File;
use std::path::Path;

pub const DEFAULT_PORT: u16 = 80;
const BULK_API_PATH: &str = "/api/live/bulk/";
const STATUS_COMPLETED: &str = "completed";
const STATUS_ERROR: &str = "error";

/// Body shared by the submit, status and delete responses.
#[derive(Deserialize, Debug, Default)]
struct StatusBody {
    status: Option<String>,
    msg: Option<String>,
    status_url: Option<String>,
    #[serde(default)]
    jobs: Vec<JobTicket>,
    job: Option<String>,
    download_url: Option<String>,
}

#[derive(Deserialize, Debug)]
struct JobTicket {
    status_url: String,
    #[serde(default)]
    msg: String,
}

// a body without a status is most likely an error page, hand it back verbatim
fn parse_status(body: &str) -> Result<StatusBody, TransferError> {
    let parsed: StatusBody = serde_json::from_str(body)
        .map_err(|_| TransferError::Application(body.to_string()))?;

    match parsed.status.as_deref() {
        None | Some("") => Err(TransferError::Application(body.to_string())),
        Some(STATUS_ERROR) => Err(TransferError::Application(
            parsed.msg.unwrap_or_else(|| body.to_string()),
        )),
        Some(_) => Ok(parsed),
    }
}

fn network(err: anyhow::Error) -> TransferError {
    TransferError::Network(format!("{:#}", err))
}

/// Last path segment of a status url, without query string.
pub fn status_id(status_url: &str) -> &str {
    let path = status_url
        .split(|c| c == '?' || c == '#')
        .next()
        .unwrap_or(status_url);
    path.trim_end_matches('/').rsplit('/').next().unwrap_or(path)
}

// a partial download must not pass for a result
fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        debug!("removing {} failed: {}", path.display(), e);
    }
}

pub fn base_url(host: &str, port: u16) -> String {
    let (scheme, host) = match host.split_once("://") {
        Some((scheme, rest)) => (scheme, rest),
        None => ("http", host),
    };
    format!(
        "{}://{}:{}{}",
        scheme,
        host.trim_end_matches('/'),
        port,
        BULK_API_PATH
    )
}

pub struct StatusUrlBackend<H: HttpClient> {
    client: H,
    base_url: String,
    api_key: String,
}

impl<H: HttpClient> StatusUrlBackend<H> {
    pub fn new(client: H) -> StatusUrlBackend<H> {
        StatusUrlBackend {
            client,
            base_url: String::new(),
            api_key: String::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn client(&self) -> &H {
        &self.client
    }
}

impl<H: HttpClient> TransportBackend for StatusUrlBackend<H> {
    fn protocol(&self) -> &'static str {
        "http"
    }

    fn connect(&mut self, details: &ConnectionDetails) -> Result<(), SetupError> {
        self.base_url = base_url(&details.host, details.port);
        self.api_key = details.secret.clone();
        debug!("bulk api at {}", self.base_url);
        Ok(())
    }

    fn submit(&mut self, request: &UploadRequest) -> Result<Submission, TransferError> {
        let path = request.file.display().to_string();
        if !request.file.is_file() {
            return Err(TransferError::MissingInput { path });
        }

        let export_type = match request.mode {
            ExportMode::Single => "single",
            ExportMode::Multi => "multi",
        };
        let fields = vec![
            ("export_type".to_string(), export_type.to_string()),
            (
                "notify_email".to_string(),
                request.notify.clone().unwrap_or_default(),
            ),
        ];

        let response = self
            .client
            .post_form(&self.base_url, &self.api_key, &fields, &request.file)
            .map_err(network)?;
        let body = parse_status(&response.body)?;

        let jobs: Vec<Job> = if !body.jobs.is_empty() {
            body.jobs
                .iter()
                .map(|ticket| Job::with_message(&ticket.status_url, &ticket.msg))
                .collect()
        } else if let Some(status_url) = body.status_url.as_deref() {
            vec![Job::new(status_url)]
        } else {
            return Err(TransferError::protocol("a status url", &response.body));
        };

        let mut message = format!("{} was uploaded.\n", path);
        if jobs.len() > 1 {
            message = format!("{}\n{}", jobs[0].message.trim_end(), message);
        }

        Ok(Submission { jobs, message })
    }

    fn poll_status(&mut self, job: &mut Job) -> Result<PollStatus, TransferError> {
        let response = self
            .client
            .get(&job.status_handle, &self.api_key)
            .map_err(network)?;
        let body = parse_status(&response.body)?;

        if body.status.as_deref() != Some(STATUS_COMPLETED) {
            debug!(
                "{} is {}",
                job.status_handle,
                body.status.unwrap_or_default()
            );
            return Ok(PollStatus::Pending);
        }

        let download_url = body
            .download_url
            .ok_or_else(|| TransferError::protocol("a download url", &response.body))?;
        let name = body.job.unwrap_or_else(|| job.status_handle.clone());

        job.result_location = Some(download_url);
        job.message = match body.msg {
            Some(msg) if !msg.is_empty() => msg,
            _ => format!("Job {} has completed.\n", name),
        };

        Ok(PollStatus::Ready(job.message.clone()))
    }

    fn reconnect_if_required(&mut self) -> Result<(), TransferError> {
        Ok(())
    }

    fn fetch_result(&mut self, job: &Job, location: &Path) -> Result<String, TransferError> {
        let download_url = job
            .result_location
            .as_deref()
            .ok_or_else(|| TransferError::protocol("a download url", &job.status_handle))?;

        let path = location.join(format!("{}.zip", status_id(&job.status_handle)));
        let mut file = File::create(&path).map_err(|e| {
            debug!("create {} failed: {}", path.display(), e);
            TransferError::Io {
                path: path.display().to_string(),
            }
        })?;

        let downloaded = self.client.download(download_url, &self.api_key, &mut file);
        drop(file);

        let content_type = match downloaded {
            Ok(content_type) => content_type,
            Err(e) => {
                discard(&path);
                return Err(network(e));
            }
        };

        // the server can answer a download with an error document
        if is_json(content_type.as_deref()) {
            let body = fs::read_to_string(&path).unwrap_or_else(|e| {
                debug!("reading {} back failed: {}", path.display(), e);
                String::new()
            });
            discard(&path);
            let message = serde_json::from_str::<StatusBody>(&body)
                .ok()
                .and_then(|parsed| parsed.msg)
                .unwrap_or(body);
            return Err(TransferError::Application(message));
        }

        info!("Downloaded into {}", path.display());
        Ok(job.message.clone())
    }

    fn delete_result(&mut self, job: &Job) -> Result<String, TransferError> {
        let response = self
            .client
            .delete(&job.status_handle, &self.api_key)
            .map_err(network)?;

        if !response.body.trim().is_empty() {
            parse_status(&response.body)?;
        }

        Ok(String::new())
    }

    fn disconnect(&mut self) -> Result<(), TransferError> {
        Err(TransferError::Unsupported {
            protocol: self.protocol().to_string(),
            operation: "quit".to_string(),
        })
    }
}
