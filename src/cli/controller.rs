use crate::cli::job::{ConnectionDetails, Job, JobState, Outcome, RunRequest};
use crate::cli::poll::PollLoop;
use crate::cli::transport::TransportBackend;
use crate::errors::{SetupError, TransferError};
use simplelog::*;

/// Drives one upload through submit, poll, fetch and the optional delete.
pub struct JobController {
    backend: Box<dyn TransportBackend>,
    details: ConnectionDetails,
    poll: PollLoop,
}

fn advance(job: &mut Job, state: JobState) {
    debug!("{}: {} -> {}", job.status_handle, job.state, state);
    job.state = state;
}

fn aggregate(messages: &[String]) -> String {
    match messages {
        [single] => single.clone(),
        _ => format!("\n{}", messages.join("\n")),
    }
}

impl JobController {
    pub fn new(
        backend: Box<dyn TransportBackend>,
        details: ConnectionDetails,
        poll: PollLoop,
    ) -> JobController {
        JobController {
            backend,
            details,
            poll,
        }
    }

    /// Runs the whole lifecycle. Only a failed connection is an `Err`, every
    /// later failure ends the run with a failed `Outcome` and leaves the
    /// remaining jobs alone.
    pub fn run(&mut self, request: &RunRequest) -> Result<Outcome, SetupError> {
        self.backend.connect(&self.details)?;

        let submission = match self.backend.submit(&request.upload) {
            Ok(submission) => submission,
            Err(e) => return Ok(e.into()),
        };
        info!("{}", submission.message.trim_end());

        let mut messages = Vec::with_capacity(submission.jobs.len());
        for mut job in submission.jobs {
            match self.process(&mut job, request) {
                Ok(message) => {
                    advance(&mut job, JobState::Done);
                    messages.push(message);
                }
                Err(e) => {
                    advance(&mut job, JobState::Failed);
                    return Ok(e.into());
                }
            }
        }

        Ok(Outcome::success(&aggregate(&messages)))
    }

    fn process(&mut self, job: &mut Job, request: &RunRequest) -> Result<String, TransferError> {
        self.poll.wait_for(self.backend.as_mut(), job)?;

        advance(job, JobState::Fetching);
        let mut message = self.backend.fetch_result(job, &request.location)?;

        if request.remove_after {
            advance(job, JobState::Removing);
            message.push_str(&self.backend.delete_result(job)?);
        }

        Ok(message)
    }

    pub fn disconnect(&mut self) -> Result<(), TransferError> {
        self.backend.disconnect()
    }
}
