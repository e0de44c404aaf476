use crate::cli::job::{Job, JobState, PollStatus};
use crate::cli::transport::TransportBackend;
use crate::errors::TransferError;
use simplelog::*;
use std::time::Duration;

pub const DEFAULT_POLL_SECONDS: u64 = 300;

#[cfg_attr(test, mockall::automock)]
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Blocks the calling thread.
pub struct ThreadSleeper {}

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Re-checks a job every `every` until the server reports it finished.
///
/// There is no retry limit or deadline: the loop only ends on a ready status,
/// a failed poll, or a failed reconnect.
pub struct PollLoop {
    every: Duration,
    sleeper: Box<dyn Sleeper>,
}

impl PollLoop {
    pub fn new(every: Duration, sleeper: Box<dyn Sleeper>) -> PollLoop {
        PollLoop { every, sleeper }
    }

    pub fn wait_for(
        &self,
        backend: &mut dyn TransportBackend,
        job: &mut Job,
    ) -> Result<String, TransferError> {
        job.state = JobState::Polling;

        loop {
            match backend.poll_status(job)? {
                PollStatus::Ready(message) => {
                    job.state = JobState::Completed;
                    return Ok(message);
                }
                PollStatus::Pending => {
                    info!("Waiting for results file {} ...", job.status_handle);
                    self.sleeper.sleep(self.every);
                    backend.reconnect_if_required()?;
                }
            }
        }
    }
}
