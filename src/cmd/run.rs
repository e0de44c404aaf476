use anyhow::Result;
use bulk_exchange::cli::config::{self, FileConfig, Overrides, Protocol, Settings};
use bulk_exchange::cli::controller::JobController;
use bulk_exchange::cli::ftp::DirectoryTransferBackend;
use bulk_exchange::cli::ftp_client::CurlFtpClient;
use bulk_exchange::cli::http::StatusUrlBackend;
use bulk_exchange::cli::http_client::ReqwestClient;
use bulk_exchange::cli::job::{ExportMode, Outcome, RunRequest, UploadRequest};
use bulk_exchange::cli::poll::{PollLoop, Sleeper};
use bulk_exchange::cli::transport::TransportBackend;
use bulk_exchange::errors::ConfigError;
use clap::Args;
use simplelog::*;
use spinners::{Spinner, Spinners};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct RunCommand {
    /// File to upload
    #[clap(short, long)]
    pub file: PathBuf,

    /// Directory the results are downloaded into
    #[clap(short, long)]
    pub location: PathBuf,

    /// Account name on the server
    #[clap(short, long)]
    pub username: Option<String>,

    /// Password (ftp) or api key (http)
    #[clap(short, long, env = "BULK_EXCHANGE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Seconds between two status checks [default: 300]
    #[clap(long)]
    pub poll: Option<u64>,

    /// Server host [default: localhost]
    #[clap(long)]
    pub host: Option<String>,

    /// Server port [default: 21 for ftp, 80 for http]
    #[clap(long)]
    pub port: Option<u16>,

    /// Ask for one result archive instead of one per split job
    #[clap(long)]
    pub single_file: bool,

    /// Remove the results from the server once downloaded
    #[clap(long)]
    pub remove: bool,

    /// ftp or http [default: http]
    #[clap(long)]
    pub protocol: Option<String>,

    /// E-mail the server notifies when processing is done (http only)
    #[clap(long)]
    pub notify: Option<String>,

    /// Config file [default: ~/.config/bulk-exchange/config.toml]
    #[clap(short, long)]
    pub config: Option<PathBuf>,
}

impl RunCommand {
    fn overrides(&self) -> Overrides {
        Overrides {
            username: self.username.clone(),
            password: self.password.clone(),
            host: self.host.clone(),
            port: self.port,
            poll: self.poll,
            protocol: self.protocol.clone(),
            notify: self.notify.clone(),
        }
    }

    fn request(&self, settings: &Settings) -> RunRequest {
        RunRequest {
            upload: UploadRequest {
                file: self.file.clone(),
                mode: ExportMode::from_single_file(self.single_file),
                notify: settings.notify.clone(),
            },
            location: self.location.clone(),
            remove_after: self.remove,
        }
    }
}

/// Shows a spinner while waiting for the next status check.
struct SpinnerSleeper {}

impl Sleeper for SpinnerSleeper {
    fn sleep(&self, duration: Duration) {
        let mut sp = Spinner::new(
            Spinners::Dots12,
            format!("Checking again in {}s", duration.as_secs()),
        );
        std::thread::sleep(duration);
        sp.stop_with_newline();
    }
}

fn prompt_secret() -> Option<String> {
    rpassword::prompt_password("Password: ").ok()
}

fn load_config(path: Option<&PathBuf>) -> Result<FileConfig, ConfigError> {
    match path {
        Some(path) => FileConfig::load(path, true),
        None => match FileConfig::default_path() {
            Some(path) => FileConfig::load(&path, false),
            None => Ok(FileConfig::default()),
        },
    }
}

fn backend_for(protocol: Protocol) -> Result<Box<dyn TransportBackend>> {
    let backend: Box<dyn TransportBackend> = match protocol {
        Protocol::Ftp => Box::new(DirectoryTransferBackend::new(CurlFtpClient::new())),
        Protocol::Http => Box::new(StatusUrlBackend::new(ReqwestClient::new()?)),
    };
    Ok(backend)
}

/// Runs one upload. `Err` means the run never got going: bad configuration or
/// no session with the server.
pub fn execute(args: &RunCommand) -> Result<Outcome> {
    let file = load_config(args.config.as_ref())?;
    let settings = config::resolve(args.overrides(), file, prompt_secret)?;
    debug!(
        "{} run against {:?}, polling every {}s",
        settings.protocol,
        settings.details,
        settings.poll.as_secs()
    );

    let poll = PollLoop::new(settings.poll, Box::new(SpinnerSleeper {}));
    let mut controller = JobController::new(
        backend_for(settings.protocol)?,
        settings.details.clone(),
        poll,
    );

    let outcome = controller.run(&args.request(&settings))?;

    if settings.protocol.has_session() {
        if let Err(e) = controller.disconnect() {
            warn!("{}", e);
        }
    }

    Ok(outcome)
}
