//! Custom error types for the bulk exchange client
use thiserror::Error;

/// Failures while establishing a transport session.
///
/// These are fatal: without a session there is nothing left to retry, so they
/// escape `JobController::run` instead of being folded into an `Outcome`.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SetupError {
    #[error("Could not set the server with {host}:{port}.")]
    Server { host: String, port: u16 },

    #[error("Cannot connect to {host}:{port}.")]
    Connect { host: String, port: u16 },

    #[error("Login failed with username {identity}.")]
    Login { identity: String },

    #[error("Could not set type to auto ASCII.")]
    TransferType,

    #[error("Could not change to passive mode.")]
    Passive,
}

/// Expected failures of a job step. The `Display` output is the message
/// reported to the user, so keep the trailing newlines.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// the local upload file is missing
    #[error("File Upload Error: {path} does not exist\n")]
    MissingInput { path: String },

    /// the server answered in a shape we could not interpret
    #[error("Failed to extract {what} from: {response}\n")]
    Protocol { what: String, response: String },

    /// the request itself failed
    #[error("{0}")]
    Network(String),

    /// the server reported an error, or sent a body without a status
    #[error("{0}")]
    Application(String),

    #[error("The {dir} directory does not exist.\n")]
    NotFound { dir: String },

    #[error("Could not reconnect to the server.\n")]
    Reconnect,

    /// the local result file could not be created
    #[error("Could not open '{path}' for writing\n")]
    Io { path: String },

    #[error("\nFile Upload Error: {0}\n")]
    Upload(String),

    #[error("\nFile Download Error: {0}\n")]
    Download(String),

    #[error("Could not remove {name} from the server.\n")]
    Remove { name: String },

    #[error("The {protocol} protocol does not support {operation}.")]
    Unsupported {
        protocol: String,
        operation: String,
    },
}

impl TransferError {
    pub fn protocol(what: &str, response: &str) -> TransferError {
        TransferError::Protocol {
            what: what.to_string(),
            response: response.to_string(),
        }
    }
}

/// Problems assembling the run configuration from flags, env and file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    #[error("unknown protocol '{0}', expected 'ftp' or 'http'")]
    Protocol(String),

    #[error("a password is required (--password, BULK_EXCHANGE_PASSWORD or the config file)")]
    MissingSecret,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_reported_text() {
        let err = TransferError::MissingInput {
            path: "other.csv".to_string(),
        };
        assert_eq!(err.to_string(), "File Upload Error: other.csv does not exist\n");

        let err = TransferError::protocol("filename", "source_test_data_20140523_0012.csv");
        assert_eq!(
            err.to_string(),
            "Failed to extract filename from: source_test_data_20140523_0012.csv\n"
        );

        assert_eq!(
            TransferError::Reconnect.to_string(),
            "Could not reconnect to the server.\n"
        );

        let err = TransferError::Unsupported {
            protocol: "http".to_string(),
            operation: "quit".to_string(),
        };
        assert_eq!(err.to_string(), "The http protocol does not support quit.");
    }

    #[test]
    fn setup_error_never_echoes_the_secret() {
        let err = SetupError::Login {
            identity: "TestKey".to_string(),
        };
        assert_eq!(err.to_string(), "Login failed with username TestKey.");
    }
}
