use crate::cli::ftp;
use crate::cli::http;
use crate::cli::job::ConnectionDetails;
use crate::cli::poll::DEFAULT_POLL_SECONDS;
use crate::errors::ConfigError;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const CONFIG_DIR: &str = "bulk-exchange";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DEFAULT_HOST: &str = "localhost";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Ftp,
    Http,
}

impl Protocol {
    pub fn default_port(&self) -> u16 {
        match self {
            Protocol::Ftp => ftp::DEFAULT_PORT,
            Protocol::Http => http::DEFAULT_PORT,
        }
    }

    /// Whether the backend keeps a session that has to be closed after a run.
    pub fn has_session(&self) -> bool {
        matches!(self, Protocol::Ftp)
    }
}

impl FromStr for Protocol {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "ftp" => Ok(Protocol::Ftp),
            "http" => Ok(Protocol::Http),
            _ => Err(ConfigError::Protocol(value.to_string())),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Protocol::Ftp => write!(f, "ftp"),
            Protocol::Http => write!(f, "http"),
        }
    }
}

/// Contents of `config.toml`. Every key is optional.
#[derive(Deserialize, Debug, Default, PartialEq, Clone)]
pub struct FileConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub poll: Option<u64>,
    pub protocol: Option<String>,
    pub notify: Option<String>,
}

impl FileConfig {
    /// `~/.config/bulk-exchange/config.toml`, if a home directory is known.
    pub fn default_path() -> Option<PathBuf> {
        home::home_dir().map(|mut path| {
            path.push(".config");
            path.push(CONFIG_DIR);
            path.push(CONFIG_FILE_NAME);
            path
        })
    }

    /// Reads `path`. A missing file is only an error when the user named it.
    pub fn load(path: &Path, explicit: bool) -> Result<FileConfig, ConfigError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound && !explicit => {
                return Ok(FileConfig::default())
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })
            }
        };

        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Values given on the command line (or through the environment).
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub username: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub poll: Option<u64>,
    pub protocol: Option<String>,
    pub notify: Option<String>,
}

/// The merged settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub details: ConnectionDetails,
    pub poll: Duration,
    pub protocol: Protocol,
    pub notify: Option<String>,
}

/// Command line wins over the file. `prompt` is only asked for the secret when
/// neither source has one.
pub fn resolve<F>(cli: Overrides, file: FileConfig, prompt: F) -> Result<Settings, ConfigError>
where
    F: FnOnce() -> Option<String>,
{
    let protocol = match cli.protocol.or(file.protocol) {
        Some(value) => value.parse::<Protocol>()?,
        None => Protocol::Http,
    };

    let poll = match cli.poll.or(file.poll) {
        Some(0) | None => DEFAULT_POLL_SECONDS,
        Some(seconds) => seconds,
    };

    let port = match cli.port.or(file.port) {
        Some(0) | None => protocol.default_port(),
        Some(port) => port,
    };

    let secret = cli
        .password
        .or(file.password)
        .or_else(prompt)
        .filter(|secret| !secret.is_empty())
        .ok_or(ConfigError::MissingSecret)?;

    Ok(Settings {
        details: ConnectionDetails {
            identity: cli.username.or(file.username).unwrap_or_default(),
            secret,
            host: cli
                .host
                .or(file.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
        },
        poll: Duration::from_secs(poll),
        protocol,
        notify: cli.notify.or(file.notify).filter(|email| !email.is_empty()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::test_helpers::scratch_dir;

    fn no_prompt() -> Option<String> {
        panic!("prompted for a secret that was already given")
    }

    #[test]
    fn defaults_to_http() {
        let cli = Overrides {
            password: Some("54321".to_string()),
            ..Overrides::default()
        };

        let settings = resolve(cli, FileConfig::default(), no_prompt).unwrap();

        assert_eq!(settings.protocol, Protocol::Http);
        assert_eq!(settings.details.host, "localhost");
        assert_eq!(settings.details.port, 80);
        assert_eq!(settings.details.identity, "");
        assert_eq!(settings.poll, Duration::from_secs(300));
        assert_eq!(settings.notify, None);
    }

    #[test]
    fn port_follows_protocol() {
        let cli = Overrides {
            password: Some("secret".to_string()),
            protocol: Some("FTP".to_string()),
            ..Overrides::default()
        };
        let settings = resolve(cli.clone(), FileConfig::default(), no_prompt).unwrap();
        assert_eq!(settings.details.port, 21);
        assert!(settings.protocol.has_session());

        let cli = Overrides {
            port: Some(9871),
            ..cli
        };
        let settings = resolve(cli, FileConfig::default(), no_prompt).unwrap();
        assert_eq!(settings.details.port, 9871);
    }

    #[test]
    fn command_line_wins_over_file() {
        let file = FileConfig {
            username: Some("FileKey".to_string()),
            password: Some("file-secret".to_string()),
            host: Some("files.example.com".to_string()),
            port: Some(2121),
            poll: Some(60),
            protocol: Some("ftp".to_string()),
            notify: Some("file@example.com".to_string()),
        };
        let cli = Overrides {
            username: Some("TestKey".to_string()),
            host: Some("bulk.example.com".to_string()),
            poll: Some(5),
            ..Overrides::default()
        };

        let settings = resolve(cli, file, no_prompt).unwrap();

        assert_eq!(settings.details.identity, "TestKey");
        assert_eq!(settings.details.secret, "file-secret");
        assert_eq!(settings.details.host, "bulk.example.com");
        assert_eq!(settings.details.port, 2121);
        assert_eq!(settings.poll, Duration::from_secs(5));
        assert_eq!(settings.protocol, Protocol::Ftp);
        assert_eq!(settings.notify.as_deref(), Some("file@example.com"));
    }

    #[test]
    fn secret_is_prompted_last() {
        let settings = resolve(Overrides::default(), FileConfig::default(), || {
            Some("typed".to_string())
        })
        .unwrap();
        assert_eq!(settings.details.secret, "typed");

        let err = resolve(Overrides::default(), FileConfig::default(), || {
            Some(String::new())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingSecret));
    }

    #[test]
    fn invalid_values_fall_back_or_fail() {
        let cli = Overrides {
            password: Some("secret".to_string()),
            protocol: Some("sftp".to_string()),
            ..Overrides::default()
        };
        let err = resolve(cli.clone(), FileConfig::default(), no_prompt).unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown protocol 'sftp', expected 'ftp' or 'http'"
        );

        let cli = Overrides {
            protocol: None,
            poll: Some(0),
            ..cli
        };
        let settings = resolve(cli, FileConfig::default(), no_prompt).unwrap();
        assert_eq!(settings.poll, Duration::from_secs(300));
    }

    #[test]
    fn load_file() {
        let dir = scratch_dir();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            "username = \"TestKey\"\nhost = \"bulk.example.com\"\nport = 2121\nprotocol = \"ftp\"\n",
        )
        .unwrap();

        let config = FileConfig::load(&path, true).unwrap();

        assert_eq!(config.username.as_deref(), Some("TestKey"));
        assert_eq!(config.host.as_deref(), Some("bulk.example.com"));
        assert_eq!(config.port, Some(2121));
        assert_eq!(config.protocol.as_deref(), Some("ftp"));
        assert_eq!(config.password, None);
    }

    #[test]
    fn missing_file_only_fails_when_named() {
        let dir = scratch_dir();
        let path = dir.path().join(CONFIG_FILE_NAME);

        assert_eq!(FileConfig::load(&path, false).unwrap(), FileConfig::default());
        assert!(matches!(
            FileConfig::load(&path, true),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn malformed_file() {
        let dir = scratch_dir();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "port = \"not a number\"\n").unwrap();

        assert!(matches!(
            FileConfig::load(&path, false),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn default_path_lives_under_home() {
        if let Some(path) = FileConfig::default_path() {
            assert!(path.ends_with(".config/bulk-exchange/config.toml"));
        }
    }
}
