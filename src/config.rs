//! Resolves the Unix-domain-socket path the client connects to.
//!
//! The path comes from the `DAIYOUSEI_UNIX_SOCKET` environment variable, or
//! from `--socket` on the command line, which wins when both are present.
//! Everything else about argument parsing, socket connection, and stdio
//! setup lives outside the core I/O engine in [`crate::mux`].

use std::path::PathBuf;

use clap::Parser;

use crate::error::ClientError;

const SOCKET_ENV_VAR: &str = "DAIYOUSEI_UNIX_SOCKET";

#[derive(Parser, Debug)]
#[command(author, version, about = "Unix-socket stdio shim driven by a remote server")]
struct Cli {
    /// Path to the Unix domain socket. Overrides DAIYOUSEI_UNIX_SOCKET.
    #[arg(long)]
    socket: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub socket_path: PathBuf,
}

impl Config {
    /// Parses CLI flags and resolves the socket path from them or the
    /// environment, returning a fatal [`ClientError::Config`] if neither
    /// source supplies one.
    pub fn resolve() -> Result<Config, ClientError> {
        Self::resolve_from(Cli::parse(), std::env::var_os(SOCKET_ENV_VAR))
    }

    fn resolve_from(cli: Cli, env_value: Option<std::ffi::OsString>) -> Result<Config, ClientError> {
        let socket_path = cli
            .socket
            .or_else(|| env_value.map(PathBuf::from))
            .ok_or_else(|| {
                ClientError::Config(format!(
                    "missing socket path: set {SOCKET_ENV_VAR} or pass --socket"
                ))
            })?;
        Ok(Config { socket_path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flag_overrides_environment() {
        let cli = Cli {
            socket: Some(PathBuf::from("/tmp/from-flag.sock")),
        };
        let config = Config::resolve_from(cli, Some("/tmp/from-env.sock".into())).unwrap();
        assert_eq!(config.socket_path, PathBuf::from("/tmp/from-flag.sock"));
    }

    #[test]
    fn falls_back_to_environment() {
        let cli = Cli { socket: None };
        let config = Config::resolve_from(cli, Some("/tmp/from-env.sock".into())).unwrap();
        assert_eq!(config.socket_path, PathBuf::from("/tmp/from-env.sock"));
    }

    #[test]
    fn missing_both_sources_is_fatal() {
        let cli = Cli { socket: None };
        let err = Config::resolve_from(cli, None).unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
        assert!(err.to_string().contains(SOCKET_ENV_VAR));
    }
}
