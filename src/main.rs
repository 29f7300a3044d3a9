mod buffer;
mod config;
mod error;
mod mux;
mod term;
mod wire;

use config::Config;
use error::{ClientError, INTERNAL_FAILURE_CODE};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .try_init()
        .ok();

    let exit_code = match run().await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(%err, "fatal");
            eprintln!("{err}");
            INTERNAL_FAILURE_CODE
        }
    };
    std::process::exit(exit_code);
}

async fn run() -> Result<i32, ClientError> {
    let config = Config::resolve()?;

    let socket = tokio::net::UnixStream::connect(&config.socket_path).await?;
    tracing::debug!(path = %config.socket_path.display(), "connected to server");

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();
    let stderr = tokio::io::stderr();

    mux::run(socket, stdin, stdout, stderr).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connecting_to_a_missing_socket_is_a_fatal_io_error() {
        let path = std::path::PathBuf::from("/tmp/ucshim-test-missing-socket-does-not-exist.sock");
        let io_err = tokio::net::UnixStream::connect(&path).await.unwrap_err();
        let err: ClientError = io_err.into();
        assert!(err.to_string().contains("No such file or directory"));
    }
}
