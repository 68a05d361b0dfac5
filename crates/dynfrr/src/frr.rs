//! FRR container control socket client.
//!
//! The FRR container listens on a Unix socket for one-line commands:
//! - `stop` - stop advertising routes
//! - `reload` - reload configuration and resume advertising
//!
//! Nothing is read back; a command counts as delivered once the write
//! succeeds. Failed writes are retried on the same connection until they go
//! through; the caller is blocked for as long as that takes.

use std::time::Duration;

use runtimecfg_common::{APIState, ControlCommand, RuntimecfgError};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::UnixStream;

/// Outcome of a delivered command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub command: ControlCommand,
    /// Write attempts needed, including the successful one
    pub attempts: u32,
}

/// Control socket client holding the persistent connection
pub struct FrrControl<S> {
    stream: S,
    /// Path of the control socket, for logging
    socket_path: String,
    /// Wait between failed write attempts
    retry_interval: Duration,
}

impl FrrControl<UnixStream> {
    /// Open the control socket
    pub async fn connect(
        socket_path: &str,
        retry_interval: Duration,
    ) -> Result<Self, RuntimecfgError> {
        let stream = UnixStream::connect(socket_path).await.map_err(|e| {
            RuntimecfgError::ControlSocket(format!("failed to connect to {socket_path}: {e}"))
        })?;

        tracing::info!(socket = socket_path, "Connected to FRR control socket");

        Ok(Self::from_stream(stream, socket_path, retry_interval))
    }
}

impl<S> FrrControl<S>
where
    S: AsyncWrite + Unpin + Send,
{
    /// Wrap an already open connection
    pub fn from_stream(stream: S, socket_path: &str, retry_interval: Duration) -> Self {
        Self {
            stream,
            socket_path: socket_path.to_string(),
            retry_interval,
        }
    }

    /// Deliver the command matching a monitor state
    pub async fn send_state(&mut self, state: APIState) -> Delivery {
        self.send_command(ControlCommand::from(state)).await
    }

    /// Deliver a command, retrying until the write succeeds
    pub async fn send_command(&mut self, command: ControlCommand) -> Delivery {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.write_command(command).await {
                Ok(()) => {
                    tracing::info!(
                        command = %command,
                        attempts = attempts,
                        "Command message successfully sent to FRR control socket"
                    );
                    return Delivery { command, attempts };
                }
                Err(e) => {
                    tracing::error!(
                        socket = %self.socket_path,
                        command = %command,
                        attempt = attempts,
                        error = %e,
                        "Failed to write command to FRR control socket"
                    );
                    tokio::time::sleep(self.retry_interval).await;
                }
            }
        }
    }

    async fn write_command(&mut self, command: ControlCommand) -> std::io::Result<()> {
        self.stream.write_all(command.wire_bytes()).await?;
        self.stream.flush().await
    }
}
