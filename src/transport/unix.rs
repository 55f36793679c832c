//! Unix domain socket connector.

use super::Reconnect;
use crate::error::{Error, Result};
use std::path::Path;
use tokio::net::UnixStream;
use tracing::instrument;

/// Connect to the master agent socket, retrying per `reconnect`.
///
/// The last connect error is returned once the attempts are exhausted.
///
/// # Example
///
/// ```rust,no_run
/// use async_agentx::transport::{Reconnect, connect_unix, DEFAULT_MASTER_SOCKET};
///
/// # async fn example() -> async_agentx::Result<()> {
/// let stream = connect_unix(DEFAULT_MASTER_SOCKET, &Reconnect::default()).await?;
/// # Ok(())
/// # }
/// ```
#[instrument(skip(path, reconnect), err, fields(agentx.socket = %path.as_ref().display()))]
pub async fn connect_unix(path: impl AsRef<Path>, reconnect: &Reconnect) -> Result<UnixStream> {
    let path = path.as_ref();
    let mut attempt = 0;
    loop {
        match UnixStream::connect(path).await {
            Ok(stream) => {
                tracing::debug!(target: "async_agentx::transport", { agentx.attempt = attempt }, "connected to master");
                return Ok(stream);
            }
            Err(e) if attempt < reconnect.max_attempts => {
                let delay = reconnect.compute_delay(attempt);
                tracing::debug!(
                    target: "async_agentx::transport",
                    { agentx.attempt = attempt, error = %e, delay = ?delay },
                    "connect failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(Error::transport(Some(path.to_path_buf()), e)),
        }
    }
}
