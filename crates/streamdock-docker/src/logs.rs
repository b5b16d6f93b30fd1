//! Following container output.

use bollard::Docker;
use bollard::container::{LogOutput, LogsOptions};
use bollard::errors::Error as BollardError;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use std::pin::pin;
use streamdock_core::Result;
use tokio::sync::mpsc;

use crate::container::classify;

/// Chunks buffered between the daemon and a slow reader.
const CHANNEL_CAPACITY: usize = 256;

/// Output of a followed container, delivered as it arrives.
///
/// The channel closes when the container exits or the daemon stops sending.
/// A daemon error (unknown container, lost connection) is delivered as the
/// last item, classified the same way as every other driver error.
pub struct LogStream {
    pub rx: mpsc::Receiver<Result<String>>,
}

impl LogStream {
    /// Follow `container_id`, starting with its last `tail_lines` lines.
    #[must_use]
    pub fn start(docker: Docker, container_id: String, tail_lines: usize) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        tokio::spawn(async move {
            let options = LogsOptions::<String> {
                follow: true,
                stdout: true,
                stderr: true,
                tail: tail_lines.to_string(),
                ..Default::default()
            };
            forward(docker.logs(&container_id, Some(options)), &tx).await;
            tracing::debug!(container = %container_id, "stopped following output");
        });

        Self { rx }
    }
}

/// Payload of an output frame. Stdin echoes carry nothing worth showing.
pub(crate) fn frame_bytes(frame: LogOutput) -> Option<Bytes> {
    match frame {
        LogOutput::StdOut { message }
        | LogOutput::StdErr { message }
        | LogOutput::Console { message } => Some(message),
        LogOutput::StdIn { .. } => None,
    }
}

/// Send every frame to `tx` until the stream ends, an error has been sent,
/// or the reader goes away.
async fn forward<S>(frames: S, tx: &mpsc::Sender<Result<String>>)
where
    S: Stream<Item = std::result::Result<LogOutput, BollardError>>,
{
    let mut frames = pin!(frames);

    while let Some(frame) = frames.next().await {
        let item = match frame {
            Ok(frame) => match frame_bytes(frame) {
                Some(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
                None => continue,
            },
            Err(e) => Err(classify(e)),
        };

        let last = item.is_err();
        if tx.send(item).await.is_err() || last {
            break;
        }
    }
}
