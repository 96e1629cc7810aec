//! Event ingestion: read frames, classify them, hand them to the router.

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::envelope::Envelope;
use crate::errors::StreamError;

/// Read frames from `source` until it fails, forwarding every tagged
/// envelope to `intake` in receive order.
///
/// Each handoff waits for room in `intake`, so a busy router slows the
/// reader down rather than building a backlog. Frames that are not JSON are
/// logged and skipped.
///
/// Returns `Ok(())` if the router went away first, otherwise the error that
/// ended the stream.
pub async fn run_ingestor<R, E>(mut source: R, intake: mpsc::Sender<Envelope>) -> Result<(), StreamError>
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: std::fmt::Display,
{
    loop {
        let msg = match source.next().await {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                let err = StreamError::Read(e.to_string());
                tracing::error!(error = %err, "stream read failed, ingestion stopped");
                return Err(err);
            }
            None => {
                tracing::warn!("stream ended, ingestion stopped");
                return Err(StreamError::Closed);
            }
        };

        let text = match msg {
            Message::Text(text) => text,
            Message::Close(frame) => {
                tracing::warn!(?frame, "stream closed by peer");
                return Err(StreamError::Closed);
            }
            _ => continue,
        };

        let envelope = match Envelope::decode(text.as_str()) {
            Ok(Some(envelope)) => envelope,
            Ok(None) => {
                tracing::trace!(frame = %text.as_str(), "untagged frame skipped");
                continue;
            }
            Err(e) => {
                tracing::warn!(error = %e, "undecodable frame skipped");
                continue;
            }
        };

        if intake.send(envelope).await.is_err() {
            tracing::debug!("router stopped, ingestion stopped");
            return Ok(());
        }
    }
}
