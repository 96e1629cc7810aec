//! The persistent event stream and its single outbound writer.
//!
//! The stream is split once: the read half goes to the ingestor, the write
//! half is owned by [`run_writer`], which also owns the outbound id counter.
//! Dispatch tasks never touch either directly; they queue replies through an
//! [`Outbound`] handle and wait for the writer's acknowledgement.

use futures::{Sink, SinkExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::envelope::OutboundFrame;
use crate::errors::{BotError, StreamError};

/// Concrete stream type produced by [`connect`].
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Open the stream at `url`.
pub async fn connect(url: &str) -> Result<WsStream, BotError> {
    let (ws, _) = connect_async(url)
        .await
        .map_err(|e| BotError::Transport(format!("stream connect: {e}")))?;
    tracing::info!("stream connected");
    Ok(ws)
}

/// A reply waiting to be written.
#[derive(Debug)]
pub struct OutboundRequest {
    channel: String,
    text: String,
    ack: oneshot::Sender<Result<u64, StreamError>>,
}

/// Cloneable handle for queueing replies to the writer.
#[derive(Clone, Debug)]
pub struct Outbound {
    tx: mpsc::Sender<OutboundRequest>,
}

impl Outbound {
    /// Create a handle and the receiver the writer consumes.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<OutboundRequest>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Queue a reply and wait until it is on the wire.
    ///
    /// Returns the outbound id the writer assigned.
    pub async fn send(&self, channel: &str, text: String) -> Result<u64, StreamError> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(OutboundRequest {
                channel: channel.to_owned(),
                text,
                ack,
            })
            .await
            .map_err(|_| StreamError::WriterStopped)?;
        done.await.map_err(|_| StreamError::WriterStopped)?
    }

    /// Resolves once the writer has stopped accepting replies.
    ///
    /// While any handle is alive the writer only stops on a write failure,
    /// so for a holder of a handle this means the stream is dead.
    pub async fn stopped(&self) {
        self.tx.closed().await;
    }
}

/// Serialize queued replies onto `sink`, assigning ids 1, 2, 3, ...
///
/// Runs until every [`Outbound`] handle is dropped, returning the last id
/// used, or until the first write failure, which is returned. The request
/// queue is closed on exit so [`Outbound::stopped`] fires.
pub async fn run_writer<S>(
    mut sink: S,
    mut rx: mpsc::Receiver<OutboundRequest>,
) -> Result<u64, StreamError>
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let mut last_id: u64 = 0;
    let mut failure = None;

    while let Some(req) = rx.recv().await {
        let id = last_id + 1;
        let frame = OutboundFrame::message(id, req.channel, req.text);

        let json = match serde_json::to_string(&frame) {
            Ok(json) => json,
            Err(e) => {
                let _ = req.ack.send(Err(StreamError::Encode(e.to_string())));
                continue;
            }
        };
        last_id = id;

        if let Err(e) = sink.send(Message::Text(json.into())).await {
            let err = StreamError::Write(e.to_string());
            tracing::error!(id, channel = %frame.channel, error = %err, "outbound write failed, writer stopping");
            let _ = req.ack.send(Err(err.clone()));
            failure = Some(err);
            break;
        }

        tracing::debug!(id, channel = %frame.channel, "reply sent");
        let _ = req.ack.send(Ok(id));
    }

    rx.close();
    let _ = sink.close().await;
    match failure {
        Some(err) => Err(err),
        None => Ok(last_id),
    }
}
