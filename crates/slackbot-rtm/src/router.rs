//! The event router: the single consumer of the intake queue.
//!
//! Each `message` envelope becomes its own dispatch task; the router never
//! waits on one. Tasks are owned by a [`JoinSet`] so their outcomes are
//! reaped and reported instead of being lost.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::envelope::Envelope;
use crate::errors::DispatchError;

type DispatchResult = Result<DispatchOutcome, DispatchError>;

/// Why the router loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouterExit {
    /// The ingestor stopped producing.
    IntakeClosed,
    /// The embedder asked for shutdown.
    Shutdown,
    /// The reply writer died, so no reply can be delivered any more.
    WriterStopped,
}

/// Counters kept by the router.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RouterStats {
    /// `hello` envelopes seen.
    pub hello: u64,
    /// `message` envelopes seen (each spawned a dispatch).
    pub messages: u64,
    /// Dispatches that wrote a reply.
    pub replied: u64,
    /// Dispatches that found the message not addressed to the bot.
    pub unaddressed: u64,
    /// Dispatches where no binding matched.
    pub unmatched: u64,
    /// Dispatches that failed (handler error, panic, or write failure).
    pub failed: u64,
    /// Recognized envelopes with no behavior attached.
    pub ignored: u64,
    /// Envelopes with an unknown type tag.
    pub unknown: u64,
    /// Envelopes whose fields could not be extracted.
    pub malformed: u64,
}

/// Routes envelopes by type and supervises dispatch tasks.
pub struct Router {
    dispatcher: Arc<Dispatcher>,
    tasks: JoinSet<DispatchResult>,
    stats: RouterStats,
}

impl Router {
    /// Create a router over `dispatcher`.
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            tasks: JoinSet::new(),
            stats: RouterStats::default(),
        }
    }

    /// Current counters.
    pub fn stats(&self) -> &RouterStats {
        &self.stats
    }

    /// Dispatch tasks not yet reaped.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Act on one envelope. Never blocks on dispatch.
    pub fn route(&mut self, envelope: Envelope) {
        match envelope {
            Envelope::Hello => {
                self.stats.hello += 1;
                tracing::info!("hello received, stream is live");
            }
            Envelope::Message(msg) => {
                self.stats.messages += 1;
                tracing::info!(user = %msg.user, channel = %msg.channel, text = %msg.text, "message");
                let span = tracing::info_span!("dispatch", channel = %msg.channel, ts = %msg.ts);
                let dispatcher = Arc::clone(&self.dispatcher);
                let _ = self
                    .tasks
                    .spawn(async move { dispatcher.dispatch(msg).await }.instrument(span));
            }
            Envelope::Ignored(kind) => {
                self.stats.ignored += 1;
                tracing::trace!(kind = %kind, "ignored event");
            }
            Envelope::Unknown { kind, raw } => {
                self.stats.unknown += 1;
                tracing::info!(kind = %kind, raw = %raw, "unknown event");
            }
            Envelope::Malformed { kind, reason } => {
                self.stats.malformed += 1;
                tracing::warn!(kind = %kind, reason = %reason, "malformed event skipped");
            }
        }
    }

    fn reap(&mut self, joined: Result<DispatchResult, JoinError>) {
        match joined {
            Ok(Ok(DispatchOutcome::Replied { id })) => {
                self.stats.replied += 1;
                tracing::debug!(id, "dispatch replied");
            }
            Ok(Ok(DispatchOutcome::NotAddressed)) => self.stats.unaddressed += 1,
            Ok(Ok(DispatchOutcome::NoMatch)) => self.stats.unmatched += 1,
            Ok(Err(e)) => {
                self.stats.failed += 1;
                tracing::warn!(error = %e, "dispatch failed");
            }
            Err(e) if e.is_cancelled() => {
                tracing::debug!("dispatch cancelled at shutdown");
            }
            Err(e) => {
                self.stats.failed += 1;
                tracing::error!(error = %e, "dispatch task panicked");
            }
        }
    }

    /// Run until the intake closes, the reply writer stops, or `shutdown`
    /// fires.
    ///
    /// When the intake closes, in-flight dispatches are awaited before
    /// returning. Otherwise they are aborted.
    pub async fn run(
        mut self,
        mut intake: mpsc::Receiver<Envelope>,
        shutdown: CancellationToken,
    ) -> (RouterExit, RouterStats) {
        let dispatcher = Arc::clone(&self.dispatcher);
        let exit = loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break RouterExit::Shutdown,
                () = dispatcher.writer_stopped() => {
                    tracing::error!("reply writer stopped, routing stopped");
                    break RouterExit::WriterStopped;
                }
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    self.reap(joined);
                }
                envelope = intake.recv() => match envelope {
                    Some(envelope) => self.route(envelope),
                    None => break RouterExit::IntakeClosed,
                },
            }
        };

        drop(intake);
        if exit != RouterExit::IntakeClosed {
            self.tasks.abort_all();
        }
        while let Some(joined) = self.tasks.join_next().await {
            self.reap(joined);
        }

        tracing::info!(?exit, stats = ?self.stats, "router stopped");
        (exit, self.stats)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
