//! Command dispatch: addressing check, highlight stripping, binding
//! selection, handler invocation, reply.

use std::sync::Arc;

use slackbot_settings::{BotSettings, HighlightStrip, MatchPolicy};

use crate::envelope::MessageEvent;
use crate::errors::DispatchError;
use crate::registry::{HandlerRegistry, Response};
use crate::session::BotIdentity;
use crate::stream::Outbound;

/// What a dispatch did with a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The message was not addressed to the bot.
    NotAddressed,
    /// No binding matched the stripped text.
    NoMatch,
    /// A handler answered and the reply was written with this id.
    Replied {
        /// Outbound id assigned by the writer.
        id: u64,
    },
}

/// Turns one message into at most one reply. Shared by every dispatch task.
#[derive(Debug)]
pub struct Dispatcher {
    identity: BotIdentity,
    mention: String,
    registry: Arc<HandlerRegistry>,
    outbound: Outbound,
    direct_prefix: String,
    policy: MatchPolicy,
    strip: HighlightStrip,
}

impl Dispatcher {
    /// Build a dispatcher for `identity`.
    pub fn new(
        identity: BotIdentity,
        registry: Arc<HandlerRegistry>,
        outbound: Outbound,
        settings: &BotSettings,
    ) -> Self {
        Self {
            mention: identity.mention(),
            identity,
            registry,
            outbound,
            direct_prefix: settings.direct_channel_prefix.clone(),
            policy: settings.match_policy,
            strip: settings.highlight_strip,
        }
    }

    /// Whether `msg` should be answered at all.
    ///
    /// The bot never answers itself. Otherwise the text must open with the
    /// bot's mention or display name, or the channel must be a direct one.
    pub fn is_addressed(&self, msg: &MessageEvent) -> bool {
        if msg.user == self.identity.id {
            return false;
        }
        msg.text.starts_with(&self.mention)
            || (!self.identity.name.is_empty() && msg.text.starts_with(&self.identity.name))
            || (!self.direct_prefix.is_empty() && msg.channel.starts_with(&self.direct_prefix))
    }

    /// Remove the leading highlight, one `:` separator, and leading
    /// whitespace.
    pub fn strip_highlight<'a>(&self, text: &'a str) -> &'a str {
        let rest = if let Some(rest) = text.strip_prefix(self.mention.as_str()) {
            rest
        } else if !self.identity.name.is_empty() && text.starts_with(&self.identity.name) {
            match self.strip {
                HighlightStrip::Exact => &text[self.identity.name.len()..],
                HighlightStrip::Legacy => text.get(self.identity.id.len()..).unwrap_or(""),
            }
        } else {
            text
        };
        let rest = rest.strip_prefix(':').unwrap_or(rest);
        rest.trim_start()
    }

    /// Resolves once the reply writer has stopped.
    pub async fn writer_stopped(&self) {
        self.outbound.stopped().await;
    }

    /// Handle one message end to end.
    pub async fn dispatch(&self, msg: MessageEvent) -> Result<DispatchOutcome, DispatchError> {
        if !self.is_addressed(&msg) {
            return Ok(DispatchOutcome::NotAddressed);
        }

        let text = self.strip_highlight(&msg.text);
        let Some((index, binding)) = self.registry.select(text, self.policy) else {
            tracing::debug!(text, "no binding matched");
            return Ok(DispatchOutcome::NoMatch);
        };
        tracing::debug!(index, pattern = binding.pattern(), "binding selected");

        let response = Response {
            user: msg.user.clone(),
            time: msg.ts.clone(),
            channel: msg.channel.clone(),
            data: binding.captures(text),
        };
        let handler = binding.handler();
        let pattern = binding.pattern().to_owned();

        let joined = tokio::task::spawn_blocking(move || {
            let mut out = String::new();
            handler.handle(&mut out, &response).map(|()| out)
        })
        .await;

        let reply = match joined {
            Ok(Ok(reply)) => reply,
            Ok(Err(source)) => return Err(DispatchError::Handler { pattern, source }),
            Err(_) => return Err(DispatchError::HandlerPanicked { pattern }),
        };

        let id = self.outbound.send(&msg.channel, reply).await?;
        Ok(DispatchOutcome::Replied { id })
    }
}

#[cfg(test)]
mod tests {
    use std::fmt::{self, Write as _};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::channel::mpsc as fmpsc;
    use futures::{FutureExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;

    use super::*;
    use crate::stream::run_writer;

    fn identity() -> BotIdentity {
        BotIdentity {
            id: "U123".into(),
            name: "helperbot".into(),
        }
    }

    fn message(channel: &str, user: &str, text: &str) -> MessageEvent {
        MessageEvent {
            channel: channel.into(),
            user: user.into(),
            ts: "1700000000.000100".into(),
            text: text.into(),
        }
    }

    struct Harness {
        dispatcher: Dispatcher,
        wire: fmpsc::UnboundedReceiver<Message>,
    }

    impl Harness {
        fn new(registry: HandlerRegistry, settings: &BotSettings) -> Self {
            let (sink, wire) = fmpsc::unbounded();
            let (outbound, rx) = Outbound::channel(16);
            let _writer = tokio::spawn(run_writer(sink, rx));
            Self {
                dispatcher: Dispatcher::new(identity(), Arc::new(registry), outbound, settings),
                wire,
            }
        }

        async fn next_frame(&mut self) -> serde_json::Value {
            match self.wire.next().await.unwrap() {
                Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
                other => panic!("unexpected frame {other:?}"),
            }
        }
    }

    fn dispatcher_only(settings: &BotSettings) -> Dispatcher {
        let (outbound, _rx) = Outbound::channel(1);
        Dispatcher::new(identity(), Arc::new(HandlerRegistry::new()), outbound, settings)
    }

    fn echo_data(out: &mut dyn fmt::Write, r: &Response) -> anyhow::Result<()> {
        write!(out, "{}", r.data.join("|"))?;
        Ok(())
    }

    // ── addressing ──────────────────────────────────────────────────

    #[test]
    fn mention_addresses_bot() {
        let d = dispatcher_only(&BotSettings::default());
        assert!(d.is_addressed(&message("C1", "U9", "<@U123> hello")));
    }

    #[test]
    fn name_prefix_addresses_bot() {
        let d = dispatcher_only(&BotSettings::default());
        assert!(d.is_addressed(&message("C1", "U9", "helperbot: ping")));
    }

    #[test]
    fn direct_channel_needs_no_mention() {
        let d = dispatcher_only(&BotSettings::default());
        assert!(d.is_addressed(&message("D42", "U9", "ping")));
    }

    #[test]
    fn plain_channel_without_mention_ignored() {
        let d = dispatcher_only(&BotSettings::default());
        assert!(!d.is_addressed(&message("C1", "U9", "ping")));
        assert!(!d.is_addressed(&message("C1", "U9", "hey <@U123>")));
    }

    #[test]
    fn own_messages_never_addressed() {
        let d = dispatcher_only(&BotSettings::default());
        assert!(!d.is_addressed(&message("C1", "U123", "<@U123> ping")));
        assert!(!d.is_addressed(&message("D1", "U123", "ping")));
    }

    // ── highlight stripping ─────────────────────────────────────────

    #[test]
    fn strips_mention() {
        let d = dispatcher_only(&BotSettings::default());
        assert_eq!(d.strip_highlight("<@U123> hello"), "hello");
        assert_eq!(d.strip_highlight("<@U123>: hello"), "hello");
    }

    #[test]
    fn strips_leading_colon() {
        let d = dispatcher_only(&BotSettings::default());
        assert_eq!(d.strip_highlight(":hi"), "hi");
    }

    #[test]
    fn exact_strip_removes_name() {
        let d = dispatcher_only(&BotSettings::default());
        assert_eq!(d.strip_highlight("helperbot: deploy"), "deploy");
    }

    #[test]
    fn legacy_strip_uses_id_length() {
        let settings = BotSettings {
            highlight_strip: HighlightStrip::Legacy,
            ..BotSettings::default()
        };
        let d = dispatcher_only(&settings);
        // "U123" is 4 bytes, so "help" goes and "erbot: deploy" stays.
        assert_eq!(d.strip_highlight("helperbot: deploy"), "erbot: deploy");
    }

    fn legacy_dispatcher(id: &str, name: &str) -> Dispatcher {
        let settings = BotSettings {
            highlight_strip: HighlightStrip::Legacy,
            ..BotSettings::default()
        };
        let (outbound, _rx) = Outbound::channel(1);
        let identity = BotIdentity {
            id: id.into(),
            name: name.into(),
        };
        Dispatcher::new(identity, Arc::new(HandlerRegistry::new()), outbound, &settings)
    }

    #[test]
    fn legacy_strip_clamps_to_text_length() {
        let d = legacy_dispatcher("U12345678", "bo");
        assert_eq!(d.strip_highlight("bo"), "");
        assert_eq!(d.strip_highlight("bot up"), "");
    }

    #[test]
    fn legacy_strip_inside_multibyte_char_yields_empty() {
        // Byte 3 falls inside the second "é".
        let d = legacy_dispatcher("U12", "é");
        assert_eq!(d.strip_highlight("éé ok"), "");
    }

    #[test]
    fn unaddressed_text_is_left_alone() {
        let d = dispatcher_only(&BotSettings::default());
        assert_eq!(d.strip_highlight("ping"), "ping");
    }

    // ── dispatch ────────────────────────────────────────────────────

    #[tokio::test]
    async fn matching_handler_receives_captures_and_replies() {
        let mut reg = HandlerRegistry::new();
        reg.register(r"^deploy (\w+) to (\w+)$", echo_data).unwrap();
        let mut h = Harness::new(reg, &BotSettings::default());

        let outcome = h
            .dispatcher
            .dispatch(message("C7", "U9", "<@U123> deploy api to prod"))
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Replied { id: 1 });

        let frame = h.next_frame().await;
        assert_eq!(frame["channel"], "C7");
        assert_eq!(frame["text"], "api|prod");
        assert_eq!(frame["type"], "message");
        assert_eq!(frame["id"], 1);
    }

    #[tokio::test]
    async fn handler_sees_message_context() {
        let mut reg = HandlerRegistry::new();
        reg.register("^whoami$", |out: &mut dyn fmt::Write, r: &Response| -> anyhow::Result<()> {
            write!(out, "{} {} {} {}", r.user, r.channel, r.time, r.data.len())?;
            Ok(())
        })
        .unwrap();
        let mut h = Harness::new(reg, &BotSettings::default());

        let _ = h.dispatcher.dispatch(message("D1", "U9", "whoami")).await.unwrap();
        let frame = h.next_frame().await;
        assert_eq!(frame["text"], "U9 D1 1700000000.000100 0");
    }

    #[tokio::test]
    async fn last_registered_match_wins() {
        let mut reg = HandlerRegistry::new();
        reg.register("^status", |out: &mut dyn fmt::Write, _r: &Response| -> anyhow::Result<()> {
            out.write_str("first")?;
            Ok(())
        })
        .unwrap();
        reg.register("status", |out: &mut dyn fmt::Write, _r: &Response| -> anyhow::Result<()> {
            out.write_str("second")?;
            Ok(())
        })
        .unwrap();
        let mut h = Harness::new(reg, &BotSettings::default());

        let _ = h.dispatcher.dispatch(message("D1", "U9", "status")).await.unwrap();
        assert_eq!(h.next_frame().await["text"], "second");
    }

    #[tokio::test]
    async fn first_match_policy_picks_earliest() {
        let mut reg = HandlerRegistry::new();
        reg.register("^status", |out: &mut dyn fmt::Write, _r: &Response| -> anyhow::Result<()> {
            out.write_str("first")?;
            Ok(())
        })
        .unwrap();
        reg.register("status", |out: &mut dyn fmt::Write, _r: &Response| -> anyhow::Result<()> {
            out.write_str("second")?;
            Ok(())
        })
        .unwrap();
        let settings = BotSettings {
            match_policy: MatchPolicy::First,
            ..BotSettings::default()
        };
        let mut h = Harness::new(reg, &settings);

        let _ = h.dispatcher.dispatch(message("D1", "U9", "status")).await.unwrap();
        assert_eq!(h.next_frame().await["text"], "first");
    }

    #[tokio::test]
    async fn unaddressed_message_invokes_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let mut reg = HandlerRegistry::new();
        reg.register(".*", move |_out: &mut dyn fmt::Write, _r: &Response| -> anyhow::Result<()> {
            let _ = seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
        let h = Harness::new(reg, &BotSettings::default());

        let outcome = h
            .dispatcher
            .dispatch(message("C1", "U123", "<@U123> anything"))
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::NotAddressed);
        let outcome = h.dispatcher.dispatch(message("C1", "U9", "anything")).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::NotAddressed);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn no_match_sends_nothing() {
        let mut reg = HandlerRegistry::new();
        reg.register("^ping$", echo_data).unwrap();
        let mut h = Harness::new(reg, &BotSettings::default());

        let outcome = h.dispatcher.dispatch(message("D1", "U9", "pong")).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::NoMatch);
        assert!(h.wire.next().now_or_never().is_none(), "nothing should be written");
    }

    #[tokio::test]
    async fn handler_error_is_reported_without_reply() {
        let mut reg = HandlerRegistry::new();
        reg.register("^fail$", |_out: &mut dyn fmt::Write, _r: &Response| -> anyhow::Result<()> {
            anyhow::bail!("backend unavailable")
        })
        .unwrap();
        let h = Harness::new(reg, &BotSettings::default());

        let err = h.dispatcher.dispatch(message("D1", "U9", "fail")).await.unwrap_err();
        assert!(matches!(err, DispatchError::Handler { ref pattern, .. } if pattern == "^fail$"));
    }

    #[tokio::test]
    async fn handler_panic_is_contained() {
        let mut reg = HandlerRegistry::new();
        reg.register("^boom$", |_out: &mut dyn fmt::Write, _r: &Response| -> anyhow::Result<()> {
            panic!("handler exploded")
        })
        .unwrap();
        let h = Harness::new(reg, &BotSettings::default());

        let err = h.dispatcher.dispatch(message("D1", "U9", "boom")).await.unwrap_err();
        assert!(matches!(err, DispatchError::HandlerPanicked { .. }));
    }

    #[tokio::test]
    async fn reply_failure_is_stream_error() {
        let mut reg = HandlerRegistry::new();
        reg.register("^ping$", echo_data).unwrap();
        let (outbound, rx) = Outbound::channel(1);
        drop(rx);
        let d = Dispatcher::new(identity(), Arc::new(reg), outbound, &BotSettings::default());

        let err = d.dispatch(message("D1", "U9", "ping")).await.unwrap_err();
        assert!(matches!(err, DispatchError::Stream(_)));
    }
}
