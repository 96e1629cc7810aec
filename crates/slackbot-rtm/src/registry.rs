//! Ordered pattern → handler bindings.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use slackbot_settings::MatchPolicy;

use crate::errors::BotError;

/// What a handler is told about the message it answers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Response {
    /// Author id.
    pub user: String,
    /// Gateway timestamp of the message.
    pub time: String,
    /// Conversation the reply goes to.
    pub channel: String,
    /// Capture groups of the matched pattern, left to right. Groups that did
    /// not participate in the match are empty strings.
    pub data: Vec<String>,
}

/// A command handler.
///
/// Writes its reply into `out`. Runs on the blocking pool, so it may block.
pub trait Handler: Send + Sync + 'static {
    /// Produce a reply for `response`.
    fn handle(&self, out: &mut dyn fmt::Write, response: &Response) -> anyhow::Result<()>;
}

impl<F> Handler for F
where
    F: Fn(&mut dyn fmt::Write, &Response) -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn handle(&self, out: &mut dyn fmt::Write, response: &Response) -> anyhow::Result<()> {
        self(out, response)
    }
}

/// One registered (pattern, handler) pair.
#[derive(Clone)]
pub struct Binding {
    pattern: Regex,
    handler: Arc<dyn Handler>,
}

impl Binding {
    /// The pattern source as registered.
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Shared handle to the handler.
    pub fn handler(&self) -> Arc<dyn Handler> {
        Arc::clone(&self.handler)
    }

    /// Captures of the first match in `text`, one entry per group.
    pub fn captures(&self, text: &str) -> Vec<String> {
        extract_captures(&self.pattern, text)
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("pattern", &self.pattern.as_str())
            .finish_non_exhaustive()
    }
}

/// Capture groups of the first match of `re` in `text`.
///
/// The result always has one entry per group in the pattern; a group that
/// did not participate yields `""`. No match yields an empty vector.
pub fn extract_captures(re: &Regex, text: &str) -> Vec<String> {
    let Some(caps) = re.captures(text) else {
        return Vec::new();
    };
    caps.iter()
        .skip(1)
        .map(|m| m.map_or_else(String::new, |m| m.as_str().to_owned()))
        .collect()
}

/// Ordered store of bindings. Filled before the engine starts, read-only
/// afterwards.
#[derive(Clone, Debug, Default)]
pub struct HandlerRegistry {
    bindings: Vec<Binding>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a binding. Duplicates are kept.
    pub fn register(&mut self, pattern: &str, handler: impl Handler) -> Result<(), BotError> {
        let regex = Regex::new(pattern).map_err(|source| BotError::InvalidPattern {
            pattern: pattern.to_owned(),
            source,
        })?;
        self.bindings.push(Binding {
            pattern: regex,
            handler: Arc::new(handler),
        });
        Ok(())
    }

    /// Pick the binding that answers `text` under `policy`.
    ///
    /// With [`MatchPolicy::Last`] every binding is tested and the last match
    /// in registration order wins.
    pub fn select(&self, text: &str, policy: MatchPolicy) -> Option<(usize, &Binding)> {
        match policy {
            MatchPolicy::First => self
                .bindings
                .iter()
                .enumerate()
                .find(|(_, b)| b.pattern.is_match(text)),
            MatchPolicy::Last => {
                let mut which = None;
                for (idx, binding) in self.bindings.iter().enumerate() {
                    if binding.pattern.is_match(text) {
                        which = Some((idx, binding));
                    }
                }
                which
            }
        }
    }

    /// Registered bindings in order.
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
