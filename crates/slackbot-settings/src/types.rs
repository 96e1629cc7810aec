//! Settings type definitions.
//!
//! Field names are camelCase on the wire. Every field has a default, so a
//! partial JSON file only needs to name what it changes.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Which binding answers when several patterns match the same text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// Scan every binding and keep the last one that matched.
    #[default]
    Last,
    /// Stop at the first binding that matches.
    First,
}

impl std::str::FromStr for MatchPolicy {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "last" => Ok(Self::Last),
            "first" => Ok(Self::First),
            other => Err(SettingsError::InvalidValue(format!(
                "unknown match policy '{other}'"
            ))),
        }
    }
}

/// How the leading highlight is removed when the bot is addressed by name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightStrip {
    /// Remove exactly the prefix that matched.
    #[default]
    Exact,
    /// Remove as many bytes as the bot id is long, whatever form matched.
    Legacy,
}

impl std::str::FromStr for HighlightStrip {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "legacy" => Ok(Self::Legacy),
            other => Err(SettingsError::InvalidValue(format!(
                "unknown highlight strip mode '{other}'"
            ))),
        }
    }
}

/// Root settings for the bot client.
///
/// ```json
/// {
///   "apiUrl": "https://slack.com/api/",
///   "matchPolicy": "first",
///   "outboundQueue": 128
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BotSettings {
    /// Base URL of the REST API, with trailing slash.
    pub api_url: String,
    /// REST method that opens a streaming session.
    pub bootstrap_method: String,
    /// Channel id prefix that marks a direct-message conversation.
    pub direct_channel_prefix: String,
    /// Binding selection policy.
    pub match_policy: MatchPolicy,
    /// Highlight stripping mode.
    pub highlight_strip: HighlightStrip,
    /// Bound of the queue between the stream reader and the router.
    pub intake_capacity: usize,
    /// Bound of the queue feeding the single outbound writer.
    pub outbound_queue: usize,
    /// Default log level (`RUST_LOG` still wins).
    pub log_level: String,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            api_url: "https://slack.com/api/".into(),
            bootstrap_method: "rtm.start".into(),
            direct_channel_prefix: "D".into(),
            match_policy: MatchPolicy::default(),
            highlight_strip: HighlightStrip::default(),
            intake_capacity: 1,
            outbound_queue: 64,
            log_level: "info".into(),
        }
    }
}

impl BotSettings {
    /// Full URL of the bootstrap endpoint.
    pub fn bootstrap_url(&self) -> String {
        if self.api_url.ends_with('/') {
            format!("{}{}", self.api_url, self.bootstrap_method)
        } else {
            format!("{}/{}", self.api_url, self.bootstrap_method)
        }
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.intake_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "intakeCapacity must be at least 1".into(),
            ));
        }
        if self.outbound_queue == 0 {
            return Err(SettingsError::InvalidValue(
                "outboundQueue must be at least 1".into(),
            ));
        }
        if self.api_url.is_empty() {
            return Err(SettingsError::InvalidValue("apiUrl is empty".into()));
        }
        Ok(())
    }
}
