//! # slackbot-settings
//!
//! Configuration for the slackbot RTM client, loaded from three layers
//! (in priority order):
//! 1. **Compiled defaults**: [`BotSettings::default()`]
//! 2. **User file**: `~/.slackbot/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `SLACKBOT_*` overrides (highest priority)
//!
//! The API token is not part of the settings file; the embedder
//! supplies it directly to the client.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::{BotSettings, HighlightStrip, MatchPolicy};
