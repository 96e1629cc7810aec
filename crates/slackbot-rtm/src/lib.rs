//! # slackbot-rtm
//!
//! Client for a real-time messaging gateway. Authenticates over REST, opens
//! the persistent event stream, and answers messages addressed to the bot
//! by running the first (or last) matching registered handler and writing
//! its output back to the originating channel.
//!
//! Tasks, once [`Client::start`] runs:
//! - **writer**: owns the stream's write half and the outbound id counter
//! - **ingestor**: reads frames, decodes envelopes, feeds the router
//! - **router**: routes envelopes and supervises one task per message
//! - **dispatch**: one per message; handler runs on the blocking pool
//!
//! ```no_run
//! use std::fmt::Write as _;
//!
//! # async fn run() -> Result<(), slackbot_rtm::BotError> {
//! let mut client = slackbot_rtm::Client::new("xoxb-token")?;
//! client.add_handler("^ping$", |out: &mut dyn std::fmt::Write, _r: &slackbot_rtm::Response| -> anyhow::Result<()> {
//!     out.write_str("pong")?;
//!     Ok(())
//! })?;
//! client.start().await
//! # }
//! ```

#![deny(unsafe_code)]

pub mod client;
pub mod dispatch;
pub mod envelope;
pub mod errors;
pub mod ingest;
pub mod logging;
pub mod registry;
pub mod router;
pub mod session;
pub mod stream;

pub use client::Client;
pub use dispatch::{DispatchOutcome, Dispatcher};
pub use envelope::{Envelope, MessageEvent, OutboundFrame};
pub use errors::{BotError, DispatchError, StreamError};
pub use registry::{Binding, Handler, HandlerRegistry, Response};
pub use router::{Router, RouterExit, RouterStats};
pub use session::{BotIdentity, Session, SessionInfo};
pub use slackbot_settings::BotSettings;
