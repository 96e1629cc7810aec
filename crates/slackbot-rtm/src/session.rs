//! Session bootstrap: the REST handshake that yields a stream endpoint and
//! the bot's own identity, followed by opening the stream itself.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::errors::BotError;
use crate::stream::{self, WsStream};

/// The bot's identity as assigned by the gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BotIdentity {
    /// Stable user id.
    pub id: String,
    /// Display name.
    pub name: String,
}

impl BotIdentity {
    /// The mention token that addresses this bot by id (`<@ID>`).
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

/// Result of a successful bootstrap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionInfo {
    /// Stream endpoint to connect to.
    pub url: String,
    /// Who the bot is.
    pub identity: BotIdentity,
}

#[derive(Deserialize)]
struct StartResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(rename = "self", default)]
    self_info: Option<SelfInfo>,
}

#[derive(Deserialize)]
struct SelfInfo {
    id: String,
    name: String,
}

/// Perform the authentication exchange against `endpoint`.
///
/// An empty token fails before any request is made.
#[tracing::instrument(skip_all, fields(endpoint = %endpoint))]
pub async fn bootstrap(
    http: &reqwest::Client,
    endpoint: &str,
    token: &SecretString,
) -> Result<SessionInfo, BotError> {
    if token.expose_secret().is_empty() {
        return Err(BotError::Config("missing API token".into()));
    }

    let resp = http
        .post(endpoint)
        .form(&[
            ("token", token.expose_secret()),
            ("simple_latest", ""),
            ("no_unreads", ""),
        ])
        .send()
        .await
        .map_err(|e| BotError::Transport(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(BotError::Transport(format!("HTTP {status}: {body}")));
    }

    let body = resp
        .bytes()
        .await
        .map_err(|e| BotError::Transport(e.to_string()))?;
    let info = parse_start_response(&body)?;
    tracing::info!(bot_id = %info.identity.id, bot_name = %info.identity.name, "session bootstrapped");
    Ok(info)
}

/// Decode a bootstrap response body.
pub fn parse_start_response(body: &[u8]) -> Result<SessionInfo, BotError> {
    let data: StartResponse = serde_json::from_slice(body)
        .map_err(|e| BotError::Protocol(format!("bootstrap response: {e}")))?;

    if !data.ok {
        return Err(BotError::Rejected {
            reason: data.error.unwrap_or_else(|| "unknown_error".into()),
        });
    }

    let url = data
        .url
        .filter(|u| !u.is_empty())
        .ok_or_else(|| BotError::Protocol("bootstrap response has no stream url".into()))?;
    let me = data
        .self_info
        .ok_or_else(|| BotError::Protocol("bootstrap response has no self identity".into()))?;

    Ok(SessionInfo {
        url,
        identity: BotIdentity {
            id: me.id,
            name: me.name,
        },
    })
}

/// A live session: the bot's identity plus its open stream.
pub struct Session {
    identity: BotIdentity,
    stream: WsStream,
}

impl Session {
    /// Bootstrap against `endpoint` and open the returned stream.
    pub async fn open(
        http: &reqwest::Client,
        endpoint: &str,
        token: &SecretString,
    ) -> Result<Self, BotError> {
        let info = bootstrap(http, endpoint, token).await?;
        let stream = stream::connect(&info.url).await?;
        Ok(Self {
            identity: info.identity,
            stream,
        })
    }

    /// The bot's identity.
    pub fn identity(&self) -> &BotIdentity {
        &self.identity
    }

    /// Give up the session, keeping the identity and the stream.
    pub fn into_parts(self) -> (BotIdentity, WsStream) {
        (self.identity, self.stream)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
