//! Built-in commands.

use std::fmt;

use slackbot_rtm::{BotError, Client, Response};

const PING: &str = "^ping$";
const ECHO: &str = "^echo (.*)$";
const HELP: &str = "^help$";

fn ping(out: &mut dyn fmt::Write, _response: &Response) -> anyhow::Result<()> {
    out.write_str("pong")?;
    Ok(())
}

fn echo(out: &mut dyn fmt::Write, response: &Response) -> anyhow::Result<()> {
    out.write_str(response.data.first().map_or("", String::as_str))?;
    Ok(())
}

/// Register `ping`, `echo <text>` and `help`.
///
/// `help` lists every pattern registered at the time it is added, itself
/// included.
pub fn register_builtins(client: &mut Client) -> Result<(), BotError> {
    client.add_handler(PING, ping)?;
    client.add_handler(ECHO, echo)?;

    let listing: Vec<&str> = client
        .registry()
        .bindings()
        .iter()
        .map(slackbot_rtm::Binding::pattern)
        .chain([HELP])
        .collect();
    let text = format!("commands: {}", listing.join(", "));
    client.add_handler(HELP, move |out: &mut dyn fmt::Write, _r: &Response| -> anyhow::Result<()> {
        out.write_str(&text)?;
        Ok(())
    })
}
