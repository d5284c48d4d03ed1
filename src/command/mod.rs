//! Command registry and dispatch.
//!
//! Commands are plain prefixed chat messages (`!roll 6`).  The registry maps each command
//! name to its argument schema and a tagged handler variant; it is built once at startup and
//! only read afterward.  Dispatch tokenizes the message, coerces the raw tokens against the
//! schema, and runs the handler.  Every failure, whether a bad argument, a bad session
//! state, or a failed external call, is caught here and reported to the channel it came from,
//! so one malformed command can never crash or stall the event loop.

use crate::{context::Context, log_error, log_internal, logging::*, voice::SessionError};
use serenity::all::{ChannelId, GuildId, Message, UserId};
use std::collections::HashMap;

mod help;
mod music;
mod roll;

/// What a registered command does, resolved once at registry build time.
#[derive(Clone, Copy, Debug)]
pub enum HandlerKind {
    Roll,
    Play,
    Stop,
    Disconnect,
    Help,
}

/// Type tag a raw token is coerced against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgType {
    /// One token, parsed as a signed integer
    Int,
    /// The rest of the message.  Must be the last declared argument.
    Text,
}

pub struct ArgSpec {
    pub name: &'static str,
    pub ty: ArgType,
}

pub struct CommandSpec {
    pub name: &'static str,
    pub brief: &'static str,
    pub args: &'static [ArgSpec],
    pub handler: HandlerKind,
}

/// A coerced argument, matching its declared [`ArgType`].
#[derive(Debug)]
pub enum ArgValue {
    Int(i64),
    Text(String),
}

impl ArgValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ArgValue::Int(v) => Some(*v),
            ArgValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ArgValue::Text(v) => Some(v),
            ArgValue::Int(_) => None,
        }
    }
}

/// Why a command failed.  The kind decides nothing today beyond the log line, but it keeps
/// argument mistakes, bad session states, and failed external calls from blurring together.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Malformed or missing command argument
    #[error("{0}")]
    Argument(String),
    /// Command invoked while the voice session is in an incompatible state
    #[error("{0}")]
    State(String),
    /// Search, download, or platform call failed
    #[error("{0}")]
    External(String),
}

impl From<serenity::Error> for CommandError {
    fn from(err: serenity::Error) -> Self {
        CommandError::External(err.to_string())
    }
}

impl From<SessionError> for CommandError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotConnected => CommandError::State(err.to_string()),
            SessionError::Join(_) | SessionError::Gateway(_) => {
                CommandError::External(err.to_string())
            }
        }
    }
}

/// The read-only command table.  Registration order is what `help` prints.
pub struct Registry {
    specs: Vec<CommandSpec>,
    by_name: HashMap<&'static str, usize>,
}

impl Registry {
    pub fn new() -> Self {
        let mut registry = Self {
            specs: Vec::new(),
            by_name: HashMap::new(),
        };

        registry.register(CommandSpec {
            name: "roll",
            brief: "Generate random number between 1 and <max_val>",
            args: &[ArgSpec {
                name: "max_val",
                ty: ArgType::Int,
            }],
            handler: HandlerKind::Roll,
        });
        registry.register(CommandSpec {
            name: "play",
            brief: "Connect to channel and play music",
            args: &[ArgSpec {
                name: "query",
                ty: ArgType::Text,
            }],
            handler: HandlerKind::Play,
        });
        registry.register(CommandSpec {
            name: "stop",
            brief: "Stops the bot from playing music",
            args: &[],
            handler: HandlerKind::Stop,
        });
        registry.register(CommandSpec {
            name: "disconnect",
            brief: "Disconnect from channel if alone",
            args: &[],
            handler: HandlerKind::Disconnect,
        });
        registry.register(CommandSpec {
            name: "help",
            brief: "Show this help message",
            args: &[],
            handler: HandlerKind::Help,
        });

        registry
    }

    fn register(&mut self, spec: CommandSpec) {
        // A free-text argument swallows the rest of the message; nothing can follow it.
        debug_assert!(spec
            .args
            .iter()
            .position(|arg| arg.ty == ArgType::Text)
            .map_or(true, |pos| pos == spec.args.len() - 1));

        self.by_name.insert(spec.name, self.specs.len());
        self.specs.push(spec);
    }

    /// Exact, case-sensitive lookup.
    pub fn resolve(&self, name: &str) -> Option<&CommandSpec> {
        self.by_name.get(name).map(|&idx| &self.specs[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandSpec> {
        self.specs.iter()
    }
}

/// Per-invocation view handed to command handlers: who asked, from where, and whether they
/// are currently in a voice channel.  Dropped as soon as the handler returns.
pub struct Invocation<'a> {
    pub ctx: &'a Context<'a>,
    pub msg: &'a Message,
    pub guild_id: Option<GuildId>,
    pub voice_channel: Option<ChannelId>,
}

impl<'a> Invocation<'a> {
    fn new(ctx: &'a Context<'a>, msg: &'a Message) -> Self {
        // The cache ref is a guard; resolve the caller's voice channel before any awaits.
        let voice_channel = msg.guild(ctx.cache).and_then(|guild| {
            guild
                .voice_states
                .get(&msg.author.id)
                .and_then(|state| state.channel_id)
        });

        Self {
            ctx,
            msg,
            guild_id: msg.guild_id,
            voice_channel,
        }
    }

    pub fn guild_id(&self) -> Result<GuildId, CommandError> {
        self.guild_id
            .ok_or_else(|| CommandError::State("This command only works in a server".to_string()))
    }

    pub async fn reply(&self, content: impl Into<String>) -> Result<(), CommandError> {
        self.msg
            .channel_id
            .say(self.ctx.cache_http, content)
            .await
            .map(|_| ())
            .map_err(Into::into)
    }
}

/// Route one message event.  Self-authored messages and unregistered commands are silently
/// ignored; everything else that fails is reported back to the originating channel.
pub async fn dispatch(ctx: &Context<'_>, msg: &Message) {
    let self_id = ctx.cache.current_user().id;
    if !should_dispatch(msg.author.id, self_id) {
        return;
    }

    let Some((name, raw_args)) = tokenize(&ctx.cfg.general.command_prefix, &msg.content) else {
        return;
    };
    let Some(spec) = ctx.registry.resolve(name) else {
        return;
    };

    if let Err(err) = invoke(ctx, msg, spec, &raw_args).await {
        report(ctx, msg, spec, err).await;
    }
}

/// Filter out our own messages so we can never trigger ourselves, no matter what the
/// message says.
fn should_dispatch(author: UserId, self_id: UserId) -> bool {
    author != self_id
}

/// Split a prefixed message into command name and raw argument tokens.  The name must
/// immediately follow the prefix; `! roll` is not a command.
fn tokenize<'a>(prefix: &str, content: &'a str) -> Option<(&'a str, Vec<&'a str>)> {
    let rest = content.strip_prefix(prefix)?;
    let (name, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));

    if name.is_empty() {
        return None;
    }

    Some((name, args.split_whitespace().collect()))
}

/// Coerce raw tokens against the declared argument schema.
fn coerce(spec: &CommandSpec, raw: &[&str]) -> Result<Vec<ArgValue>, CommandError> {
    let mut values = Vec::with_capacity(spec.args.len());

    for (pos, arg) in spec.args.iter().enumerate() {
        match arg.ty {
            ArgType::Int => {
                let token = raw.get(pos).ok_or_else(|| {
                    CommandError::Argument(format!("missing required argument <{}>", arg.name))
                })?;
                let value = token.parse::<i64>().map_err(|_| {
                    CommandError::Argument(format!("argument <{}> must be an integer", arg.name))
                })?;
                values.push(ArgValue::Int(value));
            }
            ArgType::Text => {
                if raw.len() <= pos {
                    return Err(CommandError::Argument(format!(
                        "missing required argument <{}>",
                        arg.name
                    )));
                }
                values.push(ArgValue::Text(raw[pos..].join(" ")));
            }
        }
    }

    Ok(values)
}

async fn invoke(
    ctx: &Context<'_>,
    msg: &Message,
    spec: &CommandSpec,
    raw: &[&str],
) -> Result<(), CommandError> {
    let args = coerce(spec, raw)?;
    let invocation = Invocation::new(ctx, msg);

    match spec.handler {
        HandlerKind::Roll => roll::run(&invocation, &args).await,
        HandlerKind::Play => music::play(&invocation, &args).await,
        HandlerKind::Stop => music::stop(&invocation).await,
        HandlerKind::Disconnect => music::disconnect(&invocation).await,
        HandlerKind::Help => help::run(&invocation).await,
    }
}

/// Single reporting boundary: the error string goes back to the channel the command came
/// from, and the error itself is swallowed.
async fn report(ctx: &Context<'_>, msg: &Message, spec: &CommandSpec, err: CommandError) {
    log_internal!("Command `{}` failed: {}", spec.name, err);

    if let Err(send_err) = msg
        .channel_id
        .say(ctx.cache_http, format!("ERROR: {}", err))
        .await
    {
        log_error!(
            "Could not report `{}` failure to \"{}\": {}",
            spec.name,
            msg.channel_id.color(ctx.http).await,
            send_err,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_authored_messages_never_dispatch() {
        let me = UserId::new(7);
        let someone_else = UserId::new(8);

        assert!(!should_dispatch(me, me));
        assert!(should_dispatch(someone_else, me));
    }

    #[test]
    fn tokenize_requires_prefix() {
        assert!(tokenize("!", "roll 6").is_none());
        assert!(tokenize("!", "hello there").is_none());
    }

    #[test]
    fn tokenize_splits_name_and_args() {
        let (name, args) = tokenize("!", "!roll 6").unwrap();
        assert_eq!(name, "roll");
        assert_eq!(args, vec!["6"]);
    }

    #[test]
    fn tokenize_rejects_bare_or_detached_prefix() {
        assert!(tokenize("!", "!").is_none());
        assert!(tokenize("!", "! roll 6").is_none());
    }

    #[test]
    fn tokenize_handles_no_arguments() {
        let (name, args) = tokenize("!", "!stop").unwrap();
        assert_eq!(name, "stop");
        assert!(args.is_empty());
    }

    #[test]
    fn resolve_is_case_sensitive() {
        let registry = Registry::new();
        assert!(registry.resolve("roll").is_some());
        assert!(registry.resolve("Roll").is_none());
    }

    #[test]
    fn unknown_command_resolves_to_nothing() {
        assert!(Registry::new().resolve("nonexistent").is_none());
    }

    #[test]
    fn registry_lists_all_commands() {
        let names: Vec<_> = Registry::new().iter().map(|spec| spec.name).collect();
        assert_eq!(names, vec!["roll", "play", "stop", "disconnect", "help"]);
    }

    #[test]
    fn coerce_parses_integers() {
        let registry = Registry::new();
        let spec = registry.resolve("roll").unwrap();
        let args = coerce(spec, &["6"]).unwrap();
        assert_eq!(args[0].as_int(), Some(6));
    }

    #[test]
    fn coerce_rejects_non_integer() {
        let registry = Registry::new();
        let spec = registry.resolve("roll").unwrap();
        assert!(matches!(
            coerce(spec, &["six"]),
            Err(CommandError::Argument(_))
        ));
    }

    #[test]
    fn coerce_reports_missing_argument() {
        let registry = Registry::new();
        let spec = registry.resolve("roll").unwrap();
        assert!(matches!(coerce(spec, &[]), Err(CommandError::Argument(_))));

        let spec = registry.resolve("play").unwrap();
        assert!(matches!(coerce(spec, &[]), Err(CommandError::Argument(_))));
    }

    #[test]
    fn coerce_joins_trailing_text() {
        let registry = Registry::new();
        let spec = registry.resolve("play").unwrap();
        let args = coerce(spec, &["never", "gonna", "give"]).unwrap();
        assert_eq!(args[0].as_text(), Some("never gonna give"));
    }
}
