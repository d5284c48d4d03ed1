use crate::command::{CommandError, Invocation};
use std::fmt::Write;

pub async fn run(invocation: &Invocation<'_>) -> Result<(), CommandError> {
    let prefix = &invocation.ctx.cfg.general.command_prefix;

    let mut reply = String::new();
    reply.push_str("```\n");
    reply.push_str("Commands:\n");
    for spec in invocation.ctx.registry.iter() {
        let _ = write!(reply, "{}{}", prefix, spec.name);
        for arg in spec.args {
            let _ = write!(reply, " <{}>", arg.name);
        }
        let _ = writeln!(reply, " - {}", spec.brief);
    }
    reply.push_str("```\n");

    invocation.reply(reply).await
}
