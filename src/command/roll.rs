use crate::command::{ArgValue, CommandError, Invocation};
use rand::Rng;

pub async fn run(invocation: &Invocation<'_>, args: &[ArgValue]) -> Result<(), CommandError> {
    let max_val = args
        .first()
        .and_then(ArgValue::as_int)
        .ok_or_else(|| CommandError::Argument("missing required argument <max_val>".to_string()))?;

    let value = roll_value(max_val)?;
    invocation.reply(value.to_string()).await
}

fn roll_value(max_val: i64) -> Result<i64, CommandError> {
    // argument sanity check
    if max_val < 1 {
        return Err(CommandError::Argument(
            "argument <max_val> must be at least 1".to_string(),
        ));
    }

    Ok(rand::rng().random_range(1..=max_val))
}
