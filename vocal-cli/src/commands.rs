//! Line commands read from stdin while the loop runs.

use vocal_core::LoopHandle;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Key(String),
    Amount(f32),
    Stop,
}

pub fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let verb = words.next().ok_or_else(|| "empty command".to_string())?;
    let arg = words.next();
    if words.next().is_some() {
        return Err(format!("too many arguments in `{}`", line.trim()));
    }

    match (verb.to_ascii_lowercase().as_str(), arg) {
        ("key", Some(name)) => Ok(Command::Key(name.to_string())),
        ("amount", Some(value)) => value
            .parse::<f32>()
            .map(Command::Amount)
            .map_err(|_| format!("`{}` is not a number", value)),
        ("stop" | "quit", None) => Ok(Command::Stop),
        ("key" | "amount", None) => Err(format!("`{}` needs a value", verb)),
        _ => Err(format!("unknown command `{}`", line.trim())),
    }
}

pub fn apply(command: Command, handle: &LoopHandle) {
    match command {
        Command::Key(name) => handle.set_key_name(&name),
        Command::Amount(percent) => handle.set_amount(percent),
        Command::Stop => handle.stop(),
    }
}
