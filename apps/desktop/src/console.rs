use shared::domain::ControlId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Trigger(ControlId),
    Reconnect,
    Resync,
    Disconnect,
    Help,
    Quit,
}

pub const HELP: &str =
    "commands: trigger <controlId> | reconnect | resync | disconnect | help | quit";

/// Parses one operator line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Option<Result<Command, String>> {
    let mut parts = line.split_whitespace();
    let verb = parts.next()?;
    let command = match (verb, parts.next(), parts.next()) {
        ("trigger", Some(control_id), None) => Ok(Command::Trigger(ControlId::from(control_id))),
        ("trigger", None, _) => Err("trigger needs a control id".to_string()),
        ("reconnect", None, _) => Ok(Command::Reconnect),
        ("resync", None, _) => Ok(Command::Resync),
        ("disconnect", None, _) => Ok(Command::Disconnect),
        ("help", None, _) => Ok(Command::Help),
        ("quit" | "exit", None, _) => Ok(Command::Quit),
        _ => Err(format!("unknown command '{}'", line.trim())),
    };
    Some(command)
}
