/// Operator commands typed into the dashboard's terminal
use crate::models::RelayAction;

pub const HELP: &str = "Commands: on | off | unit <ID> | units | panels | help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    Relay(RelayAction),
    Select(String),
    ListUnits,
    Panels,
    Help,
    Quit,
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<OperatorCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "on" => OperatorCommand::Relay(RelayAction::On),
        "off" => OperatorCommand::Relay(RelayAction::Off),
        "unit" | "select" => match words.next() {
            Some(id) => OperatorCommand::Select(id.to_string()),
            None => return Err("usage: unit <ID>".to_string()),
        },
        "units" => OperatorCommand::ListUnits,
        "panels" => OperatorCommand::Panels,
        "help" | "?" => OperatorCommand::Help,
        "quit" | "exit" | "q" => OperatorCommand::Quit,
        other => return Err(format!("unknown command '{}'. {}", other, HELP)),
    };

    Ok(Some(command))
}
