//! Operator console grammar.
//!
//! A handful of leading tokens name administrative commands that act on the
//! local node table. Every other line is a protocol request and is forwarded
//! to the gateway untouched.

use crate::address::NodeAddress;
use crate::error::{ProtocolError, ProtocolResult};

/// Leading tokens handled locally instead of being sent to the gateway.
pub const ADMIN_COMMANDS: &[&str] = &["name", "prune", "session_reset"];

/// Administrative command executed against the node table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    /// `name <addr-hex> <new-name...>`
    Name { address: NodeAddress, name: String },
    /// `prune`: drop nodes that have gone quiet.
    Prune,
    /// `session_reset`: forget per-session health accounting.
    SessionReset,
}

/// One line typed by the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Local administrative command.
    Admin(AdminCommand),
    /// Request forwarded verbatim to the gateway.
    Request(String),
}

impl ConsoleCommand {
    /// Tokenize and classify an operator line.
    pub fn parse(text: &str) -> ProtocolResult<ConsoleCommand> {
        let text = text.trim();
        let mut tokens = text.split_whitespace();
        let op = tokens.next().ok_or(ProtocolError::Empty)?;

        let command = match op {
            "name" => {
                let address_token = tokens
                    .next()
                    .ok_or_else(|| ProtocolError::InvalidCommand("usage: name <addr-hex> <new-name>".into()))?;
                let address = NodeAddress::parse_hex(address_token).ok_or_else(|| {
                    ProtocolError::InvalidField {
                        op: "name",
                        field: "address",
                        value: address_token.to_string(),
                    }
                })?;
                let name = tokens.collect::<Vec<_>>().join(" ");
                if name.is_empty() {
                    return Err(ProtocolError::InvalidCommand(
                        "usage: name <addr-hex> <new-name>".into(),
                    ));
                }
                AdminCommand::Name { address, name }
            }
            "prune" => AdminCommand::Prune,
            "session_reset" => AdminCommand::SessionReset,
            _ => return Ok(ConsoleCommand::Request(text.to_string())),
        };

        Ok(ConsoleCommand::Admin(command))
    }

    /// Whether a raw operator line names a local administrative command.
    pub fn is_admin_line(text: &str) -> bool {
        text.split_whitespace()
            .next()
            .is_some_and(|op| ADMIN_COMMANDS.contains(&op))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_name() {
        let command = ConsoleCommand::parse("name 000d  LPN   PCB ").unwrap();
        assert_eq!(
            command,
            ConsoleCommand::Admin(AdminCommand::Name {
                address: NodeAddress(0x000D),
                name: "LPN PCB".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_local_commands() {
        assert_eq!(
            ConsoleCommand::parse("prune").unwrap(),
            ConsoleCommand::Admin(AdminCommand::Prune)
        );
        assert_eq!(
            ConsoleCommand::parse("  session_reset").unwrap(),
            ConsoleCommand::Admin(AdminCommand::SessionReset)
        );
    }

    #[test]
    fn test_other_lines_are_requests() {
        assert_eq!(
            ConsoleCommand::parse("config_client 0005 reset").unwrap(),
            ConsoleCommand::Request("config_client 0005 reset".to_string())
        );
        assert_eq!(
            ConsoleCommand::parse("pruned").unwrap(),
            ConsoleCommand::Request("pruned".to_string())
        );
    }

    #[test]
    fn test_name_errors() {
        assert!(matches!(
            ConsoleCommand::parse("name"),
            Err(ProtocolError::InvalidCommand(_))
        ));
        assert!(matches!(
            ConsoleCommand::parse("name 0005"),
            Err(ProtocolError::InvalidCommand(_))
        ));
        assert!(matches!(
            ConsoleCommand::parse("name kitchen Lamp"),
            Err(ProtocolError::InvalidField { field: "address", .. })
        ));
        assert_eq!(ConsoleCommand::parse("   "), Err(ProtocolError::Empty));
    }

    #[test]
    fn test_is_admin_line() {
        assert!(ConsoleCommand::is_admin_line("name 0005 Door"));
        assert!(ConsoleCommand::is_admin_line("prune"));
        assert!(!ConsoleCommand::is_admin_line("reset 0005"));
        assert!(!ConsoleCommand::is_admin_line(""));
    }
}
