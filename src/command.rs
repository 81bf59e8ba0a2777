//! Inbound interactions and the closed set of `vm` sub-commands.

use std::fmt;

use facet::Facet;

use crate::error::GateError;

/// Name of the single chat command this bot owns.
pub const COMMAND_NAME: &str = "vm";

/// One user-issued command event, as delivered by the chat gateway.
///
/// `value` is the free-text VM option: a numeric id or a name for
/// targeted sub-commands, or the fragment typed so far when
/// `autocomplete` is set.
#[derive(Debug, Clone, Default, PartialEq, Facet)]
#[facet(default)]
pub struct Interaction {
    #[facet(default)]
    pub id: String,
    #[facet(default)]
    pub user: String,
    #[facet(default)]
    pub command: String,
    #[facet(default)]
    pub action: String,
    #[facet(default)]
    pub value: String,
    #[facet(default)]
    pub force: bool,
    #[facet(default)]
    pub autocomplete: bool,
}

impl Interaction {
    /// Build a `vm` command interaction.
    pub fn vm(action: &str, value: &str) -> Self {
        Self {
            command: COMMAND_NAME.into(),
            action: action.into(),
            value: value.into(),
            ..Self::default()
        }
    }

    pub fn is_for_us(&self) -> bool {
        self.command == COMMAND_NAME
    }
}

// ── VmRef ───────────────────────────────────────────────────────────

/// What the user typed to identify a VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmRef {
    Id(u32),
    Name(String),
}

impl VmRef {
    /// Numeric input is taken as an id as-is; anything else is a name to
    /// be looked up in the inventory.
    pub fn parse(input: &str) -> Result<Self, GateError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(GateError::Parse {
                message: "a VM name or id is required".into(),
            });
        }
        match input.parse::<u32>() {
            Ok(id) => Ok(VmRef::Id(id)),
            Err(_) => Ok(VmRef::Name(input.to_string())),
        }
    }
}

impl fmt::Display for VmRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmRef::Id(id) => write!(f, "{id}"),
            VmRef::Name(name) => write!(f, "'{name}'"),
        }
    }
}

// ── VmCommand ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmCommand {
    List,
    Status(VmRef),
    Start(VmRef),
    /// Graceful shutdown unless `force` is set.
    Stop { target: VmRef, force: bool },
}

impl VmCommand {
    pub fn parse(action: &str, value: &str, force: bool) -> Result<Self, GateError> {
        match action {
            "list" => Ok(VmCommand::List),
            "status" => Ok(VmCommand::Status(VmRef::parse(value)?)),
            "start" => Ok(VmCommand::Start(VmRef::parse(value)?)),
            "stop" => Ok(VmCommand::Stop {
                target: VmRef::parse(value)?,
                force,
            }),
            other => Err(GateError::UnknownCommand {
                action: other.to_string(),
            }),
        }
    }

    pub fn from_interaction(interaction: &Interaction) -> Result<Self, GateError> {
        Self::parse(&interaction.action, &interaction.value, interaction.force)
    }

    pub fn target(&self) -> Option<&VmRef> {
        match self {
            VmCommand::List => None,
            VmCommand::Status(target) | VmCommand::Start(target) => Some(target),
            VmCommand::Stop { target, .. } => Some(target),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_input_is_an_id() {
        assert_eq!(VmRef::parse("101").unwrap(), VmRef::Id(101));
        assert_eq!(VmRef::parse(" 101 ").unwrap(), VmRef::Id(101));
    }

    #[test]
    fn text_input_is_a_name() {
        assert_eq!(
            VmRef::parse("webserver").unwrap(),
            VmRef::Name("webserver".into())
        );
        // Leading digits do not make an id
        assert_eq!(VmRef::parse("101abc").unwrap(), VmRef::Name("101abc".into()));
    }

    #[test]
    fn empty_input_is_a_parse_error() {
        assert!(matches!(VmRef::parse("  "), Err(GateError::Parse { .. })));
    }

    #[test]
    fn parse_all_sub_commands() {
        assert_eq!(VmCommand::parse("list", "", false).unwrap(), VmCommand::List);
        assert_eq!(
            VmCommand::parse("status", "db", false).unwrap(),
            VmCommand::Status(VmRef::Name("db".into()))
        );
        assert_eq!(
            VmCommand::parse("start", "100", false).unwrap(),
            VmCommand::Start(VmRef::Id(100))
        );
        assert_eq!(
            VmCommand::parse("stop", "100", true).unwrap(),
            VmCommand::Stop {
                target: VmRef::Id(100),
                force: true
            }
        );
    }

    #[test]
    fn list_ignores_value() {
        assert_eq!(VmCommand::parse("list", "junk", false).unwrap(), VmCommand::List);
    }

    #[test]
    fn targeted_command_without_value_fails() {
        assert!(matches!(
            VmCommand::parse("start", "", false),
            Err(GateError::Parse { .. })
        ));
    }

    #[test]
    fn unknown_action_rejected() {
        let err = VmCommand::parse("reboot", "100", false).unwrap_err();
        assert!(matches!(err, GateError::UnknownCommand { ref action } if action == "reboot"));
    }

    #[test]
    fn interaction_decodes_with_missing_fields() {
        let i: Interaction =
            facet_json::from_str(r#"{"command":"vm","action":"status","value":"db"}"#).unwrap();
        assert!(i.is_for_us());
        assert!(!i.force);
        assert!(!i.autocomplete);
        assert_eq!(
            VmCommand::from_interaction(&i).unwrap(),
            VmCommand::Status(VmRef::Name("db".into()))
        );
    }
}
